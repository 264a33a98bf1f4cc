//! Test request building.

use crate::error::TestError;
use bytes::Bytes;
use docgate_middleware::Request;
use http::{header, HeaderName, HeaderValue, Method};
use http_body_util::Full;
use serde::Serialize;

/// Builder for a gateway request.
///
/// Headers are checked when the request is built, so a bad header name
/// surfaces as a [`TestError`] rather than a panic mid-chain.
#[must_use]
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl TestRequest {
    /// Starts a request.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `GET uri`
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// `POST uri`
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    /// `PUT uri`
    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Method::PUT, uri)
    }

    /// `DELETE uri`
    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds `Authorization: Bearer <token>`.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and the matching content type.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, TestError> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        Ok(self.header(header::CONTENT_TYPE.as_str(), "application/json"))
    }

    /// The method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Builds the HTTP request.
    pub fn build(self) -> Result<Request, TestError> {
        let mut builder = http::Request::builder().method(self.method).uri(self.uri.as_str());
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| TestError::RequestBuild(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| TestError::RequestBuild(format!("invalid header value: {e}")))?;
            builder = builder.header(name, value);
        }
        builder
            .body(Full::new(self.body))
            .map_err(|e| TestError::RequestBuild(format!("invalid request {}: {e}", self.uri)))
    }
}
