//! Common types used throughout the middleware pipeline.

use bytes::Bytes;
use docgate_core::GatewayError;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

/// The HTTP request type used in the middleware pipeline.
///
/// This is a standard `http::Request` with a fully collected body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
pub type Response = http::Response<Full<Bytes>>;

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Extension trait for building gateway responses.
pub trait ResponseExt {
    /// A response with `status` and no body.
    fn empty(status: StatusCode) -> Response;

    /// A plain-text response.
    fn text(status: StatusCode, body: &'static str) -> Response;

    /// A JSON response. Serialization failure yields an empty 500.
    fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response;

    /// The response for a gateway error.
    ///
    /// Method-not-allowed responses carry an `Allow` header. Categories
    /// without a body get an empty one.
    fn from_error(error: &GatewayError) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn text(status: StatusCode, body: &'static str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        response
    }

    fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let mut response = http::Response::new(Full::new(Bytes::from(body)));
                *response.status_mut() = status;
                response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                response
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response body");
                Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn from_error(error: &GatewayError) -> Response {
        let mut response = match error.to_body() {
            Some(body) => Self::json(error.status_code(), &body),
            None => Self::empty(error.status_code()),
        };
        if let GatewayError::MethodNotAllowed { allowed, .. } = error {
            if let Ok(value) = HeaderValue::from_str(allowed) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}
