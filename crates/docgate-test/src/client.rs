//! In-memory client for a [`Gateway`].

use crate::error::TestError;
use crate::request::TestRequest;
use crate::response::TestResponse;
use docgate_core::{CommandKind, DocumentStore};
use docgate_middleware::stages::AuthContextMiddleware;
use docgate_middleware::{IdentityVerifier, OrganizationResolver};
use docgate_server::Gateway;
use http::Method;
use std::net::SocketAddr;
use std::sync::Arc;

/// Sends requests straight into [`Gateway::handle`], with no socket.
///
/// Requests run the full routing and middleware path, so status codes,
/// headers and store calls match what a real listener would produce.
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    gateway: Arc<Gateway>,
    remote_addr: Option<SocketAddr>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Wraps an existing gateway.
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
            remote_addr: None,
            default_headers: Vec::new(),
        }
    }

    /// Builds a gateway over `store` with the regular auth stage.
    pub fn with_auth(
        store: Arc<dyn DocumentStore>,
        verifier: Arc<dyn IdentityVerifier>,
        resolver: Arc<dyn OrganizationResolver>,
    ) -> Self {
        let auth = Arc::new(AuthContextMiddleware::new(verifier, resolver));
        Self::new(Gateway::new(store, auth))
    }

    /// Reports `addr` as the peer address.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Adds a header to every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The gateway under test.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Starts a `GET`.
    pub fn get(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a `POST`.
    pub fn post(&self, uri: impl Into<String>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl Into<String>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::new(method, uri))
    }

    /// Starts a document operation on its route and method, with `query`
    /// appended (for example `"database=shop&collection=orders"`).
    pub fn operation(&self, kind: CommandKind, query: &str) -> TestClientRequest<'_> {
        let uri = if query.is_empty() {
            kind.path().to_string()
        } else {
            format!("{}?{query}", kind.path())
        };
        self.request(kind.method(), uri)
    }

    async fn send_request(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let request = request.build()?;
        let response = self.gateway.handle(request, self.remote_addr).await;
        Ok(TestResponse::from_response(response).await)
    }
}

/// A request being built by a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    request: TestRequest,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut request: TestRequest) -> Self {
        for (name, value) in &client.default_headers {
            request = request.header(name.clone(), value.clone());
        }
        Self { client, request }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request = self.request.header(name, value);
        self
    }

    /// Adds `Authorization: Bearer <token>`.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.request = self.request.bearer_token(token);
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.request = self.request.body(body);
        self
    }

    /// Sets a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be serialized.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.request = self
            .request
            .json(value)
            .unwrap_or_else(|e| panic!("test body is not serializable: {e}"));
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built. Use [`try_send`](Self::try_send)
    /// to get the error instead.
    pub async fn send(self) -> TestResponse {
        self.try_send()
            .await
            .unwrap_or_else(|e| panic!("test request failed: {e}"))
    }

    /// Sends the request, returning build errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        self.client.send_request(self.request).await
    }
}
