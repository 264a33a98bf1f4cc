//! HTTP/1.1 server.
//!
//! Accepts connections, collects each request body under the request
//! timeout and the body limit, and hands the request to the [`Gateway`].
//!
//! | Condition | Status |
//! |---|---|
//! | body larger than `max_body_bytes` | 413 |
//! | body not received within `request_timeout` | 408 |
//! | body stream broken | 400 |
//! | handling exceeds `request_timeout` | 504 (from the gateway) |
//!
//! Every response carries `x-request-id`.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway::Gateway;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use docgate_core::{GatewayError, RequestId};
use docgate_middleware::stages::stamp_request_id;
use docgate_middleware::{Response, ResponseExt};
use docgate_telemetry::{record_request, InFlightGuard};
use http::request::Parts;
use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// The gateway HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    gateway: Arc<Gateway>,
}

impl Server {
    /// Creates a server. The gateway's handling timeout is set to the
    /// configured request timeout.
    pub fn new(config: ServerConfig, gateway: Gateway) -> Self {
        let gateway = gateway.request_timeout(config.request_timeout());
        Self {
            config,
            gateway: Arc::new(gateway),
        }
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The gateway requests are handed to.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals())
            .await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("invalid address '{}': {e}", self.config.http_addr()))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind {addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// fires, then drains open connections for up to the shutdown timeout.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                debug!(remote_addr = %remote_addr, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },

                () = shutdown.recv() => {
                    info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        info!(
            active_connections = tracker.active_connections(),
            timeout_secs = shutdown_timeout.as_secs(),
            "draining connections"
        );
        tokio::select! {
            () = tracker.wait_idle() => info!("all connections closed"),
            () = tokio::time::sleep(shutdown_timeout) => warn!(
                active_connections = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            ),
        }

        info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);
        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req, remote_addr).await }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.config.keep_alive())
            .serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                // Let the in-flight request finish, then close.
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response, Infallible> {
        let _in_flight = InFlightGuard::new();
        let started = Instant::now();
        let (parts, body) = req.into_parts();

        let collected = tokio::time::timeout(
            self.config.request_timeout(),
            Limited::new(body, self.config.max_body_bytes()).collect(),
        )
        .await;

        let body = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(
                    path = %parts.uri.path(),
                    limit = self.config.max_body_bytes(),
                    "request body too large"
                );
                let response = Response::empty(StatusCode::PAYLOAD_TOO_LARGE);
                return Ok(self.reject(&parts, response, started));
            }
            Ok(Err(e)) => {
                warn!(path = %parts.uri.path(), error = %e, "failed to read request body");
                let response = Response::empty(StatusCode::BAD_REQUEST);
                return Ok(self.reject(&parts, response, started));
            }
            Err(_) => {
                warn!(path = %parts.uri.path(), "request body timed out");
                let response = Response::from_error(&GatewayError::request_timeout(
                    "Request body was not received in time",
                ));
                return Ok(self.reject(&parts, response, started));
            }
        };

        let request = Request::from_parts(parts, Full::new(body));
        Ok(self.gateway.handle(request, Some(remote_addr)).await)
    }

    fn reject(&self, parts: &Parts, mut response: Response, started: Instant) -> Response {
        stamp_request_id(&mut response, RequestId::new());
        let label = self
            .gateway
            .router()
            .resolve(&parts.method, parts.uri.path())
            .map_or("unmatched", |endpoint| endpoint.name());
        record_request(label, response.status().as_u16(), started.elapsed());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_middleware::stages::REQUEST_ID_HEADER;
    use docgate_middleware::{BoxFuture, Middleware, MiddlewareContext, Next};
    use docgate_store::MemoryStore;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct AllowAll;

    impl Middleware for AllowAll {
        fn name(&self) -> &'static str {
            "allow_all"
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: docgate_middleware::Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(next.run(ctx, request))
        }
    }

    type ServeHandle = tokio::task::JoinHandle<Result<(), ServerError>>;

    async fn start(config: ServerConfig) -> (SocketAddr, ShutdownSignal, ServeHandle) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let gateway = Gateway::new(Arc::new(MemoryStore::new()), Arc::new(AllowAll));
        let server = Server::new(config, gateway);
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, shutdown, handle)
    }

    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8(response).unwrap()
    }

    #[tokio::test]
    async fn test_health_over_tcp() {
        let (addr, shutdown, handle) = start(ServerConfig::default()).await;

        let response = exchange(
            addr,
            b"GET /health HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains(REQUEST_ID_HEADER));
        assert!(response.ends_with("OK"));

        shutdown.trigger();
        tokio_test::assert_ok!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_document_round_trip_over_tcp() {
        let (addr, shutdown, handle) = start(ServerConfig::default()).await;

        let body = r#"{"data": {"name": "widget"}}"#;
        let request = format!(
            "POST /v1/insert-one?database=shop&collection=orders HTTP/1.1\r\nhost: localhost\r\n\
             content-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let response = exchange(addr, request.as_bytes()).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains(r#""Acknowledged":true"#));

        shutdown.trigger();
        tokio_test::assert_ok!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let config = ServerConfig::builder().max_body_bytes(16).build();
        let (addr, shutdown, handle) = start(config).await;

        let body = r#"{"data": {"name": "far too long for the limit"}}"#;
        let request = format!(
            "POST /v1/insert-one?database=a&collection=b HTTP/1.1\r\nhost: localhost\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let response = exchange(addr, request.as_bytes()).await;
        assert!(response.starts_with("HTTP/1.1 413"), "{response}");
        assert!(response.contains(REQUEST_ID_HEADER));

        shutdown.trigger();
        tokio_test::assert_ok!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_stalled_body_times_out() {
        let config = ServerConfig::builder()
            .request_timeout(Duration::from_millis(100))
            .build();
        let (addr, shutdown, handle) = start(config).await;

        // Announce more bytes than are sent.
        let response = exchange_half_open(
            addr,
            b"POST /v1/get-all?database=a&collection=b HTTP/1.1\r\nhost: localhost\r\n\
              content-length: 100\r\n\r\n{\"filter\"",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 408"), "{response}");

        shutdown.trigger();
        tokio_test::assert_ok!(handle.await.unwrap());
    }

    // Writes without closing the write half and reads one response.
    async fn exchange_half_open(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_bind_error() {
        let config = ServerConfig::builder().http_addr("not-an-address").build();
        let gateway = Gateway::new(Arc::new(MemoryStore::new()), Arc::new(AllowAll));
        let err = Server::new(config, gateway)
            .run_with_shutdown(ShutdownSignal::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Bind(_)));
    }
}
