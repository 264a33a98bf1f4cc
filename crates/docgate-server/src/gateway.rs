//! The gateway: routing, middleware and dispatch over a collected request.
//!
//! [`Gateway::handle`] is transport independent. The HTTP server feeds it
//! requests whose bodies are already collected, and tests can call it
//! directly.
//!
//! Requests run through one of two pipelines:
//!
//! - document routes: request id, then the auth stage, then the dispatcher
//! - everything else (`/health`, 404, 405): request id only
//!
//! A wrong method is therefore answered before the credential is looked at
//! or the body is decoded.

use crate::dispatch::Dispatcher;
use crate::router::{Endpoint, Router};
use docgate_core::{CommandKind, DocumentStore, GatewayError};
use docgate_middleware::stages::{stamp_request_id, RequestIdMiddleware};
use docgate_middleware::{
    BoxFuture, BoxedMiddleware, MiddlewareContext, Pipeline, Request, Response, ResponseExt,
};
use docgate_telemetry::record_request;
use http::StatusCode;
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default handling timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes and serves gateway requests.
#[derive(Debug, Clone)]
pub struct Gateway {
    router: Router,
    plain: Pipeline,
    documents: Pipeline,
    dispatcher: Arc<Dispatcher>,
    request_timeout: Duration,
}

impl Gateway {
    /// Creates a gateway over `store`, authenticating document requests
    /// with `auth`.
    pub fn new(store: Arc<dyn DocumentStore>, auth: BoxedMiddleware) -> Self {
        Self::with_request_ids(store, auth, RequestIdMiddleware::new())
    }

    /// Like [`Gateway::new`] with a custom request-id stage.
    pub fn with_request_ids(
        store: Arc<dyn DocumentStore>,
        auth: BoxedMiddleware,
        request_ids: RequestIdMiddleware,
    ) -> Self {
        let plain = Pipeline::builder().stage(request_ids.clone()).build();
        let documents = Pipeline::builder()
            .stage(request_ids)
            .boxed_stage(auth)
            .build();
        Self {
            router: Router::new(),
            plain,
            documents,
            dispatcher: Arc::new(Dispatcher::new(store)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets how long authentication plus dispatch may take (504 after).
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The document dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Stage names of the document pipeline.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.documents.stage_names()
    }

    /// Serves one request.
    pub async fn handle(&self, request: Request, remote_addr: Option<SocketAddr>) -> Response {
        let mut ctx = MiddlewareContext::new();
        if let Some(addr) = remote_addr {
            ctx.set_remote_addr(addr);
        }

        let endpoint = self.router.resolve(request.method(), request.uri().path());
        let label = endpoint.as_ref().map_or("unmatched", |endpoint| endpoint.name());

        let response = match endpoint {
            Ok(Endpoint::Document(kind)) => {
                ctx.set_operation(kind);
                self.serve_document(&mut ctx, kind, request).await
            }
            Ok(Endpoint::Health) => {
                self.plain
                    .process(&mut ctx, request, |_ctx, _req| {
                        Box::pin(async { Response::text(StatusCode::OK, "OK") })
                    })
                    .await
            }
            Err(err) => {
                debug!(
                    request_id = %ctx.request_id(),
                    method = %request.method(),
                    path = %request.uri().path(),
                    error = %err,
                    "request not routed"
                );
                self.plain
                    .process(&mut ctx, request, move |_ctx, _req| {
                        Box::pin(async move { Response::from_error(&err) })
                    })
                    .await
            }
        };

        record_request(label, response.status().as_u16(), ctx.elapsed());
        response
    }

    async fn serve_document(
        &self,
        ctx: &mut MiddlewareContext,
        kind: CommandKind,
        request: Request,
    ) -> Response {
        let handler = document_handler(Arc::clone(&self.dispatcher), kind);
        let processed =
            tokio::time::timeout(self.request_timeout, self.documents.process(ctx, request, handler))
                .await;

        match processed {
            Ok(response) => response,
            Err(_) => {
                warn!(
                    request_id = %ctx.request_id(),
                    operation = kind.name(),
                    timeout_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                    "request handling timed out"
                );
                let mut response =
                    Response::from_error(&GatewayError::timeout("Request handling timed out"));
                stamp_request_id(&mut response, ctx.request_id());
                response
            }
        }
    }
}

fn document_handler(
    dispatcher: Arc<Dispatcher>,
    kind: CommandKind,
) -> impl FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static {
    move |ctx: &mut MiddlewareContext, request: Request| -> BoxFuture<'static, Response> {
        let scope = ctx.to_request_context();
        Box::pin(async move {
            let query = request.uri().query().map(str::to_owned);
            let body = match request.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };
            dispatcher
                .handle(&scope, kind, query.as_deref(), &body)
                .await
        })
    }
}
