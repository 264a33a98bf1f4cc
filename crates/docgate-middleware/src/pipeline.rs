//! Ordered middleware pipeline.
//!
//! The gateway runs two stages in front of every document route:
//!
//! 1. **Request ID** - assign the id and echo it on the response
//! 2. **Authentication** - verify the bearer credential and resolve the
//!    organization, or the loopback-only bypass
//!
//! Stages run in insertion order; the handler runs last.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, ordered list of stages.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .stage(RequestIdMiddleware::new())
///     .boxed_stage(auth)
///     .build();
///
/// let response = pipeline.process(&mut ctx, request, handler).await;
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs `request` through every stage and then `handler`.
    ///
    /// The context is borrowed so the caller can read what the stages
    /// recorded once the response is ready.
    pub async fn process<H>(
        &self,
        ctx: &mut MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::RequestIdMiddleware;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::Full;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        order: Arc<AtomicUsize>,
        seen_at: Arc<AtomicUsize>,
    }

    impl Middleware for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                let position = self.order.fetch_add(1, Ordering::SeqCst);
                self.seen_at.store(position, Ordering::SeqCst);
                next.run(ctx, request).await
            })
        }
    }

    fn create_request() -> Request {
        HttpRequest::builder()
            .uri("/v1/get-one")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_pipeline_executes_in_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(AtomicUsize::new(usize::MAX));
        let second = Arc::new(AtomicUsize::new(usize::MAX));

        let pipeline = Pipeline::builder()
            .stage(Counting {
                name: "first",
                order: order.clone(),
                seen_at: first.clone(),
            })
            .stage(Counting {
                name: "second",
                order: order.clone(),
                seen_at: second.clone(),
            })
            .build();

        let mut ctx = MiddlewareContext::new();
        let response = pipeline
            .process(&mut ctx, create_request(), |_ctx, _req| {
                Box::pin(async { Response::empty(StatusCode::OK) })
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_handler() {
        let pipeline = Pipeline::builder().build();
        assert_eq!(pipeline.stage_count(), 0);

        let mut ctx = MiddlewareContext::new();
        let response = pipeline
            .process(&mut ctx, create_request(), |_ctx, _req| {
                Box::pin(async { Response::empty(StatusCode::NO_CONTENT) })
            })
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_handler_sees_context_written_by_stages() {
        let pipeline = Pipeline::builder()
            .boxed_stage(Arc::new(RequestIdMiddleware::new()))
            .build();

        let mut ctx = MiddlewareContext::new();
        let response = pipeline
            .process(&mut ctx, create_request(), |ctx, _req| {
                let id = ctx.request_id().to_string();
                Box::pin(async move {
                    assert!(!id.is_empty());
                    Response::empty(StatusCode::OK)
                })
            })
            .await;

        let header = response.headers().get("x-request-id").unwrap();
        assert_eq!(header.to_str().unwrap(), ctx.request_id().to_string());
    }
}
