//! Authentication bypass for local development.
//!
//! Skips credential checks and scopes every request to one fixed
//! organization with no user. Only compiled with the `insecure-bypass`
//! feature, and [`BypassMiddleware::new`] refuses any listener that is not
//! on a loopback address.

use super::auth_context::{log_completed, log_received, AUTH_LOG_TARGET};
use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use docgate_core::AuthContext;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::warn;

/// The bypass was requested for a listener reachable from other hosts.
#[derive(Debug, Error)]
#[error("authentication bypass refused: {0} is not a loopback address")]
pub struct BypassRefused(pub SocketAddr);

/// Injects a fixed organization without checking credentials.
#[derive(Debug, Clone)]
pub struct BypassMiddleware {
    auth: AuthContext,
}

impl BypassMiddleware {
    /// Creates the stage for a server bound to `bind_addr`.
    pub fn new(
        bind_addr: SocketAddr,
        organization_id: impl Into<String>,
    ) -> Result<Self, BypassRefused> {
        if !bind_addr.ip().is_loopback() {
            return Err(BypassRefused(bind_addr));
        }
        let auth = AuthContext::organization_only(organization_id);
        warn!(
            target: AUTH_LOG_TARGET,
            addr = %bind_addr,
            organization_id = auth.organization_id(),
            "authentication bypass enabled; every request is trusted"
        );
        Ok(Self { auth })
    }

    /// The organization every request is scoped to.
    pub fn organization_id(&self) -> &str {
        self.auth.organization_id()
    }
}

impl Middleware for BypassMiddleware {
    fn name(&self) -> &'static str {
        "auth_bypass"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            log_received(ctx, &request);
            ctx.set_auth_context(self.auth.clone());
            let response = next.run(ctx, request).await;
            log_completed(ctx, &response, &self.auth);
            response
        })
    }
}
