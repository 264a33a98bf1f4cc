//! Authentication context middleware.
//!
//! For every document request:
//!
//! 1. take the bearer credential from `Authorization` (401 when absent)
//! 2. verify it with the [`IdentityVerifier`] (401 on failure)
//! 3. resolve the user's organization with the [`OrganizationResolver`]
//!    (401 on failure, including a user with no membership)
//! 4. attach the [`AuthContext`] and run the rest of the chain
//!
//! 401 responses have an empty body. Tokens never appear in logs.

use crate::context::MiddlewareContext;
use crate::error::AuthError;
use crate::identity::{bearer_token, IdentityVerifier};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::organization::OrganizationResolver;
use crate::types::{Request, Response, ResponseExt};
use docgate_core::{AuthContext, GatewayError};
use docgate_telemetry::record_auth_failure;
use http::header::AUTHORIZATION;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Log target shared by the auth stages.
pub const AUTH_LOG_TARGET: &str = "docgate::auth";

/// Verifies the caller and scopes the request to an organization.
#[derive(Clone)]
pub struct AuthContextMiddleware {
    verifier: Arc<dyn IdentityVerifier>,
    resolver: Arc<dyn OrganizationResolver>,
}

impl std::fmt::Debug for AuthContextMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContextMiddleware").finish_non_exhaustive()
    }
}

impl AuthContextMiddleware {
    /// Creates the stage from its two collaborators.
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        resolver: Arc<dyn OrganizationResolver>,
    ) -> Self {
        Self { verifier, resolver }
    }

    fn reject(ctx: &MiddlewareContext, err: AuthError, message: &'static str) -> Response {
        record_auth_failure(err.reason());
        let reason = err.to_string();
        let response = Response::from_error(&GatewayError::from(err));
        warn!(
            target: AUTH_LOG_TARGET,
            request_id = %ctx.request_id(),
            status = response.status().as_u16(),
            duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX),
            reason = %reason,
            "{message}"
        );
        response
    }
}

/// Logs request arrival with method, path and peer address.
pub(crate) fn log_received(ctx: &MiddlewareContext, request: &Request) {
    info!(
        target: AUTH_LOG_TARGET,
        request_id = %ctx.request_id(),
        method = %request.method(),
        path = %request.uri().path(),
        remote_addr = ?ctx.remote_addr(),
        "request received"
    );
}

/// Logs completion with status, latency and the caller's scope.
pub(crate) fn log_completed(ctx: &MiddlewareContext, response: &Response, auth: &AuthContext) {
    info!(
        target: AUTH_LOG_TARGET,
        request_id = %ctx.request_id(),
        status = response.status().as_u16(),
        duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX),
        user_id = auth.user_id().unwrap_or("-"),
        organization_id = auth.organization_id(),
        "request completed"
    );
}

impl Middleware for AuthContextMiddleware {
    fn name(&self) -> &'static str {
        "auth_context"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            log_received(ctx, &request);

            let Some(header) = request.headers().get(AUTHORIZATION) else {
                return Self::reject(ctx, AuthError::MissingCredential, "credential rejected");
            };
            let identity = match bearer_token(header) {
                Ok(token) => self.verifier.verify(token).await,
                Err(err) => Err(err),
            };
            let identity = match identity {
                Ok(identity) => identity,
                Err(err) => return Self::reject(ctx, err, "credential rejected"),
            };

            let organization_id = match self.resolver.resolve(&identity.user_id).await {
                Ok(organization_id) => organization_id,
                Err(err) => return Self::reject(ctx, err, "organization lookup failed"),
            };

            let auth = AuthContext::verified(identity.user_id, organization_id);
            debug!(
                target: AUTH_LOG_TARGET,
                request_id = %ctx.request_id(),
                user_id = auth.user_id().unwrap_or("-"),
                organization_id = auth.organization_id(),
                "caller authenticated"
            );
            ctx.set_auth_context(auth.clone());

            let response = next.run(ctx, request).await;
            log_completed(ctx, &response, &auth);
            response
        })
    }
}
