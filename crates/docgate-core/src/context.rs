//! Request context types.
//!
//! The [`RequestContext`] is an immutable snapshot of per-request state,
//! built once authentication has run and handed explicitly to the
//! normalizer and dispatcher.

use crate::command::CommandKind;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it suitable for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Organization injected by the authentication bypass unless configured.
pub const DEFAULT_BYPASS_ORGANIZATION_ID: &str = "org_2v0ixOVzW5VsqlFr1ZFJbc7GTay";

/// The authenticated scope of a request.
///
/// `user_id` is only present when a credential was verified; the bypass
/// path supplies an organization alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    user_id: Option<String>,
    organization_id: String,
}

impl AuthContext {
    /// Scope for a verified user.
    pub fn verified(user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            organization_id: organization_id.into(),
        }
    }

    /// Scope carrying only an organization.
    pub fn organization_only(organization_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            organization_id: organization_id.into(),
        }
    }

    /// The verified user, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The resolved organization.
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

/// Per-request state passed through the document pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    auth: Option<AuthContext>,
    operation: Option<CommandKind>,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with the given request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            auth: None,
            operation: None,
            started_at: Instant::now(),
        }
    }

    /// Sets the authenticated scope.
    #[must_use]
    pub fn with_auth(mut self, auth: Option<AuthContext>) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the operation being served.
    #[must_use]
    pub fn with_operation(mut self, operation: CommandKind) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Overrides the start instant.
    #[must_use]
    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }

    /// Returns the request ID.
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the authenticated scope, if any.
    pub const fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    /// Returns the operation, if routed.
    pub const fn operation(&self) -> Option<CommandKind> {
        self.operation
    }

    /// Time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
