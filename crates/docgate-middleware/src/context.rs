//! Middleware context.
//!
//! The [`MiddlewareContext`] is mutable while stages run and is copied into
//! an immutable [`RequestContext`] for the normalizer and dispatcher. The
//! [`AuthContext`] slot can only be filled by the auth stages of this crate.

use docgate_core::{AuthContext, CommandKind, RequestContext, RequestId};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Context that flows through the middleware pipeline.
///
/// # Example
///
/// ```
/// use docgate_middleware::context::MiddlewareContext;
/// use docgate_core::CommandKind;
///
/// let mut ctx = MiddlewareContext::new();
/// ctx.set_operation(CommandKind::GetOne);
///
/// assert!(ctx.auth_context().is_none());
/// assert_eq!(ctx.operation(), Some(CommandKind::GetOne));
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// Peer address of the connection, when known.
    remote_addr: Option<SocketAddr>,

    /// The operation resolved by the route table.
    operation: Option<CommandKind>,

    /// The authenticated scope, once an auth stage accepted the request.
    auth: Option<AuthContext>,

    /// When the request started processing.
    started_at: Instant,

    /// Type-erased extension data.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a new middleware context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            remote_addr: None,
            operation: None,
            auth: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Sets the request ID.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the peer address.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Records the peer address.
    pub fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    /// Returns the resolved operation.
    #[must_use]
    pub fn operation(&self) -> Option<CommandKind> {
        self.operation
    }

    /// Records the operation resolved by routing.
    pub fn set_operation(&mut self, operation: CommandKind) {
        self.operation = Some(operation);
    }

    /// The authenticated scope, if an auth stage accepted the request.
    #[must_use]
    pub fn auth_context(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    pub(crate) fn set_auth_context(&mut self, auth: AuthContext) {
        self.auth = Some(auth);
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }

    /// Snapshots this context for the document pipeline.
    #[must_use]
    pub fn to_request_context(&self) -> RequestContext {
        let ctx = RequestContext::with_request_id(self.request_id)
            .with_auth(self.auth.clone())
            .with_started_at(self.started_at);
        match self.operation {
            Some(operation) => ctx.with_operation(operation),
            None => ctx,
        }
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}
