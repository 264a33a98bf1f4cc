//! Route table.
//!
//! Maps method and path to an [`Endpoint`]. Resolution happens before any
//! middleware runs, so a wrong method is answered with 405 without touching
//! the credential or the body.
//!
//! ```rust
//! use docgate_core::CommandKind;
//! use docgate_server::{Endpoint, Router};
//! use http::Method;
//!
//! let router = Router::new();
//! assert_eq!(
//!     router.resolve(&Method::PUT, "/v1/update-one").unwrap(),
//!     Endpoint::Document(CommandKind::UpdateOne)
//! );
//! assert_eq!(router.resolve(&Method::GET, "/v1/update-one").unwrap_err().status_code(), 405);
//! ```

use docgate_core::{CommandKind, GatewayError, GatewayResult};
use http::Method;

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// What a route serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /health`
    Health,
    /// One of the document operations.
    Document(CommandKind),
}

impl Endpoint {
    /// Label used for logs and metrics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Document(kind) => kind.name(),
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    path: &'static str,
    endpoint: Endpoint,
}

/// Exact-match route table.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// The gateway's routes: `/health` and the eight document operations.
    #[must_use]
    pub fn new() -> Self {
        let mut routes = vec![Route {
            method: Method::GET,
            path: HEALTH_PATH,
            endpoint: Endpoint::Health,
        }];
        routes.extend(CommandKind::ALL.into_iter().map(|kind| Route {
            method: kind.method(),
            path: kind.path(),
            endpoint: Endpoint::Document(kind),
        }));
        Self { routes }
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolves a request.
    ///
    /// An unknown path yields `NotFound`. A known path with another method
    /// yields `MethodNotAllowed` listing the accepted methods.
    pub fn resolve(&self, method: &Method, path: &str) -> GatewayResult<Endpoint> {
        let mut allowed: Vec<&str> = Vec::new();
        for route in self.routes.iter().filter(|route| route.path == path) {
            if route.method == *method {
                return Ok(route.endpoint);
            }
            allowed.push(route.method.as_str());
        }

        if allowed.is_empty() {
            Err(GatewayError::not_found(path))
        } else {
            Err(GatewayError::method_not_allowed(
                method.as_str(),
                path,
                allowed.join(", "),
            ))
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
