//! # docgate-middleware
//!
//! The middleware pipeline in front of every document route.
//!
//! ```text
//! Request → RequestId → AuthContext → Handler
//!                                        ↓
//! Response ← x-request-id ←──────────────┘
//! ```
//!
//! The auth stage verifies the bearer credential with an
//! [`IdentityVerifier`], resolves the caller's organization with an
//! [`OrganizationResolver`] and stores the resulting
//! [`AuthContext`](docgate_core::AuthContext) in the
//! [`MiddlewareContext`]. Any failure ends the request with an empty 401.
//!
//! ## Example
//!
//! ```
//! use docgate_middleware::pipeline::Pipeline;
//! use docgate_middleware::stages::RequestIdMiddleware;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(RequestIdMiddleware::new())
//!     .build();
//! assert_eq!(pipeline.stage_names(), vec!["request_id"]);
//! ```

#![doc(html_root_url = "https://docs.rs/docgate-middleware/0.1.0")]

pub mod context;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod organization;
pub mod pipeline;
pub mod stages;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export main types at crate root
pub use context::MiddlewareContext;
pub use error::AuthError;
pub use identity::{bearer_token, ClaimRules, IdentityVerifier, JwksVerifier, JwtVerifier, VerifiedIdentity};
pub use middleware::{BoxFuture, Middleware, Next};
pub use organization::{ClerkOrganizationResolver, OrganizationResolver};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use types::{Request, Response, ResponseExt};
