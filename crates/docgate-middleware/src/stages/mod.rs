//! Pipeline stages.
//!
//! 1. [`request_id`] - assign and echo the request id
//! 2. [`auth_context`] - verify the bearer credential and resolve the
//!    organization, or [`bypass`] on loopback development builds

pub mod auth_context;
#[cfg(any(test, feature = "insecure-bypass"))]
pub mod bypass;
pub mod request_id;

pub use auth_context::AuthContextMiddleware;
#[cfg(any(test, feature = "insecure-bypass"))]
pub use bypass::{BypassMiddleware, BypassRefused};
pub use request_id::{stamp_request_id, RequestIdMiddleware, REQUEST_ID_HEADER};
