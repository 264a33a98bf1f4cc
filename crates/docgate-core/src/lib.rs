//! # docgate-core
//!
//! Core types for the docgate document gateway.
//!
//! A request moves through these types in order:
//!
//! ```text
//! Command ──validate──▶ ValidatedCommand ──coerce──▶ StoreOperation ──▶ DocumentStore
//! ```
//!
//! - [`Command`]: what the caller sent, with optional fields left optional
//! - [`ValidatedCommand`]: every required field present
//! - [`StoreOperation`]: filters concrete, identifiers parsed to [`ObjectId`]
//!
//! Failures along the way are [`GatewayError`]s, which know their HTTP
//! status and response body.

#![doc(html_root_url = "https://docs.rs/docgate-core/0.1.0")]

pub mod coerce;
pub mod command;
pub mod context;
pub mod document;
pub mod error;
pub mod store;
pub mod validate;

pub use coerce::{coerce, StoreOperation};
pub use command::{Command, CommandKind, Namespace};
pub use context::{AuthContext, RequestContext, RequestId, DEFAULT_BYPASS_ORGANIZATION_ID};
pub use document::{Document, ObjectId, ObjectIdError, Value, ID_FIELD};
pub use error::{ErrorBody, ErrorCategory, GatewayError, GatewayResult};
pub use store::{
    DeleteResult, DocumentStore, InsertManyResult, InsertOneResult, StoreError, UpdateResult,
};
pub use validate::{validate, ValidatedCommand};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        AuthContext, Command, CommandKind, Document, DocumentStore, GatewayError, GatewayResult,
        Namespace, ObjectId, RequestContext, RequestId, StoreError, StoreOperation, Value,
    };
}
