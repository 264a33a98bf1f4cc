//! # docgate
//!
//! An HTTP gateway that exposes CRUD over a document store. Every document
//! request carries a bearer credential, which is verified and resolved to an
//! organization before anything reaches the store.
//!
//! | Route | Method | Store call |
//! |-------|--------|------------|
//! | `/v1/get-all` | POST | find many |
//! | `/v1/get-one` | POST | find one |
//! | `/v1/insert-one` | POST | insert one |
//! | `/v1/insert-many` | POST | insert many |
//! | `/v1/update-one` | PUT | update by `objectId` |
//! | `/v1/update-many` | PUT | update by filter |
//! | `/v1/delete-one` | DELETE | delete by `objectId` |
//! | `/v1/delete-many` | DELETE | delete by filter |
//! | `/health` | GET | none |
//!
//! The crate is the process entry point. The building blocks live in:
//!
//! - [`docgate_core`]: commands, validation, identifier coercion, errors
//! - [`docgate_store`]: the in-memory and MongoDB stores
//! - [`docgate_middleware`]: request ids and bearer authentication
//! - [`docgate_server`]: routing, dispatch and the HTTP listener
//! - [`docgate_config`]: layered configuration
//! - [`docgate_telemetry`]: logging and metrics

#![doc(html_root_url = "https://docs.rs/docgate/0.1.0")]

pub mod app;
pub mod args;

pub use app::{auth_stage, build_gateway, load_config, run, server_config};
pub use args::{ArgsError, Invocation, USAGE};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
