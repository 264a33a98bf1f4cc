//! # docgate-server
//!
//! The HTTP side of docgate.
//!
//! - [`Router`] resolves method and path (404 and 405 before anything else)
//! - [`normalize()`] turns the query string and body into a `Command`
//! - [`Dispatcher`] validates, coerces and makes the store call
//! - [`Gateway`] wires routing, the middleware pipelines and dispatch
//! - [`Server`] accepts HTTP/1.1 connections and shuts down gracefully
//!
//! ## Example
//!
//! ```rust,ignore
//! use docgate_server::{Gateway, Server, ServerConfig};
//!
//! let gateway = Gateway::new(store, auth_stage);
//! let config = ServerConfig::builder().http_addr("127.0.0.1:8080").build();
//! Server::new(config, gateway).run().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/docgate-server/0.1.0")]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod router;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use dispatch::{Dispatcher, Reply};
pub use error::ServerError;
pub use gateway::Gateway;
pub use normalize::{normalize, QueryParams};
pub use router::{Endpoint, Router, HEALTH_PATH};
pub use server::Server;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
