//! # docgate-test
//!
//! In-memory testing for the docgate gateway: no socket, no port.
//!
//! - [`TestClient`] sends requests through [`Gateway::handle`](docgate_server::Gateway::handle)
//! - [`TestResponse`] collects the body and offers assertions
//! - [`StaticVerifier`], [`StaticResolver`] and [`CountingStore`] stand in
//!   for the identity provider and the document store, and count their calls
//!
//! ## Example
//!
//! ```ignore
//! use docgate_core::CommandKind;
//! use docgate_test::{CountingStore, StaticResolver, StaticVerifier, TestClient};
//! use std::sync::Arc;
//!
//! let store = Arc::new(CountingStore::new());
//! let client = TestClient::with_auth(
//!     store.clone(),
//!     Arc::new(StaticVerifier::new().with_token("tok", "user_1")),
//!     Arc::new(StaticResolver::new().with_membership("user_1", "org_1")),
//! );
//!
//! let response = client
//!     .operation(CommandKind::GetAll, "database=shop&collection=orders")
//!     .bearer_token("tok")
//!     .send()
//!     .await;
//! response.assert_status(http::StatusCode::OK);
//! assert_eq!(store.call_count(), 1);
//! ```

#![doc(html_root_url = "https://docs.rs/docgate-test/0.1.0")]

mod client;
mod error;
mod fakes;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use fakes::{CountingStore, StaticResolver, StaticVerifier, StoreCall};
pub use request::TestRequest;
pub use response::TestResponse;
