//! # docgate-store
//!
//! [`DocumentStore`] backends.
//!
//! | URI scheme | Backend | Feature |
//! |---|---|---|
//! | `memory://` | [`MemoryStore`] | always |
//! | `mongodb://`, `mongodb+srv://` | `MongoStore` | `mongodb` (default) |
//!
//! [`connect`] picks the backend from the URI and verifies it with a ping.
//! [`supports`] tells whether this build can open a scheme at all.

pub mod filter;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;

use docgate_core::{DocumentStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Every URI scheme docgate knows, whether or not this build can open it.
pub const SUPPORTED_SCHEMES: &[&str] = &["memory", "mongodb", "mongodb+srv"];

/// Cargo feature that backs MongoDB URIs.
pub const MONGODB_FEATURE: &str = "mongodb";

/// Whether this build can open stores with `scheme`.
pub fn supports(scheme: &str) -> bool {
    match scheme {
        "memory" => true,
        "mongodb" | "mongodb+srv" => cfg!(feature = "mongodb"),
        _ => false,
    }
}

/// Returns the scheme of `uri`, if it has one.
pub fn scheme(uri: &str) -> Option<&str> {
    uri.split_once("://").map(|(scheme, _)| scheme)
}

/// Opens the store named by `uri` and pings it.
pub async fn connect(
    uri: &str,
    connect_timeout: Duration,
) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match scheme(uri) {
        Some("memory") => Arc::new(MemoryStore::new()),
        #[cfg(feature = "mongodb")]
        Some("mongodb" | "mongodb+srv") => Arc::new(MongoStore::connect(uri, connect_timeout).await?),
        #[cfg(not(feature = "mongodb"))]
        Some("mongodb" | "mongodb+srv") => {
            return Err(StoreError::Unavailable(
                "this build has no MongoDB support; rebuild with the `mongodb` feature".to_string(),
            ));
        }
        _ => {
            return Err(StoreError::Unavailable(format!(
                "unsupported store URI scheme in '{}'",
                redact(uri)
            )))
        }
    };

    tokio::time::timeout(connect_timeout, store.ping())
        .await
        .map_err(|_| {
            StoreError::Unavailable(format!("no ping reply within {connect_timeout:?}"))
        })??;
    info!(backend = store.name(), "document store connected");
    Ok(store)
}

/// Strips credentials from a connection URI for logging.
pub fn redact(uri: &str) -> String {
    match (uri.split_once("://"), uri.rfind('@')) {
        (Some((scheme, _)), Some(at)) => format!("{scheme}://***{}", &uri[at..]),
        _ => uri.to_string(),
    }
}
