//! # docgate-config
//!
//! Typed configuration for the docgate gateway.
//!
//! Sources are layered, later ones winning:
//!
//! 1. defaults (or the `development` / `production` presets)
//! 2. a TOML or JSON file
//! 3. `.env`
//! 4. `DOCGATE__SECTION__KEY` environment variables
//! 5. `MONGO_URI` and `CLERK_SECRET_KEY` for a store URI or secret key that
//!    is still unset
//!
//! Unknown fields are rejected, so a typo in a file fails loudly.
//!
//! ## Example file
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//! max_body_bytes = 4194304
//!
//! [store]
//! uri = "mongodb://localhost:27017"
//!
//! [identity]
//! secret_key = "sk_live_..."
//! verification = "jwks"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! ## Environment overrides
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `DOCGATE__SERVER__HTTP_ADDR` | `server.http_addr` |
//! | `DOCGATE__SERVER__REQUEST_TIMEOUT_MS` | `server.request_timeout_ms` |
//! | `DOCGATE__STORE__URI` | `store.uri` |
//! | `DOCGATE__IDENTITY__SECRET_KEY` | `identity.secret_key` |
//! | `DOCGATE__AUTH__BYPASS` | `auth.bypass` |
//! | `DOCGATE__TELEMETRY__LOGGING__LEVEL` | `telemetry.logging.level` |
//!
//! Every other field follows the same pattern.

#![doc(html_root_url = "https://docs.rs/docgate-config/0.1.0")]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, LEGACY_SECRET_KEY, LEGACY_STORE_URI};
pub use schema::{
    AuthSection, IdentitySection, LogFormat, LoggingSection, MetricsSection, ServerSection,
    StoreSection, TelemetrySection, Verification,
};
