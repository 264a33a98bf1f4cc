//! The top-level [`GatewayConfig`] and its builder.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{
    AuthSection, ConfigError, IdentitySection, LogFormat, ServerSection, StoreSection,
    TelemetrySection, Verification,
};

/// Complete gateway configuration.
///
/// # Example
///
/// ```
/// use docgate_config::GatewayConfig;
///
/// let config: GatewayConfig = toml::from_str(r#"
///     [server]
///     http_addr = "127.0.0.1:8080"
///
///     [store]
///     uri = "memory://"
///
///     [identity]
///     secret_key = "sk_test_123"
/// "#).unwrap();
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerSection,

    /// Document store.
    #[serde(default)]
    pub store: StoreSection,

    /// Identity provider.
    #[serde(default)]
    pub identity: IdentitySection,

    /// Authentication mode.
    #[serde(default)]
    pub auth: AuthSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl GatewayConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Checks the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let http_addr = parse_addr("server.http_addr", &self.server.http_addr)?;
        if self.telemetry.metrics.enabled {
            parse_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }

        positive("server.request_timeout_ms", self.server.request_timeout_ms)?;
        positive("store.connect_timeout_ms", self.store.connect_timeout_ms)?;
        positive("identity.request_timeout_ms", self.identity.request_timeout_ms)?;
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        self.validate_store()?;

        if self.auth.bypass {
            if !http_addr.ip().is_loopback() {
                return Err(ConfigError::invalid_value(
                    "auth.bypass",
                    format!("bypass requires a loopback server.http_addr, got {http_addr}"),
                ));
            }
            if self.auth.bypass_organization_id.is_empty() {
                return Err(ConfigError::missing_field("auth.bypass_organization_id"));
            }
        } else {
            self.validate_identity()?;
        }

        Ok(())
    }

    fn validate_store(&self) -> Result<(), ConfigError> {
        let uri = &self.store.uri;
        if uri.is_empty() {
            return Err(ConfigError::missing_field("store.uri"));
        }
        match docgate_store::scheme(uri) {
            Some(scheme) if docgate_store::supports(scheme) => Ok(()),
            Some(scheme) if docgate_store::SUPPORTED_SCHEMES.contains(&scheme) => {
                Err(ConfigError::invalid_value(
                    "store.uri",
                    format!(
                        "{scheme}:// stores need a build with the `{}` feature",
                        docgate_store::MONGODB_FEATURE
                    ),
                ))
            }
            _ => Err(ConfigError::invalid_value(
                "store.uri",
                format!(
                    "unsupported scheme in {}, expected one of {}",
                    docgate_store::redact(uri),
                    docgate_store::SUPPORTED_SCHEMES.join(", ")
                ),
            )),
        }
    }

    fn validate_identity(&self) -> Result<(), ConfigError> {
        let identity = &self.identity;
        if identity.secret_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::missing_field("identity.secret_key"));
        }
        match identity.verification {
            Verification::Jwks => Ok(()),
            Verification::Hs256 if identity.jwt_secret.is_none() => Err(
                ConfigError::missing_field("identity.jwt_secret"),
            ),
            Verification::Rs256 if identity.public_key_pem.is_none() => Err(
                ConfigError::missing_field("identity.public_key_pem"),
            ),
            Verification::Hs256 | Verification::Rs256 => Ok(()),
        }
    }

    /// Settings for local development: pretty debug logs and the
    /// in-memory store.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.environment = "development".to_string();
        config.store.uri = "memory://".to_string();
        config
    }

    /// Settings for production: JSON logs at `info`.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.logging.include_location = false;
        config.telemetry.environment = "production".to_string();
        config
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {value}")))
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid_value(field, "must be greater than zero"));
    }
    Ok(())
}

/// Builder for [`GatewayConfig`].
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    server: Option<ServerSection>,
    store: Option<StoreSection>,
    identity: Option<IdentitySection>,
    auth: Option<AuthSection>,
    telemetry: Option<TelemetrySection>,
}

impl GatewayConfigBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server section.
    #[must_use]
    pub fn server(mut self, server: ServerSection) -> Self {
        self.server = Some(server);
        self
    }

    /// Sets the store section.
    #[must_use]
    pub fn store(mut self, store: StoreSection) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the identity section.
    #[must_use]
    pub fn identity(mut self, identity: IdentitySection) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the auth section.
    #[must_use]
    pub fn auth(mut self, auth: AuthSection) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds without validating.
    #[must_use]
    pub fn build(self) -> GatewayConfig {
        GatewayConfig {
            server: self.server.unwrap_or_default(),
            store: self.store.unwrap_or_default(),
            identity: self.identity.unwrap_or_default(),
            auth: self.auth.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Builds and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build_validated(self) -> Result<GatewayConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        GatewayConfig::builder()
            .store(StoreSection {
                uri: "memory://".to_string(),
                ..StoreSection::default()
            })
            .identity(IdentitySection {
                secret_key: Some("sk_test_123".to_string()),
                ..IdentitySection::default()
            })
            .build()
    }

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidValue { field, .. } | ConfigError::MissingField { field } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
        assert_eq!(config.telemetry.service_name, "docgate");
        assert!(config.store.uri.is_empty());
        assert!(!config.auth.bypass);
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
        assert!(GatewayConfig::builder()
            .store(valid().store)
            .identity(valid().identity)
            .build_validated()
            .is_ok());
    }

    #[test]
    fn test_store_uri_required_and_scheme_checked() {
        let mut config = valid();
        config.store.uri.clear();
        assert_eq!(field_of(config.validate().unwrap_err()), "store.uri");

        config.store.uri = "postgres://localhost/db".to_string();
        assert_eq!(field_of(config.validate().unwrap_err()), "store.uri");

        for uri in ["mongodb://localhost:27017", "mongodb+srv://cluster.example.net"] {
            config.store.uri = uri.to_string();
            assert!(config.validate().is_ok(), "{uri}");
        }
    }

    #[test]
    fn test_store_scheme_follows_build_support() {
        let mut config = valid();
        for uri in ["memory://", "mongodb://localhost:27017", "mongodb+srv://cluster.example.net"] {
            config.store.uri = uri.to_string();
            let scheme = docgate_store::scheme(uri).unwrap();
            match config.validate() {
                Ok(()) => assert!(docgate_store::supports(scheme), "{uri}"),
                Err(err) => {
                    assert!(!docgate_store::supports(scheme), "{uri}");
                    assert!(err.to_string().contains("mongodb"), "{err}");
                    assert_eq!(field_of(err), "store.uri");
                }
            }
        }
    }

    #[test]
    fn test_secret_key_required_without_bypass() {
        let mut config = valid();
        config.identity.secret_key = None;
        assert_eq!(field_of(config.validate().unwrap_err()), "identity.secret_key");

        config.identity.secret_key = Some(String::new());
        assert_eq!(field_of(config.validate().unwrap_err()), "identity.secret_key");
    }

    #[test]
    fn test_verification_mode_needs_its_key() {
        let mut config = valid();
        config.identity.verification = Verification::Hs256;
        assert_eq!(field_of(config.validate().unwrap_err()), "identity.jwt_secret");
        config.identity.jwt_secret = Some("shared".to_string());
        assert!(config.validate().is_ok());

        config.identity.verification = Verification::Rs256;
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "identity.public_key_pem"
        );
    }

    #[test]
    fn test_bypass_only_on_loopback() {
        let mut config = valid();
        config.identity.secret_key = None;
        config.auth.bypass = true;
        assert_eq!(field_of(config.validate().unwrap_err()), "auth.bypass");

        config.server.http_addr = "127.0.0.1:8080".to_string();
        assert!(config.validate().is_ok());

        config.server.http_addr = "[::1]:8080".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_addresses_and_timeouts() {
        let mut config = valid();
        config.server.http_addr = "localhost".to_string();
        assert_eq!(field_of(config.validate().unwrap_err()), "server.http_addr");

        let mut config = valid();
        config.telemetry.metrics.enabled = true;
        config.telemetry.metrics.addr = "nowhere".to_string();
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "telemetry.metrics.addr"
        );

        let mut config = valid();
        config.server.request_timeout_ms = 0;
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "server.request_timeout_ms"
        );

        let mut config = valid();
        config.server.max_body_bytes = 0;
        assert_eq!(field_of(config.validate().unwrap_err()), "server.max_body_bytes");
    }

    #[test]
    fn test_presets() {
        let dev = GatewayConfig::development();
        assert_eq!(dev.telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(dev.telemetry.logging.level, "debug");
        assert_eq!(dev.store.uri, "memory://");

        let prod = GatewayConfig::production();
        assert_eq!(prod.telemetry.logging.format, LogFormat::Json);
        assert_eq!(prod.telemetry.environment, "production");
        assert!(prod.store.uri.is_empty());
    }
}
