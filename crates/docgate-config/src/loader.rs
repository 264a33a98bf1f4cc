//! Layered configuration loading.
//!
//! Later layers override earlier ones:
//!
//! 1. built-in defaults or a preset
//! 2. a TOML or JSON file
//! 3. `.env` entries
//! 4. `DOCGATE__SECTION__KEY` environment variables
//! 5. the legacy variables `MONGO_URI` and `CLERK_SECRET_KEY`, only for
//!    settings still unset
//!
//! Validation runs last.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, GatewayConfig, LogFormat, Verification};

/// Default prefix for environment overrides.
pub const ENV_PREFIX: &str = "DOCGATE";

/// Legacy variable holding the store URI.
pub const LEGACY_STORE_URI: &str = "MONGO_URI";

/// Legacy variable holding the identity provider secret key.
pub const LEGACY_SECRET_KEY: &str = "CLERK_SECRET_KEY";

/// Configuration loader.
///
/// # Example
///
/// ```no_run
/// use docgate_config::ConfigLoader;
///
/// # fn main() -> Result<(), docgate_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_production()
///     .with_file("docgate.toml")?
///     .with_dotenv()?
///     .with_env_prefix("DOCGATE")
///     .with_legacy_env()
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: GatewayConfig,
    env_prefix: Option<String>,
    legacy_env: bool,
    dotenv: Vec<(String, String)>,
    env: Option<HashMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            env_prefix: None,
            legacy_env: false,
            dotenv: Vec::new(),
            env: None,
        }
    }

    /// Resets to the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = GatewayConfig::default();
        self
    }

    /// Starts from [`GatewayConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = GatewayConfig::development();
        self
    }

    /// Starts from [`GatewayConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = GatewayConfig::production();
        self
    }

    /// Loads a file, picking the format from its extension.
    ///
    /// The file replaces the current configuration. Sections and fields it
    /// leaves out take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.config = parse(&content, format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns an error if the content is malformed or the format unknown.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` environment overrides.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Enables the `MONGO_URI` and `CLERK_SECRET_KEY` fallbacks.
    #[must_use]
    pub fn with_legacy_env(mut self) -> Self {
        self.legacy_env = true;
        self
    }

    /// Loads `.env` from the working directory (or a parent) into the
    /// process environment. A missing file is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(err) if err.not_found() => Ok(self),
            Err(err) => Err(ConfigError::DotenvError(err.to_string())),
        }
    }

    /// Reads variables from a specific env file without touching the
    /// process environment. Real environment variables still win.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn with_dotenv_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let entries = dotenvy::from_path_iter(path)
            .map_err(|e| ConfigError::DotenvError(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::DotenvError(e.to_string()))?;
            self.dotenv.push(entry);
        }
        Ok(self)
    }

    /// Uses `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Applies the environment layers and validates.
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be parsed or the result is
    /// invalid.
    pub fn load(self) -> Result<GatewayConfig, ConfigError> {
        let config = self.resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the environment layers without validating.
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be parsed.
    pub fn load_unvalidated(self) -> Result<GatewayConfig, ConfigError> {
        self.resolve()
    }

    fn resolve(mut self) -> Result<GatewayConfig, ConfigError> {
        let vars = self.variables();

        if let Some(prefix) = self.env_prefix.take() {
            let scoped = format!("{prefix}__");
            for (key, value) in vars.iter().filter(|(k, _)| k.starts_with(&scoped)) {
                self.apply_env_var(key, value, &prefix)?;
            }
        }

        if self.legacy_env {
            self.apply_legacy(&vars);
        }

        Ok(self.config)
    }

    // Env file entries overlaid by the real (or injected) environment.
    // Ordered so overrides apply deterministically.
    fn variables(&mut self) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = self.dotenv.drain(..).collect();
        match self.env.take() {
            Some(injected) => vars.extend(injected),
            None => vars.extend(env::vars()),
        }
        vars
    }

    fn apply_legacy(&mut self, vars: &BTreeMap<String, String>) {
        let set = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        if self.config.store.uri.is_empty() {
            if let Some(uri) = set(LEGACY_STORE_URI) {
                self.config.store.uri = uri;
            }
        }
        if self.config.identity.secret_key.is_none() {
            self.config.identity.secret_key = set(LEGACY_SECRET_KEY);
        }
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_int(key, value)?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                config.server.max_body_bytes = parse_int(key, value)?;
            }
            ["SERVER", "KEEP_ALIVE"] => config.server.keep_alive = parse_flag(key, value)?,
            ["SERVER", "TRUST_REQUEST_ID"] => {
                config.server.trust_request_id = parse_flag(key, value)?;
            }

            ["STORE", "URI"] => config.store.uri = value.to_string(),
            ["STORE", "CONNECT_TIMEOUT_MS"] => {
                config.store.connect_timeout_ms = parse_int(key, value)?;
            }

            ["IDENTITY", "SECRET_KEY"] => config.identity.secret_key = optional(value),
            ["IDENTITY", "VERIFICATION"] => {
                config.identity.verification = match value.to_lowercase().as_str() {
                    "jwks" => Verification::Jwks,
                    "hs256" => Verification::Hs256,
                    "rs256" => Verification::Rs256,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'jwks', 'hs256' or 'rs256'",
                        ))
                    }
                };
            }
            ["IDENTITY", "JWT_SECRET"] => config.identity.jwt_secret = optional(value),
            ["IDENTITY", "PUBLIC_KEY_PEM"] => config.identity.public_key_pem = optional(value),
            ["IDENTITY", "JWKS_URL"] => config.identity.jwks_url = optional(value),
            ["IDENTITY", "ISSUER"] => config.identity.issuer = optional(value),
            ["IDENTITY", "AUDIENCE"] => config.identity.audience = optional(value),
            ["IDENTITY", "API_BASE_URL"] => config.identity.api_base_url = value.to_string(),
            ["IDENTITY", "REQUEST_TIMEOUT_MS"] => {
                config.identity.request_timeout_ms = parse_int(key, value)?;
            }
            ["IDENTITY", "LEEWAY_SECS"] => config.identity.leeway_secs = parse_int(key, value)?,

            ["AUTH", "BYPASS"] => config.auth.bypass = parse_flag(key, value)?,
            ["AUTH", "BYPASS_ORGANIZATION_ID"] => {
                config.auth.bypass_organization_id = value.to_string();
            }

            ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
            ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                config.telemetry.logging.include_location = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),

            // Unknown keys are ignored.
            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<GatewayConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(ConfigError::UnsupportedFormat(format.to_string())),
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [store]
        uri = "memory://"

        [identity]
        secret_key = "sk_test_file"
    "#;

    fn loader() -> ConfigLoader {
        ConfigLoader::new().with_env_vars(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_defaults_fail_validation() {
        let err = loader().load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "store.uri"));
    }

    #[test]
    fn test_string_layer() {
        let config = loader().with_string(MINIMAL, "toml").unwrap().load().unwrap();
        assert_eq!(config.store.uri, "memory://");
        assert_eq!(config.identity.secret_key.as_deref(), Some("sk_test_file"));

        let config = loader()
            .with_string(
                r#"{"store": {"uri": "memory://"}, "auth": {"bypass": true}, "server": {"http_addr": "127.0.0.1:9000"}}"#,
                "json",
            )
            .unwrap()
            .load()
            .unwrap();
        assert!(config.auth.bypass);

        assert!(matches!(
            loader().with_string("", "yaml"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = loader().with_string("[cache]\nttl = 5", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_env_overrides() {
        let config = loader()
            .with_string(MINIMAL, "toml")
            .unwrap()
            .with_env_vars([
                ("DOCGATE__SERVER__HTTP_ADDR", "127.0.0.1:3000"),
                ("DOCGATE__SERVER__REQUEST_TIMEOUT_MS", "1500"),
                ("DOCGATE__SERVER__KEEP_ALIVE", "off"),
                ("DOCGATE__IDENTITY__VERIFICATION", "HS256"),
                ("DOCGATE__IDENTITY__JWT_SECRET", "shared"),
                ("DOCGATE__IDENTITY__ISSUER", "https://issuer.example"),
                ("DOCGATE__TELEMETRY__LOGGING__FORMAT", "pretty"),
                ("DOCGATE__TELEMETRY__METRICS__ENABLED", "true"),
                ("DOCGATE__SOMETHING__ELSE", "ignored"),
                ("OTHER__SERVER__HTTP_ADDR", "ignored"),
            ])
            .with_env_prefix("docgate")
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
        assert_eq!(config.server.request_timeout_ms, 1500);
        assert!(!config.server.keep_alive);
        assert_eq!(config.identity.verification, Verification::Hs256);
        assert_eq!(config.identity.jwt_secret.as_deref(), Some("shared"));
        assert_eq!(config.identity.issuer.as_deref(), Some("https://issuer.example"));
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert!(config.telemetry.metrics.enabled);
    }

    #[test]
    fn test_env_parse_errors() {
        let result = loader()
            .with_env_vars([("DOCGATE__SERVER__MAX_BODY_BYTES", "lots")])
            .with_env_prefix(ENV_PREFIX)
            .load_unvalidated();
        assert!(matches!(
            result,
            Err(ConfigError::EnvParseError { var, .. }) if var == "DOCGATE__SERVER__MAX_BODY_BYTES"
        ));

        let result = loader()
            .with_env_vars([("DOCGATE__AUTH__BYPASS", "maybe")])
            .with_env_prefix(ENV_PREFIX)
            .load_unvalidated();
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_env_ignored_without_prefix() {
        let config = loader()
            .with_env_vars([("DOCGATE__STORE__URI", "memory://")])
            .load_unvalidated()
            .unwrap();
        assert!(config.store.uri.is_empty());
    }

    #[test]
    fn test_legacy_variables_fill_unset_settings() {
        let config = loader()
            .with_env_vars([
                ("MONGO_URI", "mongodb://db.internal:27017"),
                ("CLERK_SECRET_KEY", "sk_legacy"),
            ])
            .with_env_prefix(ENV_PREFIX)
            .with_legacy_env()
            .load()
            .unwrap();
        assert_eq!(config.store.uri, "mongodb://db.internal:27017");
        assert_eq!(config.identity.secret_key.as_deref(), Some("sk_legacy"));
    }

    #[test]
    fn test_structured_settings_beat_legacy_variables() {
        let config = loader()
            .with_string(MINIMAL, "toml")
            .unwrap()
            .with_env_vars([
                ("DOCGATE__STORE__URI", "mongodb://primary:27017"),
                ("MONGO_URI", "mongodb://legacy:27017"),
                ("CLERK_SECRET_KEY", "sk_legacy"),
            ])
            .with_env_prefix(ENV_PREFIX)
            .with_legacy_env()
            .load()
            .unwrap();
        assert_eq!(config.store.uri, "mongodb://primary:27017");
        assert_eq!(config.identity.secret_key.as_deref(), Some("sk_test_file"));
    }

    #[test]
    fn test_legacy_variables_need_opt_in() {
        let config = loader()
            .with_env_vars([("MONGO_URI", "mongodb://legacy:27017")])
            .load_unvalidated()
            .unwrap();
        assert!(config.store.uri.is_empty());
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool(yes), Some(true));
        }
        for no in ["false", "0", "No", "off"] {
            assert_eq!(parse_bool(no), Some(false));
        }
        assert_eq!(parse_bool("2"), None);
    }
}
