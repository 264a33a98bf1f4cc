//! Start-up wiring: configuration in, running gateway out.

use anyhow::Context;
use docgate_config::{ConfigError, ConfigLoader, GatewayConfig, IdentitySection, Verification, ENV_PREFIX};
use docgate_core::DocumentStore;
use docgate_middleware::stages::{AuthContextMiddleware, RequestIdMiddleware};
use docgate_middleware::{
    BoxedMiddleware, ClaimRules, ClerkOrganizationResolver, IdentityVerifier, JwksVerifier,
    JwtVerifier,
};
use docgate_server::{Gateway, Server, ServerConfig};
use docgate_store::redact;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads configuration: production preset, then `path`, `.env`,
/// `DOCGATE__*` overrides and the legacy variables.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut loader = ConfigLoader::new().with_production();
    if let Some(path) = path {
        loader = loader.with_file(path)?;
    }
    loader
        .with_dotenv()?
        .with_env_prefix(ENV_PREFIX)
        .with_legacy_env()
        .load()
}

/// The listener settings.
pub fn server_config(config: &GatewayConfig) -> ServerConfig {
    let server = &config.server;
    ServerConfig::builder()
        .http_addr(server.http_addr.clone())
        .shutdown_timeout(server.shutdown_timeout())
        .request_timeout(server.request_timeout())
        .max_body_bytes(server.max_body_bytes)
        .keep_alive(server.keep_alive)
        .build()
}

/// The authentication stage selected by `config`.
pub fn auth_stage(config: &GatewayConfig) -> anyhow::Result<BoxedMiddleware> {
    if config.auth.bypass {
        return bypass_stage(config);
    }

    let identity = &config.identity;
    let secret_key = identity
        .secret_key
        .as_deref()
        .context("identity.secret_key is required")?;

    let verifier = verifier(identity, secret_key)?;
    let resolver = ClerkOrganizationResolver::new(
        identity.api_base_url.clone(),
        secret_key,
        identity.request_timeout(),
    )
    .context("failed to build the organization resolver")?;

    Ok(Arc::new(AuthContextMiddleware::new(
        verifier,
        Arc::new(resolver),
    )))
}

fn verifier(
    identity: &IdentitySection,
    secret_key: &str,
) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    let mut rules = ClaimRules::default().leeway(identity.leeway_secs);
    if let Some(issuer) = &identity.issuer {
        rules = rules.issuer(issuer.clone());
    }
    if let Some(audience) = &identity.audience {
        rules = rules.audience(audience.clone());
    }

    let verifier: Arc<dyn IdentityVerifier> = match identity.verification {
        Verification::Jwks => Arc::new(
            JwksVerifier::new(identity.jwks_url(), identity.request_timeout(), rules)
                .context("failed to build the JWKS verifier")?
                .with_secret_key(secret_key),
        ),
        Verification::Hs256 => {
            let secret = identity
                .jwt_secret
                .as_deref()
                .context("identity.jwt_secret is required for hs256")?;
            Arc::new(JwtVerifier::hs256(secret.as_bytes(), &rules))
        }
        Verification::Rs256 => {
            let pem = identity
                .public_key_pem
                .as_deref()
                .context("identity.public_key_pem is required for rs256")?;
            Arc::new(
                JwtVerifier::rs256_pem(pem.as_bytes(), &rules)
                    .context("identity.public_key_pem is not a valid RSA public key")?,
            )
        }
    };
    Ok(verifier)
}

#[cfg(feature = "insecure-bypass")]
fn bypass_stage(config: &GatewayConfig) -> anyhow::Result<BoxedMiddleware> {
    use docgate_middleware::stages::BypassMiddleware;

    let addr = config
        .server
        .http_addr
        .parse()
        .context("server.http_addr is not a socket address")?;
    let stage = BypassMiddleware::new(addr, config.auth.bypass_organization_id.clone())?;
    Ok(Arc::new(stage))
}

#[cfg(not(feature = "insecure-bypass"))]
fn bypass_stage(_config: &GatewayConfig) -> anyhow::Result<BoxedMiddleware> {
    anyhow::bail!("auth.bypass is set but this build lacks the insecure-bypass feature")
}

/// Builds the gateway over an already connected store.
pub fn build_gateway(
    config: &GatewayConfig,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<Gateway> {
    let request_ids = if config.server.trust_request_id {
        RequestIdMiddleware::trust_incoming()
    } else {
        RequestIdMiddleware::new()
    };
    let gateway = Gateway::with_request_ids(store, auth_stage(config)?, request_ids)
        .request_timeout(config.server.request_timeout());
    Ok(gateway)
}

/// Connects the store, builds the gateway and serves until SIGINT or
/// SIGTERM.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        version = crate::VERSION,
        environment = %config.telemetry.environment,
        http_addr = %config.server.http_addr,
        store = %redact(&config.store.uri),
        verification = ?config.identity.verification,
        bypass = config.auth.bypass,
        "starting docgate"
    );

    let store = docgate_store::connect(&config.store.uri, config.store.connect_timeout())
        .await
        .with_context(|| format!("failed to connect to store {}", redact(&config.store.uri)))?;
    info!(backend = store.name(), "store connected");

    let gateway = build_gateway(&config, store)?;
    Server::new(server_config(&config), gateway)
        .run()
        .await
        .context("server failed")?;

    info!("docgate stopped");
    Ok(())
}
