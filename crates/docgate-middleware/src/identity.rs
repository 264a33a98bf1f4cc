//! Bearer credential verification.
//!
//! [`IdentityVerifier`] turns a bearer token into a user id. Two verifiers
//! ship with the crate:
//!
//! - [`JwtVerifier`] checks tokens against a static key (HS256 secret or
//!   RS256 public key PEM)
//! - [`JwksVerifier`] fetches RS256 keys from the provider's JWKS endpoint
//!   and caches them by key id, refetching when a token names an unknown key
//!   (at most once per [`DEFAULT_MIN_REFRESH_INTERVAL`])

use crate::error::AuthError;
use async_trait::async_trait;
use http::HeaderValue;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Scheme prefix of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Minimum time between two JWKS fetches triggered by unknown key ids.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// The result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// The `sub` claim.
    pub user_id: String,
    /// The `sid` claim, when the provider issues session tokens.
    pub session_id: Option<String>,
}

/// Verifies a bearer credential.
#[async_trait]
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Returns the identity behind `token`.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(header: &HeaderValue) -> Result<&str, AuthError> {
    let value = header.to_str().map_err(|_| AuthError::MalformedHeader)?;
    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::MalformedHeader),
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    sid: Option<String>,
}

impl Claims {
    fn into_identity(self) -> Result<VerifiedIdentity, AuthError> {
        match self.sub {
            Some(sub) if !sub.is_empty() => Ok(VerifiedIdentity {
                user_id: sub,
                session_id: self.sid,
            }),
            _ => Err(AuthError::MissingSubject),
        }
    }
}

/// Claim checks shared by both verifiers.
#[derive(Debug, Clone, Default)]
pub struct ClaimRules {
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: u64,
}

impl ClaimRules {
    /// Requires the `iss` claim to equal `issuer`.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Requires the `aud` claim to contain `audience`.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Clock skew tolerated on `exp` and `nbf`.
    #[must_use]
    pub fn leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

/// Verifies tokens against one static key.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// HS256 with a shared secret.
    #[must_use]
    pub fn hs256(secret: &[u8], rules: &ClaimRules) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: rules.validation(Algorithm::HS256),
        }
    }

    /// RS256 with a PEM-encoded public key.
    pub fn rs256_pem(pem: &[u8], rules: &ClaimRules) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AuthError::InvalidToken(format!("unusable public key: {e}")))?;
        Ok(Self {
            key,
            validation: rules.validation(Algorithm::RS256),
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        data.claims.into_identity()
    }
}

/// Verifies RS256 tokens with keys from a JWKS endpoint.
pub struct JwksVerifier {
    client: reqwest::Client,
    jwks_url: String,
    secret_key: Option<String>,
    rules: ClaimRules,
    cache: RwLock<KeyCache>,
    // Held across a fetch so concurrent misses share one request.
    refresh_lock: tokio::sync::Mutex<()>,
    min_refresh_interval: Duration,
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    last_fetch: Option<Instant>,
}

impl std::fmt::Debug for JwksVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksVerifier")
            .field("jwks_url", &self.jwks_url)
            .field("cached_keys", &self.cache.read().keys.len())
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish_non_exhaustive()
    }
}

impl JwksVerifier {
    /// Creates a verifier for `jwks_url` with its own HTTP client.
    pub fn new(
        jwks_url: impl Into<String>,
        request_timeout: Duration,
        rules: ClaimRules,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, jwks_url, rules))
    }

    /// Creates a verifier that uses `client`.
    pub fn with_client(
        client: reqwest::Client,
        jwks_url: impl Into<String>,
        rules: ClaimRules,
    ) -> Self {
        Self {
            client,
            jwks_url: jwks_url.into(),
            secret_key: None,
            rules,
            cache: RwLock::new(KeyCache::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Sets how long an unknown key id is answered from the cache before
    /// the JWKS is fetched again.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Authenticates JWKS requests with the provider secret key.
    #[must_use]
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    fn cached(&self, kid: &str) -> Option<DecodingKey> {
        self.cache.read().keys.get(kid).cloned()
    }

    fn fetched_recently(&self) -> bool {
        self.cache
            .read()
            .last_fetch
            .is_some_and(|at| at.elapsed() < self.min_refresh_interval)
    }

    /// Looks `kid` up after a miss, fetching the JWKS unless another
    /// request did so within the refresh interval.
    async fn key_after_miss(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let unknown = || AuthError::InvalidToken(format!("unknown key id {kid}"));

        let _guard = self.refresh_lock.lock().await;
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }
        if self.fetched_recently() {
            debug!(kid = %kid, "unknown key id, JWKS fetched recently");
            return Err(unknown());
        }
        self.refresh().await?;
        self.cached(kid).ok_or_else(unknown)
    }

    /// Replaces the key cache with the current JWKS.
    ///
    /// The attempt counts toward the refresh interval even when it fails.
    pub async fn refresh(&self) -> Result<usize, AuthError> {
        self.cache.write().last_fetch = Some(Instant::now());

        let mut request = self.client.get(&self.jwks_url);
        if let Some(secret) = &self.secret_key {
            request = request.bearer_auth(secret);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }
        let set: JwkSet = response.json().await?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(err) => debug!(kid = %kid, error = %err, "skipping unusable JWK"),
            }
        }
        let count = keys.len();
        self.cache.write().keys = keys;
        info!(url = %self.jwks_url, keys = count, "JWKS refreshed");
        Ok(count)
    }
}

#[async_trait]
impl IdentityVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token has no key id".to_string()))?;

        let key = match self.cached(&kid) {
            Some(key) => key,
            None => self.key_after_miss(&kid).await?,
        };

        let data = decode::<Claims>(token, &key, &self.rules.validation(Algorithm::RS256))?;
        data.claims.into_identity()
    }
}
