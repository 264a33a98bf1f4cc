//! Authentication errors.

use docgate_core::GatewayError;
use thiserror::Error;

/// Why a request failed authentication. Every variant maps to 401.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("missing Authorization header")]
    MissingCredential,

    /// The header is not `Bearer <token>`.
    #[error("malformed Authorization header")]
    MalformedHeader,

    /// Signature, expiry, issuer or audience check failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token carries no subject.
    #[error("token has no subject")]
    MissingSubject,

    /// The identity provider could not be reached or answered with an error.
    #[error("identity provider request failed: {0}")]
    Provider(String),

    /// The user belongs to no organization.
    #[error("no organization memberships found")]
    NoMembership,
}

impl AuthError {
    /// Metric label for this failure.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedHeader => "malformed_header",
            Self::InvalidToken(_) => "invalid_token",
            Self::MissingSubject => "missing_subject",
            Self::Provider(_) => "provider",
            Self::NoMembership => "no_membership",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        Self::authentication(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_every_variant_is_unauthorized() {
        let errors = [
            AuthError::MissingCredential,
            AuthError::MalformedHeader,
            AuthError::InvalidToken("expired".to_string()),
            AuthError::MissingSubject,
            AuthError::Provider("timeout".to_string()),
            AuthError::NoMembership,
        ];
        for err in errors {
            let gateway: GatewayError = err.into();
            assert_eq!(gateway.status_code(), StatusCode::UNAUTHORIZED);
            assert!(gateway.to_body().is_none());
        }
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(AuthError::NoMembership.reason(), "no_membership");
        assert_eq!(
            AuthError::NoMembership.to_string(),
            "no organization memberships found"
        );
    }
}
