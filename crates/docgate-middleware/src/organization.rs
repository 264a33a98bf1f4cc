//! Organization lookup for verified users.

use crate::error::AuthError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default identity provider API base.
pub const DEFAULT_API_BASE: &str = "https://api.clerk.com/v1";

/// Resolves the organization a user acts for.
#[async_trait]
pub trait OrganizationResolver: Send + Sync + 'static {
    /// Returns the organization id for `user_id`.
    ///
    /// A user with no membership is an error, never an empty id.
    async fn resolve(&self, user_id: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct MembershipList {
    #[serde(default)]
    data: Vec<Membership>,
}

#[derive(Debug, Deserialize)]
struct Membership {
    organization: Organization,
}

#[derive(Debug, Deserialize)]
struct Organization {
    id: String,
}

/// Reads memberships from the provider's backend API and picks the first.
#[derive(Debug, Clone)]
pub struct ClerkOrganizationResolver {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl ClerkOrganizationResolver {
    /// Creates a resolver with its own HTTP client.
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, api_base, secret_key))
    }

    /// Creates a resolver that uses `client`.
    pub fn with_client(
        client: reqwest::Client,
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    fn memberships_url(&self, user_id: &str) -> String {
        format!("{}/users/{user_id}/organization_memberships", self.api_base)
    }
}

// Provider ids are ASCII alphanumerics, `_` and `-`. Anything else could
// alter the request path.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[async_trait]
impl OrganizationResolver for ClerkOrganizationResolver {
    async fn resolve(&self, user_id: &str) -> Result<String, AuthError> {
        if !is_plain_id(user_id) {
            return Err(AuthError::InvalidToken(format!(
                "subject '{user_id}' is not a provider user id"
            )));
        }

        let response = self
            .client
            .get(self.memberships_url(user_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "organization lookup returned {}",
                response.status()
            )));
        }

        let list: MembershipList = response.json().await?;
        debug!(user_id = %user_id, memberships = list.data.len(), "memberships fetched");
        list.data
            .into_iter()
            .next()
            .map(|membership| membership.organization.id)
            .ok_or(AuthError::NoMembership)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{direct_client, serve};

    const TWO_MEMBERSHIPS: &str = r#"{
        "data": [
            {"id": "orgmem_1", "role": "org:admin", "organization": {"id": "org_first", "name": "First"}},
            {"id": "orgmem_2", "role": "org:member", "organization": {"id": "org_second", "name": "Second"}}
        ],
        "total_count": 2
    }"#;

    #[tokio::test]
    async fn test_first_membership_wins() {
        let (base, seen) = serve(200, TWO_MEMBERSHIPS).await;
        let resolver = ClerkOrganizationResolver::with_client(direct_client(), base, "sk_test_1");

        assert_eq!(resolver.resolve("user_abc").await.unwrap(), "org_first");

        let requests = seen.lock();
        assert!(requests[0].starts_with("get /users/user_abc/organization_memberships"));
        assert!(requests[0].contains("authorization: bearer sk_test_1"));
    }

    #[tokio::test]
    async fn test_no_membership() {
        let (base, _) = serve(200, r#"{"data": [], "total_count": 0}"#).await;
        let resolver = ClerkOrganizationResolver::with_client(direct_client(), base, "sk");
        assert!(matches!(
            resolver.resolve("user_abc").await,
            Err(AuthError::NoMembership)
        ));
    }

    #[tokio::test]
    async fn test_provider_error_status() {
        let (base, _) = serve(404, r#"{"errors": []}"#).await;
        let resolver = ClerkOrganizationResolver::with_client(direct_client(), base, "sk");
        assert!(matches!(
            resolver.resolve("user_abc").await,
            Err(AuthError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let resolver =
            ClerkOrganizationResolver::with_client(direct_client(), "http://127.0.0.1:1", "sk");
        assert!(matches!(
            resolver.resolve("user_abc").await,
            Err(AuthError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_subject() {
        let resolver = ClerkOrganizationResolver::with_client(direct_client(), "http://x", "sk");
        assert!(resolver.resolve("../admin").await.is_err());
        assert!(resolver.resolve("").await.is_err());
    }

    #[test]
    fn test_trailing_slash_in_api_base() {
        let resolver =
            ClerkOrganizationResolver::with_client(direct_client(), "https://api.clerk.com/v1/", "sk");
        assert_eq!(
            resolver.memberships_url("user_1"),
            "https://api.clerk.com/v1/users/user_1/organization_memberships"
        );
    }
}
