//! Collaborator fakes.
//!
//! Each fake counts its calls so tests can assert that a rejected request
//! never reached it.

use async_trait::async_trait;
use docgate_core::{
    DeleteResult, Document, DocumentStore, InsertManyResult, InsertOneResult, Namespace,
    ObjectId, StoreError, UpdateResult,
};
use docgate_middleware::{AuthError, IdentityVerifier, OrganizationResolver, VerifiedIdentity};
use docgate_store::MemoryStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Accepts a fixed set of tokens.
#[derive(Debug, Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticVerifier {
    /// A verifier that accepts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` as `user_id`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }

    /// Number of verifications attempted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(token)
            .map(|user_id| VerifiedIdentity {
                user_id: user_id.clone(),
                session_id: None,
            })
            .ok_or_else(|| AuthError::InvalidToken("unknown test token".to_string()))
    }
}

/// Maps users to organizations.
#[derive(Debug, Default)]
pub struct StaticResolver {
    memberships: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticResolver {
    /// A resolver with no memberships.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `user_id` a member of `organization_id`.
    #[must_use]
    pub fn with_membership(
        mut self,
        user_id: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        self.memberships
            .insert(user_id.into(), organization_id.into());
        self
    }

    /// Number of lookups made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrganizationResolver for StaticResolver {
    async fn resolve(&self, user_id: &str) -> Result<String, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.memberships
            .get(user_id)
            .cloned()
            .ok_or(AuthError::NoMembership)
    }
}

/// One call seen by a [`CountingStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    /// Trait method name, e.g. `"find_many"`.
    pub method: &'static str,
    /// Target namespace.
    pub namespace: Namespace,
    /// The filter passed, for filter-taking methods.
    pub filter: Option<Document>,
    /// The identifier passed, for single-document writes.
    pub id: Option<ObjectId>,
}

/// A [`MemoryStore`] that records every call.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
}

impl CountingStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store, for seeding without recording.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Number of calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The most recent call.
    pub fn last_call(&self) -> Option<StoreCall> {
        self.calls.lock().last().cloned()
    }

    fn record(
        &self,
        method: &'static str,
        namespace: &Namespace,
        filter: Option<&Document>,
        id: Option<ObjectId>,
    ) {
        self.calls.lock().push(StoreCall {
            method,
            namespace: namespace.clone(),
            filter: filter.cloned(),
            id,
        });
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn find_many(&self, ns: &Namespace, filter: Document) -> Result<Vec<Document>, StoreError> {
        self.record("find_many", ns, Some(&filter), None);
        self.inner.find_many(ns, filter).await
    }

    async fn find_one(&self, ns: &Namespace, filter: Document) -> Result<Option<Document>, StoreError> {
        self.record("find_one", ns, Some(&filter), None);
        self.inner.find_one(ns, filter).await
    }

    async fn insert_one(&self, ns: &Namespace, document: Document) -> Result<InsertOneResult, StoreError> {
        self.record("insert_one", ns, None, None);
        self.inner.insert_one(ns, document).await
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError> {
        self.record("insert_many", ns, None, None);
        self.inner.insert_many(ns, documents).await
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        id: ObjectId,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        self.record("update_one", ns, None, Some(id));
        self.inner.update_one(ns, id, set).await
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        self.record("update_many", ns, Some(&filter), None);
        self.inner.update_many(ns, filter, set).await
    }

    async fn delete_one(&self, ns: &Namespace, id: ObjectId) -> Result<DeleteResult, StoreError> {
        self.record("delete_one", ns, None, Some(id));
        self.inner.delete_one(ns, id).await
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> Result<DeleteResult, StoreError> {
        self.record("delete_many", ns, Some(&filter), None);
        self.inner.delete_many(ns, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier() {
        let verifier = StaticVerifier::new().with_token("tok_a", "user_a");
        assert_eq!(verifier.verify("tok_a").await.unwrap().user_id, "user_a");
        assert!(matches!(
            verifier.verify("tok_b").await,
            Err(AuthError::InvalidToken(_))
        ));
        assert_eq!(verifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new().with_membership("user_a", "org_a");
        assert_eq!(resolver.resolve("user_a").await.unwrap(), "org_a");
        assert!(matches!(
            resolver.resolve("user_b").await,
            Err(AuthError::NoMembership)
        ));
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn test_counting_store_records_calls() {
        let store = CountingStore::new();
        let ns = Namespace::new("shop", "orders");

        store.inner().insert_one(&ns, Document::new()).await.unwrap();
        assert_eq!(store.call_count(), 0);

        let found = store.find_many(&ns, Document::new()).await.unwrap();
        assert_eq!(found.len(), 1);

        let id = ObjectId::new();
        let deleted = store.delete_one(&ns, id).await.unwrap();
        assert_eq!(deleted.deleted_count, 0);

        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, "find_many");
        assert_eq!(calls[0].filter, Some(Document::new()));
        assert_eq!(store.last_call().unwrap().id, Some(id));
    }
}
