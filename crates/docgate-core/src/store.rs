//! The document store contract.
//!
//! The dispatcher talks to the backing store only through [`DocumentStore`].
//! Result types serialize with the field names existing clients already
//! consume (`InsertedID`, `MatchedCount`, ...).

use crate::command::Namespace;
use crate::document::{Document, ObjectId, Value};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The filter or update uses something the store cannot evaluate.
    #[error("malformed predicate: {0}")]
    MalformedPredicate(String),

    /// A single-document update or delete matched nothing.
    #[error("no document found with _id {0}")]
    NotFound(ObjectId),

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// Short label used for metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::MalformedPredicate(_) => "malformed_predicate",
            Self::NotFound(_) => "not_found",
            Self::Backend(_) => "backend",
        }
    }
}

/// Outcome of an insert-one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertOneResult {
    /// Identifier of the inserted document.
    #[serde(rename = "InsertedID")]
    pub inserted_id: Value,
    /// Write acknowledgement.
    #[serde(rename = "Acknowledged")]
    pub acknowledged: bool,
}

impl InsertOneResult {
    /// Acknowledged result for `inserted_id`.
    pub const fn new(inserted_id: Value) -> Self {
        Self {
            inserted_id,
            acknowledged: true,
        }
    }
}

/// Outcome of an insert-many.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertManyResult {
    /// Identifiers in input order.
    #[serde(rename = "InsertedIDs")]
    pub inserted_ids: Vec<Value>,
    /// Write acknowledgement.
    #[serde(rename = "Acknowledged")]
    pub acknowledged: bool,
}

impl InsertManyResult {
    /// Acknowledged result for `inserted_ids`.
    pub const fn new(inserted_ids: Vec<Value>) -> Self {
        Self {
            inserted_ids,
            acknowledged: true,
        }
    }
}

/// Outcome of an update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateResult {
    /// Documents matched by the filter.
    #[serde(rename = "MatchedCount")]
    pub matched_count: u64,
    /// Documents actually changed.
    #[serde(rename = "ModifiedCount")]
    pub modified_count: u64,
    /// Always zero; upserts are never requested.
    #[serde(rename = "UpsertedCount")]
    pub upserted_count: u64,
    /// Always `null`.
    #[serde(rename = "UpsertedID")]
    pub upserted_id: Option<Value>,
    /// Write acknowledgement.
    #[serde(rename = "Acknowledged")]
    pub acknowledged: bool,
}

impl UpdateResult {
    /// Acknowledged result without upserts.
    pub const fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            matched_count,
            modified_count,
            upserted_count: 0,
            upserted_id: None,
            acknowledged: true,
        }
    }
}

/// Outcome of a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    /// Documents removed.
    #[serde(rename = "DeletedCount")]
    pub deleted_count: u64,
    /// Write acknowledgement.
    #[serde(rename = "Acknowledged")]
    pub acknowledged: bool,
}

impl DeleteResult {
    /// Acknowledged result.
    pub const fn new(deleted_count: u64) -> Self {
        Self {
            deleted_count,
            acknowledged: true,
        }
    }
}

/// A backing document store.
///
/// Implementations assign an `_id` to inserted documents that lack one and
/// apply updates as a field merge (`$set`), never as a replacement.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// All documents matching `filter`.
    async fn find_many(&self, ns: &Namespace, filter: Document)
        -> Result<Vec<Document>, StoreError>;

    /// The first document matching `filter`.
    async fn find_one(&self, ns: &Namespace, filter: Document)
        -> Result<Option<Document>, StoreError>;

    /// Inserts one document.
    async fn insert_one(&self, ns: &Namespace, document: Document)
        -> Result<InsertOneResult, StoreError>;

    /// Inserts documents in order.
    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError>;

    /// Merges `set` into the document whose `_id` is `id`.
    async fn update_one(
        &self,
        ns: &Namespace,
        id: ObjectId,
        set: Document,
    ) -> Result<UpdateResult, StoreError>;

    /// Merges `set` into every document matching `filter`.
    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        set: Document,
    ) -> Result<UpdateResult, StoreError>;

    /// Deletes the document whose `_id` is `id`.
    async fn delete_one(&self, ns: &Namespace, id: ObjectId) -> Result<DeleteResult, StoreError>;

    /// Deletes every document matching `filter`.
    async fn delete_many(&self, ns: &Namespace, filter: Document)
        -> Result<DeleteResult, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_field_names() {
        let update = serde_json::to_value(UpdateResult::new(1, 1)).unwrap();
        assert_eq!(
            update,
            json!({
                "MatchedCount": 1,
                "ModifiedCount": 1,
                "UpsertedCount": 0,
                "UpsertedID": null,
                "Acknowledged": true
            })
        );

        let delete = serde_json::to_value(DeleteResult::new(3)).unwrap();
        assert_eq!(delete, json!({ "DeletedCount": 3, "Acknowledged": true }));
    }

    #[test]
    fn test_insert_result_renders_object_id_as_hex() {
        let id = ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap();
        let value = serde_json::to_value(InsertOneResult::new(Value::ObjectId(id))).unwrap();
        assert_eq!(
            value,
            json!({ "InsertedID": "64b7f0c2a1b2c3d4e5f60718", "Acknowledged": true })
        );
    }
}
