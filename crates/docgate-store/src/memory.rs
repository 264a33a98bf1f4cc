//! In-process document store.
//!
//! Collections live in a `HashMap` behind a `parking_lot::RwLock`. No lock
//! is held across an await point. Used by tests and by `memory://` URIs.

use crate::filter::{apply_set, matches, values_equal};
use async_trait::async_trait;
use docgate_core::{
    DeleteResult, Document, DocumentStore, InsertManyResult, InsertOneResult, Namespace, ObjectId,
    StoreError, UpdateResult, Value, ID_FIELD,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// A thread-safe in-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Namespace, Vec<Document>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `ns`.
    pub fn len(&self, ns: &Namespace) -> usize {
        self.collections.read().get(ns).map_or(0, Vec::len)
    }

    /// Whether `ns` holds no documents.
    pub fn is_empty(&self, ns: &Namespace) -> bool {
        self.len(ns) == 0
    }
}

// Puts an `_id` first when the document has none and returns the id value.
fn ensure_id(document: &mut Document) -> Value {
    if let Some(id) = document.get(ID_FIELD) {
        return id.clone();
    }
    let id = Value::ObjectId(ObjectId::new());
    document.shift_insert(0, ID_FIELD.to_string(), id.clone());
    id
}

fn duplicate_key(ns: &Namespace, id: &Value) -> StoreError {
    StoreError::Backend(format!(
        "duplicate key error collection: {ns} dup key: {{ _id: {} }}",
        serde_json::to_string(id).unwrap_or_default()
    ))
}

fn has_id(documents: &[Document], id: &Value) -> bool {
    documents
        .iter()
        .any(|d| d.get(ID_FIELD).is_some_and(|existing| values_equal(existing, id)))
}

fn id_filter(id: ObjectId) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD.to_string(), Value::ObjectId(id));
    filter
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read();
        let mut found = Vec::new();
        for document in guard.get(ns).into_iter().flatten() {
            if matches(document, &filter)? {
                found.push(document.clone());
            }
        }
        Ok(found)
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read();
        for document in guard.get(ns).into_iter().flatten() {
            if matches(document, &filter)? {
                return Ok(Some(document.clone()));
            }
        }
        Ok(None)
    }

    async fn insert_one(
        &self,
        ns: &Namespace,
        mut document: Document,
    ) -> Result<InsertOneResult, StoreError> {
        let id = ensure_id(&mut document);
        let mut guard = self.collections.write();
        let collection = guard.entry(ns.clone()).or_default();
        if has_id(collection, &id) {
            return Err(duplicate_key(ns, &id));
        }
        collection.push(document);
        debug!(namespace = %ns, "memory store inserted document");
        Ok(InsertOneResult::new(id))
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        mut documents: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError> {
        let ids: Vec<Value> = documents.iter_mut().map(ensure_id).collect();
        let mut guard = self.collections.write();
        let collection = guard.entry(ns.clone()).or_default();
        for (i, id) in ids.iter().enumerate() {
            if has_id(collection, id) || ids[..i].iter().any(|prev| values_equal(prev, id)) {
                return Err(duplicate_key(ns, id));
            }
        }
        collection.extend(documents);
        Ok(InsertManyResult::new(ids))
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        id: ObjectId,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        let filter = id_filter(id);
        let mut guard = self.collections.write();
        for document in guard.get_mut(ns).into_iter().flatten() {
            if matches(document, &filter)? {
                let changed = apply_set(document, &set)?;
                return Ok(UpdateResult::new(1, u64::from(changed)));
            }
        }
        Ok(UpdateResult::new(0, 0))
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        set: Document,
    ) -> Result<UpdateResult, StoreError> {
        let mut guard = self.collections.write();
        let (mut matched, mut modified) = (0, 0);
        for document in guard.get_mut(ns).into_iter().flatten() {
            if matches(document, &filter)? {
                matched += 1;
                if apply_set(document, &set)? {
                    modified += 1;
                }
            }
        }
        Ok(UpdateResult::new(matched, modified))
    }

    async fn delete_one(&self, ns: &Namespace, id: ObjectId) -> Result<DeleteResult, StoreError> {
        let filter = id_filter(id);
        let mut guard = self.collections.write();
        let Some(collection) = guard.get_mut(ns) else {
            return Ok(DeleteResult::new(0));
        };
        let mut position = None;
        for (index, document) in collection.iter().enumerate() {
            if matches(document, &filter)? {
                position = Some(index);
                break;
            }
        }
        Ok(DeleteResult::new(position.map_or(0, |index| {
            collection.remove(index);
            1
        })))
    }

    async fn delete_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteResult, StoreError> {
        let mut guard = self.collections.write();
        let Some(collection) = guard.get_mut(ns) else {
            return Ok(DeleteResult::new(0));
        };
        // Evaluate first so a malformed predicate deletes nothing.
        let mut keep = Vec::with_capacity(collection.len());
        for document in collection.iter() {
            keep.push(!matches(document, &filter)?);
        }
        let before = collection.len();
        let mut flags = keep.into_iter();
        collection.retain(|_| flags.next().unwrap_or(true));
        Ok(DeleteResult::new((before - collection.len()) as u64))
    }
}
