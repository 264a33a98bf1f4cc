//! MongoDB-backed document store.

use async_trait::async_trait;
use docgate_core::{
    DeleteResult, Document, DocumentStore, InsertManyResult, InsertOneResult, Namespace, ObjectId,
    StoreError, UpdateResult, Value, ID_FIELD,
};
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::time::Duration;
use tracing::{debug, info};

/// A [`DocumentStore`] backed by a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Parses `uri` and builds a client pool.
    ///
    /// The driver connects lazily; call [`DocumentStore::ping`] to verify
    /// the deployment is reachable.
    pub async fn connect(uri: &str, connect_timeout: Duration) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).await.map_err(map_error)?;
        options.connect_timeout = Some(connect_timeout);
        options.server_selection_timeout = Some(connect_timeout);
        options.app_name.get_or_insert_with(|| "docgate".to_string());

        let hosts = options.hosts.clone();
        let client = Client::with_options(options).map_err(map_error)?;
        info!(hosts = ?hosts, "mongodb client created");
        Ok(Self { client })
    }

    fn collection(&self, ns: &Namespace) -> Collection<bson::Document> {
        self.client
            .database(&ns.database)
            .collection(&ns.collection)
    }
}

fn map_error(err: mongodb::error::Error) -> StoreError {
    match *err.kind {
        ErrorKind::ServerSelection { .. } | ErrorKind::DnsResolve { .. } | ErrorKind::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Converts a gateway value into BSON.
pub fn to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Int(i) => Bson::Int64(i),
        Value::Double(d) => Bson::Double(d),
        Value::String(s) => Bson::String(s),
        Value::ObjectId(id) => Bson::ObjectId(oid_to_bson(id)),
        Value::Array(items) => Bson::Array(items.into_iter().map(to_bson).collect()),
        Value::Document(doc) => Bson::Document(to_bson_document(doc)),
    }
}

/// Converts a gateway document into a BSON document, keeping key order.
pub fn to_bson_document(document: Document) -> bson::Document {
    document
        .into_iter()
        .map(|(key, value)| (key, to_bson(value)))
        .collect()
}

/// Converts BSON into a gateway value.
///
/// Types without a direct counterpart use their relaxed extended JSON form.
pub fn from_bson(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::Int(i64::from(i)),
        Bson::Int64(i) => Value::Int(i),
        Bson::Double(d) => Value::Double(d),
        Bson::String(s) => Value::String(s),
        Bson::ObjectId(oid) => Value::ObjectId(oid_from_bson(oid)),
        Bson::Array(items) => Value::Array(items.into_iter().map(from_bson).collect()),
        Bson::Document(doc) => Value::Document(from_bson_document(doc)),
        other => serde_json::from_value(other.into_relaxed_extjson()).unwrap_or(Value::Null),
    }
}

/// Converts a BSON document into a gateway document.
pub fn from_bson_document(document: bson::Document) -> Document {
    document
        .into_iter()
        .map(|(key, value)| (key, from_bson(value)))
        .collect()
}

/// Converts a gateway identifier into the driver's.
pub fn oid_to_bson(id: ObjectId) -> bson::oid::ObjectId {
    bson::oid::ObjectId::from_bytes(id.bytes())
}

/// Converts a driver identifier into the gateway's.
pub fn oid_from_bson(oid: bson::oid::ObjectId) -> ObjectId {
    ObjectId::from_bytes(oid.bytes())
}

fn by_id(id: ObjectId) -> bson::Document {
    doc! { ID_FIELD: oid_to_bson(id) }
}

fn set(fields: Document) -> bson::Document {
    doc! { "$set": to_bson_document(fields) }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_error)?;
        debug!("mongodb ping ok");
        Ok(())
    }

    async fn find_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Vec<Document>, StoreError> {
        let cursor = self
            .collection(ns)
            .find(to_bson_document(filter))
            .await
            .map_err(map_error)?;
        let documents: Vec<bson::Document> = cursor.try_collect().await.map_err(map_error)?;
        Ok(documents.into_iter().map(from_bson_document).collect())
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<Option<Document>, StoreError> {
        let found = self
            .collection(ns)
            .find_one(to_bson_document(filter))
            .await
            .map_err(map_error)?;
        Ok(found.map(from_bson_document))
    }

    async fn insert_one(
        &self,
        ns: &Namespace,
        document: Document,
    ) -> Result<InsertOneResult, StoreError> {
        let result = self
            .collection(ns)
            .insert_one(to_bson_document(document))
            .await
            .map_err(map_error)?;
        Ok(InsertOneResult::new(from_bson(result.inserted_id)))
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> Result<InsertManyResult, StoreError> {
        // The driver refuses an empty batch.
        if documents.is_empty() {
            return Ok(InsertManyResult::new(Vec::new()));
        }
        let count = documents.len();
        let result = self
            .collection(ns)
            .insert_many(documents.into_iter().map(to_bson_document))
            .await
            .map_err(map_error)?;
        let mut ids = result.inserted_ids;
        let ordered = (0..count)
            .map(|i| ids.remove(&i).map_or(Value::Null, from_bson))
            .collect();
        Ok(InsertManyResult::new(ordered))
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        id: ObjectId,
        fields: Document,
    ) -> Result<UpdateResult, StoreError> {
        let result = self
            .collection(ns)
            .update_one(by_id(id), set(fields))
            .await
            .map_err(map_error)?;
        Ok(UpdateResult::new(result.matched_count, result.modified_count))
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        fields: Document,
    ) -> Result<UpdateResult, StoreError> {
        let result = self
            .collection(ns)
            .update_many(to_bson_document(filter), set(fields))
            .await
            .map_err(map_error)?;
        Ok(UpdateResult::new(result.matched_count, result.modified_count))
    }

    async fn delete_one(&self, ns: &Namespace, id: ObjectId) -> Result<DeleteResult, StoreError> {
        let result = self
            .collection(ns)
            .delete_one(by_id(id))
            .await
            .map_err(map_error)?;
        Ok(DeleteResult::new(result.deleted_count))
    }

    async fn delete_many(
        &self,
        ns: &Namespace,
        filter: Document,
    ) -> Result<DeleteResult, StoreError> {
        let result = self
            .collection(ns)
            .delete_many(to_bson_document(filter))
            .await
            .map_err(map_error)?;
        Ok(DeleteResult::new(result.deleted_count))
    }
}
