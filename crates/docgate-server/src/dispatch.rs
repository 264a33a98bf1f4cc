//! Document operation dispatch.
//!
//! [`Dispatcher::handle`] runs the per-request stages after authentication:
//! normalize, validate, coerce, then exactly one store call. Only a
//! [`StoreOperation`] can reach the store, so an unvalidated command or an
//! unconverted identifier never does.

use crate::normalize::normalize;
use docgate_core::{
    coerce, validate, CommandKind, DeleteResult, Document, DocumentStore, GatewayError,
    GatewayResult, InsertManyResult, InsertOneResult, RequestContext, StoreError, StoreOperation,
    UpdateResult,
};
use docgate_middleware::{Response, ResponseExt};
use docgate_telemetry::record_store_error;
use http::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// The 200 body of a document operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// get-all: every match, `[]` when none.
    Documents(Vec<Document>),
    /// get-one: the first match, `{}` when none.
    Document(Document),
    /// insert-one
    InsertOne(InsertOneResult),
    /// insert-many
    InsertMany(InsertManyResult),
    /// update-one and update-many
    Update(UpdateResult),
    /// delete-one and delete-many
    Delete(DeleteResult),
}

/// Executes document commands against the store.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store.name())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Serves one document request and renders the response.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        kind: CommandKind,
        query: Option<&str>,
        body: &[u8],
    ) -> Response {
        match self.run(ctx, kind, query, body).await {
            Ok(reply) => Response::json(StatusCode::OK, &reply),
            Err(err) => {
                if !matches!(err, GatewayError::Store { .. }) {
                    debug!(
                        request_id = %ctx.request_id(),
                        operation = kind.name(),
                        error = %err,
                        "request rejected"
                    );
                }
                Response::from_error(&err)
            }
        }
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        kind: CommandKind,
        query: Option<&str>,
        body: &[u8],
    ) -> GatewayResult<Reply> {
        let command = validate(normalize(kind, query, body))?;
        let operation = coerce(command)?;
        self.execute(ctx, operation).await
    }

    /// Makes the single store call for `operation`.
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        operation: StoreOperation,
    ) -> GatewayResult<Reply> {
        let kind = operation.kind();
        let namespace = operation.namespace().clone();
        debug!(
            request_id = %ctx.request_id(),
            operation = kind.name(),
            database = %namespace.database,
            collection = %namespace.collection,
            organization_id = ctx.auth().map_or("-", |auth| auth.organization_id()),
            "dispatching"
        );

        let result = self.call_store(operation).await;
        result.map_err(|source| {
            record_store_error(kind.name(), source.kind());
            error!(
                request_id = %ctx.request_id(),
                operation = kind.name(),
                database = %namespace.database,
                collection = %namespace.collection,
                error = %source,
                "store operation failed"
            );
            GatewayError::store(kind, source)
        })
    }

    async fn call_store(&self, operation: StoreOperation) -> Result<Reply, StoreError> {
        let store = &self.store;
        let reply = match operation {
            StoreOperation::FindMany { namespace, filter } => {
                Reply::Documents(store.find_many(&namespace, filter).await?)
            }
            StoreOperation::FindOne { namespace, filter } => Reply::Document(
                store
                    .find_one(&namespace, filter)
                    .await?
                    .unwrap_or_default(),
            ),
            StoreOperation::InsertOne {
                namespace,
                document,
            } => Reply::InsertOne(store.insert_one(&namespace, document).await?),
            StoreOperation::InsertMany {
                namespace,
                documents,
            } => Reply::InsertMany(store.insert_many(&namespace, documents).await?),
            StoreOperation::UpdateOne { namespace, id, set } => {
                let result = store.update_one(&namespace, id, set).await?;
                if result.matched_count == 0 {
                    return Err(StoreError::NotFound(id));
                }
                Reply::Update(result)
            }
            StoreOperation::UpdateMany {
                namespace,
                filter,
                set,
            } => Reply::Update(store.update_many(&namespace, filter, set).await?),
            StoreOperation::DeleteOne { namespace, id } => {
                let result = store.delete_one(&namespace, id).await?;
                if result.deleted_count == 0 {
                    return Err(StoreError::NotFound(id));
                }
                Reply::Delete(result)
            }
            StoreOperation::DeleteMany { namespace, filter } => {
                Reply::Delete(store.delete_many(&namespace, filter).await?)
            }
        };
        Ok(reply)
    }
}
