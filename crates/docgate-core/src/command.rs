//! Typed document commands.
//!
//! A [`Command`] is what the request normalizer produces from a raw HTTP
//! request. Every field the caller may omit is represented as-is: an empty
//! string for names, `None` for bodies. The validator decides what is
//! missing; nothing here enforces presence.

use crate::document::Document;
use http::Method;
use serde::Serialize;
use std::fmt;

/// Target database and collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Namespace {
    /// Database name.
    pub database: String,
    /// Collection name.
    pub collection: String,
}

impl Namespace {
    /// Creates a namespace.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// The eight document operations exposed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Find all documents matching a filter.
    GetAll,
    /// Find the first document matching a filter.
    GetOne,
    /// Insert one document.
    InsertOne,
    /// Insert a list of documents.
    InsertMany,
    /// Update one document by identifier.
    UpdateOne,
    /// Update every document matching a filter.
    UpdateMany,
    /// Delete one document by identifier.
    DeleteOne,
    /// Delete every document matching a filter.
    DeleteMany,
}

impl CommandKind {
    /// Every kind, in route-table order.
    pub const ALL: [Self; 8] = [
        Self::GetAll,
        Self::GetOne,
        Self::InsertOne,
        Self::InsertMany,
        Self::UpdateOne,
        Self::UpdateMany,
        Self::DeleteOne,
        Self::DeleteMany,
    ];

    /// Stable snake_case name used in logs and metric labels.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetAll => "get_all",
            Self::GetOne => "get_one",
            Self::InsertOne => "insert_one",
            Self::InsertMany => "insert_many",
            Self::UpdateOne => "update_one",
            Self::UpdateMany => "update_many",
            Self::DeleteOne => "delete_one",
            Self::DeleteMany => "delete_many",
        }
    }

    /// Route path.
    pub const fn path(self) -> &'static str {
        match self {
            Self::GetAll => "/v1/get-all",
            Self::GetOne => "/v1/get-one",
            Self::InsertOne => "/v1/insert-one",
            Self::InsertMany => "/v1/insert-many",
            Self::UpdateOne => "/v1/update-one",
            Self::UpdateMany => "/v1/update-many",
            Self::DeleteOne => "/v1/delete-one",
            Self::DeleteMany => "/v1/delete-many",
        }
    }

    /// The only HTTP method accepted on [`Self::path`].
    pub const fn method(self) -> Method {
        match self {
            Self::GetAll | Self::GetOne | Self::InsertOne | Self::InsertMany => Method::POST,
            Self::UpdateOne | Self::UpdateMany => Method::PUT,
            Self::DeleteOne | Self::DeleteMany => Method::DELETE,
        }
    }

    /// Looks up the kind served at `path`.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }

    /// Verb phrase used in store failure messages.
    pub const fn action(self) -> &'static str {
        match self {
            Self::GetAll => "finding documents",
            Self::GetOne => "finding document",
            Self::InsertOne => "inserting document",
            Self::InsertMany => "inserting documents",
            Self::UpdateOne => "updating document",
            Self::UpdateMany => "updating documents",
            Self::DeleteOne => "deleting document",
            Self::DeleteMany => "deleting documents",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A normalized, not yet validated document command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `POST /v1/get-all`
    GetAll {
        /// Target namespace.
        namespace: Namespace,
        /// Optional match filter.
        filter: Option<Document>,
    },
    /// `POST /v1/get-one`
    GetOne {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter.
        filter: Option<Document>,
    },
    /// `POST /v1/insert-one`
    InsertOne {
        /// Target namespace.
        namespace: Namespace,
        /// Document to insert.
        data: Option<Document>,
    },
    /// `POST /v1/insert-many`
    InsertMany {
        /// Target namespace.
        namespace: Namespace,
        /// Documents to insert.
        data: Option<Vec<Document>>,
    },
    /// `PUT /v1/update-one`
    UpdateOne {
        /// Target namespace.
        namespace: Namespace,
        /// Identifier as sent by the caller.
        object_id: String,
        /// Fields to set.
        data: Option<Document>,
    },
    /// `PUT /v1/update-many`
    UpdateMany {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter.
        filter: Option<Document>,
        /// Fields to set.
        data: Option<Document>,
    },
    /// `DELETE /v1/delete-one`
    DeleteOne {
        /// Target namespace.
        namespace: Namespace,
        /// Identifier as sent by the caller.
        object_id: String,
    },
    /// `DELETE /v1/delete-many`
    DeleteMany {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter.
        filter: Option<Document>,
    },
}

impl Command {
    /// A command of `kind` with every field empty.
    ///
    /// The normalizer returns this when a body cannot be decoded, so that
    /// validation reports the missing fields.
    pub fn empty(kind: CommandKind) -> Self {
        let namespace = Namespace::default();
        match kind {
            CommandKind::GetAll => Self::GetAll {
                namespace,
                filter: None,
            },
            CommandKind::GetOne => Self::GetOne {
                namespace,
                filter: None,
            },
            CommandKind::InsertOne => Self::InsertOne {
                namespace,
                data: None,
            },
            CommandKind::InsertMany => Self::InsertMany {
                namespace,
                data: None,
            },
            CommandKind::UpdateOne => Self::UpdateOne {
                namespace,
                object_id: String::new(),
                data: None,
            },
            CommandKind::UpdateMany => Self::UpdateMany {
                namespace,
                filter: None,
                data: None,
            },
            CommandKind::DeleteOne => Self::DeleteOne {
                namespace,
                object_id: String::new(),
            },
            CommandKind::DeleteMany => Self::DeleteMany {
                namespace,
                filter: None,
            },
        }
    }

    /// The kind of this command.
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::GetAll { .. } => CommandKind::GetAll,
            Self::GetOne { .. } => CommandKind::GetOne,
            Self::InsertOne { .. } => CommandKind::InsertOne,
            Self::InsertMany { .. } => CommandKind::InsertMany,
            Self::UpdateOne { .. } => CommandKind::UpdateOne,
            Self::UpdateMany { .. } => CommandKind::UpdateMany,
            Self::DeleteOne { .. } => CommandKind::DeleteOne,
            Self::DeleteMany { .. } => CommandKind::DeleteMany,
        }
    }

    /// The target namespace.
    pub const fn namespace(&self) -> &Namespace {
        match self {
            Self::GetAll { namespace, .. }
            | Self::GetOne { namespace, .. }
            | Self::InsertOne { namespace, .. }
            | Self::InsertMany { namespace, .. }
            | Self::UpdateOne { namespace, .. }
            | Self::UpdateMany { namespace, .. }
            | Self::DeleteOne { namespace, .. }
            | Self::DeleteMany { namespace, .. } => namespace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_is_consistent() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_path(kind.path()), Some(kind));
            assert_eq!(Command::empty(kind).kind(), kind);
        }
        assert_eq!(CommandKind::from_path("/v1/unknown"), None);
    }

    #[test]
    fn test_methods() {
        assert_eq!(CommandKind::GetOne.method(), Method::POST);
        assert_eq!(CommandKind::InsertMany.method(), Method::POST);
        assert_eq!(CommandKind::UpdateOne.method(), Method::PUT);
        assert_eq!(CommandKind::DeleteMany.method(), Method::DELETE);
    }

    #[test]
    fn test_namespace_display() {
        assert_eq!(Namespace::new("shop", "orders").to_string(), "shop.orders");
    }
}
