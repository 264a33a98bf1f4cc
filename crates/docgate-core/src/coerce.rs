//! Filter and identifier coercion.
//!
//! Turns a [`ValidatedCommand`] into the [`StoreOperation`] the dispatcher
//! executes. Filters become concrete documents (absent means "match all")
//! and identifier strings become [`ObjectId`]s. A value that cannot be
//! converted stops the request here, before any store call.

use crate::command::{Command, CommandKind, Namespace};
use crate::document::{Document, ObjectId, Value, ID_FIELD};
use crate::error::{GatewayError, GatewayResult};
use crate::validate::{requirement, ValidatedCommand};

/// A store call with every argument in its native form.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    /// Find every matching document.
    FindMany {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter, `{}` for all.
        filter: Document,
    },
    /// Find the first matching document.
    FindOne {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter.
        filter: Document,
    },
    /// Insert one document.
    InsertOne {
        /// Target namespace.
        namespace: Namespace,
        /// Document to insert.
        document: Document,
    },
    /// Insert documents in order.
    InsertMany {
        /// Target namespace.
        namespace: Namespace,
        /// Documents to insert.
        documents: Vec<Document>,
    },
    /// Merge fields into one document.
    UpdateOne {
        /// Target namespace.
        namespace: Namespace,
        /// Target identifier.
        id: ObjectId,
        /// Fields to set.
        set: Document,
    },
    /// Merge fields into every matching document.
    UpdateMany {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter.
        filter: Document,
        /// Fields to set.
        set: Document,
    },
    /// Delete one document.
    DeleteOne {
        /// Target namespace.
        namespace: Namespace,
        /// Target identifier.
        id: ObjectId,
    },
    /// Delete every matching document.
    DeleteMany {
        /// Target namespace.
        namespace: Namespace,
        /// Match filter.
        filter: Document,
    },
}

impl StoreOperation {
    /// The command kind this operation executes.
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::FindMany { .. } => CommandKind::GetAll,
            Self::FindOne { .. } => CommandKind::GetOne,
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
            Self::FindMany { namespace, .. }
            | Self::FindOne { namespace, .. }
            | Self::InsertOne { namespace, .. }
            | Self::InsertMany { namespace, .. }
            | Self::UpdateOne { namespace, .. }
            | Self::UpdateMany { namespace, .. }
            | Self::DeleteOne { namespace, .. }
            | Self::DeleteMany { namespace, .. } => namespace,
        }
    }
}

/// Coerces a validated command into a store operation.
pub fn coerce(command: ValidatedCommand) -> GatewayResult<StoreOperation> {
    let kind = command.kind();
    let op = match command.into_inner() {
        Command::GetAll { namespace, filter } => StoreOperation::FindMany {
            namespace,
            filter: effective_filter(filter),
        },
        Command::GetOne { namespace, filter } => StoreOperation::FindOne {
            namespace,
            filter: effective_filter(filter),
        },
        Command::InsertOne { namespace, data } => StoreOperation::InsertOne {
            namespace,
            document: present(kind, data)?,
        },
        Command::InsertMany { namespace, data } => StoreOperation::InsertMany {
            namespace,
            documents: present(kind, data)?,
        },
        Command::UpdateOne {
            namespace,
            object_id,
            data,
        } => StoreOperation::UpdateOne {
            namespace,
            id: parse_object_id(&object_id)?,
            set: present(kind, data)?,
        },
        Command::UpdateMany {
            namespace,
            filter,
            data,
        } => StoreOperation::UpdateMany {
            namespace,
            filter: effective_filter(filter),
            set: present(kind, data)?,
        },
        Command::DeleteOne {
            namespace,
            object_id,
        } => StoreOperation::DeleteOne {
            namespace,
            id: parse_object_id(&object_id)?,
        },
        Command::DeleteMany { namespace, filter } => StoreOperation::DeleteMany {
            namespace,
            filter: coerce_id_filter(effective_filter(filter))?,
        },
    };
    Ok(op)
}

/// An absent filter matches everything.
pub fn effective_filter(filter: Option<Document>) -> Document {
    filter.unwrap_or_default()
}

/// Converts a top-level string `_id` into an [`ObjectId`].
///
/// Every other entry, and an `_id` of any other type, passes through
/// unchanged and in its original position.
pub fn coerce_id_filter(mut filter: Document) -> GatewayResult<Document> {
    if let Some(value) = filter.get_mut(ID_FIELD) {
        if let Value::String(raw) = value {
            let id = ObjectId::parse_str(raw).map_err(|_| GatewayError::coercion(ID_FIELD, &*raw))?;
            *value = Value::ObjectId(id);
        }
    }
    Ok(filter)
}

/// Parses the `objectId` query parameter.
pub fn parse_object_id(raw: &str) -> GatewayResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| GatewayError::coercion("objectId", raw))
}

// Validation guarantees presence; this keeps the conversion total.
fn present<T>(kind: CommandKind, value: Option<T>) -> GatewayResult<T> {
    value.ok_or_else(|| GatewayError::validation(requirement(kind), vec!["data"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    fn ns() -> Namespace {
        Namespace::new("d", "c")
    }

    fn coerce_command(command: Command) -> GatewayResult<StoreOperation> {
        coerce(validate(command).unwrap())
    }

    #[test]
    fn test_absent_filter_becomes_empty_document() {
        let op = coerce_command(Command::GetAll {
            namespace: ns(),
            filter: None,
        })
        .unwrap();
        assert_eq!(
            op,
            StoreOperation::FindMany {
                namespace: ns(),
                filter: Document::new()
            }
        );

        let op = coerce_command(Command::UpdateMany {
            namespace: ns(),
            filter: None,
            data: Some(doc(json!({"archived": true}))),
        })
        .unwrap();
        match op {
            StoreOperation::UpdateMany { filter, .. } => assert!(filter.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_delete_many_converts_string_id_only() {
        let op = coerce_command(Command::DeleteMany {
            namespace: ns(),
            filter: Some(doc(json!({
                "status": "stale",
                "_id": "507f1f77bcf86cd799439011",
                "n": 3
            }))),
        })
        .unwrap();

        let StoreOperation::DeleteMany { filter, .. } = op else {
            panic!("expected delete-many");
        };
        let keys: Vec<_> = filter.keys().map(String::as_str).collect();
        assert_eq!(keys, ["status", "_id", "n"]);
        assert_eq!(
            filter["_id"],
            Value::ObjectId(ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap())
        );
        assert_eq!(filter["status"], Value::from("stale"));
        assert_eq!(filter["n"], Value::Int(3));
    }

    #[test]
    fn test_delete_many_leaves_non_string_id_alone() {
        let filter = doc(json!({ "_id": { "$in": ["a", "b"] } }));
        let coerced = coerce_id_filter(filter.clone()).unwrap();
        assert_eq!(coerced, filter);
    }

    #[test]
    fn test_delete_many_rejects_bad_id() {
        let err = coerce_command(Command::DeleteMany {
            namespace: ns(),
            filter: Some(doc(json!({ "_id": "not-an-id" }))),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid _id: not-an-id");
    }

    #[test]
    fn test_update_one_and_delete_one_parse_object_id() {
        let op = coerce_command(Command::DeleteOne {
            namespace: ns(),
            object_id: "507f1f77bcf86cd799439011".to_string(),
        })
        .unwrap();
        assert!(matches!(op, StoreOperation::DeleteOne { .. }));

        let err = coerce_command(Command::UpdateOne {
            namespace: ns(),
            object_id: "12345".to_string(),
            data: Some(doc(json!({"name": "y"}))),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Coercion {
                field: "objectId",
                ..
            }
        ));
        assert_eq!(err.to_string(), "Invalid objectId: 12345");
    }

    #[test]
    fn test_kind_is_preserved() {
        for kind in [CommandKind::GetOne, CommandKind::InsertMany] {
            let command = match kind {
                CommandKind::GetOne => Command::GetOne {
                    namespace: ns(),
                    filter: Some(Document::new()),
                },
                _ => Command::InsertMany {
                    namespace: ns(),
                    data: Some(vec![]),
                },
            };
            assert_eq!(coerce_command(command).unwrap().kind(), kind);
        }
    }
}
