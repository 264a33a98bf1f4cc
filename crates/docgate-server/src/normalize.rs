//! Request normalization.
//!
//! Builds a [`Command`] from the route, the raw query string and the body
//! bytes. Nothing is rejected here: absent query parameters become empty
//! strings and an undecodable body becomes the empty command of its kind,
//! so the validator reports what is missing.

use docgate_core::{Command, CommandKind, Document, Namespace};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Query parameters shared by every document route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// `database`
    pub database: String,
    /// `collection`
    pub collection: String,
    /// `objectId`
    pub object_id: String,
}

impl QueryParams {
    /// Parses a raw query string. The first occurrence of a key wins.
    pub fn parse(query: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = query
            .and_then(|raw| serde_urlencoded::from_str(raw).ok())
            .unwrap_or_default();

        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };
        Self {
            database: first("database"),
            collection: first("collection"),
            object_id: first("objectId"),
        }
    }

    fn namespace(&self) -> Namespace {
        Namespace::new(self.database.clone(), self.collection.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FilterBody {
    #[serde(default)]
    filter: Option<Document>,
}

#[derive(Debug, Default, Deserialize)]
struct DataBody<T> {
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterDataBody {
    #[serde(default)]
    filter: Option<Document>,
    #[serde(default)]
    data: Option<Document>,
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Option<T> {
    serde_json::from_slice(body).ok()
}

/// Builds the command for `kind`.
pub fn normalize(kind: CommandKind, query: Option<&str>, body: &[u8]) -> Command {
    let params = QueryParams::parse(query);
    let namespace = params.namespace();

    let command = match kind {
        CommandKind::GetAll => {
            // An empty or invalid body lists everything.
            let filter = decode::<FilterBody>(body).and_then(|b| b.filter);
            Some(Command::GetAll { namespace, filter })
        }
        CommandKind::GetOne => decode::<FilterBody>(body)
            .and_then(|b| b.filter)
            .map(|filter| Command::GetOne {
                namespace,
                filter: Some(filter),
            }),
        CommandKind::InsertOne => {
            decode::<DataBody<Document>>(body).map(|b| Command::InsertOne {
                namespace,
                data: b.data,
            })
        }
        CommandKind::InsertMany => {
            decode::<DataBody<Vec<Document>>>(body).map(|b| Command::InsertMany {
                namespace,
                data: b.data,
            })
        }
        CommandKind::UpdateOne => {
            decode::<DataBody<Document>>(body).map(|b| Command::UpdateOne {
                namespace,
                object_id: params.object_id,
                data: b.data,
            })
        }
        CommandKind::UpdateMany => decode::<FilterDataBody>(body).map(|b| Command::UpdateMany {
            namespace,
            filter: b.filter,
            data: b.data,
        }),
        CommandKind::DeleteOne => Some(Command::DeleteOne {
            namespace,
            object_id: params.object_id,
        }),
        CommandKind::DeleteMany => decode::<FilterBody>(body).map(|b| Command::DeleteMany {
            namespace,
            filter: b.filter,
        }),
    };

    command.unwrap_or_else(|| Command::empty(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_core::Value;
    use serde_json::json;

    const QUERY: Option<&str> = Some("database=shop&collection=orders");

    fn doc(value: serde_json::Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_query_params() {
        let params = QueryParams::parse(Some(
            "database=shop&collection=my%20orders&objectId=65a1b2c3d4e5f60718293a4b&database=other",
        ));
        assert_eq!(params.database, "shop");
        assert_eq!(params.collection, "my orders");
        assert_eq!(params.object_id, "65a1b2c3d4e5f60718293a4b");

        assert_eq!(QueryParams::parse(None), QueryParams::default());
        assert_eq!(QueryParams::parse(Some("")), QueryParams::default());
    }

    #[test]
    fn test_get_all_keeps_namespace_on_bad_body() {
        for body in [&b""[..], b"not json", b"{}", br#"{"filter": null}"#] {
            assert_eq!(
                normalize(CommandKind::GetAll, QUERY, body),
                Command::GetAll {
                    namespace: Namespace::new("shop", "orders"),
                    filter: None,
                }
            );
        }
    }

    #[test]
    fn test_get_all_with_filter_keeps_field_order() {
        let command = normalize(
            CommandKind::GetAll,
            QUERY,
            br#"{"filter": {"status": "open", "total": {"$gt": 10}}}"#,
        );
        let Command::GetAll { filter: Some(filter), .. } = command else {
            panic!("expected a filter");
        };
        let keys: Vec<_> = filter.keys().cloned().collect();
        assert_eq!(keys, ["status", "total"]);
    }

    #[test]
    fn test_get_one_without_filter_is_empty_command() {
        for body in [&b""[..], b"[1, 2]", b"{}", br#"{"filter": null}"#] {
            assert_eq!(
                normalize(CommandKind::GetOne, QUERY, body),
                Command::empty(CommandKind::GetOne)
            );
        }

        assert_eq!(
            normalize(CommandKind::GetOne, QUERY, br#"{"filter": {}}"#),
            Command::GetOne {
                namespace: Namespace::new("shop", "orders"),
                filter: Some(Document::new()),
            }
        );
    }

    #[test]
    fn test_insert_one() {
        let command = normalize(
            CommandKind::InsertOne,
            QUERY,
            br#"{"data": {"name": "widget", "qty": 3}, "ignored": true}"#,
        );
        assert_eq!(
            command,
            Command::InsertOne {
                namespace: Namespace::new("shop", "orders"),
                data: Some(doc(json!({"name": "widget", "qty": 3}))),
            }
        );
    }

    #[test]
    fn test_decode_failure_drops_query_fields() {
        for kind in [
            CommandKind::InsertOne,
            CommandKind::InsertMany,
            CommandKind::UpdateOne,
            CommandKind::UpdateMany,
            CommandKind::DeleteMany,
        ] {
            assert_eq!(
                normalize(kind, Some("database=a&collection=b&objectId=x"), b""),
                Command::empty(kind),
                "{kind}"
            );
        }
    }

    #[test]
    fn test_insert_many_needs_an_array() {
        assert_eq!(
            normalize(CommandKind::InsertMany, QUERY, br#"{"data": {"a": 1}}"#),
            Command::empty(CommandKind::InsertMany)
        );

        let command = normalize(
            CommandKind::InsertMany,
            QUERY,
            br#"{"data": [{"a": 1}, {"a": 2.5}]}"#,
        );
        let Command::InsertMany { data: Some(docs), .. } = command else {
            panic!("expected documents");
        };
        assert_eq!(docs[0]["a"], Value::Int(1));
        assert_eq!(docs[1]["a"], Value::Double(2.5));
    }

    #[test]
    fn test_update_one_reads_object_id_from_query() {
        let command = normalize(
            CommandKind::UpdateOne,
            Some("database=shop&collection=orders&objectId=65a1b2c3d4e5f60718293a4b"),
            br#"{"data": {"name": "renamed"}}"#,
        );
        assert_eq!(
            command,
            Command::UpdateOne {
                namespace: Namespace::new("shop", "orders"),
                object_id: "65a1b2c3d4e5f60718293a4b".to_string(),
                data: Some(doc(json!({"name": "renamed"}))),
            }
        );
    }

    #[test]
    fn test_update_many_filter_is_optional() {
        let command = normalize(
            CommandKind::UpdateMany,
            QUERY,
            br#"{"data": {"archived": true}}"#,
        );
        assert_eq!(
            command,
            Command::UpdateMany {
                namespace: Namespace::new("shop", "orders"),
                filter: None,
                data: Some(doc(json!({"archived": true}))),
            }
        );
    }

    #[test]
    fn test_delete_one_ignores_body() {
        assert_eq!(
            normalize(
                CommandKind::DeleteOne,
                Some("database=shop&collection=orders&objectId=abc"),
                b"garbage",
            ),
            Command::DeleteOne {
                namespace: Namespace::new("shop", "orders"),
                object_id: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_delete_many_with_empty_object() {
        assert_eq!(
            normalize(CommandKind::DeleteMany, QUERY, b"{}"),
            Command::DeleteMany {
                namespace: Namespace::new("shop", "orders"),
                filter: None,
            }
        );
    }
}
