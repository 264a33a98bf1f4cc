//! Dynamic document model.
//!
//! Documents arrive as arbitrary JSON and are forwarded to the store with
//! their keys in insertion order. [`Value`] mirrors the JSON value space and
//! adds one store-native variant, [`Value::ObjectId`], produced by identifier
//! coercion and by the store when it assigns `_id` on insert.

use indexmap::IndexMap;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// An ordered string-keyed mapping of values.
pub type Document = IndexMap<String, Value>;

/// Name of the primary identifier field.
pub const ID_FIELD: &str = "_id";

/// A dynamically typed document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer that fits in 64 bits.
    Int(i64),
    /// A floating point number.
    Double(f64),
    /// A UTF-8 string.
    String(String),
    /// A store-native 12-byte identifier.
    ObjectId(ObjectId),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// A nested document.
    Document(Document),
}

impl Value {
    /// Returns the string slice if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested document if this is a [`Value::Document`].
    #[must_use]
    pub const fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            _ => None,
        }
    }

    /// Returns the identifier if this is a [`Value::ObjectId`].
    #[must_use]
    pub const fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Self::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the value as `f64` for numeric variants.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::ObjectId(_) => "objectId",
            Self::Array(_) => "array",
            Self::Document(_) => "document",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::ObjectId(value)
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Self::Document(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::String(s) => serializer.serialize_str(s),
            Self::ObjectId(id) => id.serialize(serializer),
            Self::Array(items) => serializer.collect_seq(items),
            Self::Document(doc) => serializer.collect_map(doc),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        #[allow(clippy::cast_precision_loss)]
        Ok(i64::try_from(v).map_or(Value::Double(v as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut doc = Document::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            doc.insert(key, value);
        }
        Ok(Value::Document(doc))
    }
}

/// Error returned when a string is not a valid [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ObjectId '{value}': expected 24 hexadecimal characters")]
pub struct ObjectIdError {
    /// The rejected input.
    pub value: String,
}

/// A 12-byte store identifier rendered as 24 lowercase hex characters.
///
/// Layout: 4-byte big-endian seconds since the epoch, 5 bytes unique to this
/// process, 3-byte big-endian counter.
///
/// Byte-compatible with `bson::oid::ObjectId`. The core crate keeps its own
/// type so builds without the MongoDB backend stay free of `bson`; the
/// backend converts with `docgate_store::mongo::{oid_to_bson, oid_from_bson}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        #[allow(clippy::cast_possible_truncation)]
        let secs = secs as u32;
        let count = counter().fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Builds an identifier from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parses a 24 character hex string.
    pub fn parse_str(s: &str) -> Result<Self, ObjectIdError> {
        let invalid = || ObjectIdError {
            value: s.to_string(),
        };
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        use fmt::Write;
        self.0.iter().fold(String::with_capacity(24), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }

    /// Seconds since the epoch encoded in the leading four bytes.
    #[must_use]
    pub const fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_str(&s).map_err(de::Error::custom)
    }
}

fn process_unique() -> &'static [u8; 5] {
    static UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    UNIQUE.get_or_init(|| {
        // Trailing bytes of a v7 UUID are random.
        let uuid = Uuid::now_v7();
        let raw = uuid.as_bytes();
        [raw[11], raw[12], raw[13], raw[14], raw[15]]
    })
}

fn counter() -> &'static AtomicU32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let uuid = Uuid::now_v7();
        let raw = uuid.as_bytes();
        AtomicU32::new(u32::from_be_bytes([0, raw[13], raw[14], raw[15]]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_object_id_parse_and_display() {
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
        assert_eq!(id.bytes()[0], 0x50);
    }

    #[test]
    fn test_object_id_parse_accepts_uppercase() {
        let id: ObjectId = "507F1F77BCF86CD799439011".parse().unwrap();
        assert_eq!(id.to_hex(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn test_object_id_rejects_bad_input() {
        for bad in ["", "abc", "zz7f1f77bcf86cd799439011", "507f1f77bcf86cd7994390111"] {
            assert!(ObjectId::parse_str(bad).is_err(), "{bad} should be rejected");
        }
        // multi-byte characters must not panic on slicing
        assert!(ObjectId::parse_str("ééééééééééééé").is_err());
    }

    #[test]
    fn test_object_id_generation_is_unique_and_timestamped() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(u64::from(a.timestamp_secs()) <= now);
        assert!(now - u64::from(a.timestamp_secs()) < 5);
    }

    #[test]
    fn test_value_from_json_preserves_order_and_types() {
        let doc: Document = serde_json::from_value(json!({
            "name": "Ada",
            "age": 36,
            "score": 9.5,
            "tags": ["a", "b"],
            "meta": { "active": true, "nickname": null }
        }))
        .unwrap();

        let keys: Vec<_> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "age", "score", "tags", "meta"]);
        assert_eq!(doc["age"], Value::Int(36));
        assert_eq!(doc["score"], Value::Double(9.5));
        let meta = doc["meta"].as_document().unwrap();
        assert!(meta["nickname"].is_null());
    }

    #[test]
    fn test_object_id_value_serializes_as_hex_string() {
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::ObjectId(id));
        let json = serde_json::to_value(&doc).expect("serialization should work");
        assert_eq!(json, json!({ "_id": "507f1f77bcf86cd799439011" }));
    }

    proptest! {
        #[test]
        fn prop_object_id_hex_round_trips(bytes in proptest::array::uniform12(any::<u8>())) {
            let id = ObjectId::from_bytes(bytes);
            let parsed = ObjectId::parse_str(&id.to_hex()).unwrap();
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn prop_object_id_rejects_wrong_length(s in "[0-9a-f]{0,23}") {
            prop_assert!(ObjectId::parse_str(&s).is_err());
        }
    }
}
