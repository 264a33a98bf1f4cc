//! Predicate evaluation and `$set` application for in-process stores.
//!
//! Supported predicate forms:
//!
//! - `{"field": value}` equality, where `field` may be a dotted path and an
//!   array field matches when any element equals `value`
//! - `{"field": {"$op": operand, ...}}` with `$eq`, `$ne`, `$gt`, `$gte`,
//!   `$lt`, `$lte`, `$in`, `$nin` and `$exists`
//!
//! Anything else starting with `$` is a [`StoreError::MalformedPredicate`].

use docgate_core::{Document, StoreError, Value, ID_FIELD};
use std::cmp::Ordering;

/// Returns whether `doc` satisfies every clause of `filter`.
pub fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (key, condition) in filter {
        if key.starts_with('$') {
            return Err(StoreError::MalformedPredicate(format!(
                "unsupported top-level operator {key}"
            )));
        }
        let field = lookup(doc, key);
        let ok = match operator_expression(condition) {
            Some(ops) => eval_operators(field, ops)?,
            None => equals_field(field, condition),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolves a dotted path against `doc`.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Document(inner) => inner.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Merges `set` into `doc`, returning whether anything changed.
///
/// Dotted keys create intermediate documents as needed.
pub fn apply_set(doc: &mut Document, set: &Document) -> Result<bool, StoreError> {
    let mut changed = false;
    for (key, value) in set {
        if key.starts_with('$') || key.split('.').any(str::is_empty) {
            return Err(StoreError::MalformedPredicate(format!(
                "invalid update field name '{key}'"
            )));
        }
        if key == ID_FIELD && doc.get(ID_FIELD).is_some_and(|current| current != value) {
            return Err(StoreError::Backend(
                "performing an update on the path '_id' would modify the immutable field '_id'"
                    .to_string(),
            ));
        }
        changed |= set_path(doc, key, value.clone())?;
    }
    Ok(changed)
}

fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<bool, StoreError> {
    match path.split_once('.') {
        None => {
            let previous = doc.insert(path.to_string(), value.clone());
            Ok(previous.as_ref() != Some(&value))
        }
        Some((head, rest)) => {
            let slot = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Document(Document::new()));
            match slot {
                Value::Document(inner) => set_path(inner, rest, value),
                other => Err(StoreError::Backend(format!(
                    "cannot create field '{rest}' in element {{{head}: {}}}",
                    other.type_name()
                ))),
            }
        }
    }
}

fn operator_expression(condition: &Value) -> Option<&Document> {
    match condition {
        Value::Document(doc) if !doc.is_empty() && doc.keys().all(|k| k.starts_with('$')) => {
            Some(doc)
        }
        _ => None,
    }
}

fn eval_operators(field: Option<&Value>, ops: &Document) -> Result<bool, StoreError> {
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals_field(field, operand),
            "$ne" => !equals_field(field, operand),
            "$gt" => compares(field, operand, Ordering::is_gt),
            "$gte" => compares(field, operand, Ordering::is_ge),
            "$lt" => compares(field, operand, Ordering::is_lt),
            "$lte" => compares(field, operand, Ordering::is_le),
            "$in" => in_list(field, operand, op)?,
            "$nin" => !in_list(field, operand, op)?,
            "$exists" => field.is_some() == truthy(operand),
            other => {
                return Err(StoreError::MalformedPredicate(format!(
                    "unknown operator {other}"
                )))
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(field: Option<&Value>, operand: &Value, op: &str) -> Result<bool, StoreError> {
    match operand {
        Value::Array(candidates) => Ok(candidates.iter().any(|c| equals_field(field, c))),
        other => Err(StoreError::MalformedPredicate(format!(
            "{op} needs an array, got {}",
            other.type_name()
        ))),
    }
}

// A missing field equals null. An array field matches if it equals the
// operand as a whole or contains it.
fn equals_field(field: Option<&Value>, operand: &Value) -> bool {
    match field {
        None => operand.is_null(),
        Some(Value::Array(items)) if !matches!(operand, Value::Array(_)) => {
            items.iter().any(|item| values_equal(item, operand))
        }
        Some(value) => values_equal(value, operand),
    }
}

fn compares(field: Option<&Value>, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    match field {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare(item, operand).is_some_and(accept)),
        Some(value) => compare(value, operand).is_some_and(accept),
        None => false,
    }
}

/// Value equality with numeric types compared by magnitude.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::ObjectId(x), Value::ObjectId(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Double(d) => *d != 0.0,
        _ => true,
    }
}
