//! # Diff Engine
//!
//! Computes the minimal ordered list of [`PatchOperation`]s that turns one JSON document
//! into another.
//!
//! - Objects are compared key by key and recursed into.
//! - Arrays are compared by position, and each element is treated as an atomic value. A
//!   changed policy statement is replaced whole rather than patched field by field.
//! - Anything else that differs is replaced at its own path.
//!
//! The output depends only on the two inputs: keys are visited in the iteration order of
//! `serde_json::Map`, which is stable for a given document.

use crate::error::ReconcileError;
use crate::patch::PatchOperation;
use crate::resource::{Definition, RemoteResource};
use serde_json::{Map, Value};

/// Diffs `previous` against `desired`.
///
/// Returns an empty vector when the two documents are equal.
pub fn diff(previous: &Value, desired: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_value(&mut String::new(), previous, desired, &mut ops);
    ops
}

/// Diffs the definition part of a remote resource against a desired definition.
///
/// Only `remote.body` is compared: the identifier and bookkeeping fields are not part
/// of the desired state and must never be removed by a patch.
pub fn diff_resource<D: Definition>(
    remote: &RemoteResource<D>,
    desired: &D,
) -> Result<Vec<PatchOperation>, ReconcileError> {
    let encode = |value: &D| {
        serde_json::to_value(value).map_err(|source| ReconcileError::Encode {
            key: desired.key().to_string(),
            source,
        })
    };
    Ok(diff(&encode(&remote.body)?, &encode(desired)?))
}

fn diff_value(path: &mut String, previous: &Value, desired: &Value, ops: &mut Vec<PatchOperation>) {
    if previous == desired {
        return;
    }
    match (previous, desired) {
        (Value::Object(prev), Value::Object(next)) => diff_object(path, prev, next, ops),
        (Value::Array(prev), Value::Array(next)) => diff_array(path, prev, next, ops),
        _ => ops.push(PatchOperation::Replace {
            path: path.clone(),
            value: desired.clone(),
        }),
    }
}

fn diff_object(
    path: &mut String,
    previous: &Map<String, Value>,
    desired: &Map<String, Value>,
    ops: &mut Vec<PatchOperation>,
) {
    for (key, old) in previous {
        let len = path.len();
        push_token(path, key);
        match desired.get(key) {
            Some(new) => diff_value(path, old, new, ops),
            None => ops.push(PatchOperation::Remove { path: path.clone() }),
        }
        path.truncate(len);
    }
    for (key, new) in desired {
        if !previous.contains_key(key) {
            let len = path.len();
            push_token(path, key);
            ops.push(PatchOperation::Add {
                path: path.clone(),
                value: new.clone(),
            });
            path.truncate(len);
        }
    }
}

fn diff_array(path: &mut String, previous: &[Value], desired: &[Value], ops: &mut Vec<PatchOperation>) {
    let common = previous.len().min(desired.len());
    for (index, (old, new)) in previous.iter().zip(desired).enumerate() {
        if old != new {
            ops.push(PatchOperation::Replace {
                path: format!("{path}/{index}"),
                value: new.clone(),
            });
        }
    }
    // Highest index first so earlier removals don't shift later ones.
    for index in (common..previous.len()).rev() {
        ops.push(PatchOperation::Remove {
            path: format!("{path}/{index}"),
        });
    }
    for (index, new) in desired.iter().enumerate().skip(common) {
        ops.push(PatchOperation::Add {
            path: format!("{path}/{index}"),
            value: new.clone(),
        });
    }
}

fn push_token(path: &mut String, token: &str) {
    path.push('/');
    for c in token.chars() {
        match c {
            '~' => path.push_str("~0"),
            '/' => path.push_str("~1"),
            _ => path.push(c),
        }
    }
}
