//! # Patch Operations
//!
//! Typed RFC 6902 operations. The diff engine produces them, a
//! [`ResourceClient`](crate::ResourceClient) sends them, and the in-memory store applies
//! them. On the wire each operation is `{ "op": ..., "path": ..., "value"?: ..., "from"?: ... }`.

use crate::error::PatchError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structural edit of a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    /// JSON Pointer the operation targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    /// Name of the operation as it appears in the `op` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }
}

/// Applies `operations` to `document` in order.
///
/// Either every operation succeeds or `document` is left unchanged.
pub fn apply(document: &mut Value, operations: &[PatchOperation]) -> Result<(), PatchError> {
    let encoded = serde_json::to_value(operations).map_err(|e| PatchError(e.to_string()))?;
    let patch: json_patch::Patch =
        serde_json::from_value(encoded).map_err(|e| PatchError(e.to_string()))?;
    json_patch::patch(document, &patch).map_err(|e| PatchError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operations_use_rfc6902_wire_format() {
        let ops = vec![
            PatchOperation::Replace {
                path: "/name".into(),
                value: json!("Admins"),
            },
            PatchOperation::Remove {
                path: "/policy/1".into(),
            },
            PatchOperation::Move {
                from: "/a".into(),
                path: "/b".into(),
            },
        ];

        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                { "op": "replace", "path": "/name", "value": "Admins" },
                { "op": "remove", "path": "/policy/1" },
                { "op": "move", "from": "/a", "path": "/b" }
            ])
        );
    }

    #[test]
    fn apply_runs_operations_in_order() {
        let mut doc = json!({ "name": "Ops", "policy": [] });
        apply(
            &mut doc,
            &[
                PatchOperation::Add {
                    path: "/policy/0".into(),
                    value: json!({ "effect": "allow" }),
                },
                PatchOperation::Test {
                    path: "/policy/0/effect".into(),
                    value: json!("allow"),
                },
                PatchOperation::Copy {
                    from: "/name".into(),
                    path: "/description".into(),
                },
            ],
        )
        .unwrap();

        assert_eq!(
            doc,
            json!({ "name": "Ops", "description": "Ops", "policy": [{ "effect": "allow" }] })
        );
    }

    #[test]
    fn failed_apply_leaves_document_untouched() {
        let mut doc = json!({ "name": "Ops" });
        let result = apply(
            &mut doc,
            &[
                PatchOperation::Replace {
                    path: "/name".into(),
                    value: json!("Changed"),
                },
                PatchOperation::Remove {
                    path: "/missing".into(),
                },
            ],
        );

        assert!(result.is_err());
        assert_eq!(doc, json!({ "name": "Ops" }));
    }
}
