//! # Definition Trait & Remote Resources
//!
//! The `Definition` trait is the contract every reconcilable resource kind (custom role,
//! webhook, segment, ...) implements. It describes the *desired* document: the fields a
//! user declares in a bulk-load file and that the engine keeps in agreement with the
//! remote service.
//!
//! [`RemoteResource`] wraps the same document as the remote service returns it: a
//! service-assigned `_id`, the definition fields, and whatever bookkeeping fields the
//! service adds (`_links`, `_access`, version counters). Bookkeeping is kept as an opaque
//! JSON object so it never takes part in a diff.

use crate::error::ValidationError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Desired state of one keyed resource.
///
/// Implementors are plain serde structs. The engine only needs the key to locate the
/// remote counterpart and the serialised form to compute a patch.
pub trait Definition: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Human-readable kind used in logs and validation messages (e.g. `"custom role"`).
    const KIND: &'static str;

    /// The stable identifier of this resource.
    fn key(&self) -> &str;

    /// Checks the definition before any remote call is made.
    ///
    /// The default implementation only rejects a blank key. Override it to add
    /// kind-specific checks, and call [`require`] for each mandatory string field.
    fn validate(&self) -> Result<(), ValidationError> {
        require(Self::KIND, "key", self.key())
    }
}

/// Fails with [`ValidationError::MissingField`] when `value` is blank.
pub fn require(kind: &'static str, field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { kind, field })
    } else {
        Ok(())
    }
}

/// Last observed remote state of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "D: Definition")]
pub struct RemoteResource<D> {
    /// Service-assigned identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// The fields that mirror the definition.
    #[serde(flatten)]
    pub body: D,

    /// Everything else the service returned.
    #[serde(flatten)]
    pub bookkeeping: serde_json::Map<String, serde_json::Value>,
}

impl<D: Definition> RemoteResource<D> {
    pub fn new(id: impl Into<String>, body: D) -> Self {
        Self {
            id: id.into(),
            body,
            bookkeeping: serde_json::Map::new(),
        }
    }

    pub fn key(&self) -> &str {
        self.body.key()
    }
}
