//! # Reconciliation Errors
//!
//! Every failure the engine can report, grouped by where it is detected:
//!
//! - [`ValidationError`] and [`ParseError`] are local. They are raised at the
//!   boundary and never reach the remote service.
//! - [`ClientError`] comes back from a [`ResourceClient`](crate::ResourceClient)
//!   and always names the remote operation plus its documentation link.
//! - [`ReconcileError`] is the per-item failure stored in a batch result.

use std::path::PathBuf;

/// A definition or command argument is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} {field} must not be empty")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("duplicate key '{key}' at positions {first} and {second}")]
    DuplicateKey {
        key: String,
        first: usize,
        second: usize,
    },
}

/// A failure reported by the remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The resource does not exist. The only failure that selects the create branch.
    #[error("{operation}: '{key}' not found (see {docs})")]
    NotFound {
        operation: &'static str,
        key: String,
        docs: &'static str,
    },
    /// Any other remote failure: network, auth, rate limit, bad response.
    #[error("{operation} failed{}: {message} (see {docs})", status_suffix(.status))]
    Transport {
        operation: &'static str,
        status: Option<u16>,
        message: String,
        docs: &'static str,
    },
    /// The call was cancelled or timed out before a response arrived.
    #[error("{operation} cancelled: {message} (see {docs})")]
    Cancelled {
        operation: &'static str,
        message: String,
        docs: &'static str,
    },
}

impl ClientError {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::NotFound { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Cancelled { operation, .. } => operation,
        }
    }

    pub fn docs(&self) -> &'static str {
        match self {
            Self::NotFound { docs, .. }
            | Self::Transport { docs, .. }
            | Self::Cancelled { docs, .. } => docs,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}

/// A bulk-load document could not be turned into definitions.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not an array of definitions: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Malformed { path, .. } => path,
        }
    }
}

/// A patch document could not be applied to a stored resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("patch rejected: {0}")]
pub struct PatchError(pub String);

/// Outcome of a single failed reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("skipped '{key}': {reason}")]
    Skipped { key: String, reason: String },
    #[error("worker for {} failed: {message}", .path.display())]
    Worker { path: PathBuf, message: String },
}

impl ReconcileError {
    /// The client failure behind this error, if any.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Client(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_includes_status_and_docs() {
        let err = ClientError::Transport {
            operation: "getCustomRole",
            status: Some(500),
            message: "internal error".into(),
            docs: "https://example.test/get",
        };
        assert_eq!(
            err.to_string(),
            "getCustomRole failed with status 500: internal error (see https://example.test/get)"
        );
        assert_eq!(err.operation(), "getCustomRole");
        assert!(!err.is_not_found());
    }

    #[test]
    fn transport_message_without_status() {
        let err = ClientError::Transport {
            operation: "postCustomRole",
            status: None,
            message: "connection refused".into(),
            docs: "https://example.test/post",
        };
        assert_eq!(
            err.to_string(),
            "postCustomRole failed: connection refused (see https://example.test/post)"
        );
    }

    #[test]
    fn parse_error_names_the_file() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = ParseError::Malformed {
            path: PathBuf::from("roles/broken.json"),
            source,
        };
        assert!(err.to_string().starts_with("roles/broken.json is not an array"));
        assert_eq!(err.path(), std::path::Path::new("roles/broken.json"));
    }
}
