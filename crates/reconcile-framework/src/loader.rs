//! # Bulk Definition Loader
//!
//! Reads definition documents from disk. A document is a UTF-8 JSON array of
//! definitions. Loading is a pure transform from bytes to definitions: it never talks
//! to the remote service, and every failure names the file it came from.

use crate::error::ParseError;
use crate::resource::Definition;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Extension of the files picked up by [`discover`].
pub const DEFINITION_EXTENSION: &str = "json";

/// Parses one file containing an array of definitions.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_file<D: Definition>(path: impl AsRef<Path>) -> Result<Vec<D>, ParseError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let definitions: Vec<D> =
        serde_json::from_slice(&bytes).map_err(|source| ParseError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(count = definitions.len(), "Loaded definitions");
    Ok(definitions)
}

/// Lists the definition files directly inside `dir`.
///
/// Not recursive. Symlinks are followed, and a link whose target is missing is skipped
/// with a warning. Files are returned in filesystem listing order, which is not sorted;
/// callers that need a stable order across files must sort the result themselves.
#[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub async fn discover(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ParseError> {
    let dir = dir.as_ref();
    let read_err = |source| ParseError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == DEFINITION_EXTENSION) {
            continue;
        }
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
        }
    }
    debug!(count = files.len(), "Discovered definition files");
    Ok(files)
}

/// Loads every definition file in `dir`, each independently of the others.
///
/// A malformed file yields an error in its own slot and does not affect the rest. Only
/// a failure to list the directory itself fails the call.
pub async fn load_dir<D: Definition>(
    dir: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, Result<Vec<D>, ParseError>)>, ParseError> {
    let mut loaded = Vec::new();
    for path in discover(dir).await? {
        let definitions = load_file(&path).await;
        loaded.push((path, definitions));
    }
    Ok(loaded)
}
