//! # Batch Runner
//!
//! Applies [`upsert`] across many definitions and collects one outcome per definition.
//!
//! ## Ordering
//!
//! - Within one file (or one in-memory sequence) definitions are reconciled strictly in
//!   order, one at a time. Definition N+1 makes no remote call until definition N's whole
//!   get, diff and apply cycle has finished.
//! - Across the files of a directory, work runs concurrently on tokio tasks, bounded by
//!   [`BatchOptions::file_concurrency`]. Every task handle is awaited before the report
//!   is returned, so a [`DirectoryReport`] always describes finished work.
//! - Files of one directory run share a [`KeyLocks`] table: if two files declare the same
//!   key, their reconciliations of that key never overlap.
//!
//! ## Failures
//!
//! A failed definition does not stop the rest of its file. The chain is cut short only
//! when [`BatchOptions::fail_fast`] is set or the client reports a cancellation. The
//! definitions that were not attempted get a [`ReconcileError::Skipped`] outcome so results
//! stay index-aligned with the input. Nothing already applied is rolled back.

use crate::client::ResourceClient;
use crate::error::{ReconcileError, ValidationError};
use crate::loader::{discover, load_file};
use crate::resource::Definition;
use crate::upsert::{upsert, Action, Applied};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tracing::{info, instrument, warn, Instrument};

/// Tuning for a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum number of files reconciled at the same time in a directory run.
    pub file_concurrency: usize,
    /// Stop a file's chain at its first failure.
    pub fail_fast: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            file_concurrency: 4,
            fail_fast: false,
        }
    }
}

/// Counts of outcomes in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    /// Number of definitions that reached the desired state.
    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.unchanged
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn merge(&mut self, other: &BatchSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    fn add<D>(&mut self, outcome: &Result<Applied<D>, ReconcileError>) {
        match outcome {
            Ok(applied) => match applied.action {
                Action::Created => self.created += 1,
                Action::Updated => self.updated += 1,
                Action::Unchanged => self.unchanged += 1,
            },
            Err(e) if e.is_skipped() => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Per-definition outcomes, index-aligned with the input sequence.
#[derive(Debug)]
pub struct BatchResult<D> {
    pub outcomes: Vec<Result<Applied<D>, ReconcileError>>,
}

impl<D> BatchResult<D> {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for outcome in &self.outcomes {
            summary.add(outcome);
        }
        summary
    }

    /// True when every definition succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(Result::is_ok)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Outcome of reconciling one definition file.
#[derive(Debug)]
pub struct FileReport<D> {
    pub path: PathBuf,
    /// A parse or validation failure of the whole file, or its per-definition outcomes.
    pub result: Result<BatchResult<D>, ReconcileError>,
}

impl<D> FileReport<D> {
    pub fn summary(&self) -> BatchSummary {
        match &self.result {
            Ok(batch) => batch.summary(),
            Err(_) => BatchSummary::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_ok_and(BatchResult::is_success)
    }
}

/// Outcome of reconciling every definition file in a directory.
#[derive(Debug)]
pub struct DirectoryReport<D> {
    pub directory: PathBuf,
    /// One report per file, in directory listing order.
    pub files: Vec<FileReport<D>>,
}

impl<D> DirectoryReport<D> {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for file in &self.files {
            summary.merge(&file.summary());
        }
        summary
    }

    /// Files whose load or validation failed before any definition was attempted.
    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport<D>> {
        self.files.iter().filter(|f| f.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.files.iter().all(FileReport::is_success)
    }
}

/// Per-key mutual exclusion shared by concurrent chains.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder reconciles `key`.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Fails on the first key that appears twice in `definitions`.
pub fn check_unique_keys<D: Definition>(definitions: &[D]) -> Result<(), ValidationError> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, definition) in definitions.iter().enumerate() {
        if let Some(first) = seen.insert(definition.key(), index) {
            return Err(ValidationError::DuplicateKey {
                key: definition.key().to_string(),
                first,
                second: index,
            });
        }
    }
    Ok(())
}

/// Drives [`upsert`] over sequences, files and directories.
pub struct BatchRunner<C> {
    client: Arc<C>,
    options: BatchOptions,
}

impl<C> Clone for BatchRunner<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            options: self.options.clone(),
        }
    }
}

impl<C> BatchRunner<C> {
    pub fn new(client: Arc<C>, options: BatchOptions) -> Self {
        Self { client, options }
    }

    /// Reconciles `definitions` strictly in order.
    ///
    /// Duplicate keys fail the whole sequence before any remote call.
    pub async fn run<D>(&self, definitions: &[D]) -> Result<BatchResult<D>, ValidationError>
    where
        D: Definition,
        C: ResourceClient<D>,
    {
        self.run_chain(definitions, None).await
    }

    /// Loads `path` and reconciles its definitions in file order.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn run_file<D>(&self, path: impl AsRef<Path>) -> FileReport<D>
    where
        D: Definition,
        C: ResourceClient<D>,
    {
        self.run_file_with(path.as_ref(), None).await
    }

    /// Reconciles every definition file in `dir`.
    ///
    /// Files run concurrently, at most `file_concurrency` at a time; each file keeps its
    /// internal order. Returns once every file has finished. Fails only when `dir`
    /// itself cannot be listed.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn run_dir<D>(&self, dir: impl AsRef<Path>) -> Result<DirectoryReport<D>, ReconcileError>
    where
        D: Definition,
        C: ResourceClient<D> + 'static,
    {
        let dir = dir.as_ref();
        let files = discover(dir).await?;
        info!(files = files.len(), "Reconciling directory");

        let permits = Arc::new(Semaphore::new(self.options.file_concurrency.max(1)));
        let locks = Arc::new(KeyLocks::new());
        let mut handles = Vec::with_capacity(files.len());

        for path in &files {
            let runner = self.clone();
            let permits = permits.clone();
            let locks = locks.clone();
            let task_path = path.clone();
            let span = tracing::info_span!("file", path = %path.display());
            let handle = tokio::spawn(
                async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return FileReport {
                            result: Err(ReconcileError::Worker {
                                path: task_path.clone(),
                                message: "worker pool closed".into(),
                            }),
                            path: task_path,
                        };
                    };
                    runner.run_file_with(&task_path, Some(locks.as_ref())).await
                }
                .instrument(span),
            );
            handles.push(handle);
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (path, handle) in files.into_iter().zip(handles) {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Worker failed");
                    FileReport {
                        result: Err(ReconcileError::Worker {
                            path: path.clone(),
                            message: e.to_string(),
                        }),
                        path,
                    }
                }
            };
            reports.push(report);
        }

        let report = DirectoryReport {
            directory: dir.to_path_buf(),
            files: reports,
        };
        let summary = report.summary();
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            failed = summary.failed,
            skipped = summary.skipped,
            failed_files = report.failed_files().count(),
            "Directory reconciled"
        );
        Ok(report)
    }

    async fn run_file_with<D>(&self, path: &Path, locks: Option<&KeyLocks>) -> FileReport<D>
    where
        D: Definition,
        C: ResourceClient<D>,
    {
        let result = match load_file::<D>(path).await {
            Ok(definitions) => self
                .run_chain(&definitions, locks)
                .await
                .map_err(ReconcileError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &result {
            warn!(path = %path.display(), error = %e, "File rejected");
        }
        FileReport {
            path: path.to_path_buf(),
            result,
        }
    }

    async fn run_chain<D>(
        &self,
        definitions: &[D],
        locks: Option<&KeyLocks>,
    ) -> Result<BatchResult<D>, ValidationError>
    where
        D: Definition,
        C: ResourceClient<D>,
    {
        check_unique_keys(definitions)?;

        let mut outcomes = Vec::with_capacity(definitions.len());
        let mut halted: Option<String> = None;
        for definition in definitions {
            if let Some(reason) = &halted {
                outcomes.push(Err(ReconcileError::Skipped {
                    key: definition.key().to_string(),
                    reason: reason.clone(),
                }));
                continue;
            }

            let _guard = match locks {
                Some(locks) => Some(locks.lock(definition.key()).await),
                None => None,
            };
            let outcome = upsert(self.client.as_ref(), definition).await;
            if let Err(e) = &outcome {
                warn!(key = definition.key(), error = %e, "Reconcile failed");
                let cancelled = e.client_error().is_some_and(|c| c.is_cancelled());
                if cancelled || self.options.fail_fast {
                    halted = Some(format!("chain halted after '{}' failed", definition.key()));
                }
            }
            outcomes.push(outcome);
        }

        let result = BatchResult { outcomes };
        let summary = result.summary();
        info!(
            total = summary.total(),
            succeeded = summary.succeeded(),
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch complete"
        );
        Ok(result)
    }
}
