//! # Reconcile Framework
//!
//! Building blocks for keeping keyed remote resources in agreement with locally
//! declared definitions. The framework does not know which service it is talking to:
//! a resource kind plugs in by implementing [`Definition`] for its desired document and
//! [`ResourceClient`] for its get/create/patch endpoints.
//!
//! ## Architecture Overview
//!
//! ```text
//! loader ──► Vec<D> ──► BatchRunner ──► upsert (per definition) ──► diff + ResourceClient
//! ```
//!
//! 1. **Definition Layer** ([`Definition`], [`RemoteResource`]): the desired document and
//!    its remote counterpart.
//! 2. **Diff Layer** ([`diff`], [`PatchOperation`]): minimal RFC 6902 patches between
//!    the two.
//! 3. **Coordination Layer** ([`upsert()`], [`BatchRunner`]): the create-or-update decision
//!    for one key, and ordered batches of them.
//! 4. **Interface Layer** ([`ResourceClient`]): the remote service boundary.
//!
//! ## Upserting a Definition
//!
//! ```rust
//! use reconcile_framework::store::MemoryStore;
//! use reconcile_framework::{upsert, Action, Definition};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! struct Segment { key: String, name: String }
//!
//! impl Definition for Segment {
//!     const KIND: &'static str = "segment";
//!     fn key(&self) -> &str { &self.key }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (store, client) = MemoryStore::<Segment>::new(16);
//!     tokio::spawn(store.run());
//!
//!     let mut desired = Segment { key: "beta".into(), name: "Beta".into() };
//!     assert_eq!(upsert(&client, &desired).await.unwrap().action, Action::Created);
//!
//!     desired.name = "Beta testers".into();
//!     let applied = upsert(&client, &desired).await.unwrap();
//!     assert_eq!(applied.action, Action::Updated);
//!     assert_eq!(applied.resource.body, desired);
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Definitions of one file are reconciled one at a time, in file order.
//! - Files of a directory run on separate tokio tasks, bounded by
//!   [`BatchOptions::file_concurrency`], and all of them are awaited before a report is
//!   returned.
//! - The coordinator is stateless; the remote resource is fetched fresh for every
//!   attempt.
//!
//! ## Testing
//!
//! Two test doubles implement [`ResourceClient`]: [`store::MemoryStore`], an actor with
//! real state, and [`mock::ScriptedClient`], which replays scripted responses and records
//! every call.

pub mod batch;
pub mod client;
pub mod diff;
pub mod error;
pub mod loader;
pub mod mock;
pub mod patch;
pub mod resource;
pub mod store;
pub mod upsert;

// Re-export core types for convenience
pub use batch::{
    BatchOptions, BatchResult, BatchRunner, BatchSummary, DirectoryReport, FileReport, KeyLocks,
};
pub use client::ResourceClient;
pub use diff::{diff, diff_resource};
pub use error::{ClientError, ParseError, PatchError, ReconcileError, ValidationError};
pub use loader::{discover, load_dir, load_file};
pub use patch::PatchOperation;
pub use resource::{require, Definition, RemoteResource};
pub use upsert::{create, update, upsert, Action, Applied};
