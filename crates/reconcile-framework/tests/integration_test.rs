use reconcile_framework::store::{MemoryStore, StoreCall};
use reconcile_framework::{
    upsert, Action, BatchOptions, BatchRunner, Definition, ParseError, ReconcileError,
    ResourceClient,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// --- Test Definition ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Role {
    key: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    policy: Vec<serde_json::Value>,
}

impl Definition for Role {
    const KIND: &'static str = "role";

    fn key(&self) -> &str {
        &self.key
    }
}

fn role(key: &str, name: &str) -> Role {
    Role {
        key: key.into(),
        name: name.into(),
        description: None,
        policy: vec![serde_json::json!({ "effect": "allow", "actions": ["*"] })],
    }
}

fn calls(journal: &[StoreCall]) -> Vec<(&'static str, Option<&str>)> {
    journal
        .iter()
        .map(|c| (c.operation, c.key.as_deref()))
        .collect()
}

#[tokio::test]
async fn upserting_twice_is_idempotent() {
    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());

    let desired = role("reader", "Reader");
    let first = upsert(&client, &desired).await.unwrap();
    let second = upsert(&client, &desired).await.unwrap();

    assert_eq!(first.action, Action::Created);
    assert_eq!(second.action, Action::Unchanged);
    assert_eq!(second.resource, first.resource);
    assert_eq!(
        calls(&client.journal().await),
        vec![
            ("get", Some("reader")),
            ("create", Some("reader")),
            ("get", Some("reader")),
        ]
    );
}

#[tokio::test]
async fn changed_definition_is_patched_in_place() {
    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());

    let created = upsert(&client, &role("reader", "Reader")).await.unwrap();

    let mut desired = role("reader", "Read only");
    desired.description = Some("Can look, cannot touch".into());
    let applied = upsert(&client, &desired).await.unwrap();

    assert_eq!(applied.action, Action::Updated);
    assert_eq!(applied.resource.id, created.resource.id);
    assert_eq!(client.get("reader").await.unwrap().body, desired);

    // Removing the description again is a patch as well.
    let applied = upsert(&client, &role("reader", "Read only")).await.unwrap();
    assert_eq!(applied.action, Action::Updated);
    assert_eq!(applied.resource.body.description, None);
}

#[tokio::test]
async fn sequence_is_reconciled_in_declaration_order() {
    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let client = Arc::new(client);

    let runner = BatchRunner::new(client.clone(), BatchOptions::default());
    let result = runner
        .run(&[role("a", "A"), role("b", "B")])
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.summary().created, 2);
    assert_eq!(
        calls(&client.journal().await),
        vec![
            ("get", Some("a")),
            ("create", Some("a")),
            ("get", Some("b")),
            ("create", Some("b")),
        ]
    );
}

#[tokio::test]
async fn directory_report_arrives_after_every_file_finished() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("f1.json"),
        serde_json::to_string(&[role("one", "One")]).unwrap(),
    )
    .unwrap();
    fs::write(
        dir.path().join("f2.json"),
        serde_json::to_string(&[role("two", "Two"), role("three", "Three")]).unwrap(),
    )
    .unwrap();

    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let client = Arc::new(client.with_latency(Duration::from_millis(20)));

    let runner = BatchRunner::new(client.clone(), BatchOptions::default());
    let report = runner.run_dir::<Role>(dir.path()).await.unwrap();

    assert_eq!(report.files.len(), 2);
    assert!(report.is_success());
    assert_eq!(report.summary().created, 3);

    let mut keys: Vec<_> = client
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.body.key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["one", "three", "two"]);
}

/// Writes `files` definition files, each holding two roles keyed `f{n}-a` and `f{n}-b`.
fn write_prefixed_files(dir: &TempDir, files: usize) {
    for n in 1..=files {
        let roles = [role(&format!("f{n}-a"), "A"), role(&format!("f{n}-b"), "B")];
        fs::write(
            dir.path().join(format!("f{n}.json")),
            serde_json::to_string(&roles).unwrap(),
        )
        .unwrap();
    }
}

/// Largest number of files with journal entries both before and after some point.
fn max_files_in_flight(journal: &[StoreCall]) -> usize {
    let prefixes: Vec<&str> = journal
        .iter()
        .filter_map(|c| c.key.as_deref())
        .map(|key| key.split('-').next().unwrap())
        .collect();
    (0..prefixes.len())
        .map(|at| {
            let mut open: Vec<&str> = prefixes[..=at]
                .iter()
                .copied()
                .filter(|p| prefixes[at..].contains(p))
                .collect();
            open.sort();
            open.dedup();
            open.len()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn file_concurrency_of_one_never_interleaves_files() {
    let dir = TempDir::new().unwrap();
    write_prefixed_files(&dir, 3);

    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let client = Arc::new(client.with_latency(Duration::from_millis(10)));
    let options = BatchOptions {
        file_concurrency: 1,
        ..BatchOptions::default()
    };
    let report = BatchRunner::new(client.clone(), options)
        .run_dir::<Role>(dir.path())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.summary().created, 6);

    let journal = client.journal().await;
    assert_eq!(journal.len(), 12);
    assert_eq!(max_files_in_flight(&journal), 1);

    // Each file's calls form one contiguous run.
    let mut runs: Vec<&str> = journal
        .iter()
        .map(|c| c.key.as_deref().unwrap().split('-').next().unwrap())
        .collect();
    runs.dedup();
    assert_eq!(runs.len(), 3);
}

#[tokio::test]
async fn file_concurrency_bounds_the_files_in_flight() {
    let dir = TempDir::new().unwrap();
    write_prefixed_files(&dir, 4);

    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let client = Arc::new(client.with_latency(Duration::from_millis(10)));
    let options = BatchOptions {
        file_concurrency: 2,
        ..BatchOptions::default()
    };
    let report = BatchRunner::new(client.clone(), options)
        .run_dir::<Role>(dir.path())
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(max_files_in_flight(&client.journal().await) <= 2);
}

#[tokio::test]
async fn malformed_file_does_not_affect_its_siblings() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.json");
    fs::write(&bad, r#"[{"key": "broken"}"#).unwrap();
    fs::write(
        dir.path().join("good.json"),
        serde_json::to_string(&[role("good", "Good")]).unwrap(),
    )
    .unwrap();

    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let runner = BatchRunner::new(Arc::new(client), BatchOptions::default());
    let report = runner.run_dir::<Role>(dir.path()).await.unwrap();

    assert!(!report.is_success());
    let failed: Vec<_> = report.failed_files().collect();
    assert_eq!(failed.len(), 1);
    match &failed[0].result {
        Err(ReconcileError::Parse(e @ ParseError::Malformed { .. })) => {
            assert_eq!(e.path(), bad);
        }
        other => panic!("expected a malformed file, got {other:?}"),
    }
    assert_eq!(report.summary().created, 1);
}

#[tokio::test]
async fn same_key_in_two_files_converges() {
    let dir = TempDir::new().unwrap();
    for (file, name) in [("first.json", "Shared"), ("second.json", "Shared")] {
        fs::write(
            dir.path().join(file),
            serde_json::to_string(&[role("shared", name)]).unwrap(),
        )
        .unwrap();
    }

    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let client = Arc::new(client.with_latency(Duration::from_millis(10)));
    let runner = BatchRunner::new(client.clone(), BatchOptions::default());
    let report = runner.run_dir::<Role>(dir.path()).await.unwrap();

    // One file creates the role, the other finds it already in place.
    assert!(report.is_success());
    let summary = report.summary();
    assert_eq!((summary.created, summary.unchanged), (1, 1));
    assert_eq!(client.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_directory_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let (store, client) = MemoryStore::<Role>::new(16);
    tokio::spawn(store.run());
    let runner = BatchRunner::new(Arc::new(client), BatchOptions::default());

    let err = runner
        .run_dir::<Role>(dir.path().join("absent"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Parse(ParseError::Read { .. })));
}
