//! # Scripted Mock Client
//!
//! `ScriptedClient<D>` implements [`ResourceClient`] from a queue of expectations. Each
//! remote call pops the next expectation, checks that it matches (same operation, same
//! key) and returns the scripted response. Every call is also recorded, so tests can
//! assert exactly which requests the engine made and in what order.
//!
//! ## When to use ScriptedClient vs MemoryStore
//!
//! | Feature | ScriptedClient | MemoryStore |
//! |---------|----------------|-------------|
//! | **State** | None (scripted responses) | Real, patches are applied |
//! | **Determinism** | Call order is asserted | Subject to scheduler across files |
//! | **Error Injection** | Any [`ClientError`] on any call | Only what the store itself rejects |
//! | **Use Case** | Coordinator branches, failure handling | Idempotence, directory batches |
//!
//! ## Example
//!
//! ```rust
//! use reconcile_framework::mock::{Call, ScriptedClient};
//! use reconcile_framework::{upsert, ClientError, Definition, RemoteResource};
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
//!     let desired = Segment { key: "beta".into(), name: "Beta".into() };
//!
//!     let mock = ScriptedClient::<Segment>::new();
//!     mock.expect_get("beta").return_err(ClientError::NotFound {
//!         operation: "getSegment",
//!         key: "beta".into(),
//!         docs: "https://example.test/segments",
//!     });
//!     mock.expect_create().return_ok(RemoteResource::new("1", desired.clone()));
//!
//!     upsert(&mock, &desired).await.unwrap();
//!
//!     assert_eq!(mock.calls(), vec![Call::Get("beta".into()), Call::Create("beta".into())]);
//!     mock.verify();
//! }
//! ```

use crate::client::ResourceClient;
use crate::error::ClientError;
use crate::patch::PatchOperation;
use crate::resource::{Definition, RemoteResource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List,
    Get(String),
    /// Key of the definition that was created.
    Create(String),
    Patch(String, Vec<PatchOperation>),
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get(_) => "get",
            Self::Create(_) => "create",
            Self::Patch(..) => "patch",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::List => None,
            Self::Get(key) | Self::Create(key) | Self::Patch(key, _) => Some(key),
        }
    }
}

enum Expectation<D> {
    List {
        response: Result<Vec<RemoteResource<D>>, ClientError>,
    },
    Get {
        key: String,
        response: Result<RemoteResource<D>, ClientError>,
    },
    Create {
        response: Result<RemoteResource<D>, ClientError>,
    },
    Patch {
        key: String,
        response: Result<RemoteResource<D>, ClientError>,
    },
}

struct Script<D> {
    expectations: VecDeque<Expectation<D>>,
    calls: Vec<Call>,
}

/// A [`ResourceClient`] that replays scripted responses and records every call.
pub struct ScriptedClient<D> {
    script: Arc<Mutex<Script<D>>>,
}

impl<D: Definition> Default for ScriptedClient<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Definition> ScriptedClient<D> {
    /// Creates a mock with no expectations.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                expectations: VecDeque::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Expects a `list` call.
    pub fn expect_list(&self) -> ExpectationBuilder<D, Vec<RemoteResource<D>>> {
        ExpectationBuilder::new(self.script.clone(), |response| Expectation::List { response })
    }

    /// Expects a `get` call for `key`.
    pub fn expect_get(&self, key: &str) -> ExpectationBuilder<D, RemoteResource<D>> {
        let key = key.to_string();
        ExpectationBuilder::new(self.script.clone(), move |response| Expectation::Get {
            key,
            response,
        })
    }

    /// Expects a `create` call.
    pub fn expect_create(&self) -> ExpectationBuilder<D, RemoteResource<D>> {
        ExpectationBuilder::new(self.script.clone(), |response| Expectation::Create { response })
    }

    /// Expects a `patch` call for `key`.
    pub fn expect_patch(&self, key: &str) -> ExpectationBuilder<D, RemoteResource<D>> {
        let key = key.to_string();
        ExpectationBuilder::new(self.script.clone(), move |response| Expectation::Patch {
            key,
            response,
        })
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls of one kind (`"get"`, `"create"`, ...).
    pub fn count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.name() == name).count()
    }

    /// Panics if any expectation was not consumed.
    pub fn verify(&self) {
        let remaining = self.lock().expectations.len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script<D>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next(&self, call: Call) -> Expectation<D> {
        let mut script = self.lock();
        script.calls.push(call.clone());
        match script.expectations.pop_front() {
            Some(expectation) => expectation,
            None => panic!("Unexpected request {call:?}: no expectations left"),
        }
    }
}

/// Builder returned by the `expect_*` methods.
pub struct ExpectationBuilder<D, T> {
    script: Arc<Mutex<Script<D>>>,
    make: Box<dyn FnOnce(Result<T, ClientError>) -> Expectation<D> + Send>,
}

impl<D, T> ExpectationBuilder<D, T> {
    fn new(
        script: Arc<Mutex<Script<D>>>,
        make: impl FnOnce(Result<T, ClientError>) -> Expectation<D> + Send + 'static,
    ) -> Self {
        Self {
            script,
            make: Box::new(make),
        }
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: T) {
        self.push(Ok(value));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: ClientError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T, ClientError>) {
        let expectation = (self.make)(response);
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .expectations
            .push_back(expectation);
    }
}

#[async_trait]
impl<D: Definition> ResourceClient<D> for ScriptedClient<D> {
    async fn list(&self) -> Result<Vec<RemoteResource<D>>, ClientError> {
        match self.next(Call::List) {
            Expectation::List { response } => response,
            _ => panic!("Unexpected request: list"),
        }
    }

    async fn get(&self, key: &str) -> Result<RemoteResource<D>, ClientError> {
        match self.next(Call::Get(key.to_string())) {
            Expectation::Get {
                key: expected,
                response,
            } if expected == key => response,
            _ => panic!("Unexpected request: get '{key}'"),
        }
    }

    async fn create(&self, definition: &D) -> Result<RemoteResource<D>, ClientError> {
        match self.next(Call::Create(definition.key().to_string())) {
            Expectation::Create { response } => response,
            _ => panic!("Unexpected request: create '{}'", definition.key()),
        }
    }

    async fn patch(
        &self,
        key: &str,
        operations: &[PatchOperation],
    ) -> Result<RemoteResource<D>, ClientError> {
        match self.next(Call::Patch(key.to_string(), operations.to_vec())) {
            Expectation::Patch {
                key: expected,
                response,
            } if expected == key => response,
            _ => panic!("Unexpected request: patch '{key}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Segment {
        key: String,
    }

    impl Definition for Segment {
        const KIND: &'static str = "segment";

        fn key(&self) -> &str {
            &self.key
        }
    }

    #[tokio::test]
    async fn replays_expectations_in_order() {
        let mock = ScriptedClient::<Segment>::new();
        let beta = RemoteResource::new("1", Segment { key: "beta".into() });
        mock.expect_list().return_ok(vec![beta.clone()]);
        mock.expect_get("beta").return_ok(beta.clone());

        assert_eq!(mock.list().await.unwrap(), vec![beta.clone()]);
        assert_eq!(mock.get("beta").await.unwrap(), beta);
        assert_eq!(mock.calls(), vec![Call::List, Call::Get("beta".into())]);
        mock.verify();
    }

    #[tokio::test]
    #[should_panic(expected = "Unexpected request")]
    async fn mismatched_key_panics() {
        let mock = ScriptedClient::<Segment>::new();
        mock.expect_get("beta")
            .return_ok(RemoteResource::new("1", Segment { key: "beta".into() }));

        let _ = mock.get("alpha").await;
    }

    #[test]
    #[should_panic(expected = "1 remaining")]
    fn verify_reports_unmet_expectations() {
        let mock = ScriptedClient::<Segment>::new();
        mock.expect_create()
            .return_ok(RemoteResource::new("1", Segment { key: "beta".into() }));
        mock.verify();
    }
}
