//! # In-Memory Resource Store
//!
//! `MemoryStore<D>` is a stand-in for the remote service with real state. It is an actor:
//! it owns a map of resources and processes [`StoreRequest`]s sequentially from an mpsc
//! channel, answering over oneshot channels. No locks guard the map because only the
//! actor task ever touches it.
//!
//! [`MemoryClient<D>`] is the client half. It is cheap to clone, implements
//! [`ResourceClient`], and can add artificial latency to every call to emulate a
//! network round trip.
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
//!     let desired = Segment { key: "beta".into(), name: "Beta".into() };
//!     assert_eq!(upsert(&client, &desired).await.unwrap().action, Action::Created);
//!     assert_eq!(upsert(&client, &desired).await.unwrap().action, Action::Unchanged);
//! }
//! ```

use crate::client::ResourceClient;
use crate::error::ClientError;
use crate::patch::{apply, PatchOperation};
use crate::resource::{Definition, RemoteResource};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const DOCS: &str = "memory://store";

type Response<T> = oneshot::Sender<Result<T, ClientError>>;

/// A call received by the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: &'static str,
    pub key: Option<String>,
}

/// Messages processed by the store actor.
#[derive(Debug)]
pub enum StoreRequest<D: Definition> {
    List {
        respond_to: Response<Vec<RemoteResource<D>>>,
    },
    Get {
        key: String,
        respond_to: Response<RemoteResource<D>>,
    },
    Create {
        definition: D,
        respond_to: Response<RemoteResource<D>>,
    },
    Patch {
        key: String,
        operations: Vec<PatchOperation>,
        respond_to: Response<RemoteResource<D>>,
    },
    Journal {
        respond_to: oneshot::Sender<Vec<StoreCall>>,
    },
}

/// The server half: owns the resources and the call journal.
pub struct MemoryStore<D: Definition> {
    receiver: mpsc::Receiver<StoreRequest<D>>,
    resources: BTreeMap<String, RemoteResource<D>>,
    journal: Vec<StoreCall>,
    next_id: u64,
}

impl<D: Definition> MemoryStore<D> {
    /// Creates the store and its client. The store does nothing until [`run`](Self::run)
    /// is spawned.
    pub fn new(buffer_size: usize) -> (Self, MemoryClient<D>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let store = Self {
            receiver,
            resources: BTreeMap::new(),
            journal: Vec::new(),
            next_id: 1,
        };
        let client = MemoryClient {
            sender,
            latency: Duration::ZERO,
        };
        (store, client)
    }

    /// Processes requests until every client has been dropped.
    pub async fn run(mut self) {
        let kind = D::KIND;
        info!(kind, "Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::List { respond_to } => {
                    self.record("list", None);
                    debug!(kind, size = self.resources.len(), "List");
                    let _ = respond_to.send(Ok(self.resources.values().cloned().collect()));
                }
                StoreRequest::Get { key, respond_to } => {
                    self.record("get", Some(&key));
                    let found = self.resources.get(&key).cloned();
                    debug!(kind, %key, found = found.is_some(), "Get");
                    let _ = respond_to.send(found.ok_or_else(|| not_found("get", key)));
                }
                StoreRequest::Create {
                    definition,
                    respond_to,
                } => {
                    let key = definition.key().to_string();
                    self.record("create", Some(&key));
                    let _ = respond_to.send(self.create(key, definition));
                }
                StoreRequest::Patch {
                    key,
                    operations,
                    respond_to,
                } => {
                    self.record("patch", Some(&key));
                    let _ = respond_to.send(self.patch(key, &operations));
                }
                StoreRequest::Journal { respond_to } => {
                    let _ = respond_to.send(self.journal.clone());
                }
            }
        }

        info!(kind, size = self.resources.len(), "Shutdown");
    }

    fn record(&mut self, operation: &'static str, key: Option<&str>) {
        self.journal.push(StoreCall {
            operation,
            key: key.map(str::to_string),
        });
    }

    fn create(&mut self, key: String, definition: D) -> Result<RemoteResource<D>, ClientError> {
        if self.resources.contains_key(&key) {
            warn!(kind = D::KIND, %key, "Already exists");
            return Err(ClientError::Transport {
                operation: "create",
                status: Some(409),
                message: format!("'{key}' already exists"),
                docs: DOCS,
            });
        }
        let resource = RemoteResource::new(self.next_id.to_string(), definition);
        self.next_id += 1;
        self.resources.insert(key.clone(), resource.clone());
        info!(kind = D::KIND, %key, size = self.resources.len(), "Created");
        Ok(resource)
    }

    fn patch(
        &mut self,
        key: String,
        operations: &[PatchOperation],
    ) -> Result<RemoteResource<D>, ClientError> {
        let rejected = |message: String| ClientError::Transport {
            operation: "patch",
            status: Some(400),
            message,
            docs: DOCS,
        };

        let Some(resource) = self.resources.get_mut(&key) else {
            warn!(kind = D::KIND, %key, "Not found");
            return Err(not_found("patch", key));
        };
        let mut document = serde_json::to_value(&resource.body).map_err(|e| rejected(e.to_string()))?;
        apply(&mut document, operations).map_err(|e| rejected(e.to_string()))?;
        let body: D = serde_json::from_value(document).map_err(|e| rejected(e.to_string()))?;
        if body.key() != key {
            return Err(rejected(format!("patch may not change key '{key}'")));
        }

        resource.body = body;
        info!(kind = D::KIND, %key, ops = operations.len(), "Patched");
        Ok(resource.clone())
    }
}

fn not_found(operation: &'static str, key: String) -> ClientError {
    ClientError::NotFound {
        operation,
        key,
        docs: DOCS,
    }
}

/// The client half of a [`MemoryStore`].
#[derive(Clone)]
pub struct MemoryClient<D: Definition> {
    sender: mpsc::Sender<StoreRequest<D>>,
    latency: Duration,
}

impl<D: Definition> MemoryClient<D> {
    /// Delays every call by `latency` before it reaches the store.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every call the store has processed so far, in order.
    pub async fn journal(&self) -> Vec<StoreCall> {
        let (respond_to, response) = oneshot::channel();
        if self
            .sender
            .send(StoreRequest::Journal { respond_to })
            .await
            .is_err()
        {
            return Vec::new();
        }
        response.await.unwrap_or_default()
    }

    async fn request<T>(
        &self,
        operation: &'static str,
        build: impl FnOnce(Response<T>) -> StoreRequest<D>,
    ) -> Result<T, ClientError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let closed = |message: &str| ClientError::Cancelled {
            operation,
            message: message.to_string(),
            docs: DOCS,
        };
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| closed("store closed"))?;
        response.await.map_err(|_| closed("store dropped response"))?
    }
}

#[async_trait]
impl<D: Definition> ResourceClient<D> for MemoryClient<D> {
    async fn list(&self) -> Result<Vec<RemoteResource<D>>, ClientError> {
        self.request("list", |respond_to| StoreRequest::List { respond_to })
            .await
    }

    async fn get(&self, key: &str) -> Result<RemoteResource<D>, ClientError> {
        let key = key.to_string();
        self.request("get", |respond_to| StoreRequest::Get { key, respond_to })
            .await
    }

    async fn create(&self, definition: &D) -> Result<RemoteResource<D>, ClientError> {
        let definition = definition.clone();
        self.request("create", |respond_to| StoreRequest::Create {
            definition,
            respond_to,
        })
        .await
    }

    async fn patch(
        &self,
        key: &str,
        operations: &[PatchOperation],
    ) -> Result<RemoteResource<D>, ClientError> {
        let key = key.to_string();
        let operations = operations.to_vec();
        self.request("patch", |respond_to| StoreRequest::Patch {
            key,
            operations,
            respond_to,
        })
        .await
    }
}
