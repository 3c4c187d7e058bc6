//! # ResourceClient Trait
//!
//! The seam between the engine and the remote service. Each resource kind gets one
//! implementation (HTTP for production, [`MemoryClient`](crate::store::MemoryClient) or
//! [`ScriptedClient`](crate::mock::ScriptedClient) in tests). The engine never retries a
//! failed call; retry and timeout policy belong to the implementation.
use crate::error::ClientError;
use crate::patch::PatchOperation;
use crate::resource::{Definition, RemoteResource};
use async_trait::async_trait;
use std::sync::Arc;

/// Typed get/create/patch access to one resource kind.
///
/// Implementations must report a missing resource as [`ClientError::NotFound`] and
/// nothing else: it is the only failure that makes the coordinator create a resource.
#[async_trait]
pub trait ResourceClient<D: Definition>: Send + Sync {
    /// Fetch every resource of this kind.
    async fn list(&self) -> Result<Vec<RemoteResource<D>>, ClientError>;

    /// Fetch one resource by key.
    async fn get(&self, key: &str) -> Result<RemoteResource<D>, ClientError>;

    /// Create a resource from its definition.
    async fn create(&self, definition: &D) -> Result<RemoteResource<D>, ClientError>;

    /// Apply `operations` to the resource identified by `key`, in order.
    async fn patch(
        &self,
        key: &str,
        operations: &[PatchOperation],
    ) -> Result<RemoteResource<D>, ClientError>;
}

#[async_trait]
impl<D: Definition, C: ResourceClient<D> + ?Sized> ResourceClient<D> for Arc<C> {
    async fn list(&self) -> Result<Vec<RemoteResource<D>>, ClientError> {
        (**self).list().await
    }

    async fn get(&self, key: &str) -> Result<RemoteResource<D>, ClientError> {
        (**self).get(key).await
    }

    async fn create(&self, definition: &D) -> Result<RemoteResource<D>, ClientError> {
        (**self).create(definition).await
    }

    async fn patch(
        &self,
        key: &str,
        operations: &[PatchOperation],
    ) -> Result<RemoteResource<D>, ClientError> {
        (**self).patch(key, operations).await
    }
}
