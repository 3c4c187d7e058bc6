//! # Upsert Coordinator
//!
//! Create-if-absent, update-if-present reconciliation of a single keyed resource.
//!
//! ```text
//!            get(key)
//!               │
//!   ┌───────────┼─────────────────────┐
//!   │ Ok        │ NotFound            │ any other error
//!   ▼           ▼                     ▼
//! Present     Absent               propagate
//! diff →      create(definition)   (never create)
//! patch if
//! non-empty
//! ```
//!
//! The functions here are stateless: everything they need is passed in, and the remote
//! resource is fetched fresh on every call so a diff is never computed against stale
//! state.

use crate::client::ResourceClient;
use crate::diff::diff_resource;
use crate::error::{ClientError, ReconcileError};
use crate::resource::{Definition, RemoteResource};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// What an upsert did to the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Unchanged,
}

/// Successful outcome of reconciling one definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "D: crate::resource::Definition")]
pub struct Applied<D> {
    pub action: Action,
    pub resource: RemoteResource<D>,
}

/// Brings the remote resource for `desired.key()` into agreement with `desired`.
///
/// Makes exactly one `get`, then at most one `create` or `patch`. Only a
/// [`ClientError::NotFound`] from `get` leads to a create; every other failure is
/// returned as is.
#[instrument(skip(client, desired), fields(kind = D::KIND, key = desired.key()))]
pub async fn upsert<D, C>(client: &C, desired: &D) -> Result<Applied<D>, ReconcileError>
where
    D: Definition,
    C: ResourceClient<D> + ?Sized,
{
    desired.validate()?;
    match client.get(desired.key()).await {
        Ok(remote) => {
            debug!("Found, updating");
            converge(client, remote, desired).await
        }
        Err(ClientError::NotFound { .. }) => {
            debug!("Not found, creating");
            let resource = client.create(desired).await?;
            info!(id = %resource.id, "Created");
            Ok(Applied {
                action: Action::Created,
                resource,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Updates an existing resource. A missing resource is a failure, not a create.
#[instrument(skip(client, desired), fields(kind = D::KIND, key = desired.key()))]
pub async fn update<D, C>(client: &C, desired: &D) -> Result<Applied<D>, ReconcileError>
where
    D: Definition,
    C: ResourceClient<D> + ?Sized,
{
    desired.validate()?;
    let remote = client.get(desired.key()).await?;
    converge(client, remote, desired).await
}

/// Creates a resource without looking for an existing one.
#[instrument(skip(client, desired), fields(kind = D::KIND, key = desired.key()))]
pub async fn create<D, C>(client: &C, desired: &D) -> Result<Applied<D>, ReconcileError>
where
    D: Definition,
    C: ResourceClient<D> + ?Sized,
{
    desired.validate()?;
    let resource = client.create(desired).await?;
    info!(id = %resource.id, "Created");
    Ok(Applied {
        action: Action::Created,
        resource,
    })
}

async fn converge<D, C>(
    client: &C,
    remote: RemoteResource<D>,
    desired: &D,
) -> Result<Applied<D>, ReconcileError>
where
    D: Definition,
    C: ResourceClient<D> + ?Sized,
{
    let operations = diff_resource(&remote, desired)?;
    if operations.is_empty() {
        info!("Unchanged");
        return Ok(Applied {
            action: Action::Unchanged,
            resource: remote,
        });
    }

    debug!(?operations, "Patching");
    let resource = client.patch(desired.key(), &operations).await?;
    info!(ops = operations.len(), "Updated");
    Ok(Applied {
        action: Action::Updated,
        resource,
    })
}
