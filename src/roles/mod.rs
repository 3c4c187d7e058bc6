//! Custom roles: the policy model and its HTTP client.
//!
//! [`CustomRole`] is the reconcilable definition; [`RolesClient`] implements the
//! framework's [`ResourceClient`](reconcile_framework::ResourceClient) against
//! `/roles`, so upserts and bulk loads run through the generic coordinator.

pub mod client;
pub mod model;

pub use client::RolesClient;
pub use model::{CustomRole, Effect, PolicyStatement};
