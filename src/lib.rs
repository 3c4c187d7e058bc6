//! # ldsync
//!
//! Keeps LaunchDarkly custom roles in agreement with JSON definitions on disk, and
//! offers a few feature flag reads and toggles alongside.
//!
//! The reconciliation itself (diffing, the create-or-update decision, ordered batches)
//! lives in [`reconcile_framework`]. This crate binds it to the LaunchDarkly REST API.
//!
//! ## Module Tour
//!
//! - **[api]**: the authenticated `reqwest` client and the HTTP status to
//!   [`ClientError`](reconcile_framework::ClientError) mapping.
//! - **[roles]**: the [`CustomRole`](roles::CustomRole) definition and
//!   [`RolesClient`](roles::RolesClient), its [`ResourceClient`](reconcile_framework::ResourceClient).
//! - **[flags]**: [`FlagsClient`](flags::FlagsClient) for flag reads and toggles.
//! - **[config]**: environment configuration, with `.env` support.
//! - **[runtime]**: wiring of the clients and tracing setup.
//! - **[cli]**: the clap command surface and its dispatch.
//!
//! ## Running
//!
//! ```bash
//! export LAUNCHDARKLY_API_TOKEN=api-...
//! ldsync bulk-upsert-custom-role-folder demos/roles
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod flags;
pub mod roles;
pub mod runtime;
