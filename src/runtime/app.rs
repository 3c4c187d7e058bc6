use crate::api::ApiClient;
use crate::config::Config;
use crate::flags::FlagsClient;
use crate::roles::RolesClient;
use anyhow::{Context, Result};
use reconcile_framework::{BatchOptions, BatchRunner};
use std::sync::Arc;
use tracing::debug;

/// The wired-up clients a command runs against.
///
/// `App` owns one [`ApiClient`] and hands clones of it to every resource client, so
/// all of them share the same connection pool, token and timeout.
///
/// # Example
///
/// ```ignore
/// let app = App::from_config(&Config::from_env()?, BatchOptions::default())?;
/// let report = app.runner.run_file::<CustomRole>("roles.json").await;
/// ```
pub struct App {
    /// Custom roles. Shared with `runner`.
    pub roles: Arc<RolesClient>,

    /// Feature flag reads and toggles.
    pub flags: FlagsClient,

    /// Bulk upserts of custom roles.
    pub runner: BatchRunner<RolesClient>,
}

impl App {
    pub fn new(api: ApiClient, options: BatchOptions) -> Self {
        let roles = Arc::new(RolesClient::new(api.clone()));
        Self {
            runner: BatchRunner::new(roles.clone(), options),
            flags: FlagsClient::new(api),
            roles,
        }
    }

    /// Builds the HTTP client from `config`.
    pub fn from_config(config: &Config, options: BatchOptions) -> Result<Self> {
        let api = ApiClient::new(&config.base_url, &config.api_token, config.timeout)
            .context("failed to build HTTP client")?;
        debug!(base_url = api.base_url(), ?options, "Client ready");
        Ok(Self::new(api, options))
    }
}
