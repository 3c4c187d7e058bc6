//! Feature flag reads and the environment on/off toggle.
//!
//! Flags are not reconciled, so their documents stay opaque `serde_json::Value`s. The
//! toggle is a single-operation JSON Patch against `/environments/{env}/on`.

use crate::api::{require_key, ApiClient, Endpoint};
use reconcile_framework::{ClientError, PatchOperation, ValidationError};
use reqwest::Method;
use serde_json::Value;
use tracing::{info, instrument};

pub const LIST_FLAGS: Endpoint = Endpoint {
    operation: "getFeatureFlags",
    docs: "https://apidocs.launchdarkly.com/docs/list-feature-flags",
};
pub const GET_FLAG: Endpoint = Endpoint {
    operation: "getFeatureFlag",
    docs: "https://apidocs.launchdarkly.com/docs/get-feature-flag",
};
pub const PATCH_FLAG: Endpoint = Endpoint {
    operation: "patchFeatureFlag",
    docs: "https://apidocs.launchdarkly.com/docs/update-feature-flag",
};

/// Locates one flag in one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRef {
    pub project: String,
    pub flag: String,
    pub env: String,
}

impl FlagRef {
    /// Builds a reference, rejecting blank parts and characters unsafe in a path.
    pub fn new(
        project: impl Into<String>,
        flag: impl Into<String>,
        env: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let flag_ref = Self {
            project: project.into(),
            flag: flag.into(),
            env: env.into(),
        };
        require_key("feature flag", "project", &flag_ref.project)?;
        require_key("feature flag", "key", &flag_ref.flag)?;
        require_key("feature flag", "environment", &flag_ref.env)?;
        Ok(flag_ref)
    }

    fn path(&self) -> String {
        format!("/flags/{}/{}", self.project, self.flag)
    }

    fn on_pointer(&self) -> String {
        format!("/environments/{}/on", self.env)
    }
}

/// Read and toggle access to `/flags`.
#[derive(Clone)]
pub struct FlagsClient {
    api: ApiClient,
}

impl FlagsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, project: &str) -> Result<Value, ClientError> {
        let request = self.api.request(Method::GET, &format!("/flags/{project}"));
        self.api.send(LIST_FLAGS, project, request).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, flag: &FlagRef) -> Result<Value, ClientError> {
        let request = self
            .api
            .request(Method::GET, &flag.path())
            .query(&[("env", flag.env.as_str())]);
        self.api.send(GET_FLAG, &flag.flag, request).await
    }

    /// Whether the flag is on in its environment.
    #[instrument(skip(self))]
    pub async fn state(&self, flag: &FlagRef) -> Result<bool, ClientError> {
        let document = self.get(flag).await?;
        document
            .pointer(&flag.on_pointer())
            .and_then(Value::as_bool)
            .ok_or_else(|| ClientError::NotFound {
                operation: GET_FLAG.operation,
                key: format!("{}/{}", flag.flag, flag.env),
                docs: GET_FLAG.docs,
            })
    }

    /// Turns the flag on or off in its environment and returns the updated flag.
    #[instrument(skip(self))]
    pub async fn toggle(&self, flag: &FlagRef, on: bool) -> Result<Value, ClientError> {
        let operations = [PatchOperation::Replace {
            path: flag.on_pointer(),
            value: Value::Bool(on),
        }];
        let request = self
            .api
            .request(Method::PATCH, &flag.path())
            .json(&operations);
        let updated = self.api.send(PATCH_FLAG, &flag.flag, request).await?;
        info!(on, "Toggled");
        Ok(updated)
    }
}
