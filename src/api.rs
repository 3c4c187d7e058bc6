//! # LaunchDarkly HTTP plumbing
//!
//! [`ApiClient`] owns the `reqwest::Client`, the base URL and the access token, and maps
//! every response onto the framework's [`ClientError`] taxonomy:
//!
//! | Response | Error |
//! |----------|-------|
//! | 2xx | none, body decoded as JSON |
//! | 404 | [`ClientError::NotFound`] |
//! | other status | [`ClientError::Transport`] with the status |
//! | connection failure, undecodable body | [`ClientError::Transport`] without a status |
//! | timeout | [`ClientError::Cancelled`] |
//!
//! Resource-specific clients ([`RolesClient`](crate::roles::RolesClient),
//! [`FlagsClient`](crate::flags::FlagsClient)) only build requests and name the
//! [`Endpoint`] they target.

use reconcile_framework::{require, ClientError, ValidationError};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://app.launchdarkly.com/api/v2";

/// A named remote operation and the documentation page for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub operation: &'static str,
    pub docs: &'static str,
}

/// `{ "items": [...] }` envelope of list endpoints.
#[derive(Debug, Deserialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Authenticated access to the REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a request to `path` (relative to the base URL) carrying the token.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, &self.token)
    }

    /// Sends `request` and decodes a successful body.
    ///
    /// `key` names the resource in a [`ClientError::NotFound`].
    pub async fn send<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        key: &str,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| request_error(endpoint, e))?;
        let status = response.status();
        debug!(operation = endpoint.operation, status = status.as_u16(), "Response");

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                operation: endpoint.operation,
                key: key.to_string(),
                docs: endpoint.docs,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Transport {
                operation: endpoint.operation,
                status: Some(status.as_u16()),
                message: error_message(status, &body),
                docs: endpoint.docs,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| request_error(endpoint, e))
    }
}

/// Checks a value that is interpolated into a request path or a patch pointer.
///
/// Keys are limited to ASCII letters, digits, `.`, `_` and `-`, so they never need
/// escaping as a URL segment or a JSON Pointer token.
pub fn require_key(kind: &'static str, field: &'static str, value: &str) -> Result<(), ValidationError> {
    require(kind, field, value)?;
    match value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        Some(c) => Err(ValidationError::Invalid {
            field,
            message: format!("'{value}' contains '{c}'; use letters, digits, '.', '_' or '-'"),
        }),
        None => Ok(()),
    }
}

fn request_error(endpoint: Endpoint, error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::Cancelled {
            operation: endpoint.operation,
            message: error.to_string(),
            docs: endpoint.docs,
        }
    } else {
        ClientError::Transport {
            operation: endpoint.operation,
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
            docs: endpoint.docs,
        }
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        return parsed.message;
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body.trim().to_string()
    }
}
