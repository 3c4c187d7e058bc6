use super::model::CustomRole;
use crate::api::{ApiClient, Endpoint, Items};
use async_trait::async_trait;
use reconcile_framework::{ClientError, PatchOperation, RemoteResource, ResourceClient};
use reqwest::Method;
use tracing::{debug, instrument};

pub const LIST_ROLES: Endpoint = Endpoint {
    operation: "getCustomRoles",
    docs: "https://apidocs.launchdarkly.com/docs/list-custom-roles",
};
pub const GET_ROLE: Endpoint = Endpoint {
    operation: "getCustomRole",
    docs: "https://apidocs.launchdarkly.com/docs/get-custom-role",
};
pub const POST_ROLE: Endpoint = Endpoint {
    operation: "postCustomRole",
    docs: "https://apidocs.launchdarkly.com/docs/create-custom-role",
};
pub const PATCH_ROLE: Endpoint = Endpoint {
    operation: "patchCustomRole",
    docs: "https://apidocs.launchdarkly.com/docs/update-custom-role",
};

/// HTTP [`ResourceClient`] for `/roles`.
#[derive(Clone)]
pub struct RolesClient {
    api: ApiClient,
}

impl RolesClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Finds a role by its service-assigned `_id`.
    ///
    /// The list endpoint is the only way to search by id; the matching role is then
    /// fetched by key so the result is as complete as a plain `get`.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<RemoteResource<CustomRole>, ClientError> {
        let roles = self.list().await?;
        let mut matching = roles.iter().filter(|role| role.id == id);
        match (matching.next(), matching.next()) {
            (Some(role), None) => self.get(role.key()).await,
            _ => Err(ClientError::NotFound {
                operation: LIST_ROLES.operation,
                key: id.to_string(),
                docs: LIST_ROLES.docs,
            }),
        }
    }
}

#[async_trait]
impl ResourceClient<CustomRole> for RolesClient {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RemoteResource<CustomRole>>, ClientError> {
        let request = self.api.request(Method::GET, "/roles");
        let page: Items<RemoteResource<CustomRole>> =
            self.api.send(LIST_ROLES, "roles", request).await?;
        debug!(count = page.items.len(), "Listed roles");
        Ok(page.items)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<RemoteResource<CustomRole>, ClientError> {
        let request = self.api.request(Method::GET, &format!("/roles/{key}"));
        self.api.send(GET_ROLE, key, request).await
    }

    #[instrument(skip_all, fields(key = %definition.key))]
    async fn create(&self, definition: &CustomRole) -> Result<RemoteResource<CustomRole>, ClientError> {
        let request = self.api.request(Method::POST, "/roles").json(definition);
        self.api.send(POST_ROLE, &definition.key, request).await
    }

    #[instrument(skip(self, operations), fields(ops = operations.len()))]
    async fn patch(
        &self,
        key: &str,
        operations: &[PatchOperation],
    ) -> Result<RemoteResource<CustomRole>, ClientError> {
        let request = self
            .api
            .request(Method::PATCH, &format!("/roles/{key}"))
            .json(operations);
        self.api.send(PATCH_ROLE, key, request).await
    }
}
