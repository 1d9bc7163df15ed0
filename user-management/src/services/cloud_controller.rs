//! Cloud controller (v2 API) collaborator: platform users, orgs, spaces and memberships.

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;
use service_core::http::{retry_call, RetryConfig};
use service_core::observability::inject_trace_context;
use uuid::Uuid;

use crate::config::CloudControllerConfig;
use crate::models::{AccountId, OrgId, Role, SpaceId};
use crate::services::identity::UaaTokenProvider;
use crate::services::ServiceError;

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create_user(&self, user: AccountId) -> Result<(), ServiceError>;

    async fn create_organization(&self, name: &str) -> Result<OrgId, ServiceError>;

    async fn create_space(&self, org: OrgId, name: &str) -> Result<SpaceId, ServiceError>;

    /// Make `user` a member and manager of `org`.
    async fn assign_user_to_organization(
        &self,
        user: AccountId,
        org: OrgId,
    ) -> Result<(), ServiceError>;

    /// Make `user` a manager and developer of `space`.
    async fn assign_user_to_space(&self, user: AccountId, space: SpaceId)
        -> Result<(), ServiceError>;

    async fn assign_org_role(
        &self,
        user: AccountId,
        org: OrgId,
        role: Role,
    ) -> Result<(), ServiceError>;

    async fn assign_space_role(
        &self,
        user: AccountId,
        space: SpaceId,
        role: Role,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Deserialize)]
struct Metadata {
    guid: Uuid,
}

#[derive(Debug, Deserialize)]
struct Resource {
    metadata: Metadata,
}

#[derive(Debug, Serialize)]
struct CreateSpaceRequest<'a> {
    name: &'a str,
    organization_guid: Uuid,
}

/// HTTP client for the cloud controller. Creations are issued once;
/// membership PUTs are idempotent and retried with backoff.
#[derive(Clone)]
pub struct CloudControllerClient {
    http: Client,
    base_url: String,
    tokens: UaaTokenProvider,
    retry: RetryConfig,
}

impl CloudControllerClient {
    pub fn new(
        http: Client,
        config: &CloudControllerConfig,
        tokens: UaaTokenProvider,
        retry: RetryConfig,
    ) -> Self {
        tracing::info!(url = %config.url, "Cloud controller client configured");
        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            tokens,
            retry,
        }
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ServiceError> {
        let token = self.tokens.token().await?;
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .headers(headers)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, path = %path, "Cloud controller rejected request");
            return Err(ServiceError::from_upstream_status(
                "cloud controller",
                status,
                &body,
            ));
        }
        Ok(response)
    }

    async fn create<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Uuid, ServiceError> {
        let resource: Resource = self.send(Method::POST, path, Some(body)).await?.json().await?;
        Ok(resource.metadata.guid)
    }

    async fn put(&self, operation: &str, path: String) -> Result<(), ServiceError> {
        retry_call(&self.retry, operation, || {
            self.send::<serde_json::Value>(Method::PUT, &path, None)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for CloudControllerClient {
    #[tracing::instrument(skip(self))]
    async fn create_user(&self, user: AccountId) -> Result<(), ServiceError> {
        self.send(Method::POST, "/v2/users", Some(&json!({ "guid": user })))
            .await?;
        tracing::info!("Platform user created");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn create_organization(&self, name: &str) -> Result<OrgId, ServiceError> {
        let guid = self
            .create("/v2/organizations", &json!({ "name": name }))
            .await?;
        tracing::info!(org_id = %guid, "Organization created");
        Ok(OrgId(guid))
    }

    #[tracing::instrument(skip(self))]
    async fn create_space(&self, org: OrgId, name: &str) -> Result<SpaceId, ServiceError> {
        let body = CreateSpaceRequest {
            name,
            organization_guid: org.as_uuid(),
        };
        let guid = self.create("/v2/spaces", &body).await?;
        tracing::info!(space_id = %guid, "Space created");
        Ok(SpaceId(guid))
    }

    async fn assign_user_to_organization(
        &self,
        user: AccountId,
        org: OrgId,
    ) -> Result<(), ServiceError> {
        self.assign_org_role(user, org, Role::Users).await?;
        self.assign_org_role(user, org, Role::Managers).await
    }

    async fn assign_user_to_space(
        &self,
        user: AccountId,
        space: SpaceId,
    ) -> Result<(), ServiceError> {
        self.assign_space_role(user, space, Role::Managers).await?;
        self.assign_space_role(user, space, Role::Developers).await
    }

    #[tracing::instrument(skip(self))]
    async fn assign_org_role(
        &self,
        user: AccountId,
        org: OrgId,
        role: Role,
    ) -> Result<(), ServiceError> {
        self.put(
            "assign_org_role",
            format!("/v2/organizations/{}/{}/{}", org, role.as_str(), user),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn assign_space_role(
        &self,
        user: AccountId,
        space: SpaceId,
        role: Role,
    ) -> Result<(), ServiceError> {
        self.put(
            "assign_space_role",
            format!("/v2/spaces/{}/{}/{}", space, role.as_str(), user),
        )
        .await
    }
}
