//! Identity provider (UAA) collaborator.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{header::HeaderMap, Client, StatusCode};
use serde::{Deserialize, Serialize};
use service_core::observability::inject_trace_context;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::UaaConfig;
use crate::models::AccountId;
use crate::services::ServiceError;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an authenticatable account. A duplicate username is `UserAlreadyExists`.
    async fn create_account(&self, username: &str, password: &str)
        -> Result<AccountId, ServiceError>;
}

/// Refresh the cached token this long before UAA says it expires.
const TOKEN_EXPIRY_MARGIN_SECONDS: i64 = 30;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Client-credentials token for privileged calls to UAA and the cloud controller.
#[derive(Clone)]
pub struct UaaTokenProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl UaaTokenProvider {
    pub fn new(http: Client, config: &UaaConfig) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", config.url.trim_end_matches('/')),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn token(&self) -> Result<String, ServiceError> {
        {
            let guard = self.cached.read().await;
            if let Some(token) = guard.as_ref().filter(|t| t.expires_at > Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.cached.write().await;

        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = guard.as_ref().filter(|t| t.expires_at > Utc::now()) {
            return Ok(token.value.clone());
        }

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials"), ("response_type", "token")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Failed to obtain UAA client token");
            return Err(ServiceError::from_upstream_status("uaa", status, &body));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECONDS).max(0);
        *guard = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        });

        tracing::debug!(expires_in = token.expires_in, "Obtained UAA client token");
        Ok(token.access_token)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScimEmail<'a> {
    value: &'a str,
    primary: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScimUserRequest<'a> {
    user_name: &'a str,
    password: &'a str,
    emails: Vec<ScimEmail<'a>>,
}

#[derive(Debug, Deserialize)]
struct ScimUserResponse {
    id: String,
}

/// SCIM client for UAA `/Users`.
#[derive(Clone)]
pub struct UaaClient {
    http: Client,
    base_url: String,
    tokens: UaaTokenProvider,
}

impl UaaClient {
    pub fn new(http: Client, config: &UaaConfig, tokens: UaaTokenProvider) -> Self {
        tracing::info!(url = %config.url, "UAA client configured");
        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[async_trait]
impl IdentityProvider for UaaClient {
    #[tracing::instrument(skip(self, password), fields(username = %username))]
    async fn create_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AccountId, ServiceError> {
        let token = self.tokens.token().await?;
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        let body = ScimUserRequest {
            user_name: username,
            password,
            emails: vec![ScimEmail {
                value: username,
                primary: true,
            }],
        };

        let response = self
            .http
            .post(format!("{}/Users", self.base_url))
            .headers(headers)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            tracing::info!("UAA reports account already exists");
            return Err(ServiceError::UserAlreadyExists);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_upstream_status("uaa", status, &body));
        }

        let user: ScimUserResponse = response.json().await?;
        let id = Uuid::parse_str(&user.id).map_err(|e| {
            ServiceError::Upstream(format!("uaa returned malformed user id: {}", e))
        })?;

        tracing::info!(account_id = %id, "Identity account created");
        Ok(AccountId(id))
    }
}
