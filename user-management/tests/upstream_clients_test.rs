//! UAA and cloud controller clients against a mock HTTP upstream.

use serde_json::json;
use service_core::http::RetryConfig;
use std::time::Duration;
use user_management::config::{CloudControllerConfig, UaaConfig};
use user_management::models::{AccountId, OrgId, Role, SpaceId};
use user_management::services::{
    CloudControllerClient, IdentityProvider, PlatformClient, ServiceError, UaaClient,
    UaaTokenProvider,
};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

fn uaa_config(server: &MockServer) -> UaaConfig {
    UaaConfig {
        url: server.uri(),
        client_id: "user-management".to_string(),
        client_secret: "secret".to_string(),
    }
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        add_jitter: false,
    }
}

fn platform(server: &MockServer, retry: RetryConfig) -> CloudControllerClient {
    let tokens = UaaTokenProvider::new(http(), &uaa_config(server));
    CloudControllerClient::new(
        http(),
        &CloudControllerConfig { url: server.uri() },
        tokens,
        retry,
    )
}

#[tokio::test]
async fn create_account_returns_scim_id() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/Users"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({"userName": "alice@example.com"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": id.to_string()})))
        .expect(1)
        .mount(&server)
        .await;

    let config = uaa_config(&server);
    let client = UaaClient::new(http(), &config, UaaTokenProvider::new(http(), &config));

    let account = client
        .create_account("alice@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(account, AccountId(id));
}

#[tokio::test]
async fn create_account_conflict_is_user_already_exists() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let config = uaa_config(&server);
    let client = UaaClient::new(http(), &config, UaaTokenProvider::new(http(), &config));

    let result = client.create_account("alice@example.com", "secret1").await;
    assert!(matches!(result, Err(ServiceError::UserAlreadyExists)));
}

#[tokio::test]
async fn create_account_server_error_is_unavailable() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/Users"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = uaa_config(&server);
    let client = UaaClient::new(http(), &config, UaaTokenProvider::new(http(), &config));

    let result = client.create_account("alice@example.com", "secret1").await;
    assert!(matches!(result, Err(ServiceError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn token_is_cached_between_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = UaaTokenProvider::new(http(), &uaa_config(&server));
    assert_eq!(tokens.token().await.unwrap(), "cached-token");
    assert_eq!(tokens.token().await.unwrap(), "cached-token");
}

#[tokio::test]
async fn create_organization_and_space_return_guids() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let org_guid = Uuid::new_v4();
    let space_guid = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/v2/organizations"))
        .and(body_partial_json(json!({"name": "acme"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"metadata": {"guid": org_guid}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/spaces"))
        .and(body_partial_json(
            json!({"name": "default", "organization_guid": org_guid}),
        ))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"metadata": {"guid": space_guid}})),
        )
        .mount(&server)
        .await;

    let client = platform(&server, RetryConfig::no_retry());
    let org = client.create_organization("acme").await.unwrap();
    assert_eq!(org, OrgId(org_guid));
    let space = client.create_space(org, "default").await.unwrap();
    assert_eq!(space, SpaceId(space_guid));
}

#[tokio::test]
async fn role_assignment_is_retried_on_transient_failure() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let org = OrgId(Uuid::new_v4());
    let user = AccountId(Uuid::new_v4());
    let role_path = format!("/v2/organizations/{}/auditors/{}", org, user);

    Mock::given(method("PUT"))
        .and(path(role_path.as_str()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(role_path.as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = platform(&server, fast_retry());
    client.assign_org_role(user, org, Role::Auditors).await.unwrap();
}

#[tokio::test]
async fn organization_creation_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/v2/organizations"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = platform(&server, fast_retry());
    let result = client.create_organization("acme").await;
    assert!(matches!(result, Err(ServiceError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn rejected_assignment_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let space = SpaceId(Uuid::new_v4());
    let user = AccountId(Uuid::new_v4());
    Mock::given(method("PUT"))
        .and(path(format!("/v2/spaces/{}/developers/{}", space, user).as_str()))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad space"))
        .expect(1)
        .mount(&server)
        .await;

    let client = platform(&server, fast_retry());
    let result = client
        .assign_space_role(user, space, Role::Developers)
        .await;
    assert!(matches!(result, Err(ServiceError::Upstream(_))));
}

#[tokio::test]
async fn assign_user_to_space_grants_manager_and_developer() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let space = SpaceId(Uuid::new_v4());
    let user = AccountId(Uuid::new_v4());
    for role in ["managers", "developers"] {
        Mock::given(method("PUT"))
            .and(path(format!("/v2/spaces/{}/{}/{}", space, role, user).as_str()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = platform(&server, RetryConfig::no_retry());
    client.assign_user_to_space(user, space).await.unwrap();
}
