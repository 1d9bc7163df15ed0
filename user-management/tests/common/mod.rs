//! Shared fixtures for user-management integration tests: in-memory stores
//! and recording fakes for the identity provider and cloud controller.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use chrono::Duration;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use user_management::build_router;
use user_management::config::{
    CloudControllerConfig, Environment, RegistrationConfig, StoreBackend, UaaConfig,
    UpstreamConfig, UserManagementConfig,
};
use user_management::models::{AccountId, OrgId, Role, SpaceId};
use user_management::services::{
    AccessInvitationsService, BaseUrlLinkGenerator, BlacklistEmailValidator, BuiltinTemplates,
    IdentityProvider, InvitationsService, MockMessageService, PlatformClient,
    RegistrationOrchestrator, SecurityCodeService, ServiceError,
};
use user_management::store::{InMemoryAccessInvitationsStore, InMemorySecurityCodeStore};
use user_management::AppState;

pub const BASE_URL: &str = "https://console.example.com";
pub const FORBIDDEN_DOMAIN: &str = "mailinator.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBehavior {
    Succeed,
    Conflict,
    Unavailable,
}

pub struct MockIdentityProvider {
    behavior: Mutex<IdentityBehavior>,
    created: Mutex<Vec<(String, AccountId)>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(IdentityBehavior::Succeed),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behavior(&self, behavior: IdentityBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn created(&self) -> Vec<(String, AccountId)> {
        self.created.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_account(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<AccountId, ServiceError> {
        match *self.behavior.lock().unwrap() {
            IdentityBehavior::Succeed => {
                let id = AccountId(Uuid::new_v4());
                self.created
                    .lock()
                    .unwrap()
                    .push((username.to_string(), id));
                Ok(id)
            }
            IdentityBehavior::Conflict => Err(ServiceError::UserAlreadyExists),
            IdentityBehavior::Unavailable => Err(ServiceError::UpstreamUnavailable(
                "uaa timed out".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    CreateUser(AccountId),
    CreateOrganization(String),
    CreateSpace(OrgId, String),
    AssignUserToOrganization(AccountId, OrgId),
    AssignUserToSpace(AccountId, SpaceId),
    AssignOrgRole(AccountId, OrgId, Role),
    AssignSpaceRole(AccountId, SpaceId, Role),
}

/// Which platform operation should fail with `UpstreamUnavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformFailure {
    CreateOrganization,
    AssignOrgRole,
    AssignSpaceRole,
}

pub struct RecordingPlatformClient {
    calls: Mutex<Vec<PlatformCall>>,
    failure: Mutex<Option<PlatformFailure>>,
    pub org_id: OrgId,
    pub space_id: SpaceId,
}

impl RecordingPlatformClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            org_id: OrgId(Uuid::new_v4()),
            space_id: SpaceId(Uuid::new_v4()),
        }
    }

    pub fn fail_on(&self, failure: PlatformFailure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PlatformCall, op: Option<PlatformFailure>) -> Result<(), ServiceError> {
        if op.is_some() && *self.failure.lock().unwrap() == op {
            return Err(ServiceError::UpstreamUnavailable(
                "cloud controller returned 503 Service Unavailable".to_string(),
            ));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for RecordingPlatformClient {
    async fn create_user(&self, user: AccountId) -> Result<(), ServiceError> {
        self.record(PlatformCall::CreateUser(user), None)
    }

    async fn create_organization(&self, name: &str) -> Result<OrgId, ServiceError> {
        self.record(
            PlatformCall::CreateOrganization(name.to_string()),
            Some(PlatformFailure::CreateOrganization),
        )?;
        Ok(self.org_id)
    }

    async fn create_space(&self, org: OrgId, name: &str) -> Result<SpaceId, ServiceError> {
        self.record(PlatformCall::CreateSpace(org, name.to_string()), None)?;
        Ok(self.space_id)
    }

    async fn assign_user_to_organization(
        &self,
        user: AccountId,
        org: OrgId,
    ) -> Result<(), ServiceError> {
        self.record(PlatformCall::AssignUserToOrganization(user, org), None)
    }

    async fn assign_user_to_space(
        &self,
        user: AccountId,
        space: SpaceId,
    ) -> Result<(), ServiceError> {
        self.record(PlatformCall::AssignUserToSpace(user, space), None)
    }

    async fn assign_org_role(
        &self,
        user: AccountId,
        org: OrgId,
        role: Role,
    ) -> Result<(), ServiceError> {
        self.record(
            PlatformCall::AssignOrgRole(user, org, role),
            Some(PlatformFailure::AssignOrgRole),
        )
    }

    async fn assign_space_role(
        &self,
        user: AccountId,
        space: SpaceId,
        role: Role,
    ) -> Result<(), ServiceError> {
        self.record(
            PlatformCall::AssignSpaceRole(user, space, role),
            Some(PlatformFailure::AssignSpaceRole),
        )
    }
}

/// Runs extra work inside `create_user`, while a registration is in flight,
/// then delegates everything to a `RecordingPlatformClient`.
pub struct InterleavingPlatformClient {
    inner: Arc<RecordingPlatformClient>,
    delay: std::time::Duration,
    late_grant: Option<(AccessInvitationsService, String, OrgId, Role)>,
}

impl InterleavingPlatformClient {
    /// `create_user` sleeps for `delay` before succeeding.
    pub fn delayed(inner: Arc<RecordingPlatformClient>, delay: std::time::Duration) -> Self {
        Self {
            inner,
            delay,
            late_grant: None,
        }
    }

    /// `create_user` merges `role` on `org` into the invitee's pending grants.
    pub fn granting(
        inner: Arc<RecordingPlatformClient>,
        access: AccessInvitationsService,
        email: &str,
        org: OrgId,
        role: Role,
    ) -> Self {
        Self {
            inner,
            delay: std::time::Duration::ZERO,
            late_grant: Some((access, email.to_string(), org, role)),
        }
    }
}

#[async_trait]
impl PlatformClient for InterleavingPlatformClient {
    async fn create_user(&self, user: AccountId) -> Result<(), ServiceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some((access, email, org, role)) = &self.late_grant {
            access
                .add_org_access_invitation(email, *org, [*role].into_iter().collect())
                .await?;
        }
        self.inner.create_user(user).await
    }

    async fn create_organization(&self, name: &str) -> Result<OrgId, ServiceError> {
        self.inner.create_organization(name).await
    }

    async fn create_space(&self, org: OrgId, name: &str) -> Result<SpaceId, ServiceError> {
        self.inner.create_space(org, name).await
    }

    async fn assign_user_to_organization(
        &self,
        user: AccountId,
        org: OrgId,
    ) -> Result<(), ServiceError> {
        self.inner.assign_user_to_organization(user, org).await
    }

    async fn assign_user_to_space(
        &self,
        user: AccountId,
        space: SpaceId,
    ) -> Result<(), ServiceError> {
        self.inner.assign_user_to_space(user, space).await
    }

    async fn assign_org_role(
        &self,
        user: AccountId,
        org: OrgId,
        role: Role,
    ) -> Result<(), ServiceError> {
        self.inner.assign_org_role(user, org, role).await
    }

    async fn assign_space_role(
        &self,
        user: AccountId,
        space: SpaceId,
        role: Role,
    ) -> Result<(), ServiceError> {
        self.inner.assign_space_role(user, space, role).await
    }
}

pub struct TestContext {
    pub codes: SecurityCodeService,
    pub access: AccessInvitationsService,
    pub identity: Arc<MockIdentityProvider>,
    pub platform: Arc<RecordingPlatformClient>,
    pub mail: MockMessageService,
    pub registrations: RegistrationOrchestrator,
    pub invitations: InvitationsService,
    pub links: BaseUrlLinkGenerator,
}

impl TestContext {
    pub fn new() -> Self {
        let codes = SecurityCodeService::new(
            Arc::new(InMemorySecurityCodeStore::new()),
            Duration::hours(24),
        );
        let access = AccessInvitationsService::new(Arc::new(InMemoryAccessInvitationsStore::new()));
        let identity = Arc::new(MockIdentityProvider::new());
        let platform = Arc::new(RecordingPlatformClient::new());
        let mail = MockMessageService::new();

        let registrations = RegistrationOrchestrator::new(
            codes.clone(),
            access.clone(),
            identity.clone(),
            platform.clone(),
            6,
        );
        let invitations = InvitationsService::new(
            codes.clone(),
            access.clone(),
            Arc::new(BlacklistEmailValidator::new([FORBIDDEN_DOMAIN])),
            Arc::new(mail.clone()),
            Arc::new(BuiltinTemplates::new()),
            "Trusted Analytics",
        );

        Self {
            codes,
            access,
            identity,
            platform,
            mail,
            registrations,
            invitations,
            links: BaseUrlLinkGenerator::new(BASE_URL),
        }
    }

    /// Record an invitation with no grants and return its security code.
    pub async fn invite(&self, email: &str) -> String {
        self.access
            .add_access_invitations(email, Default::default(), Default::default(), false)
            .await
            .unwrap();
        self.codes.generate_code(email).await.unwrap().code
    }

    /// An orchestrator sharing this context's invitations and identity fake
    /// but using the given code service and platform client.
    pub fn orchestrator_with(
        &self,
        codes: SecurityCodeService,
        platform: Arc<dyn PlatformClient>,
    ) -> RegistrationOrchestrator {
        RegistrationOrchestrator::new(codes, self.access.clone(), self.identity.clone(), platform, 6)
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            config: test_config(),
            registrations: self.registrations.clone(),
            invitations: self.invitations.clone(),
            links: Arc::new(self.links.clone()),
            db: None,
        })
    }
}

pub fn test_config() -> UserManagementConfig {
    UserManagementConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "user-management-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        store: StoreBackend::Memory,
        database: None,
        uaa: UaaConfig {
            url: "http://uaa.invalid".to_string(),
            client_id: "test".to_string(),
            client_secret: "test".to_string(),
        },
        cloud_controller: CloudControllerConfig {
            url: "http://cc.invalid".to_string(),
        },
        smtp: None,
        registration: RegistrationConfig {
            security_code_expiry_hours: 24,
            password_min_length: 6,
            forbidden_domains: vec![FORBIDDEN_DOMAIN.to_string()],
            invitation_base_url: BASE_URL.to_string(),
            platform_name: "Trusted Analytics".to_string(),
        },
        upstream: UpstreamConfig {
            timeout_seconds: 10,
            max_retries: 0,
        },
        allowed_origins: vec!["http://allowed.example.com".to_string()],
    }
}
