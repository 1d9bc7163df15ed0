//! Registration of an invited user: code check, account creation, provisioning, consumption.

use std::fmt;
use std::sync::Arc;

use crate::models::{AccessInvitations, AccountId, Invitation, RegistrationRequest, SecurityCode};
use crate::services::cloud_controller::PlatformClient;
use crate::services::identity::IdentityProvider;
use crate::services::{AccessInvitationsService, Consumption, SecurityCodeService, ServiceError};

pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;
pub const DEFAULT_SPACE_NAME: &str = "default";

/// Rounds of "apply late grants, then consume" before giving up.
const MAX_CONSUME_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    CodeUnverified,
    CodeVerified,
    UserCreated,
    OrgProvisioned,
    RolesApplied,
    CodeConsumed,
    InvitationsConsumed,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationStage::CodeUnverified => "code_unverified",
            RegistrationStage::CodeVerified => "code_verified",
            RegistrationStage::UserCreated => "user_created",
            RegistrationStage::OrgProvisioned => "org_provisioned",
            RegistrationStage::RolesApplied => "roles_applied",
            RegistrationStage::CodeConsumed => "code_consumed",
            RegistrationStage::InvitationsConsumed => "invitations_consumed",
        };
        f.write_str(name)
    }
}

struct StageTracker {
    current: RegistrationStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: RegistrationStage::CodeUnverified,
        }
    }

    fn advance(&mut self, next: RegistrationStage) {
        tracing::info!(from = %self.current, stage = %next, "Registration stage reached");
        self.current = next;
    }
}

#[derive(Clone)]
pub struct RegistrationOrchestrator {
    codes: SecurityCodeService,
    access_invitations: AccessInvitationsService,
    identity: Arc<dyn IdentityProvider>,
    platform: Arc<dyn PlatformClient>,
    min_password_length: usize,
}

impl RegistrationOrchestrator {
    pub fn new(
        codes: SecurityCodeService,
        access_invitations: AccessInvitationsService,
        identity: Arc<dyn IdentityProvider>,
        platform: Arc<dyn PlatformClient>,
        min_password_length: usize,
    ) -> Self {
        Self {
            codes,
            access_invitations,
            identity,
            platform,
            min_password_length,
        }
    }

    /// Register the invitee identified by `code`.
    ///
    /// Code and invitations are consumed only after every upstream step
    /// succeeded. A failure part way leaves both pending and does not undo
    /// upstream side effects already made.
    #[tracing::instrument(skip_all, fields(org = ?request.org_name()))]
    pub async fn register(
        &self,
        code: &str,
        request: &RegistrationRequest,
    ) -> Result<AccountId, ServiceError> {
        let mut stages = StageTracker::new();
        let result = self.run(code, request, &mut stages).await;

        match &result {
            Ok(account_id) => {
                metrics::counter!("registrations_total", "outcome" => "success").increment(1);
                tracing::info!(account_id = %account_id, "Registration completed");
            }
            Err(e) => {
                metrics::counter!("registrations_total", "outcome" => "failure").increment(1);
                tracing::warn!(stage = %stages.current, error = %e, "Registration failed");
            }
        }
        result
    }

    async fn run(
        &self,
        code: &str,
        request: &RegistrationRequest,
        stages: &mut StageTracker,
    ) -> Result<AccountId, ServiceError> {
        let security_code = self.codes.verify(code).await?;
        stages.advance(RegistrationStage::CodeVerified);

        self.validate_password(&request.password)?;

        let email = security_code.email.as_str();
        let invitations = self
            .access_invitations
            .get_access_invitations(email)
            .await?
            .ok_or(ServiceError::NoPendingInvitation)?;

        let account_id = self.identity.create_account(email, &request.password).await?;
        stages.advance(RegistrationStage::UserCreated);

        self.provision(account_id, request.org_name(), &invitations, stages)
            .await?;

        self.consume(account_id, &security_code, invitations, stages)
            .await?;
        Ok(account_id)
    }

    fn validate_password(&self, password: &str) -> Result<(), ServiceError> {
        if password.chars().count() < self.min_password_length {
            return Err(ServiceError::IllegalPassword(
                "Password is too short".to_string(),
            ));
        }
        Ok(())
    }

    /// Every upstream side effect after account creation happens here.
    async fn provision(
        &self,
        account_id: AccountId,
        org_name: Option<&str>,
        invitations: &AccessInvitations,
        stages: &mut StageTracker,
    ) -> Result<(), ServiceError> {
        self.platform.create_user(account_id).await?;

        if let Some(name) = org_name {
            let org = self.platform.create_organization(name).await?;
            self.platform
                .assign_user_to_organization(account_id, org)
                .await?;
            let space = self.platform.create_space(org, DEFAULT_SPACE_NAME).await?;
            self.platform.assign_user_to_space(account_id, space).await?;
            stages.advance(RegistrationStage::OrgProvisioned);
        }

        self.apply_grants(account_id, invitations).await?;
        stages.advance(RegistrationStage::RolesApplied);
        Ok(())
    }

    async fn apply_grants(
        &self,
        account_id: AccountId,
        invitations: &AccessInvitations,
    ) -> Result<(), ServiceError> {
        for (org, role) in invitations.org_role_grants() {
            self.platform.assign_org_role(account_id, org, role).await?;
        }
        for (space, role) in invitations.space_role_grants() {
            self.platform
                .assign_space_role(account_id, space, role)
                .await?;
        }
        Ok(())
    }

    /// Consume the code, then the invitations that were applied. Grants merged
    /// by another inviter while this registration ran are applied before the
    /// newer record is consumed, so nothing is flagged without being granted.
    async fn consume(
        &self,
        account_id: AccountId,
        security_code: &SecurityCode,
        mut applied: AccessInvitations,
        stages: &mut StageTracker,
    ) -> Result<(), ServiceError> {
        self.codes.use_code(security_code).await?;
        stages.advance(RegistrationStage::CodeConsumed);

        for _ in 0..MAX_CONSUME_ATTEMPTS {
            match self
                .access_invitations
                .use_access_invitations(&applied)
                .await?
            {
                Consumption::Consumed => {
                    stages.advance(RegistrationStage::InvitationsConsumed);
                    return Ok(());
                }
                Consumption::Superseded(latest) => {
                    let added = latest.grants_not_in(&applied);
                    if added.has_grants() {
                        tracing::info!(
                            org_grants = added.org_role_grants().count(),
                            space_grants = added.space_role_grants().count(),
                            "Applying grants added during registration"
                        );
                        self.apply_grants(account_id, &added).await?;
                    }
                    applied = latest;
                }
            }
        }

        Err(ServiceError::Internal(anyhow::anyhow!(
            "access invitations kept changing while registration was consuming them"
        )))
    }

    /// Details shown to an invitee before registering. Does not consume the code.
    pub async fn invitation_details(&self, code: &str) -> Result<Invitation, ServiceError> {
        let security_code = self.codes.verify(code).await?;
        let org_creation_allowed = self
            .access_invitations
            .get_org_creation_eligibility(&security_code.email)
            .await?;

        Ok(Invitation {
            email: security_code.email,
            org_creation_allowed,
        })
    }
}
