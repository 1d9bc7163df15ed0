//! Pending organization/space grants for invited emails.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::models::{AccessInvitations, OrgId, Role, RoleGrants, SpaceId};
use crate::services::ServiceError;
use crate::store::AccessInvitationsStore;

/// Outcome of consuming a snapshot of pending invitations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumption {
    Consumed,
    /// Grants were merged after the snapshot was read; nothing was flagged.
    Superseded(AccessInvitations),
}

#[derive(Clone)]
pub struct AccessInvitationsService {
    store: Arc<dyn AccessInvitationsStore>,
}

impl AccessInvitationsService {
    pub fn new(store: Arc<dyn AccessInvitationsStore>) -> Self {
        Self { store }
    }

    /// `None` means the email was never invited (or its grants were already applied).
    pub async fn get_access_invitations(
        &self,
        email: &str,
    ) -> Result<Option<AccessInvitations>, ServiceError> {
        self.store.find_pending(&normalize_email(email)).await
    }

    /// Merge grants into the pending record. Several inviters may grant
    /// different roles independently; nothing already granted is lost.
    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn add_access_invitations(
        &self,
        email: &str,
        org_roles: RoleGrants<OrgId>,
        space_roles: RoleGrants<SpaceId>,
        org_creation_eligible: bool,
    ) -> Result<(), ServiceError> {
        let invitations = AccessInvitations::with_grants(
            normalize_email(email),
            org_roles,
            space_roles,
            org_creation_eligible,
        );

        tracing::info!(
            org_grants = invitations.org_role_grants().count(),
            space_grants = invitations.space_role_grants().count(),
            org_creation_eligible,
            "Recording access invitations"
        );
        self.store.merge(invitations).await
    }

    pub async fn add_org_access_invitation(
        &self,
        email: &str,
        org: OrgId,
        roles: BTreeSet<Role>,
    ) -> Result<(), ServiceError> {
        self.add_access_invitations(email, BTreeMap::from([(org, roles)]), BTreeMap::new(), false)
            .await
    }

    pub async fn add_space_access_invitation(
        &self,
        email: &str,
        space: SpaceId,
        roles: BTreeSet<Role>,
    ) -> Result<(), ServiceError> {
        self.add_access_invitations(email, BTreeMap::new(), BTreeMap::from([(space, roles)]), false)
            .await
    }

    pub async fn add_eligibility_invitation(&self, email: &str) -> Result<(), ServiceError> {
        self.add_access_invitations(email, BTreeMap::new(), BTreeMap::new(), true)
            .await
    }

    /// Mark the pending record consumed, provided it still matches `applied`.
    /// Call only after every grant in `applied` has been applied upstream.
    #[tracing::instrument(skip_all, fields(email = %applied.email, revision = applied.revision))]
    pub async fn use_access_invitations(
        &self,
        applied: &AccessInvitations,
    ) -> Result<Consumption, ServiceError> {
        let email = normalize_email(&applied.email);
        if self
            .store
            .mark_used(&email, applied.revision, Utc::now())
            .await?
        {
            tracing::info!("Access invitations consumed");
            return Ok(Consumption::Consumed);
        }

        match self.store.find_pending(&email).await? {
            Some(latest) => {
                tracing::info!(latest = latest.revision, "Access invitations changed since read");
                Ok(Consumption::Superseded(latest))
            }
            None => Err(ServiceError::NoPendingInvitation),
        }
    }

    pub async fn get_org_creation_eligibility(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self
            .get_access_invitations(email)
            .await?
            .map(|invitations| invitations.org_creation_eligible)
            .unwrap_or(false))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
