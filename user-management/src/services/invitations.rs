//! Invite flow: validate the invitee, record grants, mint a code and mail the link.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{OrgId, RoleGrants, SpaceId};
use crate::services::email::MessageService;
use crate::services::email_validator::EmailValidator;
use crate::services::templates::{TemplateRenderer, INVITE_TEMPLATE};
use crate::services::{AccessInvitationsService, SecurityCodeService, ServiceError};

pub const INVITATION_SUBJECT: &str = "Invitation to join Trusted Analytics platform";

/// Turns a security code into the URL an invitee opens to register.
pub trait InvitationLinkGenerator: Send + Sync {
    fn link(&self, code: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct BaseUrlLinkGenerator {
    base_url: String,
}

impl BaseUrlLinkGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl InvitationLinkGenerator for BaseUrlLinkGenerator {
    fn link(&self, code: &str) -> String {
        format!("{}/new-account?code={}", self.base_url, code)
    }
}

/// Grants attached to an invitation.
#[derive(Debug, Clone, Default)]
pub struct AccessGrants {
    pub org_roles: RoleGrants<OrgId>,
    pub space_roles: RoleGrants<SpaceId>,
    pub org_creation_eligible: bool,
}

impl AccessGrants {
    /// Org grants must use org roles and space grants space roles.
    pub fn validate(&self) -> Result<(), ServiceError> {
        for role in self.org_roles.values().flatten() {
            if !role.is_org_role() {
                return Err(ServiceError::InvalidAccessGrant(format!(
                    "{} is not an organization role",
                    role
                )));
            }
        }
        for role in self.space_roles.values().flatten() {
            if !role.is_space_role() {
                return Err(ServiceError::InvalidAccessGrant(format!(
                    "{} is not a space role",
                    role
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct InvitationsService {
    codes: SecurityCodeService,
    access_invitations: AccessInvitationsService,
    email_validator: Arc<dyn EmailValidator>,
    messages: Arc<dyn MessageService>,
    templates: Arc<dyn TemplateRenderer>,
    service_name: String,
}

impl InvitationsService {
    pub fn new(
        codes: SecurityCodeService,
        access_invitations: AccessInvitationsService,
        email_validator: Arc<dyn EmailValidator>,
        messages: Arc<dyn MessageService>,
        templates: Arc<dyn TemplateRenderer>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            codes,
            access_invitations,
            email_validator,
            messages,
            templates,
            service_name: service_name.into(),
        }
    }

    /// Mint a code for `email`, mail the invitation and return the link it contains.
    #[tracing::instrument(skip(self, links))]
    pub async fn send_invite_email(
        &self,
        email: &str,
        current_user: &str,
        links: &dyn InvitationLinkGenerator,
    ) -> Result<String, ServiceError> {
        let code = self.codes.generate_code(email).await?;
        let link = links.link(&code.code);

        let variables = HashMap::from([
            ("serviceName".to_string(), self.service_name.clone()),
            ("email".to_string(), email.to_string()),
            ("currentUser".to_string(), current_user.to_string()),
            ("accountsUrl".to_string(), link.clone()),
        ]);
        let html = self.templates.render(INVITE_TEMPLATE, &variables)?;

        self.messages
            .send_message(email, INVITATION_SUBJECT, &html)
            .await?;

        metrics::counter!("invitations_sent_total").increment(1);
        tracing::info!("Invitation sent");
        Ok(link)
    }

    #[tracing::instrument(skip(self, grants, links))]
    pub async fn invite_user(
        &self,
        email: &str,
        current_user: &str,
        grants: AccessGrants,
        links: &dyn InvitationLinkGenerator,
    ) -> Result<String, ServiceError> {
        self.email_validator.validate(email)?;
        grants.validate()?;

        self.access_invitations
            .add_access_invitations(
                email,
                grants.org_roles,
                grants.space_roles,
                grants.org_creation_eligible,
            )
            .await?;

        self.send_invite_email(email, current_user, links).await
    }
}
