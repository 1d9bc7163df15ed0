use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;

use crate::models::{OrgId, Role, SpaceId};
use crate::services::AccessGrants;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[schema(example = "bob@example.com")]
    pub email: String,

    /// Organization guid to the roles granted in it.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub org_roles: BTreeMap<OrgId, BTreeSet<Role>>,

    /// Space guid to the roles granted in it.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub space_roles: BTreeMap<SpaceId, BTreeSet<Role>>,

    #[serde(default)]
    pub org_creation_eligible: bool,
}

impl InviteRequest {
    pub fn into_grants(self) -> (String, AccessGrants) {
        (
            self.email,
            AccessGrants {
                org_roles: self.org_roles,
                space_roles: self.space_roles,
                org_creation_eligible: self.org_creation_eligible,
            },
        )
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    #[schema(example = "bob@example.com")]
    pub email: String,
    #[schema(example = "https://console.example.com/new-account?code=9f86d0...")]
    pub invitation_link: String,
}
