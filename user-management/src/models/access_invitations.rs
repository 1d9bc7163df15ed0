//! Pending role grants for an email that has not registered yet.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{OrgId, Role, SpaceId};

/// Roles granted per entity. A key is only present with a non-empty set.
pub type RoleGrants<K> = BTreeMap<K, BTreeSet<Role>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessInvitations {
    pub email: String,
    pub org_access_invitations: RoleGrants<OrgId>,
    pub space_access_invitations: RoleGrants<SpaceId>,
    pub org_creation_eligible: bool,
    /// Bumped by the store on every merge; consumption is conditional on it.
    #[serde(default)]
    pub revision: i64,
}

impl AccessInvitations {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            org_access_invitations: BTreeMap::new(),
            space_access_invitations: BTreeMap::new(),
            org_creation_eligible: false,
            revision: 0,
        }
    }

    pub fn with_grants(
        email: impl Into<String>,
        org_roles: RoleGrants<OrgId>,
        space_roles: RoleGrants<SpaceId>,
        org_creation_eligible: bool,
    ) -> Self {
        let mut invitations = Self::new(email);
        invitations.merge(org_roles, space_roles, org_creation_eligible);
        invitations
    }

    /// Union the given grants into this record. Existing roles are never
    /// removed and eligibility, once granted, stays granted.
    pub fn merge(
        &mut self,
        org_roles: RoleGrants<OrgId>,
        space_roles: RoleGrants<SpaceId>,
        org_creation_eligible: bool,
    ) {
        merge_roles(&mut self.org_access_invitations, org_roles);
        merge_roles(&mut self.space_access_invitations, space_roles);
        self.org_creation_eligible |= org_creation_eligible;
    }

    pub fn merge_from(&mut self, other: AccessInvitations) {
        self.merge(
            other.org_access_invitations,
            other.space_access_invitations,
            other.org_creation_eligible,
        );
    }

    /// One `(org, role)` pair per grant.
    pub fn org_role_grants(&self) -> impl Iterator<Item = (OrgId, Role)> + '_ {
        flatten(&self.org_access_invitations)
    }

    /// One `(space, role)` pair per grant.
    pub fn space_role_grants(&self) -> impl Iterator<Item = (SpaceId, Role)> + '_ {
        flatten(&self.space_access_invitations)
    }

    pub fn has_grants(&self) -> bool {
        !self.org_access_invitations.is_empty() || !self.space_access_invitations.is_empty()
    }

    /// Grants present here but absent from `applied`.
    pub fn grants_not_in(&self, applied: &AccessInvitations) -> AccessInvitations {
        let mut added = AccessInvitations::new(self.email.clone());
        added.org_access_invitations =
            difference(&self.org_access_invitations, &applied.org_access_invitations);
        added.space_access_invitations =
            difference(&self.space_access_invitations, &applied.space_access_invitations);
        added.org_creation_eligible = self.org_creation_eligible && !applied.org_creation_eligible;
        added.revision = self.revision;
        added
    }
}

fn difference<K: Ord + Copy>(current: &RoleGrants<K>, applied: &RoleGrants<K>) -> RoleGrants<K> {
    current
        .iter()
        .filter_map(|(entity, roles)| {
            let missing: BTreeSet<Role> = match applied.get(entity) {
                Some(done) => roles.difference(done).copied().collect(),
                None => roles.clone(),
            };
            (!missing.is_empty()).then_some((*entity, missing))
        })
        .collect()
}

fn merge_roles<K: Ord>(target: &mut RoleGrants<K>, source: RoleGrants<K>) {
    for (entity, roles) in source {
        if roles.is_empty() {
            continue;
        }
        target.entry(entity).or_default().extend(roles);
    }
}

fn flatten<K: Copy>(grants: &RoleGrants<K>) -> impl Iterator<Item = (K, Role)> + '_ {
    grants
        .iter()
        .flat_map(|(entity, roles)| roles.iter().map(move |role| (*entity, *role)))
}
