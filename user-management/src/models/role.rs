//! Organization and space membership roles.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Users,
    Managers,
    Auditors,
    BillingManagers,
    Developers,
}

impl Role {
    /// Storage code, identical to the cloud controller's association path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Users => "users",
            Role::Managers => "managers",
            Role::Auditors => "auditors",
            Role::BillingManagers => "billing_managers",
            Role::Developers => "developers",
        }
    }

    pub fn is_org_role(&self) -> bool {
        !matches!(self, Role::Developers)
    }

    pub fn is_space_role(&self) -> bool {
        matches!(self, Role::Managers | Role::Auditors | Role::Developers)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "users" => Ok(Role::Users),
            "managers" => Ok(Role::Managers),
            "auditors" => Ok(Role::Auditors),
            "billing_managers" => Ok(Role::BillingManagers),
            "developers" => Ok(Role::Developers),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
