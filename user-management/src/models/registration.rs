use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /rest/registrations`.
#[derive(Clone, Deserialize, ToSchema)]
pub struct RegistrationRequest {
    #[schema(example = "secret1")]
    pub password: String,

    /// Name of an organization to create for the new user.
    #[schema(example = "acme")]
    #[serde(default)]
    pub org: Option<String>,
}

impl RegistrationRequest {
    pub fn new(password: impl Into<String>, org: Option<String>) -> Self {
        Self {
            password: password.into(),
            org,
        }
    }

    /// Organization name, with blank names treated as absent.
    pub fn org_name(&self) -> Option<&str> {
        self.org
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("password", &"[REDACTED]")
            .field("org", &self.org)
            .finish()
    }
}

/// What an invitee sees before registering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub org_creation_allowed: bool,
}
