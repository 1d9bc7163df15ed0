pub mod access_invitations;
pub mod ids;
pub mod registration;
pub mod role;
pub mod security_code;

pub use access_invitations::{AccessInvitations, RoleGrants};
pub use ids::{AccountId, OrgId, SpaceId};
pub use registration::{Invitation, RegistrationRequest};
pub use role::Role;
pub use security_code::SecurityCode;
