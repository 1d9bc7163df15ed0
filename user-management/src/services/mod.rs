pub mod access_invitations;
pub mod cloud_controller;
pub mod email;
pub mod email_validator;
pub mod error;
pub mod identity;
pub mod invitations;
pub mod registration;
pub mod security_code;
pub mod templates;

pub use access_invitations::{AccessInvitationsService, Consumption};
pub use cloud_controller::{CloudControllerClient, PlatformClient};
pub use email::{MessageService, MockMessageService, SentMessage, SmtpMessageService};
pub use email_validator::{BlacklistEmailValidator, EmailValidator};
pub use error::ServiceError;
pub use identity::{IdentityProvider, UaaClient, UaaTokenProvider};
pub use invitations::{
    AccessGrants, BaseUrlLinkGenerator, InvitationLinkGenerator, InvitationsService,
};
pub use registration::{RegistrationOrchestrator, RegistrationStage};
pub use security_code::SecurityCodeService;
pub use templates::{BuiltinTemplates, TemplateRenderer};
