pub mod health;
pub mod invitations;
pub mod metrics;
pub mod registrations;

pub use health::*;
pub use invitations::*;
pub use registrations::*;
