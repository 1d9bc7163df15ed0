//! Persistence seams for security codes and pending access invitations.
//!
//! Both stores are shared across concurrent requests, so the consuming
//! operations are compare-and-set: exactly one caller observes `true`.

mod memory;
mod postgres;

pub use memory::{InMemoryAccessInvitationsStore, InMemorySecurityCodeStore};
pub use postgres::{PgAccessInvitationsStore, PgSecurityCodeStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AccessInvitations, SecurityCode};
use crate::services::ServiceError;

#[async_trait]
pub trait SecurityCodeStore: Send + Sync {
    async fn insert(&self, code: &SecurityCode) -> Result<(), ServiceError>;

    async fn find(&self, code: &str) -> Result<Option<SecurityCode>, ServiceError>;

    /// Flip `used` from false to true, stamping `now`. Returns whether this
    /// call performed the transition. Expiry is not checked here; `verify`
    /// owns the cutoff.
    async fn mark_used(&self, code: &str, now: DateTime<Utc>) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait AccessInvitationsStore: Send + Sync {
    /// The pending (unconsumed) record for a normalized email.
    async fn find_pending(&self, email: &str) -> Result<Option<AccessInvitations>, ServiceError>;

    /// Union `invitations` into the pending record for its email, creating a
    /// fresh pending record when none exists or the previous one was consumed.
    /// Every merge bumps the record's revision.
    async fn merge(&self, invitations: AccessInvitations) -> Result<(), ServiceError>;

    /// Flag the pending record consumed if it is still at `revision`. Returns
    /// whether a record was flagged; `false` when nothing is pending or a
    /// merge landed after `revision` was read.
    async fn mark_used(
        &self,
        email: &str,
        revision: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;
}
