use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{AccessInvitationsStore, SecurityCodeStore};
use crate::models::{AccessInvitations, SecurityCode};
use crate::services::ServiceError;

/// Security codes held in process memory. Used for tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct InMemorySecurityCodeStore {
    codes: DashMap<String, SecurityCode>,
}

impl InMemorySecurityCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecurityCodeStore for InMemorySecurityCodeStore {
    async fn insert(&self, code: &SecurityCode) -> Result<(), ServiceError> {
        self.codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find(&self, code: &str) -> Result<Option<SecurityCode>, ServiceError> {
        Ok(self.codes.get(code).map(|entry| entry.value().clone()))
    }

    async fn mark_used(&self, code: &str, _now: DateTime<Utc>) -> Result<bool, ServiceError> {
        // The shard write lock held by `get_mut` makes check-then-mark indivisible.
        match self.codes.get_mut(code) {
            Some(mut entry) if !entry.used => {
                entry.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

struct InvitationRecord {
    invitations: AccessInvitations,
    used_at: Option<DateTime<Utc>>,
}

impl InvitationRecord {
    fn pending(email: &str) -> Self {
        Self {
            invitations: AccessInvitations::new(email),
            used_at: None,
        }
    }
}

/// Access invitations held in process memory, one record per email.
#[derive(Default)]
pub struct InMemoryAccessInvitationsStore {
    records: DashMap<String, InvitationRecord>,
}

impl InMemoryAccessInvitationsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccessInvitationsStore for InMemoryAccessInvitationsStore {
    async fn find_pending(&self, email: &str) -> Result<Option<AccessInvitations>, ServiceError> {
        Ok(self
            .records
            .get(email)
            .filter(|record| record.used_at.is_none())
            .map(|record| record.invitations.clone()))
    }

    async fn merge(&self, invitations: AccessInvitations) -> Result<(), ServiceError> {
        let email = invitations.email.clone();
        let mut record = self
            .records
            .entry(email.clone())
            .or_insert_with(|| InvitationRecord::pending(&email));

        if record.used_at.is_some() {
            *record = InvitationRecord::pending(&email);
        }
        record.invitations.merge_from(invitations);
        record.invitations.revision += 1;
        Ok(())
    }

    async fn mark_used(
        &self,
        email: &str,
        revision: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        match self.records.get_mut(email) {
            Some(mut record)
                if record.used_at.is_none() && record.invitations.revision == revision =>
            {
                record.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
