//! Security code model - single-use registration token bound to an invited email.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCode {
    pub code: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl SecurityCode {
    pub fn new(email: String, code: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            code,
            email,
            created_at: now,
            expires_at: now + ttl,
            used: false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_code_is_unused_and_unexpired() {
        let code = SecurityCode::new("a@example.com".into(), "abc".into(), Duration::hours(24));
        assert!(!code.is_expired());
        assert!(!code.used);
    }

    #[test]
    fn test_expiry_boundary() {
        let code = SecurityCode::new("a@example.com".into(), "abc".into(), Duration::seconds(-1));
        assert!(code.is_expired());
        assert!(code.is_expired_at(code.expires_at));
        assert!(!code.is_expired_at(code.created_at));
    }
}
