//! Issues, verifies and consumes single-use registration codes.

use chrono::{Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

use crate::models::SecurityCode;
use crate::services::ServiceError;
use crate::store::SecurityCodeStore;

pub const DEFAULT_CODE_TTL_HOURS: i64 = 24;

/// Random bytes per code; 256 bits makes collisions negligible without a uniqueness probe.
const CODE_BYTES: usize = 32;

#[derive(Clone)]
pub struct SecurityCodeService {
    store: Arc<dyn SecurityCodeStore>,
    ttl: Duration,
}

impl SecurityCodeService {
    pub fn new(store: Arc<dyn SecurityCodeStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    #[tracing::instrument(skip_all, fields(email = %email))]
    pub async fn generate_code(&self, email: &str) -> Result<SecurityCode, ServiceError> {
        let code = SecurityCode::new(email.to_string(), generate_token(), self.ttl);
        self.store.insert(&code).await?;

        tracing::info!(expires_at = %code.expires_at, "Security code issued");
        Ok(code)
    }

    /// Look up a code without consuming it.
    pub async fn verify(&self, code: &str) -> Result<SecurityCode, ServiceError> {
        if code.trim().is_empty() {
            return Err(ServiceError::InvalidSecurityCode(
                "Security code empty or null".to_string(),
            ));
        }

        let security_code = self
            .store
            .find(code)
            .await?
            .ok_or_else(|| ServiceError::InvalidSecurityCode("Unknown security code".to_string()))?;

        if security_code.used {
            return Err(ServiceError::InvalidSecurityCode(
                "Security code already used".to_string(),
            ));
        }
        if security_code.is_expired() {
            return Err(ServiceError::InvalidSecurityCode(
                "Security code expired".to_string(),
            ));
        }

        Ok(security_code)
    }

    /// Consume a code. Exactly one caller wins; every other call fails.
    ///
    /// Expiry is only checked by `verify`: a registration that verified the
    /// code before it expired can still consume it after provisioning.
    #[tracing::instrument(skip_all, fields(email = %security_code.email))]
    pub async fn use_code(&self, security_code: &SecurityCode) -> Result<(), ServiceError> {
        if security_code.used {
            return Err(ServiceError::InvalidSecurityCode(
                "Security code already used".to_string(),
            ));
        }

        if !self.store.mark_used(&security_code.code, Utc::now()).await? {
            tracing::warn!("Security code consumption lost: already used");
            return Err(ServiceError::InvalidSecurityCode(
                "Security code already used".to_string(),
            ));
        }

        tracing::info!("Security code consumed");
        Ok(())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
