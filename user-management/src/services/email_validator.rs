//! Gate applied to every address before an invitation is created.

use std::collections::HashSet;
use validator::ValidateEmail;

use crate::services::ServiceError;

pub trait EmailValidator: Send + Sync {
    fn validate(&self, email: &str) -> Result<(), ServiceError>;
}

/// Syntax check, ASCII-only check, then domain blacklist. Stops at the first failure.
#[derive(Debug, Clone, Default)]
pub struct BlacklistEmailValidator {
    forbidden_domains: HashSet<String>,
}

impl BlacklistEmailValidator {
    pub fn new<I, S>(forbidden_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            forbidden_domains: forbidden_domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    fn validate_address(&self, email: &str) -> Result<(), ServiceError> {
        if !email.validate_email() {
            tracing::warn!(email = %email, "Rejected malformed email address");
            return Err(ServiceError::InvalidEmailAddress(
                "That email address is not valid".to_string(),
            ));
        }

        if !email.is_ascii() {
            return Err(ServiceError::InvalidEmailAddress(
                "Email must not contain non-ASCII characters".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_domain(&self, email: &str) -> Result<(), ServiceError> {
        let domain = email
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
            .to_lowercase();

        if self.forbidden_domains.contains(&domain) {
            tracing::info!(domain = %domain, "Rejected email from blocked domain");
            return Err(ServiceError::InvalidEmailAddress(
                "That domain is blocked".to_string(),
            ));
        }

        Ok(())
    }
}

impl EmailValidator for BlacklistEmailValidator {
    fn validate(&self, email: &str) -> Result<(), ServiceError> {
        self.validate_address(email)?;
        self.validate_domain(email)
    }
}
