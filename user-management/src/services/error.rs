use reqwest::StatusCode;
use service_core::error::AppError;
use service_core::http::{is_retryable_status, Retryable};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidEmailAddress(String),

    #[error("Invalid security code: {0}")]
    InvalidSecurityCode(String),

    #[error("No pending invitation for this email address")]
    NoPendingInvitation,

    #[error("{0}")]
    IllegalPassword(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    InvalidAccessGrant(String),

    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream service rejected the request: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Map a non-success upstream response to the error taxonomy.
    pub fn from_upstream_status(service: &str, status: StatusCode, body: &str) -> Self {
        if is_retryable_status(status) || status.is_server_error() {
            ServiceError::UpstreamUnavailable(format!("{} returned {}", service, status))
        } else {
            ServiceError::Upstream(format!("{} returned {}: {}", service, status, body))
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ServiceError::UpstreamUnavailable(err.to_string())
        } else {
            ServiceError::Upstream(err.to_string())
        }
    }
}

impl Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::UpstreamUnavailable(_))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidEmailAddress(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::InvalidSecurityCode(_) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid security code"))
            }
            ServiceError::NoPendingInvitation => AppError::BadRequest(anyhow::anyhow!(
                "No pending invitation for this email address"
            )),
            ServiceError::IllegalPassword(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::InvalidAccessGrant(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::UserAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("User already exists"))
            }
            ServiceError::UpstreamUnavailable(msg) => AppError::ServiceUnavailable(msg),
            ServiceError::Upstream(msg) => AppError::BadGateway(msg),
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::EmailError(msg) => AppError::EmailError(msg),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
