use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::SmtpConfig;
use crate::services::ServiceError;

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn send_message(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SmtpMessageService {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpMessageService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let from: Mailbox = config
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| {
                ServiceError::EmailError(format!("invalid sender address: {}", e))
            })?;

        let mut builder = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| ServiceError::EmailError(e.to_string()))?
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, "SMTP message service initialized");

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MessageService for SmtpMessageService {
    async fn send_message(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ServiceError> {
        let to: Mailbox = to_email
            .parse()
            .map_err(|e: lettre::address::AddressError| ServiceError::EmailError(e.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| ServiceError::EmailError(e.to_string()))?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(ServiceError::EmailError(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Keeps messages in memory instead of sending them. Used when SMTP is not configured.
#[derive(Clone, Default)]
pub struct MockMessageService {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl MockMessageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MessageService for MockMessageService {
    async fn send_message(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ServiceError> {
        tracing::info!(to = %to_email, subject = %subject, "Mock email captured");
        self.sent.lock().await.push(SentMessage {
            to: to_email.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}
