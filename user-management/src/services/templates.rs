//! Email bodies rendered from askama templates under `templates/`.

use askama::Template;
use std::collections::HashMap;

use crate::services::ServiceError;

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, variables: &HashMap<String, String>)
        -> Result<String, ServiceError>;
}

pub const INVITE_TEMPLATE: &str = "invite";

#[derive(Template)]
#[template(path = "invite.html")]
pub struct InviteTemplate<'a> {
    pub service_name: &'a str,
    pub email: &'a str,
    pub current_user: &'a str,
    pub accounts_url: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateRenderer for BuiltinTemplates {
    fn render(
        &self,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, ServiceError> {
        let var = |key: &str| {
            variables.get(key).map(String::as_str).ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!(
                    "template {} is missing variable {}",
                    name,
                    key
                ))
            })
        };

        let template = match name {
            INVITE_TEMPLATE => InviteTemplate {
                service_name: var("serviceName")?,
                email: var("email")?,
                current_user: var("currentUser")?,
                accounts_url: var("accountsUrl")?,
            },
            _ => {
                return Err(ServiceError::Internal(anyhow::anyhow!(
                    "unknown template: {}",
                    name
                )))
            }
        };

        template
            .render()
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))
    }
}
