use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct UserManagementConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub database: Option<DatabaseConfig>,
    pub uaa: UaaConfig,
    pub cloud_controller: CloudControllerConfig,
    pub smtp: Option<SmtpConfig>,
    pub registration: RegistrationConfig,
    pub upstream: UpstreamConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UaaConfig {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudControllerConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    pub security_code_expiry_hours: i64,
    pub password_min_length: usize,
    pub forbidden_domains: Vec<String>,
    /// Console URL invitation links point at.
    pub invitation_base_url: String,
    /// Platform name shown in invitation emails.
    pub platform_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl UserManagementConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let store: StoreBackend = get_env("STORE_BACKEND", Some("memory"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let database = match store {
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), false)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), false)?,
            }),
            StoreBackend::Memory => None,
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: parse_env("SMTP_PORT", Some("587"), false)?,
                username: get_env("SMTP_USERNAME", Some(""), false)?,
                password: get_env("SMTP_PASSWORD", Some(""), false)?,
                from_email: get_env("SMTP_FROM", None, is_prod)?,
            }),
            Err(_) if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "SMTP_HOST is required in production but not set"
                )))
            }
            Err(_) => None,
        };

        let config = UserManagementConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("user-management"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            store,
            database,
            uaa: UaaConfig {
                url: get_env("UAA_URL", Some("http://localhost:8081"), is_prod)?,
                client_id: get_env("UAA_CLIENT_ID", Some("user-management"), is_prod)?,
                client_secret: get_env("UAA_CLIENT_SECRET", Some(""), is_prod)?,
            },
            cloud_controller: CloudControllerConfig {
                url: get_env("CC_URL", Some("http://localhost:8082"), is_prod)?,
            },
            smtp,
            registration: RegistrationConfig {
                security_code_expiry_hours: parse_env(
                    "SECURITY_CODE_EXPIRY_HOURS",
                    Some("24"),
                    false,
                )?,
                password_min_length: parse_env("PASSWORD_MIN_LENGTH", Some("6"), false)?,
                forbidden_domains: parse_list(&get_env("FORBIDDEN_DOMAINS", Some(""), false)?),
                invitation_base_url: get_env(
                    "INVITATION_BASE_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
                platform_name: get_env("PLATFORM_NAME", Some("Trusted Analytics"), false)?,
            },
            upstream: UpstreamConfig {
                timeout_seconds: parse_env("UPSTREAM_TIMEOUT_SECONDS", Some("10"), false)?,
                max_retries: parse_env("UPSTREAM_MAX_RETRIES", Some("3"), false)?,
            },
            allowed_origins: parse_list(&get_env(
                "ALLOWED_ORIGINS",
                Some("http://localhost:3000"),
                is_prod,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.registration.security_code_expiry_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SECURITY_CODE_EXPIRY_HOURS must be positive"
            )));
        }

        if self.registration.password_min_length == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_MIN_LENGTH must be positive"
            )));
        }

        if self.upstream.timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "UPSTREAM_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.store == StoreBackend::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND=memory is not allowed in production"
                )));
            }

            if self.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" => Ok(StoreBackend::Postgres),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" mailinator.com, ,Guerrillamail.com "),
            vec!["mailinator.com".to_string(), "Guerrillamail.com".to_string()]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_get_env_defaults_outside_prod() {
        let value = get_env("USER_MANAGEMENT_TEST_UNSET_KEY", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
        assert!(get_env("USER_MANAGEMENT_TEST_UNSET_KEY", Some("fallback"), true).is_err());
        assert!(get_env("USER_MANAGEMENT_TEST_UNSET_KEY", None, false).is_err());
    }

    #[test]
    fn test_parse_env_reports_key() {
        let err = parse_env::<u16>("USER_MANAGEMENT_TEST_UNSET_PORT", Some("not-a-port"), false)
            .unwrap_err();
        assert!(err.to_string().contains("USER_MANAGEMENT_TEST_UNSET_PORT"));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("redis".parse::<StoreBackend>().is_err());
    }
}
