//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_IMAP_HOST: &str = "outlook.office365.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_SMTP_HOST: &str = "smtp.outlook.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MODEL_PATH: &str = "phishing_detection_model.json";
pub const DEFAULT_VECTORIZER_PATH: &str = "vectorizer.json";

/// Mailbox settings for both the IMAP poller and the SMTP replier.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    /// Outbound credentials. Default to the inbound ones.
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
    pub poll_interval: Duration,
}

/// Locations of the pre-trained artifacts.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub vectorizer_path: PathBuf,
}

/// Whole-process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mail: MailConfig,
    pub model: ModelConfig,
    pub http_port: u16,
}

impl AppConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = required(&lookup, "CATCH_EMAIL_USER")?;
        let password = required(&lookup, "CATCH_EMAIL_PASS")?;

        let smtp_username = lookup("CATCH_SMTP_USER")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| username.clone());
        let smtp_password = lookup("CATCH_SMTP_PASS")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| password.clone());

        let from_address = lookup("CATCH_FROM_ADDRESS")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| username.clone());
        if !from_address.contains('@') {
            return Err(ConfigError::InvalidValue {
                key: "CATCH_FROM_ADDRESS".into(),
                message: format!("'{from_address}' is not an email address"),
            });
        }

        let mail = MailConfig {
            imap_host: lookup("CATCH_IMAP_HOST").unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string()),
            imap_port: parsed_or(&lookup, "CATCH_IMAP_PORT", DEFAULT_IMAP_PORT),
            smtp_host: lookup("CATCH_SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port: parsed_or(&lookup, "CATCH_SMTP_PORT", DEFAULT_SMTP_PORT),
            username,
            password: SecretString::from(password),
            smtp_username,
            smtp_password: SecretString::from(smtp_password),
            from_address,
            poll_interval: Duration::from_secs(
                parsed_or(&lookup, "CATCH_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS).max(1),
            ),
        };

        let model = ModelConfig {
            model_path: lookup("CATCH_MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            vectorizer_path: lookup("CATCH_VECTORIZER_PATH")
                .unwrap_or_else(|| DEFAULT_VECTORIZER_PATH.to_string())
                .into(),
        };

        Ok(Self {
            mail,
            model,
            http_port: parsed_or(&lookup, "CATCH_HTTP_PORT", DEFAULT_HTTP_PORT),
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
