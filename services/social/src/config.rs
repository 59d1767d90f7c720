//! Service configuration
//!
//! Settings come from built-in defaults overridden by `SOCIAL_*` environment
//! variables, e.g. `SOCIAL_LISTEN_ADDR=0.0.0.0:9000`.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

/// Storage engine backing the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// How activation emails leave the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write the message to the log
    Log,
    /// POST the message to an HTTP mail relay
    Http,
}

/// What signup does with its writes when the activation email fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailFailurePolicy {
    /// Discard the new account and token
    Rollback,
    /// Keep the disabled account; recovery goes through resend-activation
    Keep,
}

/// Service settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    /// Prefix of the links embedded in activation emails
    pub public_base_url: String,
    pub storage: StorageBackend,
    pub mail_transport: MailTransport,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub mail_failure_policy: MailFailurePolicy,
    /// Upper bound on a single relay call, in seconds
    pub mail_timeout_seconds: u64,
    /// HS256 signing key; there is no default
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub jwt_expiry_seconds: u64,
}

impl AppConfig {
    /// Load settings from defaults and the environment
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default("listen_addr", "0.0.0.0:8080")?
            .set_default("public_base_url", "http://localhost:8080")?
            .set_default("storage", "postgres")?
            .set_default("mail_transport", "log")?
            .set_default("mail_from", "no-reply@flock.local")?
            .set_default("mail_failure_policy", "rollback")?
            .set_default("mail_timeout_seconds", 10)?
            .set_default("jwt_expiry_seconds", 900)?
            .add_source(Environment::with_prefix("SOCIAL").try_parsing(true))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;

        if config.mail_transport == MailTransport::Http && config.mail_relay_url.is_none() {
            anyhow::bail!("SOCIAL_MAIL_RELAY_URL is required when SOCIAL_MAIL_TRANSPORT=http");
        }

        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("SOCIAL_JWT_SECRET must be set");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "SOCIAL_LISTEN_ADDR",
        "SOCIAL_STORAGE",
        "SOCIAL_MAIL_TRANSPORT",
        "SOCIAL_MAIL_RELAY_URL",
        "SOCIAL_MAIL_FAILURE_POLICY",
        "SOCIAL_JWT_EXPIRY_SECONDS",
        "SOCIAL_JWT_SECRET",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    fn with_secret() {
        unsafe {
            std::env::set_var("SOCIAL_JWT_SECRET", "test-secret");
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        with_secret();

        let config = AppConfig::load().unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.public_base_url, "http://localhost:8080");
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.mail_transport, MailTransport::Log);
        assert_eq!(config.mail_failure_policy, MailFailurePolicy::Rollback);
        assert_eq!(config.jwt_expiry_seconds, 900);
        assert_eq!(config.mail_timeout_seconds, 10);
        assert!(config.mail_relay_url.is_none());
        assert_eq!(config.jwt_secret, "test-secret");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        with_secret();
        unsafe {
            std::env::set_var("SOCIAL_STORAGE", "memory");
            std::env::set_var("SOCIAL_MAIL_FAILURE_POLICY", "keep");
            std::env::set_var("SOCIAL_JWT_EXPIRY_SECONDS", "60");
        }

        let config = AppConfig::load().unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.mail_failure_policy, MailFailurePolicy::Keep);
        assert_eq!(config.jwt_expiry_seconds, 60);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_http_transport_needs_relay_url() {
        clear_env();
        with_secret();
        unsafe {
            std::env::set_var("SOCIAL_MAIL_TRANSPORT", "http");
        }

        assert!(AppConfig::load().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_jwt_secret_is_required() {
        clear_env();
        assert!(AppConfig::load().is_err());

        unsafe {
            std::env::set_var("SOCIAL_JWT_SECRET", "   ");
        }
        assert!(AppConfig::load().is_err());

        clear_env();
    }
}
