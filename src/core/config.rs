use config::Config;
use serde::Deserialize;
use std::time::Duration;

use crate::core::error::ConfigError;

/// Upper bound on `token_ttl`, one hundred years.
const MAX_TOKEN_TTL: u64 = 100 * 365 * 86_400;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Args {
    pub(crate) log_level: String,
    pub(crate) port: u16,
    pub(crate) secret: String,
    /// Credential lifetime in seconds.
    pub(crate) token_ttl: u64,
    /// Redis connection string. The in-memory backend is used when unset.
    pub(crate) store_url: Option<String>,
    pub(crate) store_prefix: String,
    pub(crate) store_timeout_ms: u64,
    pub(crate) request_timeout_ms: u64,
    pub(crate) database_host: String,
    pub(crate) database_port: u16,
    pub(crate) database_name: String,
    pub(crate) database_user: String,
    pub(crate) database_password: String,
}

impl Args {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("log_level", "info")?
            .set_default("port", 8080)?
            .set_default("token_ttl", 86_400)?
            .set_default("store_prefix", "authcore:")?
            .set_default("store_timeout_ms", 2_000)?
            .set_default("request_timeout_ms", 10_000)?
            .set_default("database_port", 5432)?
            .add_source(config::Environment::with_prefix("AUTHCORE"))
            .build()?;

        let args = config.try_deserialize::<Args>()?;
        args.validate()?;

        Ok(args)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::InvalidSetting("secret must not be empty"));
        }

        if self.token_ttl == 0 {
            return Err(ConfigError::InvalidSetting("token_ttl must be at least 1 second"));
        }

        if self.token_ttl > MAX_TOKEN_TTL {
            return Err(ConfigError::InvalidSetting("token_ttl must not exceed 100 years"));
        }

        if self.store_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting("timeouts must be non-zero"));
        }

        Ok(())
    }

    pub(crate) fn database_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.database_user,
            self.database_password,
            self.database_host,
            self.database_port,
            self.database_name
        )
    }

    pub(crate) fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl)
    }

    pub(crate) fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
