use std::time::Duration;

use bon::Builder;
use strum::{Display, EnumString};

/// Origin of the studio backend when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
/// Path prefix every API route lives under.
pub const API_PREFIX: &str = "/api/v1";
/// Timeout for ordinary requests.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Resume optimization runs an LLM pass on the backend and needs longer.
pub const OPTIMIZE_TIMEOUT: Duration = Duration::from_secs(180);

/// Longest chat message the UI accepts.
pub const MAX_MESSAGE_LENGTH: usize = 10_000;
/// Messages kept in a chat history before the oldest are dropped.
pub const MAX_MESSAGES_HISTORY: usize = 100;

pub const ENV_API_BASE_URL: &str = "STUDIO_API_BASE_URL";
pub const ENV_API_TIMEOUT_SECS: &str = "STUDIO_API_TIMEOUT_SECS";
pub const ENV_ENVIRONMENT: &str = "STUDIO_ENV";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid number of seconds: {value}")]
    InvalidTimeout { name: &'static str, value: String },
    #[error("{name} must be `development` or `production`, got {value}")]
    InvalidEnvironment { name: &'static str, value: String },
}

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct StudioConfig {
    #[builder(default = DEFAULT_API_BASE_URL.to_string(), into)]
    pub api_base_url: String,
    #[builder(default = API_PREFIX.to_string(), into)]
    pub api_prefix: String,
    #[builder(default = API_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default)]
    pub environment: Environment,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl StudioConfig {
    /// Read the configuration from `STUDIO_*` environment variables.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from any variable lookup; unset or blank values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_BASE_URL) {
            config.api_base_url = url.trim().to_string();
        }

        if let Some(value) = get(ENV_API_TIMEOUT_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout {
                    name: ENV_API_TIMEOUT_SECS,
                    value: value.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(value) = get(ENV_ENVIRONMENT) {
            config.environment =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnvironment {
                        name: ENV_ENVIRONMENT,
                        value: value.clone(),
                    })?;
        }

        Ok(config)
    }

    /// Base URL all API routes are relative to, e.g. `http://localhost:8000/api/v1`.
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
    }
}
