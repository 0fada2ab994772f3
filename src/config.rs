//! Endpoint conventions that applications may override.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_PREFIX: &str = "api";
pub const API_PREFIX_ENV: &str = "API_ROUTE_PREFIX";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOptions {
    /// First path segment of every conventional route group, without slashes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

impl Default for EndpointOptions {
    fn default() -> Self {
        EndpointOptions {
            api_prefix: default_api_prefix(),
        }
    }
}

impl EndpointOptions {
    pub fn with_api_prefix(prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let api_prefix = normalize_prefix(&prefix.into())?;
        Ok(EndpointOptions { api_prefix })
    }

    /// Defaults overridden by `API_ROUTE_PREFIX` when set. A `.env` file is loaded first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        match std::env::var(API_PREFIX_ENV) {
            Ok(prefix) => Self::with_api_prefix(prefix),
            Err(_) => Ok(Self::default()),
        }
    }
}

fn normalize_prefix(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidOption {
            name: API_PREFIX_ENV,
            message: "prefix must not be empty".into(),
        });
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c == ':' || c == '*') {
        return Err(ConfigError::InvalidOption {
            name: API_PREFIX_ENV,
            message: format!("{trimmed:?} is not a static path"),
        });
    }
    Ok(trimmed.to_string())
}
