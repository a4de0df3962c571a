//! Process configuration, read once from the environment at startup.
//!
//! A `.env` file in the working directory is loaded first when present.
//! Variables already set in the environment take precedence over it.
//!
//! | Variable | Default |
//! |---|---|
//! | `SHARDHOOK_BIND_ADDR` | `0.0.0.0:8802` |
//! | `SHARDHOOK_WEBHOOK_SECRET` | required |
//! | `SHARDHOOK_CACHE_REDIS_URL` | `redis://127.0.0.1:6379/1` |
//! | `SHARDHOOK_QUEUE_REDIS_URL` | `redis://127.0.0.1:6379/0` |
//! | `SHARDHOOK_TOPOLOGY` | `{"localhost": 1}` |
//! | `SHARDHOOK_GITHUB_APP_ID` | required |
//! | `SHARDHOOK_GITHUB_PRIVATE_KEY_PATH` | required |
//! | `SHARDHOOK_CONFIG_FILE` | `.shardhook.yml` |
//! | `SHARDHOOK_REDIRECT_URL` | `https://github.com/apps` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::shard::Topology;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub webhook_secret: String,
    pub cache_redis_url: String,
    pub queue_redis_url: String,
    pub topology: Topology,
    pub github_app_id: u64,
    pub github_private_key_path: PathBuf,
    /// Repository file whose presence enables refreshes.
    pub config_file: String,
    pub redirect_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());
        let require = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let bind_addr = get("SHARDHOOK_BIND_ADDR", "0.0.0.0:8802")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "SHARDHOOK_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let topology: Topology = serde_json::from_str(&get("SHARDHOOK_TOPOLOGY", r#"{"localhost": 1}"#))
            .map_err(|e| ConfigError::Invalid {
                var: "SHARDHOOK_TOPOLOGY",
                reason: e.to_string(),
            })?;

        let github_app_id = require("SHARDHOOK_GITHUB_APP_ID")?
            .parse()
            .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                var: "SHARDHOOK_GITHUB_APP_ID",
                reason: e.to_string(),
            })?;

        Ok(Config {
            bind_addr,
            webhook_secret: require("SHARDHOOK_WEBHOOK_SECRET")?,
            cache_redis_url: get("SHARDHOOK_CACHE_REDIS_URL", "redis://127.0.0.1:6379/1"),
            queue_redis_url: get("SHARDHOOK_QUEUE_REDIS_URL", "redis://127.0.0.1:6379/0"),
            topology,
            github_app_id,
            github_private_key_path: require("SHARDHOOK_GITHUB_PRIVATE_KEY_PATH")?.into(),
            config_file: get("SHARDHOOK_CONFIG_FILE", ".shardhook.yml"),
            redirect_url: get("SHARDHOOK_REDIRECT_URL", "https://github.com/apps"),
        })
    }
}
