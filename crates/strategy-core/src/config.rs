//! Configuration management for the strategy backtesting workspace.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Market data provider endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// The database section is optional: simulations run entirely in memory
    /// unless `DATABASE_URL` is set.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        });

        let provider = ProviderConfig {
            base_url: env::var("MARKET_DATA_URL").map_err(|_| Error::Config {
                message: "MARKET_DATA_URL environment variable not set".to_string(),
            })?,
            timeout_secs: env::var("MARKET_DATA_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        };

        Ok(Self { database, provider })
    }

    /// Load configuration for testing (with defaults).
    pub fn test_config() -> Self {
        Self {
            database: None,
            provider: ProviderConfig {
                base_url: "http://localhost:9000".to_string(),
                timeout_secs: 5,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::test_config();
        assert!(config.database.is_none());
        assert_eq!(config.provider.timeout_secs, 5);
    }
}
