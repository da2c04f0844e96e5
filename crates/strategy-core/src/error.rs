//! Error types for the strategy backtesting workspace.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data provider error: {message}")]
    Provider { message: String },

    #[error("Strategy not found: {0}")]
    StrategyNotFound(uuid::Uuid),

    #[error("Simulation error: {message}")]
    Simulation { message: String },

    #[error("Scheduler error: {message}")]
    Scheduler { message: String },
}

impl Error {
    /// Shorthand for a configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a simulation error with a message.
    pub fn simulation(message: impl Into<String>) -> Self {
        Error::Simulation {
            message: message.into(),
        }
    }

    /// Shorthand for a scheduler error with a message.
    pub fn scheduler(message: impl Into<String>) -> Self {
        Error::Scheduler {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
