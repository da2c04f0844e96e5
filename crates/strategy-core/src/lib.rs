//! Strategy Core Library
//!
//! Shared types, configuration, and persistence for the strategy backtesting
//! workspace.

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
