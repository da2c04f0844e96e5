//! Market Data
//!
//! Time-series providers and the historical data cache used by the
//! backtesting engine.
//!
//! # Components
//!
//! - **SeriesProvider**: pluggable source of time-stamped price and
//!   lending-rate series
//! - **HttpSeriesProvider**: JSON-over-HTTP provider implementation
//! - **FixedSeriesProvider**: canned series for offline runs and tests
//! - **HistoricalDataCache**: prefetching cache answering point-in-time
//!   queries via interpolation, with per-asset fallbacks

pub mod cache;
pub mod provider;

pub use cache::{HistoricalDataCache, RateQuote};
pub use provider::{
    FixedSeriesProvider, HttpSeriesProvider, PricePoint, RatePoint, SeriesProvider,
};
