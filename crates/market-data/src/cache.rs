//! Prefetching historical data cache with point-in-time lookups.
//!
//! Prices answer via linear interpolation between the neighboring samples;
//! lending rates answer via the nearest sample. Provider failures never
//! propagate out of lookups: a missing, empty, or expired series degrades to
//! the per-asset fallback constants from the catalog.

use crate::provider::{PricePoint, RatePoint, SeriesProvider};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use strategy_core::types::AssetCatalog;
use tracing::{debug, warn};

/// Supply/borrow APY pair in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuote {
    pub supply_apy: Decimal,
    pub borrow_apy: Decimal,
}

/// A fetched series plus the metadata needed for TTL and coverage checks.
#[derive(Debug, Clone)]
struct SeriesEntry<T> {
    points: Vec<T>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
}

impl<T> SeriesEntry<T> {
    fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.window_start <= start && self.window_end >= end
    }
}

/// Read-mostly cache shared across concurrent simulations. Prefetch writes
/// are synchronized behind the series locks; lookups only take read locks.
pub struct HistoricalDataCache {
    provider: Arc<dyn SeriesProvider>,
    catalog: AssetCatalog,
    /// Entries older than this are treated as absent on next access.
    ttl: Duration,
    prices: RwLock<HashMap<String, SeriesEntry<PricePoint>>>,
    rates: RwLock<HashMap<String, SeriesEntry<RatePoint>>>,
}

impl HistoricalDataCache {
    /// Default entry time-to-live.
    pub const DEFAULT_TTL_SECS: i64 = 600;

    pub fn new(provider: Arc<dyn SeriesProvider>, catalog: AssetCatalog) -> Self {
        Self {
            provider,
            catalog,
            ttl: Duration::seconds(Self::DEFAULT_TTL_SECS),
            prices: RwLock::new(HashMap::new()),
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// Override the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fetch and memoize series for every asset over the window.
    ///
    /// Best effort: a failed fetch is logged and skipped, leaving lookups for
    /// that asset on fallback constants. Stablecoins are never fetched.
    pub async fn prefetch(&self, start: DateTime<Utc>, end: DateTime<Utc>, assets: &[String]) {
        for asset in assets {
            if self.catalog.is_stable(asset) {
                continue;
            }

            if self.has_fresh_prices(asset, start, end) {
                debug!(asset = %asset, "Price series already cached");
            } else {
                match self.provider.fetch_prices(asset, start, end).await {
                    Ok(points) => {
                        debug!(asset = %asset, samples = points.len(), "Fetched price series");
                        self.prices.write().expect("price lock poisoned").insert(
                            asset.clone(),
                            SeriesEntry {
                                points,
                                window_start: start,
                                window_end: end,
                                fetched_at: Utc::now(),
                            },
                        );
                    }
                    Err(e) => {
                        warn!(asset = %asset, error = %e, "Price fetch failed; using fallback constants");
                    }
                }
            }

            if self.has_fresh_rates(asset, start, end) {
                debug!(asset = %asset, "Rate series already cached");
            } else {
                match self.provider.fetch_rates(asset, start, end).await {
                    Ok(points) => {
                        debug!(asset = %asset, samples = points.len(), "Fetched rate series");
                        self.rates.write().expect("rate lock poisoned").insert(
                            asset.clone(),
                            SeriesEntry {
                                points,
                                window_start: start,
                                window_end: end,
                                fetched_at: Utc::now(),
                            },
                        );
                    }
                    Err(e) => {
                        warn!(asset = %asset, error = %e, "Rate fetch failed; using fallback constants");
                    }
                }
            }
        }
    }

    /// Price of `asset` at `timestamp`.
    ///
    /// Stablecoins are pinned to 1.0 without touching the cache. Between two
    /// samples the price is linearly interpolated; outside the sampled range
    /// the nearest sample's value is returned unchanged; with no usable
    /// series the catalog fallback applies.
    pub fn price_at(&self, asset: &str, timestamp: DateTime<Utc>) -> Decimal {
        if self.catalog.is_stable(asset) {
            return Decimal::ONE;
        }

        let prices = self.prices.read().expect("price lock poisoned");
        let entry = match prices.get(asset).filter(|e| self.is_fresh(e.fetched_at)) {
            Some(entry) if !entry.points.is_empty() => entry,
            _ => return self.catalog.fallback_price(asset),
        };

        // First sample strictly after the query time.
        let after_idx = entry.points.partition_point(|p| p.timestamp <= timestamp);
        let before = after_idx.checked_sub(1).map(|i| entry.points[i]);
        let after = entry.points.get(after_idx).copied();

        match (before, after) {
            (Some(b), Some(a)) => interpolate(b, a, timestamp),
            (Some(b), None) => b.price,
            (None, Some(a)) => a.price,
            (None, None) => self.catalog.fallback_price(asset),
        }
    }

    /// Lending APYs of `asset` at `timestamp`, from the nearest sample by
    /// absolute time distance, or the catalog fallback pair.
    pub fn apy_at(&self, asset: &str, timestamp: DateTime<Utc>) -> RateQuote {
        let rates = self.rates.read().expect("rate lock poisoned");
        let entry = match rates.get(asset).filter(|e| self.is_fresh(e.fetched_at)) {
            Some(entry) if !entry.points.is_empty() => entry,
            _ => {
                let (supply_apy, borrow_apy) = self.catalog.fallback_rates(asset);
                return RateQuote {
                    supply_apy,
                    borrow_apy,
                };
            }
        };

        let nearest = entry
            .points
            .iter()
            .min_by_key(|p| (p.timestamp - timestamp).num_seconds().abs())
            .expect("non-empty series");

        RateQuote {
            supply_apy: nearest.supply_apy,
            borrow_apy: nearest.borrow_apy,
        }
    }

    /// Whether a fresh, non-empty price series is cached for the asset.
    /// Stablecoins always count as covered.
    pub fn has_coverage(&self, asset: &str) -> bool {
        if self.catalog.is_stable(asset) {
            return true;
        }
        self.prices
            .read()
            .expect("price lock poisoned")
            .get(asset)
            .filter(|e| self.is_fresh(e.fetched_at))
            .map(|e| !e.points.is_empty())
            .unwrap_or(false)
    }

    fn is_fresh(&self, fetched_at: DateTime<Utc>) -> bool {
        Utc::now() - fetched_at < self.ttl
    }

    fn has_fresh_prices(&self, asset: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.prices
            .read()
            .expect("price lock poisoned")
            .get(asset)
            .map(|e| self.is_fresh(e.fetched_at) && e.covers(start, end))
            .unwrap_or(false)
    }

    fn has_fresh_rates(&self, asset: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.rates
            .read()
            .expect("rate lock poisoned")
            .get(asset)
            .map(|e| self.is_fresh(e.fetched_at) && e.covers(start, end))
            .unwrap_or(false)
    }
}

/// Linear interpolation between two bracketing samples.
fn interpolate(before: PricePoint, after: PricePoint, at: DateTime<Utc>) -> Decimal {
    let span = (after.timestamp - before.timestamp).num_seconds();
    if span <= 0 {
        return before.price;
    }
    let elapsed = (at - before.timestamp).num_seconds();
    let fraction = Decimal::from(elapsed) / Decimal::from(span);
    before.price + (after.price - before.price) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FixedSeriesProvider, MockSeriesProvider};
    use chrono::TimeZone;
    use strategy_core::Error;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    async fn cache_with_eth_series(points: Vec<PricePoint>) -> HistoricalDataCache {
        let provider = FixedSeriesProvider::new().with_prices("ETH", points);
        let cache = HistoricalDataCache::new(Arc::new(provider), AssetCatalog::default());
        cache
            .prefetch(ts(0), ts(23), &["ETH".to_string()])
            .await;
        cache
    }

    #[tokio::test]
    async fn test_interpolation_lies_between_samples() {
        let cache = cache_with_eth_series(vec![
            PricePoint {
                timestamp: ts(0),
                price: Decimal::new(2000, 0),
            },
            PricePoint {
                timestamp: ts(10),
                price: Decimal::new(3000, 0),
            },
        ])
        .await;

        // Exactly halfway through the span.
        assert_eq!(cache.price_at("ETH", ts(5)), Decimal::new(2500, 0));

        // Any strictly-interior point stays within the sample bounds.
        for hour in 1..10 {
            let price = cache.price_at("ETH", ts(hour));
            assert!(price >= Decimal::new(2000, 0) && price <= Decimal::new(3000, 0));
        }
    }

    #[tokio::test]
    async fn test_boundary_clamping() {
        let cache = cache_with_eth_series(vec![
            PricePoint {
                timestamp: ts(5),
                price: Decimal::new(2000, 0),
            },
            PricePoint {
                timestamp: ts(10),
                price: Decimal::new(2200, 0),
            },
        ])
        .await;

        assert_eq!(cache.price_at("ETH", ts(1)), Decimal::new(2000, 0));
        assert_eq!(cache.price_at("ETH", ts(20)), Decimal::new(2200, 0));
        // At a sample timestamp the sample itself is returned.
        assert_eq!(cache.price_at("ETH", ts(5)), Decimal::new(2000, 0));
    }

    #[tokio::test]
    async fn test_empty_series_uses_fallback() {
        let cache = cache_with_eth_series(vec![]).await;
        assert_eq!(cache.price_at("ETH", ts(3)), Decimal::new(2000, 0));
        assert!(!cache.has_coverage("ETH"));
    }

    #[tokio::test]
    async fn test_stablecoin_pinned_without_fetch() {
        let mut provider = MockSeriesProvider::new();
        // Stable assets must never reach the provider.
        provider.expect_fetch_prices().times(0);
        provider.expect_fetch_rates().times(0);

        let cache = HistoricalDataCache::new(Arc::new(provider), AssetCatalog::default());
        cache.prefetch(ts(0), ts(23), &["USDC".to_string()]).await;

        assert_eq!(cache.price_at("USDC", ts(7)), Decimal::ONE);
        assert!(cache.has_coverage("USDC"));
    }

    #[tokio::test]
    async fn test_fetch_failure_swallowed_into_fallback() {
        let mut provider = MockSeriesProvider::new();
        provider.expect_fetch_prices().returning(|_, _, _| {
            Err(Error::Provider {
                message: "upstream down".to_string(),
            })
        });
        provider.expect_fetch_rates().returning(|_, _, _| {
            Err(Error::Provider {
                message: "upstream down".to_string(),
            })
        });

        let cache = HistoricalDataCache::new(Arc::new(provider), AssetCatalog::default());
        cache.prefetch(ts(0), ts(23), &["ETH".to_string()]).await;

        assert_eq!(cache.price_at("ETH", ts(3)), Decimal::new(2000, 0));
        let quote = cache.apy_at("ETH", ts(3));
        assert_eq!(quote.supply_apy, Decimal::new(15, 1));
        assert_eq!(quote.borrow_apy, Decimal::new(3, 0));
    }

    #[tokio::test]
    async fn test_apy_uses_nearest_sample() {
        let provider = FixedSeriesProvider::new().with_rates(
            "ETH",
            vec![
                RatePoint {
                    timestamp: ts(0),
                    supply_apy: Decimal::ONE,
                    borrow_apy: Decimal::TWO,
                },
                RatePoint {
                    timestamp: ts(10),
                    supply_apy: Decimal::new(5, 0),
                    borrow_apy: Decimal::new(7, 0),
                },
            ],
        );
        let cache = HistoricalDataCache::new(Arc::new(provider), AssetCatalog::default());
        cache.prefetch(ts(0), ts(23), &["ETH".to_string()]).await;

        // No interpolation: 4h is closer to the first sample.
        assert_eq!(cache.apy_at("ETH", ts(4)).supply_apy, Decimal::ONE);
        assert_eq!(cache.apy_at("ETH", ts(6)).supply_apy, Decimal::new(5, 0));
    }

    #[tokio::test]
    async fn test_expired_entry_treated_as_absent() {
        let provider = FixedSeriesProvider::new().with_prices(
            "ETH",
            vec![PricePoint {
                timestamp: ts(0),
                price: Decimal::new(2500, 0),
            }],
        );
        let cache = HistoricalDataCache::new(Arc::new(provider), AssetCatalog::default())
            .with_ttl(Duration::zero());
        cache.prefetch(ts(0), ts(23), &["ETH".to_string()]).await;

        // The entry is immediately stale, so lookups fall back.
        assert_eq!(cache.price_at("ETH", ts(1)), Decimal::new(2000, 0));
        assert!(!cache.has_coverage("ETH"));
    }
}
