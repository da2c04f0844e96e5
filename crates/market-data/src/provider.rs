//! Time-series data providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strategy_core::{Error, Result};

/// One price sample. Series are sorted ascending by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// One lending-rate sample (APYs in percent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub timestamp: DateTime<Utc>,
    pub supply_apy: Decimal,
    pub borrow_apy: Decimal,
}

/// Source of historical series for one asset over a time range.
///
/// The only contract is "time-ordered numeric series in"; transport and
/// upstream schema are implementation details.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    async fn fetch_prices(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>>;

    async fn fetch_rates(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RatePoint>>;
}

/// JSON-over-HTTP provider.
///
/// Expects `GET {base}/v1/prices/{asset}?from=&to=` and
/// `GET {base}/v1/rates/{asset}?from=&to=` returning arrays of samples.
pub struct HttpSeriesProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSeriesProvider {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_series<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<T>> {
        let url = format!("{}/v1/{}/{}", self.base_url, path, asset);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("from", start.timestamp().to_string()),
                ("to", end.timestamp().to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Provider {
                message: format!(
                    "series request for {asset} failed with status {}",
                    response.status()
                ),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SeriesProvider for HttpSeriesProvider {
    async fn fetch_prices(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>> {
        let mut points: Vec<PricePoint> = self.get_series("prices", asset, start, end).await?;
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn fetch_rates(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RatePoint>> {
        let mut points: Vec<RatePoint> = self.get_series("rates", asset, start, end).await?;
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

/// Provider serving canned series, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedSeriesProvider {
    prices: HashMap<String, Vec<PricePoint>>,
    rates: HashMap<String, Vec<RatePoint>>,
}

impl FixedSeriesProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(mut self, asset: &str, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        self.prices.insert(asset.to_string(), points);
        self
    }

    pub fn with_rates(mut self, asset: &str, mut points: Vec<RatePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        self.rates.insert(asset.to_string(), points);
        self
    }

    /// Canned provider holding a flat price series for each (asset, price)
    /// pair across the whole window.
    pub fn flat(
        assets: &[(&str, Decimal)],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let mut provider = Self::new();
        for (asset, price) in assets {
            provider = provider.with_prices(
                asset,
                vec![
                    PricePoint {
                        timestamp: start,
                        price: *price,
                    },
                    PricePoint {
                        timestamp: end,
                        price: *price,
                    },
                ],
            );
        }
        provider
    }
}

#[async_trait]
impl SeriesProvider for FixedSeriesProvider {
    async fn fetch_prices(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>> {
        Ok(self
            .prices
            .get(asset)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_rates(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RatePoint>> {
        Ok(self
            .rates
            .get(asset)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_fixed_provider_filters_window() {
        let start = Utc::now();
        let provider = FixedSeriesProvider::new().with_prices(
            "ETH",
            vec![
                PricePoint {
                    timestamp: start,
                    price: Decimal::new(2000, 0),
                },
                PricePoint {
                    timestamp: start + Duration::days(2),
                    price: Decimal::new(2100, 0),
                },
            ],
        );

        let points = provider
            .fetch_prices("ETH", start, start + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);

        let empty = provider
            .fetch_prices("WBTC", start, start + Duration::days(1))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }
}
