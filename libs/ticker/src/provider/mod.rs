//! Price-provider clients.
//!
//! Each provider sits behind a trait so watchers can be driven by fakes.

mod cache;
mod coingecko;
mod oneinch;
mod pancakeswap;
mod yahoo;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};

use crate::{error::FetchError, quote::Quote};

pub use cache::{QuoteCache, RedisQuoteCache};
pub use coingecko::CoinGeckoClient;
pub use oneinch::OneInchClient;
pub use pancakeswap::PancakeSwapClient;
pub use yahoo::YahooClient;

/// A number as reported by the provider, raw and pre-formatted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Field {
    pub raw: f64,
    pub fmt: String,
}

impl Field {
    pub fn new(raw: f64, fmt: impl Into<String>) -> Self {
        Self {
            raw,
            fmt: fmt.into(),
        }
    }
}

/// Equity quote before a market session has been picked.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquitySnapshot {
    pub market_state: String,
    pub price: Field,
    pub regular_change: Field,
    pub regular_change_percent: Field,
    pub pre_change: Field,
    pub pre_change_percent: Field,
    pub post_change: Field,
    pub post_change_percent: Field,
    pub market_cap: Field,
    pub circulating_supply: Field,
    pub volume_24h: Field,
    pub open: Field,
}

#[async_trait]
pub trait EquityProvider: Send + Sync {
    async fn equity_quote(&self, symbol: &str) -> Result<EquitySnapshot, FetchError>;

    /// USD to `currency` rate, read from the `<CUR>=X` pseudo-ticker.
    async fn fx_rate(&self, currency: &str) -> Result<f64, FetchError> {
        let snapshot = self.equity_quote(&format!("{currency}=X")).await?;
        Ok(snapshot.price.raw)
    }
}

#[async_trait]
pub trait CryptoProvider: Send + Sync {
    async fn coin(&self, id: &str) -> Result<Quote, FetchError>;
}

/// On-chain pool quoter; prices come back in a reference coin.
#[async_trait]
pub trait DexQuoter: Send + Sync {
    /// Crypto provider id of the coin prices are denominated in.
    fn reference_coin(&self) -> &str;

    async fn price_in_reference(&self, contract: &str) -> Result<String, FetchError>;
}

/// Aggregator quoter; prices come back as a fixed-point integer string.
#[async_trait]
pub trait AggregatorQuoter: Send + Sync {
    async fn scaled_price(&self, network: &str, contract: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct CacheHandle {
    pub cache: Arc<dyn QuoteCache>,
    pub ttl: Duration,
}

/// Every collaborator a watcher may need to produce quotes.
#[derive(Clone)]
pub struct Providers {
    pub equity: Arc<dyn EquityProvider>,
    pub crypto: Arc<dyn CryptoProvider>,
    pub dex: Arc<dyn DexQuoter>,
    pub aggregator: Arc<dyn AggregatorQuoter>,
    pub cache: Option<CacheHandle>,
}

impl Providers {
    /// Default HTTP clients sharing one connection pool.
    pub fn http(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            equity: Arc::new(YahooClient::new(client.clone())),
            crypto: Arc::new(CoinGeckoClient::new(client.clone())),
            dex: Arc::new(PancakeSwapClient::new(client.clone())),
            aggregator: Arc::new(OneInchClient::new(client)),
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn QuoteCache>, ttl: Duration) -> Self {
        self.cache = Some(CacheHandle { cache, ttl });
        self
    }
}

/// Compact rendering for large figures: `2.5T`, `41.07B`, `980.00M`.
pub(crate) fn compact(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "k")];

    UNITS
        .iter()
        .find(|(scale, _)| value.abs() >= *scale)
        .map(|(scale, unit)| format!("{:.2}{}", value / scale, unit))
        .unwrap_or_else(|| format!("{value:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compacts_large_numbers() {
        assert_eq!(compact(2_500_000_000_000.0), "2.50T");
        assert_eq!(compact(41_070_000_000.0), "41.07B");
        assert_eq!(compact(19_600_000.0), "19.60M");
        assert_eq!(compact(1_500.0), "1.50k");
        assert_eq!(compact(12.0), "12.00");
    }
}
