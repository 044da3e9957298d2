use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{EquityProvider, EquitySnapshot, Field};
use crate::error::FetchError;

const YAHOO_API: &str = "https://query1.finance.yahoo.com";

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_api: String,
}

impl YahooClient {
    pub fn new(client: Client) -> Self {
        Self::with_base(client, YAHOO_API)
    }

    pub fn with_base(client: Client, base_api: impl Into<String>) -> Self {
        Self {
            client,
            base_api: base_api.into(),
        }
    }
}

#[async_trait]
impl EquityProvider for YahooClient {
    async fn equity_quote(&self, symbol: &str) -> Result<EquitySnapshot, FetchError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_api.trim_end_matches('/'),
            symbol
        );

        let res: QuoteSummaryResponse = self
            .client
            .get(url)
            .query(&[("modules", "price")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        res.into_snapshot().ok_or_else(|| FetchError::Empty {
            provider: "yahoo",
            symbol: symbol.to_string(),
        })
    }
}

//
// Match Yahoo quoteSummary JSON
// Numbers come as {"raw": 123.45, "fmt": "123.45"} or {} when absent.
//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PriceModule {
    market_state: Option<String>,
    regular_market_price: Value,
    regular_market_change: Value,
    regular_market_change_percent: Value,
    pre_market_change: Value,
    pre_market_change_percent: Value,
    post_market_change: Value,
    post_market_change_percent: Value,
    market_cap: Value,
    circulating_supply: Value,
    #[serde(rename = "volume24Hr")]
    volume_24h: Value,
    regular_market_open: Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Value {
    raw: Option<f64>,
    fmt: Option<String>,
}

impl From<Value> for Field {
    fn from(v: Value) -> Self {
        Field {
            raw: v.raw.unwrap_or_default(),
            fmt: v.fmt.unwrap_or_default(),
        }
    }
}

impl QuoteSummaryResponse {
    fn into_snapshot(self) -> Option<EquitySnapshot> {
        let price = self
            .quote_summary
            .result?
            .into_iter()
            .next()?
            .price?;

        Some(EquitySnapshot {
            market_state: price.market_state.unwrap_or_default(),
            price: price.regular_market_price.into(),
            regular_change: price.regular_market_change.into(),
            regular_change_percent: price.regular_market_change_percent.into(),
            pre_change: price.pre_market_change.into(),
            pre_change_percent: price.pre_market_change_percent.into(),
            post_change: price.post_market_change.into(),
            post_change_percent: price.post_market_change_percent.into(),
            market_cap: price.market_cap.into(),
            circulating_supply: price.circulating_supply.into(),
            volume_24h: price.volume_24h.into(),
            open: price.regular_market_open.into(),
        })
    }
}
