use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CryptoProvider, compact};
use crate::{
    error::FetchError,
    quote::{Extended, PairQuote, Quote},
};

const COINGECKO_API: &str = "https://api.coingecko.com";

#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_api: String,
}

impl CoinGeckoClient {
    pub fn new(client: Client) -> Self {
        Self::with_base(client, COINGECKO_API)
    }

    pub fn with_base(client: Client, base_api: impl Into<String>) -> Self {
        Self {
            client,
            base_api: base_api.into(),
        }
    }
}

#[async_trait]
impl CryptoProvider for CoinGeckoClient {
    async fn coin(&self, id: &str) -> Result<Quote, FetchError> {
        let url = format!(
            "{}/api/v3/coins/{}",
            self.base_api.trim_end_matches('/'),
            id
        );

        let res: CoinResponse = self
            .client
            .get(url)
            .query(&[
                ("localization", "false"),
                ("tickers", "false"),
                ("community_data", "false"),
                ("developer_data", "false"),
                ("market_data", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res.into())
    }
}

//
// Match CoinGecko /coins/{id} JSON
// https://docs.coingecko.com/reference/coins-id
//
#[derive(Debug, Deserialize)]
struct CoinResponse {
    symbol: String,
    market_data: MarketData,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MarketData {
    current_price: Currencies,
    price_change_24h_in_currency: Currencies,
    price_change_percentage_24h: Option<f64>,
    market_cap: Currencies,
    circulating_supply: Option<f64>,
    total_volume: Currencies,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Currencies {
    usd: f64,
    btc: f64,
}

impl From<CoinResponse> for Quote {
    fn from(res: CoinResponse) -> Self {
        let data = res.market_data;

        let mut quote = Quote::new(
            data.current_price.usd,
            data.price_change_24h_in_currency.usd,
            data.price_change_percentage_24h.unwrap_or_default(),
        );
        quote.symbol = Some(res.symbol);
        quote.pair = Some(PairQuote {
            price: data.current_price.btc,
            change: data.price_change_24h_in_currency.btc,
        });
        quote.extended = Some(Extended {
            market_cap: format!("${}", compact(data.market_cap.usd)),
            circulating_supply: compact(data.circulating_supply.unwrap_or_default()),
            volume_24h: format!("${}", compact(data.total_volume.usd)),
            open: String::new(),
        });

        quote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_coin_response() {
        let json = r#"{
            "id": "bitcoin",
            "symbol": "btc",
            "market_data": {
                "current_price": {"usd": 64000.5, "btc": 1.0, "eur": 59000.0},
                "price_change_24h_in_currency": {"usd": -1200.25, "btc": 0.0},
                "price_change_percentage_24h": -1.84,
                "market_cap": {"usd": 1260000000000.0},
                "circulating_supply": 19700000.0,
                "total_volume": {"usd": 31000000000.0}
            }
        }"#;

        let res: CoinResponse = serde_json::from_str(json).unwrap();
        let quote = Quote::from(res);

        assert_eq!(quote.price, 64000.5);
        assert_eq!(quote.change, -1200.25);
        assert_eq!(quote.change_percent, -1.84);
        assert_eq!(quote.symbol.as_deref(), Some("btc"));
        assert_eq!(quote.pair.unwrap().price, 1.0);

        let extended = quote.extended.unwrap();
        assert_eq!(extended.market_cap, "$1.26T");
        assert_eq!(extended.circulating_supply, "19.70M");
        assert_eq!(extended.volume_24h, "$31.00B");
    }
}
