use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::AggregatorQuoter;
use crate::error::FetchError;

const ONEINCH_API: &str = "https://api.1inch.io";

/// 10 whole tokens of an 18-decimal asset. Quoted into 6-decimal USDC this
/// makes the returned amount the USD price scaled by 10^7.
const QUOTE_AMOUNT: &str = "10000000000000000000";

/// Chain id and USDC address per supported network.
fn usdc_route(network: &str) -> Option<(u64, &'static str)> {
    match network.to_ascii_lowercase().as_str() {
        "ethereum" => Some((1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")),
        "polygon" => Some((137, "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174")),
        _ => None,
    }
}

#[derive(Clone)]
pub struct OneInchClient {
    client: Client,
    base_api: String,
}

impl OneInchClient {
    pub fn new(client: Client) -> Self {
        Self::with_base(client, ONEINCH_API)
    }

    pub fn with_base(client: Client, base_api: impl Into<String>) -> Self {
        Self {
            client,
            base_api: base_api.into(),
        }
    }
}

#[async_trait]
impl AggregatorQuoter for OneInchClient {
    async fn scaled_price(&self, network: &str, contract: &str) -> Result<String, FetchError> {
        let (chain, usdc) = usdc_route(network).ok_or_else(|| FetchError::UnsupportedNetwork {
            provider: "1inch",
            network: network.to_string(),
        })?;

        let url = format!(
            "{}/v5.0/{}/quote",
            self.base_api.trim_end_matches('/'),
            chain
        );

        let res: QuoteResponse = self
            .client
            .get(url)
            .query(&[
                ("fromTokenAddress", contract),
                ("toTokenAddress", usdc),
                ("amount", QUOTE_AMOUNT),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res.to_token_amount)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    to_token_amount: String,
}
