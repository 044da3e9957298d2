use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::DexQuoter;
use crate::error::FetchError;

const PANCAKESWAP_API: &str = "https://api.pancakeswap.info";

/// BNB's id on the crypto provider.
const REFERENCE_COIN: &str = "binancecoin";

#[derive(Clone)]
pub struct PancakeSwapClient {
    client: Client,
    base_api: String,
}

impl PancakeSwapClient {
    pub fn new(client: Client) -> Self {
        Self::with_base(client, PANCAKESWAP_API)
    }

    pub fn with_base(client: Client, base_api: impl Into<String>) -> Self {
        Self {
            client,
            base_api: base_api.into(),
        }
    }
}

#[async_trait]
impl DexQuoter for PancakeSwapClient {
    fn reference_coin(&self) -> &str {
        REFERENCE_COIN
    }

    async fn price_in_reference(&self, contract: &str) -> Result<String, FetchError> {
        let url = format!(
            "{}/api/v2/tokens/{}",
            self.base_api.trim_end_matches('/'),
            contract
        );

        let res: TokenResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(res.data.price_bnb)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(rename = "price_BNB")]
    price_bnb: String,
}
