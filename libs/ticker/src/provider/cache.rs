use std::time::Duration;

use anyhow::Error;
use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Expiration;
use tracing::error;

use crate::{error::FetchError, quote::Quote};

/// Shared quote cache for crypto watchers. Must be safe to use from many
/// watchers at once.
#[async_trait]
pub trait QuoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Quote>, FetchError>;

    async fn set(&self, key: &str, quote: &Quote, ttl: Duration) -> Result<(), FetchError>;
}

#[derive(Clone)]
pub struct RedisQuoteCache {
    client: Client,
    key_prefix: String,
}

impl RedisQuoteCache {
    /// Connects and waits for the first connection. Keys are written under
    /// `{prefix}:quote:`.
    pub async fn connect(
        redis_url: &str,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let client = Builder::from_config(Config::from_url(redis_url)?)
            .with_connection_config(|conn| {
                conn.connection_timeout = timeout;
                conn.tcp.nodelay = Some(true);
            })
            .build()?;

        client.on_error(|(error, server)| async move {
            error!(?server, %error, "quote cache connection error");
            Ok(())
        });

        client.connect();
        client.wait_for_connect().await?;

        Ok(Self {
            client,
            key_prefix: prefix.into(),
        })
    }

    fn quote_key(&self, name: &str) -> String {
        format!("{}:quote:{}", self.key_prefix, name.trim().to_lowercase())
    }
}

fn cache_error(e: impl std::fmt::Display) -> FetchError {
    FetchError::Cache(e.to_string())
}

#[async_trait]
impl QuoteCache for RedisQuoteCache {
    async fn get(&self, key: &str) -> Result<Option<Quote>, FetchError> {
        let raw: Option<String> = self
            .client
            .get(self.quote_key(key))
            .await
            .map_err(cache_error)?;

        raw.map(|s| serde_json::from_str(&s).map_err(cache_error))
            .transpose()
    }

    async fn set(&self, key: &str, quote: &Quote, ttl: Duration) -> Result<(), FetchError> {
        let value = serde_json::to_string(quote).map_err(cache_error)?;
        let seconds = ttl.as_secs().max(1) as i64;

        let _: () = self
            .client
            .set(
                self.quote_key(key),
                value,
                Some(Expiration::EX(seconds)),
                None,
                false,
            )
            .await
            .map_err(cache_error)?;

        Ok(())
    }
}
