//! Quote sources, one per instrument kind.
//!
//! The variant is chosen once from the watcher's config; the polling loop
//! only ever calls [`QuoteSource::fetch`].

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    config::{InstrumentConfig, InstrumentKind, TokenBackend},
    error::{ConfigError, FormatError, TickError},
    provider::{
        AggregatorQuoter, CacheHandle, CryptoProvider, DexQuoter, EquityProvider, EquitySnapshot,
        Providers,
    },
    quote::{Extended, Formatted, MarketSession, Quote},
};

/// Aggregator prices are USD scaled by this factor.
pub const AGGREGATOR_SCALE: f64 = 10_000_000.0;

pub enum QuoteSource {
    Equity(EquitySource),
    Crypto(CryptoSource),
    Token(TokenSource),
}

impl QuoteSource {
    pub fn from_config(config: &InstrumentConfig, providers: &Providers) -> Result<Self, ConfigError> {
        let source = match config.kind {
            InstrumentKind::Equity => QuoteSource::Equity(EquitySource {
                symbol: config.symbol.clone(),
                provider: Arc::clone(&providers.equity),
            }),
            InstrumentKind::Crypto => QuoteSource::Crypto(CryptoSource {
                id: config.symbol.clone(),
                provider: Arc::clone(&providers.crypto),
                cache: providers.cache.clone(),
            }),
            InstrumentKind::Token => {
                let token = config.token.as_ref().ok_or(ConfigError::MissingContract)?;
                let backend = match token.source {
                    TokenBackend::PancakeSwap => TokenBackendClient::Dex {
                        dex: Arc::clone(&providers.dex),
                        reference: Arc::clone(&providers.crypto),
                    },
                    TokenBackend::OneInch => TokenBackendClient::Aggregator {
                        network: token.network.clone(),
                        aggregator: Arc::clone(&providers.aggregator),
                    },
                };
                QuoteSource::Token(TokenSource {
                    contract: token.contract.clone(),
                    backend,
                })
            }
        };

        Ok(source)
    }

    pub async fn fetch(&self) -> Result<Quote, TickError> {
        match self {
            QuoteSource::Equity(s) => s.fetch().await,
            QuoteSource::Crypto(s) => s.fetch().await,
            QuoteSource::Token(s) => s.fetch().await,
        }
    }
}

pub struct EquitySource {
    symbol: String,
    provider: Arc<dyn EquityProvider>,
}

impl EquitySource {
    async fn fetch(&self) -> Result<Quote, TickError> {
        let snapshot = self.provider.equity_quote(&self.symbol).await?;
        Ok(session_quote(snapshot))
    }
}

/// Picks the change figures matching the session the market is in.
fn session_quote(snapshot: EquitySnapshot) -> Quote {
    let session = MarketSession::from_state(&snapshot.market_state);
    let (change, percent) = match session {
        MarketSession::Post => (snapshot.post_change, snapshot.post_change_percent),
        MarketSession::Pre => (snapshot.pre_change, snapshot.pre_change_percent),
        MarketSession::Regular => (snapshot.regular_change, snapshot.regular_change_percent),
    };

    let mut quote = Quote::new(snapshot.price.raw, change.raw, percent.raw);
    quote.session = session;
    quote.formatted = Some(Formatted {
        price: snapshot.price.fmt,
        change: change.fmt,
        change_percent: percent.fmt,
    });
    quote.extended = Some(Extended {
        market_cap: snapshot.market_cap.fmt,
        circulating_supply: snapshot.circulating_supply.fmt,
        volume_24h: snapshot.volume_24h.fmt,
        open: snapshot.open.fmt,
    });
    quote
}

pub struct CryptoSource {
    id: String,
    provider: Arc<dyn CryptoProvider>,
    cache: Option<CacheHandle>,
}

impl CryptoSource {
    async fn fetch(&self) -> Result<Quote, TickError> {
        let Some(cache) = &self.cache else {
            return Ok(self.provider.coin(&self.id).await?);
        };

        match cache.cache.get(&self.id).await {
            Ok(Some(quote)) if quote.age() <= cache.ttl => {
                debug!(id = %self.id, age = ?quote.age(), "quote cache hit");
                return Ok(quote);
            }
            Ok(Some(quote)) => debug!(id = %self.id, age = ?quote.age(), "cached quote is stale"),
            Ok(None) => debug!(id = %self.id, "quote cache miss"),
            Err(e) => warn!(id = %self.id, error = %e, "quote cache read failed"),
        }

        let quote = self.provider.coin(&self.id).await?;
        if let Err(e) = cache.cache.set(&self.id, &quote, cache.ttl).await {
            warn!(id = %self.id, error = %e, "quote cache write failed");
        }

        Ok(quote)
    }
}

enum TokenBackendClient {
    Dex {
        dex: Arc<dyn DexQuoter>,
        reference: Arc<dyn CryptoProvider>,
    },
    Aggregator {
        network: String,
        aggregator: Arc<dyn AggregatorQuoter>,
    },
}

pub struct TokenSource {
    contract: String,
    backend: TokenBackendClient,
}

impl TokenSource {
    async fn fetch(&self) -> Result<Quote, TickError> {
        let price = match &self.backend {
            TokenBackendClient::Dex { dex, reference } => {
                let raw = dex.price_in_reference(&self.contract).await?;
                let in_reference = parse_price("dex price", &raw)?;
                let reference_usd = reference.coin(dex.reference_coin()).await?.price;
                reference_usd * in_reference
            }
            TokenBackendClient::Aggregator {
                network,
                aggregator,
            } => {
                let raw = aggregator.scaled_price(network, &self.contract).await?;
                parse_price("aggregator price", &raw)? / AGGREGATOR_SCALE
            }
        };

        Ok(Quote::price_only(price))
    }
}

fn parse_price(field: &'static str, value: &str) -> Result<f64, FormatError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FormatError {
            field,
            value: value.to_string(),
        })
}
