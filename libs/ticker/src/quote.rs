use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading session an equity quote was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarketSession {
    Pre,
    #[default]
    Regular,
    Post,
}

impl MarketSession {
    /// Maps the provider's market state (`PRE`, `REGULAR`, `POST`, `CLOSED`, ...).
    pub fn from_state(state: &str) -> Self {
        match state {
            "PRE" => MarketSession::Pre,
            "POST" => MarketSession::Post,
            _ => MarketSession::Regular,
        }
    }
}

/// Strings the provider already formatted for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Formatted {
    pub price: String,
    pub change: String,
    pub change_percent: String,
}

/// Fields only some providers report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Extended {
    pub market_cap: String,
    pub circulating_supply: String,
    pub volume_24h: String,
    pub open: String,
}

/// Value of the instrument in a reference crypto (BTC).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PairQuote {
    pub price: f64,
    pub change: f64,
}

/// Normalized snapshot from one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub session: MarketSession,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub formatted: Option<Formatted>,
    #[serde(default)]
    pub extended: Option<Extended>,
    #[serde(default)]
    pub pair: Option<PairQuote>,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(price: f64, change: f64, change_percent: f64) -> Self {
        Self {
            price,
            change,
            change_percent,
            session: MarketSession::Regular,
            symbol: None,
            formatted: None,
            extended: None,
            pair: None,
            fetched_at: Utc::now(),
        }
    }

    /// A quote carrying only a price; tokens report no change figures.
    pub fn price_only(price: f64) -> Self {
        Self::new(price, 0.0, 0.0)
    }

    /// Time since the provider produced this quote; zero if the clock went
    /// backwards.
    pub fn age(&self) -> std::time::Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }
}
