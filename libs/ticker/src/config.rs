use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Precision used for token prices when none (or an unsupported one) is set.
pub const DEFAULT_TOKEN_DECIMALS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Equity,
    Crypto,
    Token,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Equity => "equity",
            InstrumentKind::Crypto => "crypto",
            InstrumentKind::Token => "token",
        }
    }
}

/// Price backend for on-chain tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenBackend {
    /// Aggregator quote into USDC, fixed-point integer result.
    #[default]
    #[serde(rename = "1inch")]
    OneInch,

    /// DEX pool price denominated in BNB.
    #[serde(rename = "pancakeswap")]
    PancakeSwap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub network: String,
    pub contract: String,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub source: TokenBackend,
}

impl TokenConfig {
    /// Fractional digits to render: 1..=11 as configured, otherwise the default.
    pub fn precision(&self) -> usize {
        match self.decimals {
            Some(d @ 1..=11) => d as usize,
            _ => DEFAULT_TOKEN_DECIMALS,
        }
    }
}

/// Immutable per-watcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub kind: InstrumentKind,

    /// Ticker for equities, provider id for crypto, label for tokens.
    #[serde(default)]
    pub symbol: String,

    /// Display name override.
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Polling interval in seconds.
    #[serde(rename = "frequency")]
    pub frequency_secs: u64,

    #[serde(default)]
    pub nickname: bool,

    #[serde(default)]
    pub color: bool,

    #[serde(default)]
    pub extended_activity: bool,

    /// Empty means automatic up/down arrows.
    #[serde(default)]
    pub decorator: String,

    /// Show crypto value in BTC instead of USD.
    #[serde(default)]
    pub bitcoin: bool,

    #[serde(default, deserialize_with = "custom_messages")]
    pub activity: Vec<String>,

    #[serde(default)]
    pub token: Option<TokenConfig>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Accepts either a list or the legacy `;`-joined string.
fn custom_messages<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Messages {
        Joined(String),
        List(Vec<String>),
    }

    let messages = match Messages::deserialize(deserializer)? {
        Messages::Joined(s) => s.split(';').map(str::to_string).collect(),
        Messages::List(v) => v,
    };

    Ok(messages.into_iter().filter(|m| !m.is_empty()).collect())
}

impl InstrumentConfig {
    pub fn new(kind: InstrumentKind, symbol: impl Into<String>, frequency_secs: u64) -> Self {
        Self {
            kind,
            symbol: symbol.into(),
            name: String::new(),
            currency: default_currency(),
            frequency_secs,
            nickname: false,
            color: false,
            extended_activity: false,
            decorator: String::new(),
            bitcoin: false,
            activity: Vec::new(),
            token: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_secs == 0 {
            return Err(ConfigError::ZeroFrequency);
        }

        match (&self.kind, &self.token) {
            (InstrumentKind::Token, Some(t)) if !t.network.is_empty() && !t.contract.is_empty() => {
                Ok(())
            }
            (InstrumentKind::Token, _) => Err(ConfigError::MissingContract),
            _ if self.symbol.trim().is_empty() => Err(ConfigError::EmptySymbol),
            _ => Ok(()),
        }
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_secs)
    }

    /// Identity of the instrument; at most one watcher runs per key.
    pub fn key(&self) -> String {
        match (&self.kind, &self.token) {
            (InstrumentKind::Token, Some(t)) => {
                format!(
                    "token:{}:{}",
                    t.network.to_lowercase(),
                    t.contract.to_lowercase()
                )
            }
            _ => format!("{}:{}", self.kind.as_str(), self.symbol.to_lowercase()),
        }
    }

    /// Configured display name, if any.
    pub fn display_name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|n| !n.is_empty())
    }

    pub fn is_usd(&self) -> bool {
        self.currency.eq_ignore_ascii_case("USD")
    }

    pub fn auto_decorator(&self) -> bool {
        self.decorator.is_empty()
    }

    pub fn token_precision(&self) -> usize {
        self.token
            .as_ref()
            .map_or(DEFAULT_TOKEN_DECIMALS, TokenConfig::precision)
    }
}
