//! Error taxonomy for watchers.
//!
//! Only [`SetupError`] is fatal to a watcher. Everything raised while
//! polling ([`TickError`], [`PublishError`]) is local to one tick.

use thiserror::Error;

use crate::session::GuildId;

/// Rejected watcher configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("frequency must be greater than zero")]
    ZeroFrequency,

    #[error("symbol is empty")]
    EmptySymbol,

    #[error("token instrument requires a network and a contract address")]
    MissingContract,
}

/// Failure reported by the chat-platform transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SessionError(pub String);

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A watcher could not be brought up and never starts polling.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("opening chat session: {0}")]
    Connect(SessionError),

    #[error("looking up session identity: {0}")]
    Identity(SessionError),
}

/// A provider (or the cache in front of it) did not produce a quote.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} returned no data for {symbol}")]
    Empty { provider: &'static str, symbol: String },

    #[error("{provider} does not support network {network}")]
    UnsupportedNetwork {
        provider: &'static str,
        network: String,
    },

    #[error("cache error: {0}")]
    Cache(String),
}

/// A provider payload could not be turned into a number.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unparsable {field}: {value:?}")]
pub struct FormatError {
    pub field: &'static str,
    pub value: String,
}

/// Why a tick was skipped.
#[derive(Error, Debug)]
pub enum TickError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// The chat platform rejected part of a presence update.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("setting nickname in guild {guild}: {source}")]
    Nickname { guild: GuildId, source: SessionError },

    #[error("guild {guild} is missing the tickers-red/tickers-green roles")]
    MissingRoles { guild: GuildId },

    #[error("updating color role in guild {guild}: {source}")]
    Role { guild: GuildId, source: SessionError },

    #[error("setting activity: {0}")]
    Activity(SessionError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a watcher for {0} is already running")]
    AlreadyRunning(String),
}
