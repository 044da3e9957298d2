use std::{env::var, path::PathBuf, time::Duration};

use anyhow::{Context, Result};

#[derive(Clone)]
pub struct Config {
    /// Token of the admin bot serving slash commands; none runs headless.
    pub discord_token: Option<String>,
    pub version: String,
    pub tickers_file: PathBuf,
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub cache_ttl: Duration,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            discord_token: var("DISCORD_TOKEN").ok().filter(|t| !t.is_empty()),
            version: var("APP_VERSION").unwrap_or_else(|_| "Unknown".to_string()),
            tickers_file: var("TICKERS_FILE")
                .unwrap_or_else(|_| "tickers.json".to_string())
                .into(),
            redis_url: var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            redis_key_prefix: var("REDIS_KEY_PREFIX").unwrap_or_else(|_| "ticker".to_string()),
            cache_ttl: Duration::from_secs(secs("CACHE_TTL_SECS", 30)?),
            http_timeout: Duration::from_secs(secs("HTTP_TIMEOUT_SECS", 10)?),
        })
    }
}

fn secs(name: &str, default: u64) -> Result<u64> {
    match var(name) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{name} must be a whole number of seconds")),
        Err(_) => Ok(default),
    }
}
