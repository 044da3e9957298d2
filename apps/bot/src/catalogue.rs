use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use ticker::InstrumentConfig;

/// One watcher as listed in the tickers file.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Chat token of the account this watcher drives.
    pub session_token: String,
    #[serde(flatten)]
    pub config: InstrumentConfig,
}

/// Watchers that can be started, keyed by instrument key.
#[derive(Debug, Default)]
pub struct Catalogue {
    entries: BTreeMap<String, Entry>,
}

impl Catalogue {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let list: Vec<Entry> = serde_json::from_str(raw)?;
        let entries = list
            .into_iter()
            .map(|entry| (entry.config.key(), entry))
            .collect();

        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
