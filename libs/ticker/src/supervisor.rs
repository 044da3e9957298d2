use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::{info, info_span, warn};

use crate::{
    config::InstrumentConfig,
    error::SupervisorError,
    provider::Providers,
    session::SessionConnector,
    watcher::{InstrumentWatcher, WatcherState},
};

/// Creates and destroys watchers on demand, one per instrument key.
pub struct WatcherSupervisor {
    connector: Arc<dyn SessionConnector>,
    providers: Providers,
    watchers: Mutex<HashMap<String, InstrumentWatcher>>,
}

impl WatcherSupervisor {
    pub fn new(connector: Arc<dyn SessionConnector>, providers: Providers) -> Self {
        Self {
            connector,
            providers,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a watcher and returns its key. A finished watcher under the
    /// same key is replaced; a live one is not.
    pub async fn start(
        &self,
        config: InstrumentConfig,
        token: String,
    ) -> Result<String, SupervisorError> {
        config.validate()?;
        let key = config.key();

        let mut watchers = self.watchers.lock().await;
        if let Some(existing) = watchers.get(&key)
            && !existing.is_finished()
        {
            return Err(SupervisorError::AlreadyRunning(key));
        }

        let span = info_span!("watcher", key = %key);
        let watcher = InstrumentWatcher::spawn(
            config,
            token,
            Arc::clone(&self.connector),
            &self.providers,
            span,
        )?;
        watchers.insert(key.clone(), watcher);

        info!(%key, "started watcher");
        Ok(key)
    }

    /// Stops the watcher under `key` and waits for its loop to exit.
    /// Returns `false` if there was none.
    ///
    /// The entry keeps its key until the loop has exited, so a `start` for
    /// the same key meanwhile gets [`SupervisorError::AlreadyRunning`].
    pub async fn stop(&self, key: &str) -> bool {
        let mut state = {
            let watchers = self.watchers.lock().await;
            let Some(watcher) = watchers.get(key) else {
                warn!(%key, "no such watcher");
                return false;
            };
            watcher.shutdown();
            watcher.subscribe()
        };

        // Err means the task is gone without reporting, which is just as final.
        let _ = state.wait_for(|s| *s == WatcherState::Stopped).await;

        let watcher = {
            let mut watchers = self.watchers.lock().await;
            // A finished entry may already have been replaced by a new start.
            let owned = watchers.get(key).is_some_and(|w| w.owns(&state));
            if owned {
                watchers.remove(key)
            } else {
                None
            }
        };
        if let Some(watcher) = watcher {
            watcher.stop().await;
        }

        info!(%key, "stopped watcher");
        true
    }

    /// Keys and states, sorted by key.
    pub async fn list(&self) -> Vec<(String, WatcherState)> {
        let watchers = self.watchers.lock().await;
        let mut entries: Vec<_> = watchers
            .iter()
            .map(|(key, w)| (key.clone(), w.state()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Holds the map for the whole call; nothing starts until every loop has
    /// exited.
    pub async fn stop_all(&self) {
        let mut watchers = self.watchers.lock().await;
        info!(count = watchers.len(), "stopping all watchers");

        for watcher in watchers.values() {
            watcher.shutdown();
        }
        for (_, watcher) in watchers.drain() {
            watcher.stop().await;
        }
    }
}
