//! Per-instrument polling loop.
//!
//! A watcher goes `Starting -> Polling -> Stopped` exactly once. Each tick
//! runs fetch, format, rotate and publish to completion before the next
//! tick or a shutdown request is considered.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{Span, debug, error, info, warn};
use tracing_futures::Instrument;

use crate::{
    config::InstrumentConfig,
    error::{ConfigError, SetupError, TickError},
    format::DisplayFormatter,
    presence::{ColorRoles, GuildTarget, Presence, PresenceUpdate, RoleColor},
    provider::{EquityProvider, Providers},
    rotate::ActivityRotator,
    session::{ChatSession, Guild, SessionConnector},
    source::QuoteSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Starting,
    Polling,
    Stopped,
}

/// Handle to a running watcher loop.
pub struct InstrumentWatcher {
    key: String,
    shutdown: mpsc::Sender<()>,
    state: watch::Receiver<WatcherState>,
    task: JoinHandle<()>,
}

impl InstrumentWatcher {
    /// Validates `config` and starts the loop. `span` carries the watcher's
    /// identity into every event it logs.
    pub fn spawn(
        config: InstrumentConfig,
        token: String,
        connector: Arc<dyn SessionConnector>,
        providers: &Providers,
        span: Span,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let key = config.key();
        let source = QuoteSource::from_config(&config, providers)?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(WatcherState::Starting);

        let task = WatcherTask {
            config,
            token,
            connector,
            fx: Arc::clone(&providers.equity),
            source,
            state: state_tx,
            shutdown: shutdown_rx,
        };

        let task = tokio::spawn(task.run().instrument(span));

        Ok(Self {
            key,
            shutdown: shutdown_tx,
            state: state_rx,
            task,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatcherState> {
        self.state.clone()
    }

    /// Whether `state` was subscribed from this watcher.
    pub fn owns(&self, state: &watch::Receiver<WatcherState>) -> bool {
        self.state.same_channel(state)
    }

    /// Requests shutdown without blocking. Returns `false` when a request is
    /// already pending or the loop has already exited.
    pub fn shutdown(&self) -> bool {
        self.shutdown.try_send(()).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests shutdown and waits for the loop to exit.
    pub async fn stop(self) {
        self.shutdown();
        if let Err(e) = self.task.await {
            error!(key = %self.key, error = ?e, "watcher task failed");
        }
    }
}

struct WatcherTask {
    config: InstrumentConfig,
    token: String,
    connector: Arc<dyn SessionConnector>,
    fx: Arc<dyn EquityProvider>,
    source: QuoteSource,
    state: watch::Sender<WatcherState>,
    shutdown: mpsc::Receiver<()>,
}

/// Result of the one-time setup.
struct Ready {
    presence: Presence,
    /// Effective config; nickname mode may have been degraded.
    config: InstrumentConfig,
    fx_rate: f64,
}

impl WatcherTask {
    async fn run(mut self) {
        let ready = match self.setup().await {
            Ok(ready) => ready,
            Err(e) => {
                error!(error = %e, "watcher setup failed");
                self.state.send_replace(WatcherState::Stopped);
                return;
            }
        };

        let mut poller = Poller {
            rotator: ActivityRotator::for_config(&ready.config),
            formatter: DisplayFormatter::new(ready.config, ready.fx_rate),
            source: self.source,
            presence: ready.presence,
            last_price: None,
        };

        self.state.send_replace(WatcherState::Polling);
        info!("watching price");

        let frequency = self.config.frequency();
        let mut ticker = time::interval_at(Instant::now() + frequency, frequency);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => break,

                _ = ticker.tick() => {
                    debug!("fetching price");
                    if let Err(e) = poller.tick().await {
                        warn!(error = %e, "skipping tick");
                    }
                }
            }
        }

        poller.presence.close().await;
        self.state.send_replace(WatcherState::Stopped);
        info!("shut down price watching");
    }

    async fn setup(&self) -> Result<Ready, SetupError> {
        let mut config = self.config.clone();

        let session = self
            .connector
            .open(&self.token)
            .await
            .map_err(SetupError::Connect)?;

        let user = match session.current_user().await {
            Ok(user) => user,
            Err(e) => {
                session.close().await;
                return Err(SetupError::Identity(e));
            }
        };

        let guilds = match session.list_memberships().await {
            Ok(guilds) => guilds,
            Err(e) => {
                warn!(error = %e, "listing guilds failed, nickname disabled");
                config.nickname = false;
                Vec::new()
            }
        };

        let mut targets = Vec::with_capacity(guilds.len());
        for guild in guilds {
            let colors = if config.nickname && config.color {
                resolve_colors(session.as_ref(), &guild).await
            } else {
                None
            };
            targets.push(GuildTarget { guild, colors });
        }

        let fx_rate = if config.is_usd() {
            0.0
        } else {
            resolve_fx(self.fx.as_ref(), &config.currency).await
        };

        info!(
            guilds = targets.len(),
            nickname = config.nickname,
            fx_rate,
            "watcher ready"
        );

        Ok(Ready {
            presence: Presence::new(session, user, targets),
            config,
            fx_rate,
        })
    }
}

async fn resolve_colors(session: &dyn ChatSession, guild: &Guild) -> Option<ColorRoles> {
    let name = &guild.name;
    match session.list_roles(guild.id).await {
        Ok(roles) => {
            let colors = ColorRoles::find(&roles);
            if colors.is_none() {
                warn!(guild = %name, "unable to find roles for color changes");
            }
            colors
        }
        Err(e) => {
            warn!(guild = %name, error = %e, "listing roles failed");
            None
        }
    }
}

/// Zero when the rate cannot be resolved, which means no conversion.
async fn resolve_fx(fx: &dyn EquityProvider, currency: &str) -> f64 {
    let currency = currency.to_uppercase();
    match fx.fx_rate(&currency).await {
        Ok(rate) if rate > 0.0 => rate,
        Ok(rate) => {
            warn!(%currency, rate, "invalid exchange rate, defaulting to USD");
            0.0
        }
        Err(e) => {
            warn!(%currency, error = %e, "unable to fetch exchange rate, defaulting to USD");
            0.0
        }
    }
}

/// Runtime state of one watcher while polling.
struct Poller {
    source: QuoteSource,
    formatter: DisplayFormatter,
    rotator: ActivityRotator,
    presence: Presence,
    last_price: Option<f64>,
}

impl Poller {
    async fn tick(&mut self) -> Result<(), TickError> {
        let quote = self.source.fetch().await?;
        let display = self.formatter.compute(&quote, self.last_price);
        self.last_price = Some(display.value);

        let candidate = self.rotator.next();
        let config = self.formatter.config();
        let update = PresenceUpdate {
            color: (display.nickname.is_some() && config.color)
                .then(|| RoleColor::from_increase(display.increase)),
            activity: display.activity(&candidate),
            nickname: display.nickname,
        };

        self.presence.apply(&update).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::{InstrumentKind, TokenBackend, TokenConfig},
        error::{FetchError, SessionError},
        presence::tests::{Call, RecordingSession, color_roles, guild},
        provider::{AggregatorQuoter, CryptoProvider, DexQuoter, EquitySnapshot, Field},
        quote::Quote,
        session::{GuildId, RoleId},
    };

    struct Connector {
        session: RecordingSession,
        opens: AtomicUsize,
        fail: bool,
    }

    impl Connector {
        fn new(session: RecordingSession) -> Arc<Self> {
            Arc::new(Self {
                session,
                opens: AtomicUsize::new(0),
                fail: false,
            })
        }
    }

    #[async_trait]
    impl SessionConnector for Connector {
        async fn open(&self, _: &str) -> Result<Box<dyn ChatSession>, SessionError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SessionError::new("invalid token"));
            }
            Ok(Box::new(self.session.clone()))
        }
    }

    /// Serves equity snapshots in order, repeating the last one. `fx: None`
    /// fails every exchange-rate lookup.
    struct ScriptedEquity {
        snapshots: Mutex<Vec<Result<EquitySnapshot, ()>>>,
        fx: Option<f64>,
    }

    #[async_trait]
    impl EquityProvider for ScriptedEquity {
        async fn equity_quote(&self, symbol: &str) -> Result<EquitySnapshot, FetchError> {
            if symbol.ends_with("=X") {
                let fx = self.fx.ok_or_else(|| FetchError::Empty {
                    provider: "scripted",
                    symbol: symbol.to_string(),
                })?;
                return Ok(EquitySnapshot {
                    price: Field::new(fx, ""),
                    ..Default::default()
                });
            }

            let mut snapshots = self.snapshots.lock().unwrap();
            let next = if snapshots.len() > 1 {
                snapshots.remove(0)
            } else {
                snapshots[0].clone()
            };
            next.map_err(|_| FetchError::Empty {
                provider: "scripted",
                symbol: symbol.to_string(),
            })
        }
    }

    struct NoCrypto;

    #[async_trait]
    impl CryptoProvider for NoCrypto {
        async fn coin(&self, id: &str) -> Result<Quote, FetchError> {
            Err(FetchError::Empty {
                provider: "none",
                symbol: id.to_string(),
            })
        }
    }

    #[async_trait]
    impl DexQuoter for NoCrypto {
        fn reference_coin(&self) -> &str {
            "binancecoin"
        }

        async fn price_in_reference(&self, _: &str) -> Result<String, FetchError> {
            Ok("0".into())
        }
    }

    /// Serves aggregator payloads in order, repeating the last one.
    struct ScriptedAggregator(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl AggregatorQuoter for ScriptedAggregator {
        async fn scaled_price(&self, _: &str, _: &str) -> Result<String, FetchError> {
            let mut payloads = self.0.lock().unwrap();
            let next = if payloads.len() > 1 {
                payloads.remove(0)
            } else {
                payloads[0]
            };
            Ok(next.to_string())
        }
    }

    fn quote(price: &str, change: &str, percent: &str) -> Result<EquitySnapshot, ()> {
        Ok(EquitySnapshot {
            market_state: "REGULAR".into(),
            price: Field::new(price.parse().unwrap(), price),
            regular_change: Field::new(change.parse().unwrap(), change),
            regular_change_percent: Field::new(0.0, percent),
            ..Default::default()
        })
    }

    fn providers(equity: Vec<Result<EquitySnapshot, ()>>, token: Vec<&'static str>) -> Providers {
        providers_with_fx(Some(0.5), equity, token)
    }

    fn providers_with_fx(
        fx: Option<f64>,
        equity: Vec<Result<EquitySnapshot, ()>>,
        token: Vec<&'static str>,
    ) -> Providers {
        Providers {
            equity: Arc::new(ScriptedEquity {
                snapshots: Mutex::new(equity),
                fx,
            }),
            crypto: Arc::new(NoCrypto),
            dex: Arc::new(NoCrypto),
            aggregator: Arc::new(ScriptedAggregator(Mutex::new(token))),
            cache: None,
        }
    }

    fn equity_config() -> InstrumentConfig {
        let mut config = InstrumentConfig::new(InstrumentKind::Equity, "AAPL", 10);
        config.nickname = true;
        config
    }

    fn activities(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Activity(a) => Some(a.clone()),
                _ => None,
            })
            .collect()
    }

    async fn wait_for(watcher: &InstrumentWatcher, state: WatcherState) {
        let mut rx = watcher.subscribe();
        rx.wait_for(|s| *s == state).await.unwrap();
    }

    async fn advance_ticks(n: u32, frequency: u64) {
        for _ in 0..n {
            time::sleep(Duration::from_secs(frequency)).await;
        }
        // let the last tick finish publishing
        time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn equity_tick_publishes_nickname_and_activity() {
        let session = RecordingSession {
            guilds: vec![guild(1)],
            ..Default::default()
        };
        let connector = Connector::new(session.clone());
        let providers = providers(vec![quote("123.45", "-1.20", "-0.96%")], vec!["0"]);

        let watcher =
            InstrumentWatcher::spawn(equity_config(), "t".into(), connector, &providers, Span::none())
                .unwrap();
        wait_for(&watcher, WatcherState::Polling).await;

        // nothing is published before the first interval elapses
        assert!(session.calls().is_empty());

        advance_ticks(1, 10).await;
        assert_eq!(
            session.calls(),
            vec![
                Call::Nickname(GuildId(1), "AAPL ⬊ $123.45".into()),
                Call::Activity("$-1.20 (-0.96%)".into()),
            ]
        );

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn equity_rotation_is_smoothed() {
        let session = RecordingSession {
            guilds: vec![guild(1)],
            ..Default::default()
        };
        let mut config = equity_config();
        config.activity = vec!["custom".into()];
        let providers = providers(vec![quote("10.00", "0.10", "1.00%")], vec!["0"]);

        let watcher = InstrumentWatcher::spawn(
            config,
            "t".into(),
            Connector::new(session.clone()),
            &providers,
            Span::none(),
        )
        .unwrap();

        advance_ticks(5, 10).await;
        watcher.stop().await;

        assert_eq!(
            activities(&session.calls()),
            vec![
                "$0.10 (1.00%)",
                "$0.10 (1.00%)",
                "custom",
                "custom",
                "$0.10 (1.00%)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_skips_tick_and_keeps_polling() {
        let session = RecordingSession::default();
        let providers = providers(
            vec![Err(()), quote("5.00", "0.00", "0.00%")],
            vec!["0"],
        );
        let mut config = equity_config();
        config.nickname = false;

        let watcher = InstrumentWatcher::spawn(
            config,
            "t".into(),
            Connector::new(session.clone()),
            &providers,
            Span::none(),
        )
        .unwrap();

        advance_ticks(1, 10).await;
        assert!(session.calls().is_empty());
        assert_eq!(watcher.state(), WatcherState::Polling);

        advance_ticks(1, 10).await;
        assert_eq!(activities(&session.calls()), vec!["5.00 ⬈ 0.00%"]);

        watcher.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn token_direction_and_color_follow_previous_price() {
        let session = RecordingSession {
            guilds: vec![guild(1)],
            roles: color_roles(),
            ..Default::default()
        };
        let mut config = InstrumentConfig::new(InstrumentKind::Token, "", 10);
        config.name = "PEPE".into();
        config.nickname = true;
        config.color = true;
        config.token = Some(TokenConfig {
            network: "ethereum".into(),
            contract: "0xabc".into(),
            decimals: Some(4),
            source: TokenBackend::OneInch,
        });
        let providers = providers(vec![Err(())], vec!["2500000", "not-a-number", "2000000"]);

        let watcher = InstrumentWatcher::spawn(
            config,
            "t".into(),
            Connector::new(session.clone()),
            &providers,
            Span::none(),
        )
        .unwrap();

        advance_ticks(3, 10).await;
        watcher.stop().await;

        assert_eq!(
            session.calls(),
            vec![
                Call::Nickname(GuildId(1), "PEPE ⬈ $0.2500".into()),
                Call::RemoveRole(GuildId(1), RoleId(1)),
                Call::AddRole(GuildId(1), RoleId(2)),
                Call::Activity("Using USDC on 1inch".into()),
                // the unparsable payload skipped a tick
                Call::Nickname(GuildId(1), "PEPE ⬊ $0.2000".into()),
                Call::RemoveRole(GuildId(1), RoleId(2)),
                Call::AddRole(GuildId(1), RoleId(1)),
                Call::Activity("Using USDC on 1inch".into()),
                Call::Close,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn guild_listing_failure_disables_nickname() {
        let session = RecordingSession {
            guilds: vec![guild(1)],
            fail_memberships: true,
            ..Default::default()
        };
        let providers = providers(vec![quote("1.00", "0.01", "1.00%")], vec!["0"]);

        let watcher = InstrumentWatcher::spawn(
            equity_config(),
            "t".into(),
            Connector::new(session.clone()),
            &providers,
            Span::none(),
        )
        .unwrap();

        advance_ticks(1, 10).await;
        watcher.stop().await;

        assert_eq!(
            session.calls(),
            vec![Call::Activity("1.00 ⬈ 1.00%".into()), Call::Close]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fx_rate_is_resolved_once_and_applied() {
        let session = RecordingSession {
            guilds: vec![guild(1)],
            ..Default::default()
        };
        let mut config = equity_config();
        config.currency = "eur".into();
        let providers = providers(vec![quote("100.00", "-4.00", "-3.85%")], vec!["0"]);

        let watcher = InstrumentWatcher::spawn(
            config,
            "t".into(),
            Connector::new(session.clone()),
            &providers,
            Span::none(),
        )
        .unwrap();

        advance_ticks(1, 10).await;
        watcher.stop().await;

        assert_eq!(session.calls()[0], Call::Nickname(GuildId(1), "AAPL ⬊ $50.00".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_fx_rate_leaves_prices_unconverted() {
        // a failed lookup and a zero rate both mean no conversion
        for fx in [None, Some(0.0)] {
            let session = RecordingSession {
                guilds: vec![guild(1)],
                ..Default::default()
            };
            let mut config = equity_config();
            config.currency = "EUR".into();
            let providers =
                providers_with_fx(fx, vec![quote("100.00", "-4.00", "-3.85%")], vec!["0"]);

            let watcher = InstrumentWatcher::spawn(
                config,
                "t".into(),
                Connector::new(session.clone()),
                &providers,
                Span::none(),
            )
            .unwrap();

            advance_ticks(1, 10).await;
            watcher.stop().await;

            assert_eq!(
                session.calls()[..2],
                [
                    Call::Nickname(GuildId(1), "AAPL ⬊ $100.00".into()),
                    Call::Activity("$-4.00 (-3.85%)".into()),
                ],
                "fx = {fx:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn setup_failure_never_polls() {
        let session = RecordingSession::default();
        let connector = Arc::new(Connector {
            session: session.clone(),
            opens: AtomicUsize::new(0),
            fail: true,
        });
        let providers = providers(vec![quote("1.00", "0.01", "1.00%")], vec!["0"]);

        let watcher = InstrumentWatcher::spawn(
            equity_config(),
            "bad".into(),
            connector.clone(),
            &providers,
            Span::none(),
        )
        .unwrap();

        wait_for(&watcher, WatcherState::Stopped).await;
        advance_ticks(3, 10).await;

        assert!(session.calls().is_empty());
        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
        assert!(!watcher.shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_wins_over_pending_tick() {
        let session = RecordingSession::default();
        let providers = providers(vec![quote("1.00", "0.01", "1.00%")], vec!["0"]);
        let mut config = equity_config();
        config.nickname = false;

        let watcher = InstrumentWatcher::spawn(
            config,
            "t".into(),
            Connector::new(session.clone()),
            &providers,
            Span::none(),
        )
        .unwrap();
        wait_for(&watcher, WatcherState::Polling).await;

        // Request shutdown, then let the tick deadline pass before the loop
        // runs again: both branches are ready at once.
        assert!(watcher.shutdown());
        time::advance(Duration::from_secs(10)).await;
        watcher.stop().await;

        assert_eq!(session.calls(), vec![Call::Close]);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_shutdown_is_harmless() {
        let session = RecordingSession::default();
        let providers = providers(vec![quote("1.00", "0.01", "1.00%")], vec!["0"]);

        let watcher = InstrumentWatcher::spawn(
            equity_config(),
            "t".into(),
            Connector::new(session),
            &providers,
            Span::none(),
        )
        .unwrap();

        assert!(watcher.shutdown());
        assert!(!watcher.shutdown());

        wait_for(&watcher, WatcherState::Stopped).await;
        assert!(!watcher.shutdown());
        watcher.stop().await;
    }

    #[test]
    fn invalid_config_is_rejected_before_spawning() {
        let providers = providers(vec![Err(())], vec!["0"]);
        let config = InstrumentConfig::new(InstrumentKind::Equity, "AAPL", 0);
        let connector = Connector::new(RecordingSession::default());

        let result = InstrumentWatcher::spawn(config, "t".into(), connector, &providers, Span::none());
        assert!(matches!(result, Err(ConfigError::ZeroFrequency)));
    }
}
