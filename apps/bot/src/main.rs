use std::sync::Arc;

use anyhow::Result;
use poise::{Framework, FrameworkOptions};
use serenity::all::{ActivityData, ClientBuilder, GatewayIntents};
use ticker::{Providers, RedisQuoteCache, WatcherSupervisor};
use ticker_bot::{
    Data, catalogue::Catalogue, command::ticker::ticker_command, config::Config,
    session::SerenityConnector,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut providers = Providers::http(config.http_timeout)?;
    if let Some(url) = &config.redis_url {
        let prefix = config.redis_key_prefix.as_str();
        match RedisQuoteCache::connect(url, prefix, config.http_timeout).await {
            Ok(cache) => providers = providers.with_cache(Arc::new(cache), config.cache_ttl),
            Err(e) => warn!(error = ?e, "redis unavailable, fetching crypto quotes directly"),
        }
    }

    let supervisor = Arc::new(WatcherSupervisor::new(
        Arc::new(SerenityConnector::default()),
        providers,
    ));

    let catalogue = Arc::new(Catalogue::load(&config.tickers_file)?);
    info!(
        file = %config.tickers_file.display(),
        count = catalogue.len(),
        "loaded watcher catalogue"
    );

    for entry in catalogue.entries() {
        if let Err(e) = supervisor
            .start(entry.config.clone(), entry.session_token.clone())
            .await
        {
            error!(key = %entry.config.key(), error = %e, "failed to start watcher");
        }
    }

    let admin = match &config.discord_token {
        Some(token) => {
            let framework = Framework::builder()
                .options(FrameworkOptions {
                    commands: vec![ticker_command()],
                    ..Default::default()
                })
                .setup({
                    let supervisor = Arc::clone(&supervisor);
                    let catalogue = Arc::clone(&catalogue);
                    let version = config.version.clone();

                    move |ctx, ready, framework| {
                        Box::pin(async move {
                            info!(
                                user = %ready.user.name,
                                id = %ready.user.id,
                                "admin bot connected"
                            );

                            poise::builtins::register_globally(ctx, &framework.options().commands)
                                .await?;

                            let text = if version.starts_with('v') {
                                version
                            } else {
                                format!("Version - {version}")
                            };
                            ctx.set_activity(Some(ActivityData::custom(text)));

                            Ok(Data {
                                supervisor,
                                catalogue,
                            })
                        })
                    }
                })
                .build();

            let mut client = ClientBuilder::new(token, GatewayIntents::non_privileged())
                .framework(framework)
                .await?;
            let shard_manager = Arc::clone(&client.shard_manager);

            tokio::spawn(async move {
                if let Err(why) = client.start().await {
                    error!(error = ?why, "admin client error");
                }
            });

            Some(shard_manager)
        }
        None => {
            info!("DISCORD_TOKEN not set, running without admin commands");
            None
        }
    };

    shutdown_signal().await?;

    supervisor.stop_all().await;
    if let Some(shard_manager) = admin {
        shard_manager.shutdown_all().await;
    }

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
