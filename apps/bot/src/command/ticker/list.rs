use std::collections::HashMap;

use ticker::WatcherState;
use tracing::info;

use crate::{Context, Error};

/// Lists catalogue watchers and their state.
#[poise::command(slash_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();
    let running: HashMap<String, WatcherState> = data.supervisor.list().await.into_iter().collect();

    info!(
        user_id = ctx.author().id.get(),
        running = running.len(),
        "list: invoked"
    );

    if data.catalogue.is_empty() && running.is_empty() {
        ctx.say("No watchers configured.").await?;
        return Ok(());
    }

    let mut lines: Vec<String> = data
        .catalogue
        .keys()
        .map(|key| {
            let state = running.get(key).copied().unwrap_or(WatcherState::Stopped);
            format!("`{key}` - {}", state_label(state))
        })
        .collect();

    // Started before the catalogue was reloaded.
    lines.extend(
        running
            .iter()
            .filter(|(key, _)| data.catalogue.get(key).is_none())
            .map(|(key, state)| format!("`{key}` - {} (not in catalogue)", state_label(*state))),
    );

    ctx.say(lines.join("\n")).await?;
    Ok(())
}

fn state_label(state: WatcherState) -> &'static str {
    match state {
        WatcherState::Starting => "starting",
        WatcherState::Polling => "polling",
        WatcherState::Stopped => "stopped",
    }
}
