use ticker::error::SupervisorError;
use tracing::{info, warn};

use crate::{Context, Error};

/// Starts the watcher configured under a catalogue key.
#[poise::command(slash_command)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Watcher key (e.g., equity:aapl)"] key: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let key = key.trim().to_lowercase();
    let user_id = ctx.author().id.get();
    info!(user_id, %key, "start: invoked");

    let Some(entry) = ctx.data().catalogue.get(&key) else {
        warn!(user_id, %key, "start: unknown key");
        ctx.say(format!("No watcher `{key}` in the catalogue.")).await?;
        return Ok(());
    };

    match ctx
        .data()
        .supervisor
        .start(entry.config.clone(), entry.session_token.clone())
        .await
    {
        Ok(key) => {
            ctx.say(format!("Started `{key}`.")).await?;
        }
        Err(SupervisorError::AlreadyRunning(key)) => {
            ctx.say(format!("`{key}` is already running.")).await?;
        }
        Err(e) => {
            warn!(user_id, %key, error = %e, "start: refused");
            ctx.say(format!("Could not start `{key}`: {e}")).await?;
        }
    }

    Ok(())
}
