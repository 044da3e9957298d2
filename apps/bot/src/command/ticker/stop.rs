use tracing::info;

use crate::{Context, Error};

/// Stops a running watcher.
#[poise::command(slash_command)]
pub async fn stop(
    ctx: Context<'_>,
    #[description = "Watcher key (e.g., equity:aapl)"] key: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let key = key.trim().to_lowercase();
    info!(user_id = ctx.author().id.get(), %key, "stop: invoked");

    if ctx.data().supervisor.stop(&key).await {
        ctx.say(format!("Stopped `{key}`.")).await?;
    } else {
        ctx.say(format!("`{key}` is not running.")).await?;
    }

    Ok(())
}
