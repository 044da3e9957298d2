mod list;
mod start;
mod stop;

use crate::{Context, Error};
use list::list;
use start::start;
use stop::stop;

/// Manage the price watchers of the tickers file.
#[poise::command(
    slash_command,
    rename = "ticker",
    subcommands("list", "start", "stop"),
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn ticker_command(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}
