//! Serenity-backed chat sessions for the watchers.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serenity::all::{
    ActivityData, ClientBuilder, Context, EventHandler, GatewayIntents, GuildId as DiscordGuild,
    Http, Ready, RoleId as DiscordRole, ShardManager, UserId as DiscordUser,
};
use ticker::{
    error::SessionError,
    session::{ChatSession, Guild, GuildId, Role, RoleId, SessionConnector, UserId},
};
use tokio::{sync::oneshot, time::timeout};
use tracing::{debug, error};

const GUILD_PAGE: u64 = 100;

fn session_error(e: serenity::Error) -> SessionError {
    SessionError::new(e.to_string())
}

/// Logs every watcher account in through its own gateway connection.
pub struct SerenityConnector {
    ready_timeout: Duration,
}

impl SerenityConnector {
    pub fn new(ready_timeout: Duration) -> Self {
        Self { ready_timeout }
    }
}

impl Default for SerenityConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Hands the gateway context back once the shard is ready.
struct ReadySignal {
    tx: Mutex<Option<oneshot::Sender<Context>>>,
}

#[serenity::async_trait]
impl EventHandler for ReadySignal {
    async fn ready(&self, ctx: Context, ready: Ready) {
        debug!(user = %ready.user.name, "watcher session ready");

        let tx = self.tx.lock().ok().and_then(|mut tx| tx.take());
        if let Some(tx) = tx {
            let _ = tx.send(ctx);
        }
    }
}

#[async_trait]
impl SessionConnector for SerenityConnector {
    async fn open(&self, token: &str) -> Result<Box<dyn ChatSession>, SessionError> {
        let (tx, rx) = oneshot::channel();
        let handler = ReadySignal {
            tx: Mutex::new(Some(tx)),
        };

        let mut client = ClientBuilder::new(token, GatewayIntents::GUILDS)
            .event_handler(handler)
            .await
            .map_err(session_error)?;
        let shard_manager = Arc::clone(&client.shard_manager);

        // The handler, and with it the sender, is dropped if the client exits early.
        tokio::spawn(async move {
            if let Err(why) = client.start().await {
                error!(error = ?why, "watcher client stopped");
            }
        });

        let ctx = match timeout(self.ready_timeout, rx).await {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(_)) => return Err(SessionError::new("client exited before ready")),
            Err(_) => {
                shard_manager.shutdown_all().await;
                return Err(SessionError::new("timed out waiting for ready"));
            }
        };

        Ok(Box::new(SerenitySession {
            http: Arc::clone(&ctx.http),
            ctx,
            shard_manager,
        }))
    }
}

pub struct SerenitySession {
    ctx: Context,
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
}

#[async_trait]
impl ChatSession for SerenitySession {
    async fn current_user(&self) -> Result<UserId, SessionError> {
        let user = self.http.get_current_user().await.map_err(session_error)?;
        Ok(UserId(user.id.get()))
    }

    async fn list_memberships(&self) -> Result<Vec<Guild>, SessionError> {
        let guilds = self
            .http
            .get_guilds(None, Some(GUILD_PAGE))
            .await
            .map_err(session_error)?;

        Ok(guilds
            .into_iter()
            .map(|g| Guild {
                id: GuildId(g.id.get()),
                name: g.name,
            })
            .collect())
    }

    async fn set_nickname(
        &self,
        guild: GuildId,
        _user: UserId,
        nickname: &str,
    ) -> Result<(), SessionError> {
        DiscordGuild::new(guild.0)
            .edit_nickname(&self.http, Some(nickname))
            .await
            .map_err(session_error)
    }

    async fn set_activity(&self, activity: &str) -> Result<(), SessionError> {
        self.ctx.set_activity(Some(ActivityData::playing(activity)));
        Ok(())
    }

    async fn list_roles(&self, guild: GuildId) -> Result<Vec<Role>, SessionError> {
        let roles = DiscordGuild::new(guild.0)
            .roles(&self.http)
            .await
            .map_err(session_error)?;

        Ok(roles
            .into_values()
            .map(|r| Role {
                id: RoleId(r.id.get()),
                name: r.name,
            })
            .collect())
    }

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), SessionError> {
        self.http
            .add_member_role(
                DiscordGuild::new(guild.0),
                DiscordUser::new(user.0),
                DiscordRole::new(role.0),
                None,
            )
            .await
            .map_err(session_error)
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), SessionError> {
        self.http
            .remove_member_role(
                DiscordGuild::new(guild.0),
                DiscordUser::new(user.0),
                DiscordRole::new(role.0),
                None,
            )
            .await
            .map_err(session_error)
    }

    async fn close(&self) {
        self.shard_manager.shutdown_all().await;
    }
}
