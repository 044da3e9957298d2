//! Chat-platform collaborator interface.
//!
//! The core never talks to the platform directly; the bot crate provides
//! the adapter.

use std::fmt;

use async_trait::async_trait;

use crate::error::SessionError;

/// Role names that drive color mode.
pub const RED_ROLE: &str = "tickers-red";
pub const GREEN_ROLE: &str = "tickers-green";

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(GuildId);
id_type!(UserId);
id_type!(RoleId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Opens one session per watcher token.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(&self, token: &str) -> Result<Box<dyn ChatSession>, SessionError>;
}

#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn current_user(&self) -> Result<UserId, SessionError>;

    async fn list_memberships(&self) -> Result<Vec<Guild>, SessionError>;

    async fn set_nickname(
        &self,
        guild: GuildId,
        user: UserId,
        nickname: &str,
    ) -> Result<(), SessionError>;

    async fn set_activity(&self, activity: &str) -> Result<(), SessionError>;

    async fn list_roles(&self, guild: GuildId) -> Result<Vec<Role>, SessionError>;

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId)
    -> Result<(), SessionError>;

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), SessionError>;

    /// Disconnect; called once when the watcher stops.
    async fn close(&self) {}
}
