use tracing::{debug, warn};

use crate::{
    error::PublishError,
    session::{ChatSession, GREEN_ROLE, Guild, GuildId, RED_ROLE, Role, RoleId, UserId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleColor {
    Green,
    Red,
}

impl RoleColor {
    pub fn from_increase(increase: bool) -> Self {
        if increase {
            RoleColor::Green
        } else {
            RoleColor::Red
        }
    }
}

/// The red/green role pair of one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRoles {
    pub red: RoleId,
    pub green: RoleId,
}

impl ColorRoles {
    /// `None` unless both roles exist.
    pub fn find(roles: &[Role]) -> Option<Self> {
        let id_of = |name: &str| roles.iter().find(|r| r.name == name).map(|r| r.id);

        Some(Self {
            red: id_of(RED_ROLE)?,
            green: id_of(GREEN_ROLE)?,
        })
    }

    /// (role to drop, role to add)
    fn swap(&self, color: RoleColor) -> (RoleId, RoleId) {
        match color {
            RoleColor::Green => (self.red, self.green),
            RoleColor::Red => (self.green, self.red),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub nickname: Option<String>,
    pub activity: String,
    pub color: Option<RoleColor>,
}

#[derive(Debug, Clone)]
pub struct GuildTarget {
    pub guild: Guild,
    /// Resolved at setup; `None` when color mode is off or the roles are missing.
    pub colors: Option<ColorRoles>,
}

/// Pushes updates to every guild the session belongs to.
pub struct Presence {
    session: Box<dyn ChatSession>,
    user: UserId,
    guilds: Vec<GuildTarget>,
}

impl Presence {
    pub fn new(session: Box<dyn ChatSession>, user: UserId, guilds: Vec<GuildTarget>) -> Self {
        Self {
            session,
            user,
            guilds,
        }
    }

    /// Applies one update. Failures are logged and returned; none of them
    /// stops the rest of the update.
    pub async fn apply(&self, update: &PresenceUpdate) -> Vec<PublishError> {
        let mut errors = Vec::new();

        if let Some(nickname) = &update.nickname {
            for target in &self.guilds {
                let guild = target.guild.id;

                if let Err(source) = self.session.set_nickname(guild, self.user, nickname).await {
                    errors.push(PublishError::Nickname { guild, source });
                    continue;
                }
                debug!(guild = %target.guild.name, %nickname, "set nickname");

                if let Some(color) = update.color {
                    self.apply_color(guild, target.colors, color, &mut errors)
                        .await;
                }
            }
        }

        match self.session.set_activity(&update.activity).await {
            Ok(()) => debug!(activity = %update.activity, "set activity"),
            Err(e) => errors.push(PublishError::Activity(e)),
        }

        for e in &errors {
            warn!(error = %e, "presence update rejected");
        }

        errors
    }

    async fn apply_color(
        &self,
        guild: GuildId,
        roles: Option<ColorRoles>,
        color: RoleColor,
        errors: &mut Vec<PublishError>,
    ) {
        let Some(roles) = roles else {
            errors.push(PublishError::MissingRoles { guild });
            return;
        };

        let (drop, add) = roles.swap(color);

        if let Err(source) = self.session.remove_role(guild, self.user, drop).await {
            errors.push(PublishError::Role { guild, source });
        }
        if let Err(source) = self.session.add_role(guild, self.user, add).await {
            errors.push(PublishError::Role { guild, source });
        }
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}
