//! Who may open the economy console.
//!
//! An operator is authorized when they carry the platform administrator flag or
//! hold the configured admin role. When a guild is configured, interactions
//! from anywhere else are refused regardless of role.

use log::warn;

use super::interaction::Operator;
use crate::config::DiscordConfig;
use crate::logutil::escape_log;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("You need administrator permissions to use this command.")]
    NotAdmin,
    #[error("This command is not available here.")]
    WrongGuild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    pub admin_role_id: Option<u64>,
    pub guild_id: Option<u64>,
}

impl AccessPolicy {
    pub fn from_config(cfg: &DiscordConfig) -> Self {
        Self {
            admin_role_id: cfg.admin_role_id,
            guild_id: cfg.guild_id,
        }
    }

    pub fn check(&self, operator: &Operator, guild_id: Option<u64>) -> Result<(), AccessDenied> {
        if let Some(required) = self.guild_id {
            // Terminal interactions carry no guild and are trusted locally.
            if guild_id.is_some_and(|g| g != required) {
                warn!(
                    target: "security",
                    "Refused {} from guild {:?} (console bound to {})",
                    escape_log(&operator.to_string()),
                    guild_id,
                    required
                );
                return Err(AccessDenied::WrongGuild);
            }
        }
        let has_role = self
            .admin_role_id
            .is_some_and(|role| operator.roles.contains(&role));
        if operator.administrator || has_role {
            Ok(())
        } else {
            warn!(
                target: "security",
                "Refused non-admin operator {}",
                escape_log(&operator.to_string())
            );
            Err(AccessDenied::NotAdmin)
        }
    }
}
