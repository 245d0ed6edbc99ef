//! # Configuration Management Module
//!
//! Deployment parameters for the console: chat credentials, database
//! connection, target table, audit channel, session behaviour and logging.
//!
//! ## Sources
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. An optional TOML file (`--config`, missing file is not an error)
//! 3. Process environment variables
//!
//! | Variable                  | Field                          |
//! |---------------------------|--------------------------------|
//! | `DISCORD_TOKEN`           | `discord.token` (required)     |
//! | `GUILD_ID`                | `discord.guild_id`             |
//! | `LOG_CHANNEL_ID`          | `discord.log_channel_id`       |
//! | `ADMIN_ROLE_ID`           | `discord.admin_role_id`        |
//! | `DB_HOST` / `DB_PORT`     | `database.host` / `.port`      |
//! | `DB_USER` / `DB_PASSWORD` | `database.user` / `.password` (required) |
//! | `DB_NAME`                 | `database.name`                |
//! | `DB_POOL_SIZE`            | `database.pool_size`           |
//! | `TABLE_NAME`              | `database.table`               |
//! | `SESSION_TIMEOUT_MINUTES` | `console.session_timeout`      |
//! | `LOG_LEVEL` / `LOG_FILE`  | `logging.level` / `.file`      |
//!
//! ## File Format
//!
//! ```toml
//! [discord]
//! token = ""
//! log_channel_id = 123456789012345678
//!
//! [database]
//! host = "localhost"
//! port = 3306
//! user = "economy"
//! password = ""
//! name = "coinsengine_shared"
//! table = "coinsengine_users"
//!
//! [console]
//! session_timeout = 5
//! ```
//!
//! Missing mandatory secrets are reported as [`ConfigError::MissingRequired`]
//! and stop startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::validation::validate_table_name;

/// Fatal configuration problems. Any of these prevents startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required (set it in the environment or the config file)")]
    MissingRequired(&'static str),

    #[error("{key} has an invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config file {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discord: DiscordConfig,
    pub database: DatabaseConfig,
    pub console: ConsoleConfig,
    pub logging: LoggingConfig,
}

/// Chat platform credentials and scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot authentication token. Required.
    pub token: String,
    /// Restrict the console to a single guild when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    /// Channel receiving audit records for applied adjustments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_channel_id: Option<u64>,
    /// Role that grants console access in addition to the administrator flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_role_id: Option<u64>,
    /// REST base used for audit delivery.
    pub api_base: String,
    /// Seconds before an audit delivery attempt is abandoned.
    pub audit_timeout_seconds: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            guild_id: None,
            log_channel_id: None,
            admin_role_id: None,
            api_base: "https://discord.com/api/v10".to_string(),
            audit_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Players table. Must be a plain identifier; it is interpolated into SQL.
    pub table: String,
    pub pool_size: u32,
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            name: "coinsengine_shared".to_string(),
            table: "coinsengine_users".to_string(),
            pool_size: 5,
            connect_timeout_seconds: 10,
        }
    }
}

impl DatabaseConfig {
    /// Connection summary that is safe to log (no password).
    pub fn describe(&self) -> String {
        format!(
            "mysql://{}@{}:{}/{} (table {})",
            self.user, self.host, self.port, self.name, self.table
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Idle minutes before a session expires. 0 disables expiry.
    pub session_timeout: u32,
    /// Seconds a confirmation prompt stays live.
    pub confirm_timeout_seconds: u64,
    /// Operator identity used by the terminal transport.
    pub operator_name: String,
    pub operator_id: u64,
    /// Whether the terminal operator carries the administrator flag.
    pub operator_is_admin: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            session_timeout: 5,
            confirm_timeout_seconds: 60,
            operator_name: "console".to_string(),
            operator_id: 0,
            operator_is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("logs/bot.log".to_string()),
            security_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            discord: DiscordConfig::default(),
            database: DatabaseConfig::default(),
            console: ConsoleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, overlay the optional TOML file, overlay the process
    /// environment, then validate.
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config = Self::load_unchecked(path).await?;
        config.validate()?;
        Ok(config)
    }

    /// [`Config::load`] without validation; used by `start --demo`, which
    /// needs neither a token nor database credentials.
    pub async fn load_unchecked(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if Path::new(p).exists() => Self::from_file(p).await?,
            _ => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file without consulting the environment or validating.
    pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Overlay values from an environment-like lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DISCORD_TOKEN") {
            self.discord.token = v;
        }
        if let Some(v) = get("GUILD_ID") {
            self.discord.guild_id = Some(parse_num("GUILD_ID", &v)?);
        }
        if let Some(v) = get("LOG_CHANNEL_ID") {
            self.discord.log_channel_id = Some(parse_num("LOG_CHANNEL_ID", &v)?);
        }
        if let Some(v) = get("ADMIN_ROLE_ID") {
            self.discord.admin_role_id = Some(parse_num("ADMIN_ROLE_ID", &v)?);
        }
        if let Some(v) = get("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = get("DB_PORT") {
            self.database.port = parse_num("DB_PORT", &v)?;
        }
        if let Some(v) = get("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = get("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = get("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = get("DB_POOL_SIZE") {
            self.database.pool_size = parse_num("DB_POOL_SIZE", &v)?;
        }
        if let Some(v) = get("TABLE_NAME") {
            self.database.table = v;
        }
        if let Some(v) = get("SESSION_TIMEOUT_MINUTES") {
            self.console.session_timeout = parse_num("SESSION_TIMEOUT_MINUTES", &v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = get("LOG_FILE") {
            self.logging.file = Some(v);
        }
        Ok(())
    }

    /// Check mandatory secrets and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.token.trim().is_empty() {
            return Err(ConfigError::MissingRequired("DISCORD_TOKEN"));
        }
        if self.database.user.trim().is_empty() {
            return Err(ConfigError::MissingRequired("DB_USER"));
        }
        if self.database.password.is_empty() {
            return Err(ConfigError::MissingRequired("DB_PASSWORD"));
        }
        if let Err(e) = validate_table_name(&self.database.table) {
            return Err(ConfigError::InvalidValue {
                key: "TABLE_NAME",
                value: self.database.table.clone(),
                reason: e.to_string(),
            });
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DB_POOL_SIZE",
                value: "0".to_string(),
                reason: "pool needs at least one connection".to_string(),
            });
        }
        if log_level_filter(&self.logging.level).is_none() {
            return Err(ConfigError::InvalidValue {
                key: "LOG_LEVEL",
                value: self.logging.level.clone(),
                reason: "expected one of off, error, warn, info, debug, trace".to_string(),
            });
        }
        Ok(())
    }

    /// Write a starter configuration with secrets left blank.
    pub async fn create_default(path: &str) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(&Config::default()).map_err(|e| ConfigError::Write {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        fs::write(path, content)
            .await
            .map_err(|e| ConfigError::Write {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

fn parse_num<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Map a textual level (case-insensitive, `warning` accepted) to a filter.
pub fn log_level_filter(level: &str) -> Option<log::LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Some(log::LevelFilter::Off),
        "error" | "critical" => Some(log::LevelFilter::Error),
        "warn" | "warning" => Some(log::LevelFilter::Warn),
        "info" => Some(log::LevelFilter::Info),
        "debug" => Some(log::LevelFilter::Debug),
        "trace" => Some(log::LevelFilter::Trace),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn configured() -> Config {
        let mut cfg = Config::default();
        let vars = env(&[
            ("DISCORD_TOKEN", "tok"),
            ("DB_USER", "economy"),
            ("DB_PASSWORD", "hunter2"),
        ]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        cfg
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.database.name, "coinsengine_shared");
        assert_eq!(cfg.database.table, "coinsengine_users");
        assert_eq!(cfg.database.pool_size, 5);
        assert_eq!(cfg.console.session_timeout, 5);
        assert!(cfg.discord.log_channel_id.is_none());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let cfg = Config::default();
        match cfg.validate() {
            Err(ConfigError::MissingRequired(key)) => assert_eq!(key, "DISCORD_TOKEN"),
            other => panic!("expected missing token, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_db_password_is_fatal() {
        let mut cfg = Config::default();
        let vars = env(&[("DISCORD_TOKEN", "tok"), ("DB_USER", "economy")]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        match cfg.validate() {
            Err(ConfigError::MissingRequired(key)) => assert_eq!(key, "DB_PASSWORD"),
            other => panic!("expected missing password, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_and_optional_ids() {
        let mut cfg = configured();
        let vars = env(&[
            ("DB_PORT", "3307"),
            ("TABLE_NAME", "players_v2"),
            ("LOG_CHANNEL_ID", "998877"),
            ("GUILD_ID", ""),
            ("LOG_LEVEL", "DEBUG"),
        ]);
        cfg.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.database.port, 3307);
        assert_eq!(cfg.database.table, "players_v2");
        assert_eq!(cfg.discord.log_channel_id, Some(998877));
        assert_eq!(cfg.discord.guild_id, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_non_numeric_port_rejected() {
        let mut cfg = Config::default();
        let vars = env(&[("DB_PORT", "mysql")]);
        let err = cfg.apply_env(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "DB_PORT", .. }));
    }

    #[test]
    fn test_unsafe_table_name_rejected() {
        let mut cfg = configured();
        cfg.database.table = "users; DROP TABLE users".to_string();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { key: "TABLE_NAME", .. })
        ));
    }

    #[test]
    fn test_describe_omits_password() {
        let cfg = configured();
        let text = cfg.database.describe();
        assert!(text.contains("economy@localhost:3306"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(log_level_filter("INFO"), Some(log::LevelFilter::Info));
        assert_eq!(log_level_filter("warning"), Some(log::LevelFilter::Warn));
        assert_eq!(log_level_filter("loud"), None);
    }
}
