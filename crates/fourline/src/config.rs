//! Configuration management for the Fourline server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use fourline_server::{GameConfig, SecurityConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// Game timing and security limits use the server crate's own types, so a
/// partial `[game]` or `[security]` table falls back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Matchmaking, reconnect and bot timing
    #[serde(default)]
    pub game: GameConfig,
    /// Rate limiting and message shape limits
    #[serde(default)]
    pub security: SecurityConfig,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Where finished games are stored
    #[serde(default)]
    pub archive: ArchiveSettings,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Default for max_connections
fn default_max_connections() -> usize {
    1000
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

/// Finished-game storage. Without a path games are only logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// JSON-lines file that completed games are appended to
    pub path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
            },
            game: GameConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            archive: ArchiveSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a game server configuration.
    ///
    /// # Returns
    ///
    /// A `ServerConfig` instance ready for use with the game server.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            security: self.security.clone(),
            game: self.game.clone(),
        })
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        self.archive.path.as_ref().map(PathBuf::from)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        let delays = [
            ("game.matchmaking_fallback_ms", self.game.matchmaking_fallback_ms),
            ("game.reconnect_grace_ms", self.game.reconnect_grace_ms),
            ("game.challenge_ttl_ms", self.game.challenge_ttl_ms),
        ];
        if let Some((name, _)) = delays.iter().find(|(_, value)| *value == 0) {
            return Err(format!("{name} must be greater than 0"));
        }

        if self.game.bot_name.trim().is_empty() {
            return Err("game.bot_name cannot be empty".to_string());
        }

        if self.security.enable_rate_limiting
            && (self.security.max_messages_per_window == 0 || self.security.rate_limit_window_ms == 0)
        {
            return Err("security rate limit quota and window must be greater than 0".to_string());
        }

        if self.archive.path.as_deref() == Some("") {
            return Err("archive.path cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.game.matchmaking_fallback_ms, 10_000);
        assert_eq!(config.game.reconnect_grace_ms, 30_000);
        assert_eq!(config.game.bot_move_delay_ms, 500);
        assert_eq!(config.game.bot_name, "Rose");
        assert_eq!(config.logging.level, "info");
        assert!(config.archive.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");

        // The default file is written out and reads back the same
        assert!(path.exists());
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.game.challenge_ttl_ms, config.game.challenge_ttl_ms);
        assert_eq!(reloaded.security.max_messages_per_window, 10);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 2000

[game]
reconnect_grace_ms = 45000
bot_name = "Daisy"

[logging]
level = "debug"
json_format = true

[archive]
path = "/tmp/games.jsonl"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.max_connections, 2000);
        assert_eq!(config.game.reconnect_grace_ms, 45_000);
        assert_eq!(config.game.bot_name, "Daisy");
        // Unlisted keys keep their defaults
        assert_eq!(config.game.matchmaking_fallback_ms, 10_000);
        assert!(config.security.enable_rate_limiting);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.archive_path(), Some(PathBuf::from("/tmp/games.jsonl")));
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut config = AppConfig::default();
        config.server.bind_address = "192.168.1.100:8080".to_string();
        config.game.bot_move_delay_ms = 250;

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.bind_address.to_string(), "192.168.1.100:8080");
        assert_eq!(server_config.max_connections, 1000);
        assert_eq!(server_config.game.bot_move_delay_ms, 250);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.game.reconnect_grace_ms = 0;
        assert_eq!(
            config.validate(),
            Err("game.reconnect_grace_ms must be greater than 0".to_string())
        );

        let mut config = AppConfig::default();
        config.security.max_messages_per_window = 0;
        assert!(config.validate().is_err());
        config.security.enable_rate_limiting = false;
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        config.game.bot_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = AppConfig::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} should be accepted");
        }
    }
}
