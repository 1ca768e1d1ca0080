//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, monitoring, and shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent},
};
use fourline_server::{
    Collaborators, DiscardArchive, EngineStats, GameArchive, GameServer, JsonlGameArchive, TracingLifecycleSink,
};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

const STATS_INTERVAL: Duration = Duration::from_secs(60);
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(8);

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the Fourline
/// server: configuration loading, server initialization, health monitoring,
/// and graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Game server instance
    server: Arc<GameServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build the collaborators and the game server
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Some(archive_path) = args.archive_path {
            config.archive.path = Some(archive_path.to_string_lossy().to_string());
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = GameServer::with_collaborators(server_config, build_collaborators(&config));

        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// Runs the server until a shutdown signal arrives, then stops it.
    ///
    /// # Monitoring Features
    ///
    /// * **Configuration Summary**: Displays key settings at startup
    /// * **Periodic Health Reports**: Engine statistics every 60 seconds
    /// * **Final Statistics**: Summary report during shutdown
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Fourline server application");
        self.log_configuration_summary();

        let stats = self.server.stats();

        let mut server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                match server.start().await {
                    Ok(()) => info!("✅ Server completed successfully"),
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        let monitoring_handle = {
            let stats = stats.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(STATS_INTERVAL);
                // The first tick completes immediately
                interval.tick().await;
                let mut last_completed = 0u64;

                loop {
                    interval.tick().await;
                    let snapshot = stats.snapshot();
                    let completed_this_period = snapshot.games_completed - last_completed;
                    last_completed = snapshot.games_completed;

                    info!(
                        "📊 Health - {} online | {} waiting | {} active games | {} games finished/min | {} rate limited",
                        snapshot.online_players,
                        snapshot.waiting_players,
                        snapshot.active_sessions,
                        completed_this_period,
                        snapshot.rate_limited_messages
                    );
                }
            })
        };

        info!("✅ Fourline is now running!");
        info!("🎮 Ready to accept connections on {}", self.config.server.bind_address);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        tokio::select! {
            result = wait_for_shutdown_signal() => result?,
            _ = &mut server_handle => {
                monitoring_handle.abort();
                return Err("server stopped unexpectedly".into());
            }
        }

        // A second signal skips the graceful path
        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("📡 Phase 1: Stopping monitoring...");
        monitoring_handle.abort();

        info!("🧹 Phase 2: Stopping the accept loop and session engine...");
        self.server.shutdown().await?;
        match tokio::time::timeout(SERVER_STOP_TIMEOUT, server_handle).await {
            Ok(_) => info!("✅ Server task completed gracefully"),
            Err(_) => warn!("⏰ Server task did not complete within timeout, proceeding with cleanup"),
        }

        // Let in-flight archive writes finish
        info!("⏳ Waiting for connections to close...");
        tokio::time::sleep(Duration::from_secs(1)).await;

        log_final_statistics(&stats);
        info!("✅ Fourline shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  ⏱️ Bot fallback: {}ms | reconnect grace: {}ms | challenge TTL: {}ms",
            self.config.game.matchmaking_fallback_ms,
            self.config.game.reconnect_grace_ms,
            self.config.game.challenge_ttl_ms
        );
        info!(
            "  💾 Game archive: {}",
            self.config.archive.path.as_deref().unwrap_or("disabled")
        );
    }
}

/// Picks the archive from configuration; lifecycle events always go to the log.
fn build_collaborators(config: &AppConfig) -> Collaborators {
    let archive: Arc<dyn GameArchive> = match config.archive_path() {
        Some(path) => Arc::new(JsonlGameArchive::new(path)),
        None => Arc::new(DiscardArchive),
    };
    Collaborators::new(archive, Arc::new(TracingLifecycleSink))
}

fn log_final_statistics(stats: &EngineStats) {
    let snapshot = stats.snapshot();
    info!("📊 Final Statistics:");
    info!("  - Games started: {}", snapshot.games_started);
    info!("  - Games completed: {}", snapshot.games_completed);
    info!("  - Forfeits: {}", snapshot.forfeits);
    info!("  - Rate-limited messages: {}", snapshot.rate_limited_messages);
    match serde_json::to_string(&snapshot) {
        Ok(json) => info!(target: "fourline::stats", %json, "Final snapshot"),
        Err(e) => warn!("Failed to serialize final statistics: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args(config_path: PathBuf) -> CliArgs {
        CliArgs {
            config_path,
            bind_address: Some("127.0.0.1:0".to_string()),
            log_level: Some("debug".to_string()),
            json_logs: false,
            archive_path: None,
        }
    }

    #[tokio::test]
    async fn test_application_applies_cli_overrides() {
        let dir = tempdir().unwrap();
        let mut cli = args(dir.path().join("config.toml"));
        cli.archive_path = Some(dir.path().join("games.jsonl"));

        let app = Application::new(cli).await.unwrap();
        assert_eq!(app.config.server.bind_address, "127.0.0.1:0");
        assert_eq!(app.config.logging.level, "debug");
        assert!(app.config.archive.path.as_deref().is_some_and(|p| p.ends_with("games.jsonl")));
        assert_eq!(app.server.config().bind_address.port(), 0);
    }

    #[tokio::test]
    async fn test_application_rejects_invalid_overrides() {
        let dir = tempdir().unwrap();
        let mut cli = args(dir.path().join("config.toml"));
        cli.log_level = Some("loud".to_string());

        assert!(Application::new(cli).await.is_err());
    }
}
