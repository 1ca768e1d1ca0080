//! Core game server implementation.
//!
//! This module contains the main `GameServer` struct: it binds the listener,
//! spawns the session engine, and hands every accepted socket to its own
//! connection task.

use crate::{
    collaborators::Collaborators,
    config::ServerConfig,
    engine::spawn_engine,
    error::ServerError,
    server::handlers::{handle_connection, refuse_connection},
    stats::EngineStats,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// The core game server structure.
///
/// `GameServer` owns the network side of the system and the lifetime of the
/// session engine. Game rules, matchmaking and reconnection all live in the
/// engine; the server only moves frames between sockets and the engine's
/// event stream.
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Where finished games and lifecycle events are reported
    collaborators: Collaborators,

    /// Counters published by the engine
    stats: Arc<EngineStats>,

    /// Channel for coordinating server shutdown
    shutdown_sender: watch::Sender<bool>,
}

/// Keeps the live connection count accurate however a connection task ends.
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl GameServer {
    /// Creates a new game server with the default collaborators.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_collaborators(config, Collaborators::default())
    }

    /// Creates a new game server reporting to the given collaborators.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration parameters for server behavior
    /// * `collaborators` - Archive and lifecycle-event destinations
    pub fn with_collaborators(config: ServerConfig, collaborators: Collaborators) -> Self {
        let (shutdown_sender, _) = watch::channel(false);
        Self {
            config,
            collaborators,
            stats: EngineStats::new(),
            shutdown_sender,
        }
    }

    /// Binds the configured address and serves until [`GameServer::shutdown`] is called.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a `ServerError`
    /// if the listener could not be bound.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting game server on {}", self.config.bind_address);
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind {}: {e}", self.config.bind_address)))?;
        self.serve(listener).await
    }

    /// Serves connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(e.to_string()))?;
        info!("🌐 Listening for WebSocket connections on {}", local_addr);

        let (engine, engine_task) = spawn_engine(&self.config, self.collaborators.clone(), self.stats.clone());
        let active_connections = Arc::new(AtomicUsize::new(0));
        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            if *shutdown_receiver.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let current = active_connections.fetch_add(1, Ordering::Relaxed);
                    let slot = ConnectionSlot(active_connections.clone());
                    if current >= self.config.max_connections {
                        warn!("🚧 Refusing {}: {} connections already open", addr, current);
                        tokio::spawn(async move {
                            refuse_connection(stream, addr).await;
                            drop(slot);
                        });
                        continue;
                    }

                    let engine = engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, engine).await {
                            error!("Connection error: {:?}", e);
                        }
                        drop(slot);
                    });
                }
                _ = shutdown_receiver.changed() => {
                    info!("Internal shutdown signal received");
                }
            }
        }

        info!("🧹 Performing server cleanup...");
        if engine.shutdown().is_ok() {
            if let Err(e) = engine_task.await {
                error!("Session engine task failed: {}", e);
            }
        }
        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    ///
    /// Stops the accept loop; the engine then cancels its timers and closes
    /// every open connection.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        self.shutdown_sender.send_replace(true);
        Ok(())
    }

    /// Live engine counters, readable while the server runs.
    pub fn stats(&self) -> Arc<EngineStats> {
        self.stats.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
