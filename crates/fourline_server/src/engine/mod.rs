//! The real-time session engine.
//!
//! All engine state is owned by a single task that consumes one channel of
//! [`EngineEvent`]s: connection lifecycle, inbound frames and timer firings.
//! Handlers run one at a time and to completion, so there is no locking around
//! the registry, queue, challenges or sessions. Socket tasks talk to the engine
//! through a cloneable [`EngineHandle`].

pub mod challenges;
pub mod matchmaking;
pub mod orchestrator;
pub mod reconnect;
pub mod registry;
pub mod session;
pub mod timers;

use crate::collaborators::Collaborators;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::messaging::ServerMessage;
use crate::stats::EngineStats;
use orchestrator::Orchestrator;
use registry::ConnectionId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timers::TimerKind;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the engine reacts to.
#[derive(Debug)]
pub enum EngineEvent {
    Connected {
        connection_id: ConnectionId,
        remote_addr: SocketAddr,
        outbox: UnboundedSender<ServerMessage>,
    },
    Inbound {
        connection_id: ConnectionId,
        text: String,
    },
    Disconnected {
        connection_id: ConnectionId,
    },
    TimerFired(TimerKind),
    Shutdown,
}

/// Cloneable entry point into the engine task.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    events: UnboundedSender<EngineEvent>,
    next_connection_id: Arc<AtomicUsize>,
}

impl EngineHandle {
    /// Registers a new connection and returns its id plus the queue of
    /// messages to write to its socket.
    pub fn open_connection(
        &self,
        remote_addr: SocketAddr,
    ) -> Result<(ConnectionId, UnboundedReceiver<ServerMessage>), ServerError> {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (outbox, outbox_receiver) = mpsc::unbounded_channel();
        self.send(EngineEvent::Connected {
            connection_id,
            remote_addr,
            outbox,
        })?;
        Ok((connection_id, outbox_receiver))
    }

    pub fn inbound(&self, connection_id: ConnectionId, text: String) -> Result<(), ServerError> {
        self.send(EngineEvent::Inbound {
            connection_id,
            text,
        })
    }

    pub fn close_connection(&self, connection_id: ConnectionId) -> Result<(), ServerError> {
        self.send(EngineEvent::Disconnected { connection_id })
    }

    /// Asks the engine to cancel its timers and close every connection.
    pub fn shutdown(&self) -> Result<(), ServerError> {
        self.send(EngineEvent::Shutdown)
    }

    fn send(&self, event: EngineEvent) -> Result<(), ServerError> {
        self.events
            .send(event)
            .map_err(|_| ServerError::Internal("session engine has stopped".to_string()))
    }
}

/// Spawns the engine task.
pub fn spawn_engine(
    config: &ServerConfig,
    collaborators: Collaborators,
    stats: Arc<EngineStats>,
) -> (EngineHandle, JoinHandle<()>) {
    let (events, receiver) = mpsc::unbounded_channel();
    let orchestrator = Orchestrator::new(config, events.clone(), collaborators, stats);

    let handle = EngineHandle {
        events,
        next_connection_id: Arc::new(AtomicUsize::new(1)),
    };
    let task = tokio::spawn(run_engine(orchestrator, receiver));
    (handle, task)
}

async fn run_engine(mut orchestrator: Orchestrator, mut receiver: UnboundedReceiver<EngineEvent>) {
    info!("🎯 Session engine started");
    let mut housekeeping = interval(HOUSEKEEPING_INTERVAL);
    housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = receiver.recv() => {
                match event {
                    Some(EngineEvent::Shutdown) | None => {
                        orchestrator.handle_event(EngineEvent::Shutdown);
                        break;
                    }
                    Some(event) => orchestrator.handle_event(event),
                }
            }
            _ = housekeeping.tick() => {
                debug!("🧹 Engine housekeeping");
                orchestrator.housekeeping();
            }
        }
    }

    info!("✅ Session engine stopped");
}
