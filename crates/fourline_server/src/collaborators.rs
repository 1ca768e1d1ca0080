//! Seams to the systems outside the session engine.
//!
//! The engine reports two things to the outside world: a finished game to be
//! stored, and game lifecycle events for analytics. Both are fire-and-forget:
//! [`Collaborators`] spawns each call onto the runtime and only logs failures,
//! so a slow or broken backend never holds up a session.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Row written for every game that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedGame {
    pub id: Uuid,
    pub player1: String,
    pub player2: String,
    /// Display name of the winner; `None` for a draw
    pub winner: Option<String>,
    /// Milliseconds since the Unix epoch
    pub started_at: u64,
    pub ended_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Win,
    Draw,
    Forfeit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    GameStarted {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        players: [String; 2],
        #[serde(rename = "startedAt")]
        started_at: u64,
    },
    GameEnded {
        #[serde(rename = "gameId")]
        game_id: Uuid,
        winner: Option<String>,
        loser: Option<String>,
        players: [String; 2],
        #[serde(rename = "durationMs")]
        duration_ms: u64,
        reason: EndReason,
    },
}

impl LifecycleEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::GameStarted { .. } => "GAME_STARTED",
            LifecycleEvent::GameEnded { .. } => "GAME_ENDED",
        }
    }
}

/// Long-term storage for finished games.
#[async_trait]
pub trait GameArchive: Send + Sync {
    async fn persist_completed_game(&self, game: CompletedGame) -> Result<(), CollaboratorError>;
}

/// Destination for game lifecycle events.
#[async_trait]
pub trait LifecycleSink: Send + Sync {
    async fn emit(&self, event: LifecycleEvent) -> Result<(), CollaboratorError>;
}

/// Appends one JSON object per finished game to a file.
#[derive(Debug)]
pub struct JsonlGameArchive {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlGameArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl GameArchive for JsonlGameArchive {
    async fn persist_completed_game(&self, game: CompletedGame) -> Result<(), CollaboratorError> {
        let failure = |reason: String| CollaboratorError::Persistence {
            game_id: game.id.to_string(),
            reason,
        };

        let mut line = serde_json::to_string(&game).map_err(|e| failure(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| failure(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| failure(e.to_string()))?;
        file.flush().await.map_err(|e| failure(e.to_string()))?;

        debug!("💾 Game {} archived to {}", game.id, self.path.display());
        Ok(())
    }
}

/// Archive used when no storage is configured; finished games are only logged.
#[derive(Debug, Default)]
pub struct DiscardArchive;

#[async_trait]
impl GameArchive for DiscardArchive {
    async fn persist_completed_game(&self, game: CompletedGame) -> Result<(), CollaboratorError> {
        debug!("Game {} finished, no archive configured", game.id);
        Ok(())
    }
}

/// Publishes lifecycle events as structured log records.
#[derive(Debug, Default)]
pub struct TracingLifecycleSink;

#[async_trait]
impl LifecycleSink for TracingLifecycleSink {
    async fn emit(&self, event: LifecycleEvent) -> Result<(), CollaboratorError> {
        let payload = serde_json::to_string(&event).map_err(|e| CollaboratorError::Publish {
            kind: event.kind().to_string(),
            reason: e.to_string(),
        })?;
        info!(target: "fourline::lifecycle", kind = event.kind(), %payload, "📣 Lifecycle event");
        Ok(())
    }
}

/// Both outbound seams, invoked without waiting on the result.
#[derive(Clone)]
pub struct Collaborators {
    archive: Arc<dyn GameArchive>,
    events: Arc<dyn LifecycleSink>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(DiscardArchive), Arc::new(TracingLifecycleSink))
    }
}

impl Collaborators {
    pub fn new(archive: Arc<dyn GameArchive>, events: Arc<dyn LifecycleSink>) -> Self {
        Self { archive, events }
    }

    pub fn persist(&self, game: CompletedGame) {
        let archive = self.archive.clone();
        tokio::spawn(async move {
            let id = game.id;
            if let Err(e) = archive.persist_completed_game(game).await {
                error!("❌ Failed to persist game {}: {}", id, e);
            }
        });
    }

    pub fn emit(&self, event: LifecycleEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let kind = event.kind();
            if let Err(e) = events.emit(event).await {
                error!("❌ Failed to emit {} event: {}", kind, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_game(winner: Option<&str>) -> CompletedGame {
        CompletedGame {
            id: Uuid::new_v4(),
            player1: "alice".into(),
            player2: "bob".into(),
            winner: winner.map(str::to_string),
            started_at: 1_000,
            ended_at: 61_000,
        }
    }

    #[tokio::test]
    async fn test_jsonl_archive_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let archive = JsonlGameArchive::new(dir.path().join("games.jsonl"));

        let first = sample_game(Some("alice"));
        let second = sample_game(None);
        archive.persist_completed_game(first.clone()).await.unwrap();
        archive.persist_completed_game(second.clone()).await.unwrap();

        let contents = tokio::fs::read_to_string(archive.path()).await.unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], first.id.to_string());
        assert_eq!(lines[0]["winner"], "alice");
        assert_eq!(lines[0]["startedAt"], 1_000);
        assert!(lines[1]["winner"].is_null());
    }

    #[tokio::test]
    async fn test_archive_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let archive = JsonlGameArchive::new(dir.path());
        let err = archive.persist_completed_game(sample_game(None)).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Persistence { .. }));
    }

    #[test]
    fn test_game_ended_payload() {
        let id = Uuid::new_v4();
        let event = LifecycleEvent::GameEnded {
            game_id: id,
            winner: Some("alice".into()),
            loser: Some("bob".into()),
            players: ["alice".into(), "bob".into()],
            duration_ms: 42,
            reason: EndReason::Forfeit,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "kind": "GAME_ENDED",
                "gameId": id.to_string(),
                "winner": "alice",
                "loser": "bob",
                "players": ["alice", "bob"],
                "durationMs": 42,
                "reason": "forfeit"
            })
        );
    }
}
