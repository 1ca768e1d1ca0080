//! Cancellable one-shot timers that report back into the engine's event stream.
//!
//! A timer is a spawned task that sleeps until its deadline and then sends
//! [`EngineEvent::TimerFired`]. Cancelling aborts the task, but a firing may
//! already be queued by then, so every [`TimerKind`] carries the ticket it was
//! armed with and handlers compare it against the ticket they still hold.

use super::EngineEvent;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::trace;
use uuid::Uuid;

/// Identifies one arming of a timer.
pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    MatchmakingFallback { ticket: Ticket },
    Forfeit { session_id: Uuid, ticket: Ticket },
    BotMove { session_id: Uuid, ticket: Ticket },
    ChallengeExpiry { challenge_id: Uuid, ticket: Ticket },
}

impl TimerKind {
    pub fn ticket(&self) -> Ticket {
        match *self {
            TimerKind::MatchmakingFallback { ticket }
            | TimerKind::Forfeit { ticket, .. }
            | TimerKind::BotMove { ticket, .. }
            | TimerKind::ChallengeExpiry { ticket, .. } => ticket,
        }
    }
}

/// A pending timer. Dropping the handle does not cancel it.
#[derive(Debug)]
pub struct TimerHandle {
    ticket: Ticket,
    abort: AbortHandle,
}

impl TimerHandle {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn cancel(self) {
        trace!("⏹️ Timer {} cancelled", self.ticket);
        self.abort.abort();
    }
}

#[derive(Debug)]
pub struct TimerScheduler {
    events: UnboundedSender<EngineEvent>,
    next_ticket: Ticket,
}

impl TimerScheduler {
    pub fn new(events: UnboundedSender<EngineEvent>) -> Self {
        Self { events, next_ticket: 1 }
    }

    /// Arms a timer that fires `kind(ticket)` after `delay`.
    pub fn schedule(&mut self, delay: Duration, kind: impl FnOnce(Ticket) -> TimerKind) -> TimerHandle {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let kind = kind(ticket);
        let deadline = Instant::now() + delay;
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            sleep_until(deadline).await;
            // The engine may already be gone during shutdown
            let _ = events.send(EngineEvent::TimerFired(kind));
        });

        trace!("⏲️ Timer {} armed for {:?}: {:?}", ticket, delay, kind);
        TimerHandle {
            ticket,
            abort: task.abort_handle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TimerScheduler::new(tx);
        let handle = scheduler.schedule(Duration::from_millis(500), |ticket| TimerKind::MatchmakingFallback { ticket });

        let start = Instant::now();
        match rx.recv().await {
            Some(EngineEvent::TimerFired(kind)) => assert_eq!(kind.ticket(), handle.ticket()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TimerScheduler::new(tx);
        let first = scheduler.schedule(Duration::from_secs(1), |ticket| TimerKind::MatchmakingFallback { ticket });
        let second = scheduler.schedule(Duration::from_secs(2), |ticket| TimerKind::MatchmakingFallback { ticket });
        assert_ne!(first.ticket(), second.ticket());
        first.cancel();

        match rx.recv().await {
            Some(EngineEvent::TimerFired(kind)) => assert_eq!(kind.ticket(), second.ticket()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
