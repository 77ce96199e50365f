use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle states a session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Lobby: participants join and leave, the game has not started.
    Waiting,
    /// The mode engine is driving rounds/questions.
    Playing,
    /// The game ran to natural completion; retained for review.
    Finished,
    /// Explicitly archived after finishing.
    Archived,
}

/// Events that move a session between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Begin the game from the lobby.
    Start,
    /// The engine reached natural completion.
    FinishNaturally,
    /// Admin-issued stop; returns to the lobby, distinct from finishing.
    Stop,
    /// Archive a finished session.
    Archive,
}

/// Error returned when a status change is outside the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the session was in when the event was received.
    pub from: SessionStatus,
    /// The event that cannot be applied from this status.
    pub event: StatusEvent,
}

/// Explicit status machine; every edge outside the table is rejected up
/// front instead of being tolerated silently.
#[derive(Debug, Clone)]
pub struct StatusMachine {
    status: SessionStatus,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self {
            status: SessionStatus::Waiting,
        }
    }
}

impl StatusMachine {
    /// Create a machine initialised in the waiting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Apply `event`, returning the new status or a typed rejection.
    pub fn apply(&mut self, event: StatusEvent) -> Result<SessionStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (SessionStatus::Waiting, StatusEvent::Start) => SessionStatus::Playing,
            (SessionStatus::Playing, StatusEvent::FinishNaturally) => SessionStatus::Finished,
            (SessionStatus::Playing, StatusEvent::Stop) => SessionStatus::Waiting,
            (SessionStatus::Finished, StatusEvent::Archive) => SessionStatus::Archived,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.status = next;
        Ok(next)
    }
}
