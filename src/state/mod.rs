//! Authoritative directory of active sessions and the public command
//! surface.
//!
//! The registry is an arena of per-session tasks indexed by id. Every
//! command is all-or-nothing: it is forwarded into the target session's
//! serialized queue and either returns the typed response or a
//! [`CommandError`]; no command leaves state partially mutated on failure.

/// Per-session event fan-out hub.
pub mod broadcast;
/// Mode-independent session state and membership.
pub mod session;
/// Explicit session-status machine.
pub mod status;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast as tokio_broadcast, mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::EngineConfig,
    dto::{
        config::SessionConfig,
        events::SessionEvent,
        pictionary::GuessOutcome,
        quiz::{AnswerReceipt, ValidationReceipt},
        session::{
            AdminSnapshot, DrawingReceipt, JoinRequest, JoinResponse, SessionOutcome,
            SessionSummary,
        },
    },
    engine::{Command, Engine, Reply, SessionActor, Shared, drawing::DrawingStore, timer::TimerService},
    error::CommandError,
    scoring::ScoringLedger,
    state::{
        broadcast::EventHub,
        session::{CreatorRef, GameMode, Origin, Participant, SessionCore},
    },
};

/// Shared handle to the registry; cloning only bumps the inner `Arc`.
pub type SharedRegistry = Arc<SessionRegistry>;

/// Handle kept in the directory for one live session task.
struct SessionHandle {
    mode: GameMode,
    cmd_tx: mpsc::Sender<Command>,
    hub: EventHub,
}

/// Arena of active sessions, the single entry point of the engine.
pub struct SessionRegistry {
    config: Arc<EngineConfig>,
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    /// Build a registry wrapped in an [`Arc`] so it can be shared cheaply.
    pub fn new(config: EngineConfig) -> SharedRegistry {
        Arc::new(Self {
            config: Arc::new(config),
            sessions: DashMap::new(),
        })
    }

    /// Create a session: validate its configuration, spawn its task, and
    /// return the initial lobby snapshot.
    pub fn create(
        &self,
        config: SessionConfig,
        creator: CreatorRef,
    ) -> Result<SessionSummary, CommandError> {
        config.validate()?;
        self.spawn_session(config, creator)
    }

    /// Create a session on behalf of a participant room master: the lobby is
    /// spawned with the creator already designated, and the creator joins in
    /// the same breath so the returned response carries their id.
    pub async fn create_as_master(
        &self,
        config: SessionConfig,
        request: JoinRequest,
    ) -> Result<JoinResponse, CommandError> {
        config.validate()?;
        let (display_name, team_name) = sanitize_join(request)?;

        let master_id = Uuid::new_v4();
        let summary = self.spawn_session(config, CreatorRef::Participant(master_id))?;
        let session_id = summary.id;

        let participant = Participant {
            id: master_id,
            display_name,
            team_name,
        };
        self.send(session_id, |reply| Command::Join { participant, reply })
            .await
    }

    fn spawn_session(
        &self,
        config: SessionConfig,
        creator: CreatorRef,
    ) -> Result<SessionSummary, CommandError> {
        let id = Uuid::new_v4();
        let mode = match &config {
            SessionConfig::Quiz(_) => GameMode::Quiz,
            SessionConfig::Pictionary(_) => GameMode::Pictionary,
            SessionConfig::Relay(_) => GameMode::Relay,
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(self.config.command_capacity);
        let hub = EventHub::new(self.config.event_capacity);
        let shared = Shared {
            core: SessionCore::new(id, mode, creator),
            ledger: ScoringLedger::default(),
            drawings: DrawingStore::default(),
            hub: hub.clone(),
            timers: TimerService::new(cmd_tx.clone(), self.config.tick_interval),
            config: Arc::clone(&self.config),
        };
        let actor = SessionActor::new(shared, Engine::from_config(config));
        let summary = actor.summary();

        self.sessions.insert(
            id,
            SessionHandle {
                mode,
                cmd_tx,
                hub,
            },
        );
        tokio::spawn(actor.run(cmd_rx));

        info!(session = %id, ?mode, "session created");
        Ok(summary)
    }

    /// Subscribe to a session's event stream.
    pub fn subscribe(
        &self,
        id: Uuid,
    ) -> Result<tokio_broadcast::Receiver<SessionEvent>, CommandError> {
        let handle = self
            .sessions
            .get(&id)
            .ok_or_else(|| unknown_session(id))?;
        Ok(handle.hub.subscribe())
    }

    /// Ids and modes of every active session.
    pub fn sessions(&self) -> Vec<(Uuid, GameMode)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().mode))
            .collect()
    }

    /// Add a participant to a lobby. Fails with `NotFound` for an unknown
    /// session and `InvalidState` when late joins are disallowed for the
    /// mode and the session already left the lobby.
    pub async fn join(&self, id: Uuid, request: JoinRequest) -> Result<JoinResponse, CommandError> {
        let (display_name, team_name) = sanitize_join(request)?;
        let participant = Participant {
            id: Uuid::new_v4(),
            display_name,
            team_name,
        };
        self.send(id, |reply| Command::Join { participant, reply })
            .await
    }

    /// Remove a participant from a session.
    pub async fn leave(
        &self,
        id: Uuid,
        participant_id: Uuid,
    ) -> Result<SessionSummary, CommandError> {
        self.send(id, |reply| Command::Leave {
            participant_id,
            reply,
        })
        .await
    }

    /// Start the game; admin or room master only.
    pub async fn start(&self, id: Uuid, origin: Origin) -> Result<SessionSummary, CommandError> {
        self.send(id, |reply| Command::Start { origin, reply }).await
    }

    /// Manually advance the game (next question, skip passage or phase).
    pub async fn advance(&self, id: Uuid, origin: Origin) -> Result<SessionSummary, CommandError> {
        self.send(id, |reply| Command::Advance { origin, reply })
            .await
    }

    /// Stop the game and return to the lobby; distinct from natural finish.
    pub async fn stop(&self, id: Uuid, origin: Origin) -> Result<SessionSummary, CommandError> {
        self.send(id, |reply| Command::Stop { origin, reply }).await
    }

    /// Archive a finished session; it stays readable until deleted.
    pub async fn archive(&self, id: Uuid, origin: Origin) -> Result<SessionSummary, CommandError> {
        self.send(id, |reply| Command::Archive { origin, reply })
            .await
    }

    /// Delete a session: cancel its timers, notify subscribers, stop its
    /// task, and drop it from the directory.
    pub async fn delete(&self, id: Uuid, origin: Origin) -> Result<(), CommandError> {
        self.send(id, |reply| Command::Delete { origin, reply })
            .await?;
        self.sessions.remove(&id);
        debug!(session = %id, "session removed from the directory");
        Ok(())
    }

    /// Submit a quiz answer; one per participant per question.
    pub async fn submit_answer(
        &self,
        id: Uuid,
        participant_id: Uuid,
        text: impl Into<String>,
    ) -> Result<AnswerReceipt, CommandError> {
        let text = text.into();
        self.send(id, |reply| Command::SubmitAnswer {
            participant_id,
            text,
            reply,
        })
        .await
    }

    /// Validate an answer post-hoc; admin only, idempotent per slot.
    pub async fn validate_answer(
        &self,
        id: Uuid,
        origin: Origin,
        participant_id: Uuid,
        question_index: usize,
        correct: bool,
    ) -> Result<ValidationReceipt, CommandError> {
        self.send(id, |reply| Command::ValidateAnswer {
            origin,
            participant_id,
            question_index,
            correct,
            reply,
        })
        .await
    }

    /// Submit a pictionary guess for the participant's team.
    pub async fn guess(
        &self,
        id: Uuid,
        participant_id: Uuid,
        text: impl Into<String>,
    ) -> Result<GuessOutcome, CommandError> {
        let text = text.into();
        self.send(id, |reply| Command::Guess {
            participant_id,
            text,
            reply,
        })
        .await
    }

    /// Upload a team's canvas snapshot through the save protocol.
    pub async fn save_drawing(
        &self,
        id: Uuid,
        participant_id: Uuid,
        image_data: impl Into<String>,
    ) -> Result<DrawingReceipt, CommandError> {
        let image_data = image_data.into();
        self.send(id, |reply| Command::SaveDrawing {
            participant_id,
            image_data,
            reply,
        })
        .await
    }

    /// Relay a live canvas stroke. Fire-and-forget: the stroke is dropped
    /// when the painter lacks draw permission or the queue is full, and
    /// correctness never depends on it arriving.
    pub fn stroke(
        &self,
        id: Uuid,
        participant_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<(), CommandError> {
        let handle = self
            .sessions
            .get(&id)
            .ok_or_else(|| unknown_session(id))?;
        if handle
            .cmd_tx
            .try_send(Command::Stroke {
                participant_id,
                payload,
            })
            .is_err()
        {
            debug!(session = %id, "stroke dropped (queue full or session closing)");
        }
        Ok(())
    }

    /// Public snapshot of a session.
    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSummary, CommandError> {
        self.send(id, |reply| Command::Snapshot { reply }).await
    }

    /// Full monitor view including withheld content; admin only.
    pub async fn admin_snapshot(
        &self,
        id: Uuid,
        origin: Origin,
    ) -> Result<AdminSnapshot, CommandError> {
        self.send(id, |reply| Command::AdminSnapshot { origin, reply })
            .await
    }

    /// Finish payload of a finished or archived session.
    pub async fn outcome(&self, id: Uuid) -> Result<SessionOutcome, CommandError> {
        self.send(id, |reply| Command::Outcome { reply }).await
    }

    /// Forward a command into the session's queue and await its reply.
    async fn send<T>(
        &self,
        id: Uuid,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, CommandError> {
        let cmd_tx = {
            let handle = self
                .sessions
                .get(&id)
                .ok_or_else(|| unknown_session(id))?;
            handle.cmd_tx.clone()
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| unknown_session(id))?;
        reply_rx.await.map_err(|_| unknown_session(id))?
    }
}

fn unknown_session(id: Uuid) -> CommandError {
    CommandError::NotFound(format!("session `{id}` not found"))
}

/// Validate a join request and trim its names.
fn sanitize_join(request: JoinRequest) -> Result<(String, String), CommandError> {
    request.validate()?;
    let display_name = request.display_name.trim().to_string();
    let team_name = request.team_name.trim().to_string();
    if display_name.is_empty() || team_name.is_empty() {
        return Err(CommandError::InvalidInput(
            "display and team names must not be blank".into(),
        ));
    }
    Ok((display_name, team_name))
}
