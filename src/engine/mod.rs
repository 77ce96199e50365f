//! Per-session command execution.
//!
//! Each session runs as one spawned task consuming a serialized command
//! queue, so no two mutations of the same session ever interleave; different
//! sessions run concurrently and share no mutable state. Timer callbacks are
//! ordinary messages re-delivered into the same queue and re-validated
//! against current state before acting.

/// Drawing artifacts and the idempotent save protocol.
pub mod drawing;
mod pictionary;
mod quiz;
mod relay;
pub(crate) mod timer;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    dto::{
        config::SessionConfig,
        events::SessionEvent,
        pictionary::GuessOutcome,
        quiz::{AnswerReceipt, ValidationReceipt},
        session::{
            AdminDetail, AdminSnapshot, DrawingReceipt, JoinResponse, ModeSnapshot,
            SessionOutcome, SessionSummary, TeamScore, TeamStanding,
        },
    },
    error::CommandError,
    scoring::ScoringLedger,
    state::{
        broadcast::EventHub,
        session::{Origin, Participant, SessionCore},
        status::{SessionStatus, StatusEvent},
    },
};

use self::{
    drawing::DrawingStore,
    pictionary::PictionaryEngine,
    quiz::QuizEngine,
    relay::RelayEngine,
    timer::{TimerKind, TimerService},
};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, CommandError>>;

/// Messages processed by a session task. External commands carry a reply
/// channel; timer messages are re-delivered by the session's own timers and
/// carry the generation they were armed with.
pub(crate) enum Command {
    Join {
        participant: Participant,
        reply: Reply<JoinResponse>,
    },
    Leave {
        participant_id: Uuid,
        reply: Reply<SessionSummary>,
    },
    Start {
        origin: Origin,
        reply: Reply<SessionSummary>,
    },
    Advance {
        origin: Origin,
        reply: Reply<SessionSummary>,
    },
    Stop {
        origin: Origin,
        reply: Reply<SessionSummary>,
    },
    Archive {
        origin: Origin,
        reply: Reply<SessionSummary>,
    },
    Delete {
        origin: Origin,
        reply: Reply<()>,
    },
    SubmitAnswer {
        participant_id: Uuid,
        text: String,
        reply: Reply<AnswerReceipt>,
    },
    ValidateAnswer {
        origin: Origin,
        participant_id: Uuid,
        question_index: usize,
        correct: bool,
        reply: Reply<ValidationReceipt>,
    },
    Guess {
        participant_id: Uuid,
        text: String,
        reply: Reply<GuessOutcome>,
    },
    SaveDrawing {
        participant_id: Uuid,
        image_data: String,
        reply: Reply<DrawingReceipt>,
    },
    Stroke {
        participant_id: Uuid,
        payload: serde_json::Value,
    },
    Snapshot {
        reply: Reply<SessionSummary>,
    },
    AdminSnapshot {
        origin: Origin,
        reply: Reply<AdminSnapshot>,
    },
    Outcome {
        reply: Reply<SessionOutcome>,
    },
    TimerTick {
        generation: u64,
        kind: TimerKind,
        remaining_secs: u64,
    },
    TimerFired {
        generation: u64,
        kind: TimerKind,
    },
}

/// State owned by a session task and threaded through the mode engines.
pub(crate) struct Shared {
    pub core: SessionCore,
    pub ledger: ScoringLedger,
    pub drawings: DrawingStore,
    pub hub: EventHub,
    pub timers: TimerService,
    pub config: Arc<EngineConfig>,
}

/// Team roster frozen when a game starts; member order is join order.
#[derive(Debug, Clone)]
pub(crate) struct TeamRoster {
    pub name: String,
    pub members: Vec<Uuid>,
}

/// Snapshot the current team rosters in first-appearance order.
pub(crate) fn freeze_rosters(core: &SessionCore) -> Vec<TeamRoster> {
    core.teams()
        .into_iter()
        .map(|(name, members)| TeamRoster { name, members })
        .collect()
}

/// Teams relevant for scoreboards: every current team plus any team that
/// only exists in the ledger (all of its members left).
fn scored_team_names(core: &SessionCore, ledger: &ScoringLedger) -> Vec<String> {
    let mut names: Vec<String> = core.teams().keys().cloned().collect();
    for team in ledger.totals().keys() {
        if !names.iter().any(|name| name == team) {
            names.push(team.clone());
        }
    }
    names
}

/// Current totals in standing order.
pub(crate) fn team_scores(core: &SessionCore, ledger: &ScoringLedger) -> Vec<TeamScore> {
    let names = scored_team_names(core, ledger);
    ledger
        .standings(names.iter().map(String::as_str))
        .into_iter()
        .map(|(team, score)| TeamScore { team, score })
        .collect()
}

/// Final ranking: totals sorted descending, ties broken by team name.
pub(crate) fn ranking(core: &SessionCore, ledger: &ScoringLedger) -> Vec<TeamStanding> {
    let names = scored_team_names(core, ledger);
    ledger
        .standings(names.iter().map(String::as_str))
        .into_iter()
        .enumerate()
        .map(|(position, (team, score))| TeamStanding {
            rank: position + 1,
            team,
            score,
        })
        .collect()
}

/// Assemble the public snapshot around a mode-specific slice.
pub(crate) fn summary_with(shared: &Shared, detail: ModeSnapshot) -> SessionSummary {
    SessionSummary {
        id: shared.core.id,
        status: shared.core.status(),
        participants: shared.core.participants.values().map(Into::into).collect(),
        team_totals: team_scores(&shared.core, &shared.ledger),
        remaining_secs: shared.timers.remaining().map(|left| left.as_secs()),
        detail,
    }
}

/// Mode engine dispatch.
pub(crate) enum Engine {
    Quiz(QuizEngine),
    Pictionary(PictionaryEngine),
    Relay(RelayEngine),
}

impl Engine {
    pub fn from_config(config: SessionConfig) -> Self {
        match config {
            SessionConfig::Quiz(config) => Engine::Quiz(QuizEngine::new(config)),
            SessionConfig::Pictionary(config) => {
                Engine::Pictionary(PictionaryEngine::new(config))
            }
            SessionConfig::Relay(config) => Engine::Relay(RelayEngine::new(config)),
        }
    }

    fn summary(&self, shared: &Shared) -> SessionSummary {
        match self {
            Engine::Quiz(engine) => engine.summary(shared),
            Engine::Pictionary(engine) => engine.summary(shared),
            Engine::Relay(engine) => engine.summary(shared),
        }
    }

    fn admin_detail(&self) -> AdminDetail {
        match self {
            Engine::Quiz(engine) => engine.admin_detail(),
            Engine::Pictionary(engine) => engine.admin_detail(),
            Engine::Relay(engine) => engine.admin_detail(),
        }
    }

    fn start(&mut self, shared: &mut Shared, origin: Origin) -> Result<SessionSummary, CommandError> {
        match self {
            Engine::Quiz(engine) => engine.start(shared, origin),
            Engine::Pictionary(engine) => engine.start(shared, origin),
            Engine::Relay(engine) => engine.start(shared, origin),
        }
    }

    fn advance(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        match self {
            Engine::Quiz(engine) => engine.advance(shared, origin),
            Engine::Pictionary(engine) => engine.advance(shared, origin),
            Engine::Relay(engine) => engine.advance(shared, origin),
        }
    }

    fn stop(&mut self, shared: &mut Shared, origin: Origin) -> Result<SessionSummary, CommandError> {
        match self {
            Engine::Quiz(engine) => engine.stop(shared, origin),
            Engine::Pictionary(engine) => engine.stop(shared, origin),
            Engine::Relay(engine) => engine.stop(shared, origin),
        }
    }

    fn submit_answer(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        text: String,
    ) -> Result<AnswerReceipt, CommandError> {
        match self {
            Engine::Quiz(engine) => engine.submit_answer(shared, participant_id, text),
            _ => Err(CommandError::InvalidState(
                "answers belong to quiz sessions".into(),
            )),
        }
    }

    fn validate_answer(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
        participant_id: Uuid,
        question_index: usize,
        correct: bool,
    ) -> Result<ValidationReceipt, CommandError> {
        match self {
            Engine::Quiz(engine) => {
                engine.validate_answer(shared, origin, participant_id, question_index, correct)
            }
            _ => Err(CommandError::InvalidState(
                "answer validation belongs to quiz sessions".into(),
            )),
        }
    }

    fn guess(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        text: String,
    ) -> Result<GuessOutcome, CommandError> {
        match self {
            Engine::Pictionary(engine) => engine.guess(shared, participant_id, text),
            _ => Err(CommandError::InvalidState(
                "guesses belong to pictionary sessions".into(),
            )),
        }
    }

    fn save_drawing(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        image_data: String,
    ) -> Result<DrawingReceipt, CommandError> {
        match self {
            Engine::Pictionary(engine) => engine.save_drawing(shared, participant_id, image_data),
            Engine::Relay(engine) => engine.save_drawing(shared, participant_id, image_data),
            Engine::Quiz(_) => Err(CommandError::InvalidState(
                "quiz sessions have no canvas".into(),
            )),
        }
    }

    fn allow_stroke(&self, shared: &Shared, participant_id: Uuid) -> bool {
        match self {
            Engine::Quiz(_) => false,
            Engine::Pictionary(engine) => engine.allow_stroke(shared, participant_id),
            Engine::Relay(engine) => engine.allow_stroke(shared, participant_id),
        }
    }

    fn timer_fired(&mut self, shared: &mut Shared, kind: TimerKind) {
        match self {
            Engine::Quiz(engine) => engine.timer_fired(shared, kind),
            Engine::Pictionary(engine) => engine.timer_fired(shared, kind),
            Engine::Relay(engine) => engine.timer_fired(shared, kind),
        }
    }

    fn on_participant_left(&mut self, shared: &mut Shared) {
        if let Engine::Quiz(engine) = self {
            engine.on_participant_left(shared);
        }
    }

    fn outcome(&self, shared: &Shared) -> SessionOutcome {
        match self {
            Engine::Quiz(engine) => engine.outcome(shared),
            Engine::Pictionary(engine) => engine.outcome(shared),
            Engine::Relay(engine) => engine.outcome(shared),
        }
    }
}

/// One session's task state: the mode engine plus everything it shares.
pub(crate) struct SessionActor {
    shared: Shared,
    engine: Engine,
}

impl SessionActor {
    pub fn new(shared: Shared, engine: Engine) -> Self {
        Self { shared, engine }
    }

    /// Public snapshot, used by the registry right after creation.
    pub fn summary(&self) -> SessionSummary {
        self.engine.summary(&self.shared)
    }

    /// Process commands until the session is deleted. Timers are cancelled
    /// on the way out; a stale timer firing into a deleted session is the
    /// main leak hazard.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let session = self.shared.core.id;
        debug!(%session, "session task started");
        while let Some(command) = rx.recv().await {
            if self.handle(command) {
                break;
            }
        }
        self.shared.timers.cancel_all();
        debug!(%session, "session task stopped");
    }

    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Join { participant, reply } => {
                let _ = reply.send(self.join(participant));
            }
            Command::Leave {
                participant_id,
                reply,
            } => {
                let _ = reply.send(self.leave(participant_id));
            }
            Command::Start { origin, reply } => {
                let _ = reply.send(self.engine.start(&mut self.shared, origin));
            }
            Command::Advance { origin, reply } => {
                let _ = reply.send(self.engine.advance(&mut self.shared, origin));
            }
            Command::Stop { origin, reply } => {
                let _ = reply.send(self.engine.stop(&mut self.shared, origin));
            }
            Command::Archive { origin, reply } => {
                let _ = reply.send(self.archive(origin));
            }
            Command::Delete { origin, reply } => {
                let result = self.delete(origin);
                let stop = result.is_ok();
                let _ = reply.send(result);
                return stop;
            }
            Command::SubmitAnswer {
                participant_id,
                text,
                reply,
            } => {
                let _ = reply.send(self.engine.submit_answer(&mut self.shared, participant_id, text));
            }
            Command::ValidateAnswer {
                origin,
                participant_id,
                question_index,
                correct,
                reply,
            } => {
                let _ = reply.send(self.engine.validate_answer(
                    &mut self.shared,
                    origin,
                    participant_id,
                    question_index,
                    correct,
                ));
            }
            Command::Guess {
                participant_id,
                text,
                reply,
            } => {
                let _ = reply.send(self.engine.guess(&mut self.shared, participant_id, text));
            }
            Command::SaveDrawing {
                participant_id,
                image_data,
                reply,
            } => {
                let _ = reply.send(self.engine.save_drawing(
                    &mut self.shared,
                    participant_id,
                    image_data,
                ));
            }
            Command::Stroke {
                participant_id,
                payload,
            } => self.stroke(participant_id, payload),
            Command::Snapshot { reply } => {
                let _ = reply.send(Ok(self.engine.summary(&self.shared)));
            }
            Command::AdminSnapshot { origin, reply } => {
                let _ = reply.send(self.admin_snapshot(origin));
            }
            Command::Outcome { reply } => {
                let _ = reply.send(self.outcome());
            }
            Command::TimerTick {
                generation,
                kind,
                remaining_secs,
            } => {
                if self.shared.timers.accepts(generation, kind) {
                    self.shared
                        .hub
                        .broadcast(SessionEvent::TimerTick { remaining_secs });
                }
            }
            Command::TimerFired { generation, kind } => {
                if self.shared.timers.accepts(generation, kind) {
                    self.shared.timers.disarm(kind);
                    self.engine.timer_fired(&mut self.shared, kind);
                } else {
                    debug!(?kind, "stale timer message discarded");
                }
            }
        }
        false
    }

    fn join(&mut self, participant: Participant) -> Result<JoinResponse, CommandError> {
        match self.shared.core.status() {
            SessionStatus::Waiting => {}
            SessionStatus::Playing if self.shared.core.mode.allows_late_join() => {}
            SessionStatus::Playing => {
                return Err(CommandError::InvalidState(
                    "late joins are not allowed for this mode".into(),
                ));
            }
            SessionStatus::Finished | SessionStatus::Archived => {
                return Err(CommandError::InvalidState("the session is over".into()));
            }
        }

        let summary_participant = (&participant).into();
        let participant_id = participant.id;
        self.shared
            .core
            .participants
            .insert(participant_id, participant);

        let session = self.engine.summary(&self.shared);
        self.shared.hub.broadcast(SessionEvent::ParticipantJoined {
            participant: summary_participant,
            session: session.clone(),
        });
        Ok(JoinResponse {
            participant_id,
            session,
        })
    }

    fn leave(&mut self, participant_id: Uuid) -> Result<SessionSummary, CommandError> {
        if self
            .shared
            .core
            .participants
            .shift_remove(&participant_id)
            .is_none()
        {
            return Err(CommandError::NotFound(format!(
                "participant `{participant_id}` not found"
            )));
        }
        self.engine.on_participant_left(&mut self.shared);

        let session = self.engine.summary(&self.shared);
        self.shared.hub.broadcast(SessionEvent::ParticipantLeft {
            participant_id,
            session: session.clone(),
        });
        Ok(session)
    }

    fn archive(&mut self, origin: Origin) -> Result<SessionSummary, CommandError> {
        if !self.shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may archive the session".into(),
            ));
        }
        self.shared.core.apply_status(StatusEvent::Archive)?;

        let session = self.engine.summary(&self.shared);
        self.shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Archived,
            session: session.clone(),
        });
        Ok(session)
    }

    fn delete(&mut self, origin: Origin) -> Result<(), CommandError> {
        if !self.shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may delete the session".into(),
            ));
        }
        self.shared.timers.cancel_all();
        self.shared.hub.broadcast(SessionEvent::SessionDeleted);
        info!(session = %self.shared.core.id, "session deleted");
        Ok(())
    }

    fn stroke(&mut self, participant_id: Uuid, payload: serde_json::Value) {
        if self.engine.allow_stroke(&self.shared, participant_id) {
            self.shared.hub.broadcast(SessionEvent::StrokePainted {
                participant_id,
                payload,
            });
        } else {
            debug!(%participant_id, "stroke without draw permission dropped");
        }
    }

    fn admin_snapshot(&self, origin: Origin) -> Result<AdminSnapshot, CommandError> {
        if origin != Origin::Admin {
            return Err(CommandError::Forbidden(
                "the full monitor view is admin-only".into(),
            ));
        }
        Ok(AdminSnapshot {
            session: self.engine.summary(&self.shared),
            detail: self.engine.admin_detail(),
        })
    }

    fn outcome(&self) -> Result<SessionOutcome, CommandError> {
        if !matches!(
            self.shared.core.status(),
            SessionStatus::Finished | SessionStatus::Archived
        ) {
            return Err(CommandError::InvalidState(
                "the outcome is available once the session finished".into(),
            ));
        }
        Ok(self.engine.outcome(&self.shared))
    }
}
