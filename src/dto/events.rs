use serde::Serialize;
use uuid::Uuid;

use crate::{
    dto::{
        quiz::QuestionPublic,
        relay::RelayPhase,
        session::{ParticipantSummary, SessionOutcome, SessionSummary, TeamScore},
    },
    state::status::SessionStatus,
};

/// Why a pictionary round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    /// Every non-drawing team found the word before the timer ran out.
    AllFound,
    /// The round timer expired.
    TimedOut,
    /// The admin or room master skipped the round.
    Skipped,
}

/// Broadcast payloads pushed to subscribed viewers after each mutation.
///
/// Boundary events embed a fresh public [`SessionSummary`] so late joiners
/// and reconnecting viewers resynchronise without a separate query.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A participant joined the lobby.
    ParticipantJoined {
        /// The new participant.
        participant: ParticipantSummary,
        /// Updated snapshot.
        session: SessionSummary,
    },
    /// A participant left.
    ParticipantLeft {
        /// The departed participant.
        participant_id: Uuid,
        /// Updated snapshot.
        session: SessionSummary,
    },
    /// The lifecycle status changed.
    StatusChanged {
        /// New status.
        status: SessionStatus,
        /// Updated snapshot.
        session: SessionSummary,
    },
    /// A quiz question opened.
    QuestionOpened {
        /// Player-visible question fields.
        question: QuestionPublic,
        /// Updated snapshot.
        session: SessionSummary,
    },
    /// A participant answered the current question. Only the fact that they
    /// answered is public; the content stays on the admin monitor.
    AnswerFlagged {
        /// Who answered.
        participant_id: Uuid,
        /// Which question.
        question_index: usize,
    },
    /// The admin validated or invalidated an answer.
    AnswerValidated {
        /// Whose answer.
        participant_id: Uuid,
        /// Which question.
        question_index: usize,
        /// The verdict.
        correct: bool,
        /// Totals after the score was applied.
        team_totals: Vec<TeamScore>,
    },
    /// A pictionary passage started.
    RoundStarted {
        /// Passage index.
        round: usize,
        /// Team drawing this passage.
        drawing_team: String,
        /// Member holding draw permission.
        drawer: Option<Uuid>,
        /// Length of the hidden word.
        word_length: usize,
        /// Updated snapshot.
        session: SessionSummary,
    },
    /// Draw permission rotated to the next drawing-team member.
    DrawerRotated {
        /// Passage index.
        round: usize,
        /// Member now holding draw permission.
        drawer: Uuid,
    },
    /// A team found the word.
    WordFound {
        /// Passage index.
        round: usize,
        /// Team that found the word.
        team: String,
        /// Member whose guess matched.
        participant_id: Uuid,
        /// Arrival rank (1 = first).
        rank: usize,
        /// Totals after the awards.
        team_totals: Vec<TeamScore>,
    },
    /// The word was revealed after a round timed out.
    WordRevealed {
        /// Passage index.
        round: usize,
        /// The word that was being drawn.
        word: String,
        /// Teams that had found it.
        teams_found: Vec<String>,
    },
    /// A pictionary passage ended.
    RoundEnded {
        /// Passage index.
        round: usize,
        /// Why it ended.
        reason: RoundEndReason,
        /// Final arrival list of the passage.
        teams_found: Vec<String>,
    },
    /// A relay phase started.
    PhaseChanged {
        /// Round index.
        round: usize,
        /// New phase.
        phase: RelayPhase,
        /// Updated snapshot (carries the round's assignments).
        session: SessionSummary,
    },
    /// A canvas stroke was painted. Fire-and-forget: loss and reordering are
    /// tolerated, correctness rests on the saved drawing at round end.
    StrokePainted {
        /// Painter.
        participant_id: Uuid,
        /// Opaque stroke payload; the canvas wire format is delegated.
        payload: serde_json::Value,
    },
    /// A drawing was persisted for a (round, team) slot.
    DrawingSaved {
        /// Round index.
        round: usize,
        /// Team whose canvas was saved.
        team: String,
    },
    /// Countdown tick for the active timer.
    TimerTick {
        /// Seconds left, derived from the absolute deadline.
        remaining_secs: u64,
    },
    /// The session reached natural completion.
    SessionFinished {
        /// Finish payload handed to the persistence collaborator.
        outcome: SessionOutcome,
    },
    /// The session was deleted; no further events will arrive.
    SessionDeleted,
}
