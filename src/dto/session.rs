use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        pictionary::PictionarySnapshot,
        quiz::{AnswerRecord, QuizSnapshot},
        relay::{ChainReconstruction, RelaySnapshot},
    },
    engine::drawing::Drawing,
    scoring::ScoreEvent,
    state::{
        session::{GameMode, Participant},
        status::SessionStatus,
    },
};

/// Payload supplied by a player joining a lobby.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinRequest {
    /// Display name shown to other participants.
    #[validate(length(min = 1, message = "display name must not be empty"))]
    pub display_name: String,
    /// Team the player joins; teams are the unit of scoring.
    #[validate(length(min = 1, message = "team name must not be empty"))]
    pub team_name: String,
}

/// Response returned once a join was accepted.
#[derive(Debug, Clone, Serialize)]
pub struct JoinResponse {
    /// Identifier assigned to the new participant.
    pub participant_id: Uuid,
    /// Fresh public snapshot of the session.
    pub session: SessionSummary,
}

/// Public projection of a participant.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    /// Participant identifier.
    pub id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Team the participant belongs to.
    pub team_name: String,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id,
            display_name: participant.display_name.clone(),
            team_name: participant.team_name.clone(),
        }
    }
}

/// Team name with its current ledger total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamScore {
    /// Team name.
    pub team: String,
    /// Sum of the team's score events.
    pub score: i32,
}

/// Final placement of a team in the session ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamStanding {
    /// 1-based rank; ties are broken by team name (documented, arbitrary).
    pub rank: usize,
    /// Team name.
    pub team: String,
    /// Final score.
    pub score: i32,
}

/// Mode-specific slice of a public snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeSnapshot {
    /// Quiz state visible to everyone.
    Quiz(QuizSnapshot),
    /// Pictionary state visible to everyone (word masked).
    Pictionary(PictionarySnapshot),
    /// Relay state visible to everyone.
    Relay(RelaySnapshot),
}

/// Public projection of a session, pushed to viewers after every mutation.
///
/// Leak prevention applies: answer contents and the current pictionary word
/// are absent; only the admin view ([`AdminSnapshot`]) carries them.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: Uuid,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Participants in join order.
    pub participants: Vec<ParticipantSummary>,
    /// Current per-team totals.
    pub team_totals: Vec<TeamScore>,
    /// Seconds left on the active countdown, computed from its absolute
    /// deadline so every observer derives the same value.
    pub remaining_secs: Option<u64>,
    /// Mode-specific state.
    #[serde(flatten)]
    pub detail: ModeSnapshot,
}

/// Admin-only session view including the withheld content.
#[derive(Debug, Clone, Serialize)]
pub struct AdminSnapshot {
    /// The public snapshot.
    pub session: SessionSummary,
    /// Mode-specific privileged detail.
    pub detail: AdminDetail,
}

/// Mode-specific privileged detail of an [`AdminSnapshot`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AdminDetail {
    /// Full answer and validation records.
    Quiz {
        /// Every recorded answer with its validation verdict.
        answers: Vec<AnswerRecord>,
    },
    /// Current word and consumed pool entries.
    Pictionary {
        /// Word being drawn right now, when a round is active.
        word: Option<String>,
        /// Words already consumed by earlier passages.
        used_words: Vec<String>,
    },
    /// Relay has no privileged detail beyond the public snapshot.
    Relay,
}

/// Receipt returned by `save_drawing`.
///
/// `stored: false` covers every ignored upload: a filled slot, an uploader
/// other than the designated first team member, or an inactive round. None
/// of these are errors; the save protocol favours idempotent retries.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DrawingReceipt {
    /// Whether the drawing was persisted.
    pub stored: bool,
}

/// Payload handed to the persistence collaborator when a session finishes.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// Session identifier.
    pub session_id: Uuid,
    /// Mode the session ran.
    pub mode: GameMode,
    /// Final ranking; empty for relay sessions, which are not scored.
    pub ranking: Vec<TeamStanding>,
    /// Every score event appended during the session.
    pub score_events: Vec<ScoreEvent>,
    /// All drawings persisted by the save protocol.
    pub drawings: Vec<Drawing>,
    /// Reconstructed chains; present for relay sessions only.
    pub chains: Option<Vec<ChainReconstruction>>,
}
