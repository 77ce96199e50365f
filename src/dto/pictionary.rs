use serde::Serialize;
use serde_with::skip_serializing_none;
use uuid::Uuid;

/// Pictionary state visible to every viewer; the word itself is masked.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct PictionarySnapshot {
    /// Index of the current passage.
    pub round_index: usize,
    /// Total passages of the session (rounds x team count).
    pub total_passages: usize,
    /// Team currently drawing, when a round is active.
    pub drawing_team: Option<String>,
    /// Drawing-team member currently holding draw permission.
    pub drawer: Option<Uuid>,
    /// Length of the hidden word, shown as a hint.
    pub word_length: Option<usize>,
    /// Teams that found the word, in strict arrival order.
    pub teams_found: Vec<String>,
}

/// Outcome of a guess command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GuessOutcome {
    /// The guess matched; `rank` 1 is the first team in.
    Correct {
        /// Arrival rank of the guesser's team.
        rank: usize,
        /// Points awarded to the guesser's team.
        points: i32,
    },
    /// No match; nothing changed.
    Incorrect,
    /// The guesser's team already found the word (no-op success).
    AlreadyFound,
}
