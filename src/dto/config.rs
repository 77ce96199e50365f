use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::content::{Question, ReferenceImage, WordEntry};

/// Mode-specific parameters snapshotted when a session is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionConfig {
    /// Trivia quiz configuration.
    Quiz(QuizConfig),
    /// Draw-and-guess configuration.
    Pictionary(PictionaryConfig),
    /// Memory-drawing relay configuration.
    Relay(RelayConfig),
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            SessionConfig::Quiz(config) => config.validate(),
            SessionConfig::Pictionary(config) => config.validate(),
            SessionConfig::Relay(config) => config.validate(),
        }
    }
}

/// Quiz parameters and the question snapshot taken from the content bank.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizConfig {
    /// Questions played in order.
    #[validate(length(min = 1, message = "a quiz needs at least one question"))]
    pub questions: Vec<Question>,
}

/// Pictionary parameters and the word snapshot taken from the content bank.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PictionaryConfig {
    /// Full cycles over the teams; total passages = rounds x team count.
    #[validate(range(min = 1))]
    pub actual_rounds: u32,
    /// Duration of one passage in seconds.
    #[validate(range(min = 1))]
    pub time_per_round_secs: u64,
    /// Drawer-rotation interval in seconds; 0 keeps a single drawer.
    pub time_per_drawer_secs: u64,
    /// Points for the first team to guess the word.
    #[validate(range(min = 0))]
    pub points_first_guess: i32,
    /// Points for every later correct team.
    #[validate(range(min = 0))]
    pub points_other_guess: i32,
    /// Points the drawing team earns per correct guess.
    #[validate(range(min = 0))]
    pub points_drawing_team: i32,
    /// Words available for the session; one is consumed per passage.
    #[validate(length(min = 1, message = "the word pool must not be empty"))]
    pub word_pool: Vec<WordEntry>,
}

/// Relay parameters and the reference snapshot taken from the content bank.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// Number of observation+drawing rounds.
    #[validate(range(min = 1))]
    pub passages: u32,
    /// Observation phase duration in seconds.
    #[validate(range(min = 1))]
    pub observation_secs: u64,
    /// Drawing phase duration in seconds.
    #[validate(range(min = 1))]
    pub drawing_secs: u64,
    /// Reference images seeding the chains; one per team is drawn at start.
    #[validate(length(min = 2, message = "the reference pool needs at least two images"))]
    pub reference_pool: Vec<ReferenceImage>,
}
