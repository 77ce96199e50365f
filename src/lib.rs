//! Real-time session engine for team party games.
//!
//! One administrator runs live sessions for many simultaneously connected
//! players across three modes: a trivia quiz, a draw-and-guess game, and a
//! circular memory-drawing relay. Every session executes on its own
//! serialized command queue, timers re-deliver generation-tagged messages
//! into that queue, and each mutation fans a snapshot out to subscribed
//! viewers. HTTP transport, content-bank management, persistence, and UI
//! rendering are external collaborators: this crate owns only the engine.

mod config;
mod content;
mod dto;
mod engine;
mod error;
mod scoring;
mod state;

pub use config::EngineConfig;
pub use content::{Question, QuestionKind, ReferenceImage, WordEntry};
pub use dto::config::{PictionaryConfig, QuizConfig, RelayConfig, SessionConfig};
pub use dto::events::{RoundEndReason, SessionEvent};
pub use dto::pictionary::{GuessOutcome, PictionarySnapshot};
pub use dto::quiz::{AnswerReceipt, AnswerRecord, QuestionPublic, QuizSnapshot, ValidationReceipt};
pub use dto::relay::{
    ChainAssignment, ChainLink, ChainReconstruction, ObservedSource, RelayPhase, RelaySnapshot,
};
pub use dto::session::{
    AdminDetail, AdminSnapshot, DrawingReceipt, JoinRequest, JoinResponse, ModeSnapshot,
    ParticipantSummary, SessionOutcome, SessionSummary, TeamScore, TeamStanding,
};
pub use engine::drawing::Drawing;
pub use error::CommandError;
pub use scoring::ScoreEvent;
pub use state::session::{CreatorRef, GameMode, Origin, Participant};
pub use state::status::SessionStatus;
pub use state::{SessionRegistry, SharedRegistry};
