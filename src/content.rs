//! Content-bank snapshots consumed by sessions.
//!
//! A session copies the content it needs when it is created; edits to the
//! bank after that point never affect a running session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a quiz question expects to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Free-text answer, validated by the admin after the fact.
    Open,
    /// One answer out of a fixed set of choices.
    MultipleChoice,
}

/// A quiz question snapshotted from the question bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier in the content bank.
    pub id: Uuid,
    /// Question text shown to participants.
    pub text: String,
    /// Expected answer, when the bank records one.
    pub answer: Option<String>,
    /// Choices for multiple-choice questions; empty for open questions.
    #[serde(default)]
    pub choices: Vec<String>,
    /// Points awarded when an answer is validated as correct.
    pub points: i32,
    /// Per-question countdown in seconds; 0 disables the timer.
    pub timer_secs: u64,
    /// Kind of question.
    pub kind: QuestionKind,
}

/// A word snapshotted from the word bank, drawn in pictionary passages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordEntry {
    /// Stable identifier in the content bank.
    pub id: Uuid,
    /// The word the drawing team illustrates.
    pub word: String,
    /// Bank category the word belongs to.
    pub category: String,
    /// Free-form difficulty tag.
    pub difficulty: String,
}

/// A reference image snapshotted from the image bank, seeding relay chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceImage {
    /// Stable identifier in the content bank.
    pub id: Uuid,
    /// Human readable image name, revealed when chains are reconstructed.
    pub name: String,
    /// URL pointing at the image resource.
    pub image_url: String,
    /// Bank category the image belongs to.
    pub category: String,
}
