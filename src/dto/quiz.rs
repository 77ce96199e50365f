use serde::Serialize;
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::{content::Question, dto::session::TeamScore};

/// Question fields safe to show players: the expected answer is withheld.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionPublic {
    /// Position of the question in the quiz.
    pub index: usize,
    /// Question text.
    pub text: String,
    /// Choices for multiple-choice questions; empty for open questions.
    pub choices: Vec<String>,
    /// Points at stake.
    pub points: i32,
    /// Countdown in seconds; 0 means no timer.
    pub timer_secs: u64,
}

impl QuestionPublic {
    /// Project `question` at `index` into its player-visible form.
    pub fn from_question(index: usize, question: &Question) -> Self {
        Self {
            index,
            text: question.text.clone(),
            choices: question.choices.clone(),
            points: question.points,
            timer_secs: question.timer_secs,
        }
    }
}

/// Quiz state visible to every viewer.
///
/// Peers only learn *who* answered, never *what* was answered.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct QuizSnapshot {
    /// Index of the current question.
    pub question_index: usize,
    /// Total number of questions.
    pub question_count: usize,
    /// Current question, present while playing.
    pub current_question: Option<QuestionPublic>,
    /// Participants that already answered the current question.
    pub answered: Vec<Uuid>,
}

/// One recorded answer with its validation verdict, admin view only.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    /// Participant that answered.
    pub participant_id: Uuid,
    /// Team the participant answered for.
    pub team: String,
    /// Question the answer belongs to.
    pub question_index: usize,
    /// Submitted text.
    pub text: String,
    /// Admin verdict; absent until validated.
    pub verdict: Option<bool>,
}

/// Receipt returned by `submit_answer`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnswerReceipt {
    /// False when the participant had already answered this question; the
    /// earlier answer stands and nothing changed.
    pub accepted: bool,
    /// Question the receipt refers to.
    pub question_index: usize,
}

/// Receipt returned by `validate_answer`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReceipt {
    /// False when the slot already carried the same verdict (no-op).
    pub applied: bool,
    /// Totals after the validation.
    pub team_totals: Vec<TeamScore>,
}
