//! Quiz session engine: question flow, answer records, admin validation.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        config::QuizConfig,
        events::SessionEvent,
        quiz::{AnswerReceipt, AnswerRecord, QuestionPublic, QuizSnapshot, ValidationReceipt},
        session::{AdminDetail, ModeSnapshot, SessionOutcome, SessionSummary},
    },
    engine::{Shared, ranking, summary_with, team_scores, timer::TimerKind},
    error::CommandError,
    state::{
        session::Origin,
        status::{SessionStatus, StatusEvent},
    },
};

/// One recorded answer, kept with the answering team so post-hoc validation
/// survives the participant leaving.
#[derive(Debug, Clone)]
struct AnswerEntry {
    text: String,
    team: String,
}

#[derive(Debug, Default)]
struct QuizState {
    question_index: usize,
    /// Answers per question, in arrival order.
    answers: HashMap<usize, IndexMap<Uuid, AnswerEntry>>,
    /// Admin verdicts per question.
    validations: HashMap<usize, HashMap<Uuid, bool>>,
    /// Questions already advanced past; the guard that makes the grace and
    /// timeout paths idempotent when they land in the same tick.
    advanced: HashSet<usize>,
}

/// State machine for one quiz session.
pub(crate) struct QuizEngine {
    config: QuizConfig,
    state: QuizState,
}

impl QuizEngine {
    pub fn new(config: QuizConfig) -> Self {
        Self {
            config,
            state: QuizState::default(),
        }
    }

    pub fn mode_snapshot(&self, shared: &Shared) -> ModeSnapshot {
        let index = self.state.question_index;
        let current_question = (shared.core.status() == SessionStatus::Playing)
            .then(|| self.config.questions.get(index))
            .flatten()
            .map(|question| QuestionPublic::from_question(index, question));
        ModeSnapshot::Quiz(QuizSnapshot {
            question_index: index,
            question_count: self.config.questions.len(),
            current_question,
            answered: self
                .state
                .answers
                .get(&index)
                .map(|slot| slot.keys().copied().collect())
                .unwrap_or_default(),
        })
    }

    pub fn summary(&self, shared: &Shared) -> SessionSummary {
        summary_with(shared, self.mode_snapshot(shared))
    }

    pub fn admin_detail(&self) -> AdminDetail {
        let mut question_indexes: Vec<usize> = self.state.answers.keys().copied().collect();
        question_indexes.sort_unstable();

        let mut answers = Vec::new();
        for question_index in question_indexes {
            for (participant_id, entry) in &self.state.answers[&question_index] {
                answers.push(AnswerRecord {
                    participant_id: *participant_id,
                    team: entry.team.clone(),
                    question_index,
                    text: entry.text.clone(),
                    verdict: self
                        .state
                        .validations
                        .get(&question_index)
                        .and_then(|slot| slot.get(participant_id))
                        .copied(),
                });
            }
        }
        AdminDetail::Quiz { answers }
    }

    pub fn start(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        if !shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may start the session".into(),
            ));
        }
        if shared.core.status() != SessionStatus::Waiting {
            return Err(CommandError::InvalidState(
                "the session can only start from the lobby".into(),
            ));
        }
        if shared.core.participants.is_empty() {
            return Err(CommandError::PreconditionFailed(
                "cannot start a quiz without participants".into(),
            ));
        }
        if self.config.questions.is_empty() {
            return Err(CommandError::PreconditionFailed(
                "cannot start a quiz without questions".into(),
            ));
        }

        shared.core.apply_status(StatusEvent::Start)?;
        self.state = QuizState::default();
        let summary = self.summary(shared);
        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Playing,
            session: summary,
        });
        self.open_question(shared, 0);
        Ok(self.summary(shared))
    }

    fn open_question(&mut self, shared: &mut Shared, index: usize) {
        self.state.question_index = index;
        let question = &self.config.questions[index];
        if question.timer_secs > 0 {
            shared.timers.arm(
                Duration::from_secs(question.timer_secs),
                TimerKind::QuestionTimeout { question: index },
            );
        } else {
            shared
                .timers
                .disarm(TimerKind::QuestionTimeout { question: index });
        }
        let public = QuestionPublic::from_question(index, question);
        shared.hub.broadcast(SessionEvent::QuestionOpened {
            question: public,
            session: self.summary(shared),
        });
    }

    pub fn submit_answer(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        text: String,
    ) -> Result<AnswerReceipt, CommandError> {
        if shared.core.status() != SessionStatus::Playing {
            return Err(CommandError::InvalidState(
                "answers are only accepted while playing".into(),
            ));
        }
        let Some(team) = shared.core.team_of(participant_id).map(str::to_string) else {
            return Err(CommandError::NotFound(format!(
                "participant `{participant_id}` not found"
            )));
        };

        let index = self.state.question_index;
        let slot = self.state.answers.entry(index).or_default();
        if slot.contains_key(&participant_id) {
            // One answer per participant per question; the first stands.
            return Ok(AnswerReceipt {
                accepted: false,
                question_index: index,
            });
        }
        slot.insert(participant_id, AnswerEntry { text, team });

        shared.hub.broadcast(SessionEvent::AnswerFlagged {
            participant_id,
            question_index: index,
        });
        self.schedule_grace_if_complete(shared);

        Ok(AnswerReceipt {
            accepted: true,
            question_index: index,
        })
    }

    /// Arm the grace timer once every present participant has answered. The
    /// expiry re-validates the condition, so a participant joining during
    /// the grace window turns it into a no-op while the question timer
    /// remains armed as the fallback path.
    fn schedule_grace_if_complete(&mut self, shared: &mut Shared) {
        let index = self.state.question_index;
        if self.state.advanced.contains(&index) {
            return;
        }
        if !self.all_present_answered(shared) {
            return;
        }
        shared
            .timers
            .arm(shared.config.answer_grace, TimerKind::AnswerGrace {
                question: index,
            });
    }

    fn all_present_answered(&self, shared: &Shared) -> bool {
        if shared.core.participants.is_empty() {
            return false;
        }
        let Some(answers) = self.state.answers.get(&self.state.question_index) else {
            return false;
        };
        shared
            .core
            .participants
            .keys()
            .all(|id| answers.contains_key(id))
    }

    pub fn on_participant_left(&mut self, shared: &mut Shared) {
        if shared.core.status() == SessionStatus::Playing {
            // The departed participant may have been the last holdout.
            self.schedule_grace_if_complete(shared);
        }
    }

    pub fn timer_fired(&mut self, shared: &mut Shared, kind: TimerKind) {
        match kind {
            TimerKind::QuestionTimeout { question } => {
                if shared.core.status() != SessionStatus::Playing
                    || question != self.state.question_index
                {
                    debug!(question, "question timeout against superseded state ignored");
                    return;
                }
                self.advance_question(shared, question);
            }
            TimerKind::AnswerGrace { question } => {
                if shared.core.status() != SessionStatus::Playing
                    || question != self.state.question_index
                    || !self.all_present_answered(shared)
                {
                    debug!(question, "answer grace against superseded state ignored");
                    return;
                }
                self.advance_question(shared, question);
            }
            other => debug!(kind = ?other, "timer kind does not belong to the quiz engine"),
        }
    }

    pub fn advance(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        if !shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may advance the quiz".into(),
            ));
        }
        if shared.core.status() != SessionStatus::Playing {
            return Err(CommandError::InvalidState(
                "the quiz can only advance while playing".into(),
            ));
        }
        self.advance_question(shared, self.state.question_index);
        Ok(self.summary(shared))
    }

    /// Advance past `index`. Every path (grace, timeout, manual) funnels
    /// through the per-question guard, so two of them landing in the same
    /// tick advance exactly once.
    fn advance_question(&mut self, shared: &mut Shared, index: usize) {
        if !self.state.advanced.insert(index) {
            return;
        }
        shared.timers.cancel_all();

        let next = index + 1;
        if next < self.config.questions.len() {
            self.open_question(shared, next);
        } else {
            self.finish(shared);
        }
    }

    fn finish(&mut self, shared: &mut Shared) {
        if let Err(err) = shared.core.apply_status(StatusEvent::FinishNaturally) {
            warn!(error = %err, "quiz finish rejected by the status machine");
            return;
        }
        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Finished,
            session: self.summary(shared),
        });
        shared.hub.broadcast(SessionEvent::SessionFinished {
            outcome: self.outcome(shared),
        });
    }

    pub fn validate_answer(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
        participant_id: Uuid,
        question_index: usize,
        correct: bool,
    ) -> Result<ValidationReceipt, CommandError> {
        if origin != Origin::Admin {
            return Err(CommandError::Forbidden("answer validation is admin-only".into()));
        }
        if matches!(
            shared.core.status(),
            SessionStatus::Waiting | SessionStatus::Archived
        ) {
            return Err(CommandError::InvalidState(
                "validation requires a running or finished quiz".into(),
            ));
        }
        if question_index >= self.config.questions.len() {
            return Err(CommandError::NotFound(format!(
                "question {question_index} does not exist"
            )));
        }
        let Some(entry) = self
            .state
            .answers
            .get(&question_index)
            .and_then(|slot| slot.get(&participant_id))
        else {
            return Err(CommandError::NotFound(
                "no answer recorded for this participant and question".into(),
            ));
        };
        let team = entry.team.clone();

        let previous = self
            .state
            .validations
            .get(&question_index)
            .and_then(|slot| slot.get(&participant_id))
            .copied();
        if previous == Some(correct) {
            // Re-validating the same slot never double-applies the score.
            return Ok(ValidationReceipt {
                applied: false,
                team_totals: team_scores(&shared.core, &shared.ledger),
            });
        }

        let points = self.config.questions[question_index].points;
        let delta = match (previous, correct) {
            (_, true) => points,
            (Some(true), false) => -points,
            (None, false) => 0,
            // Unreachable: `previous == Some(correct)` returned early above.
            (Some(false), false) => unreachable!(),
        };
        if delta != 0 {
            let reason = if correct { "validation" } else { "validation_revoked" };
            shared
                .ledger
                .add_points(&team, question_index, delta, reason);
        }
        self.state
            .validations
            .entry(question_index)
            .or_default()
            .insert(participant_id, correct);

        let team_totals = team_scores(&shared.core, &shared.ledger);
        shared.hub.broadcast(SessionEvent::AnswerValidated {
            participant_id,
            question_index,
            correct,
            team_totals: team_totals.clone(),
        });

        Ok(ValidationReceipt {
            applied: true,
            team_totals,
        })
    }

    pub fn stop(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        if !shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may stop the session".into(),
            ));
        }
        shared.core.apply_status(StatusEvent::Stop)?;
        shared.timers.cancel_all();
        self.state = QuizState::default();

        let summary = self.summary(shared);
        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Waiting,
            session: summary.clone(),
        });
        Ok(summary)
    }

    pub fn outcome(&self, shared: &Shared) -> SessionOutcome {
        SessionOutcome {
            session_id: shared.core.id,
            mode: shared.core.mode,
            ranking: ranking(&shared.core, &shared.ledger),
            score_events: shared.ledger.events().to_vec(),
            drawings: Vec::new(),
            chains: None,
        }
    }
}
