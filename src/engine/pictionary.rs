//! Pictionary session engine: passage rotation, guess judging, drawer turns.

use std::collections::HashSet;
use std::time::Duration;

use rand::{rng, seq::IndexedRandom};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        config::PictionaryConfig,
        events::{RoundEndReason, SessionEvent},
        pictionary::{GuessOutcome, PictionarySnapshot},
        session::{AdminDetail, DrawingReceipt, ModeSnapshot, SessionOutcome, SessionSummary},
    },
    engine::{
        Shared, TeamRoster, drawing::Drawing, freeze_rosters, ranking, summary_with, team_scores,
        timer::TimerKind,
    },
    error::CommandError,
    state::{
        session::Origin,
        status::{SessionStatus, StatusEvent},
    },
};

/// Per-run state, built at start and dropped on stop.
#[derive(Debug)]
struct PictionaryRun {
    /// Team rosters frozen at start; the passage rotation walks this order.
    teams: Vec<TeamRoster>,
    /// actual_rounds x team count.
    total_passages: usize,
    round_index: usize,
    /// Index into the word pool of the word being drawn.
    word_index: usize,
    used_words: HashSet<usize>,
    drawer_pos: usize,
    /// Teams that found the word, in strict arrival order.
    teams_found: Vec<String>,
    /// True during the gap between the round ending and the next passage.
    round_over: bool,
}

/// State machine for one pictionary session.
pub(crate) struct PictionaryEngine {
    config: PictionaryConfig,
    run: Option<PictionaryRun>,
}

impl PictionaryEngine {
    pub fn new(config: PictionaryConfig) -> Self {
        Self { config, run: None }
    }

    fn drawing_team(run: &PictionaryRun) -> &TeamRoster {
        &run.teams[run.round_index % run.teams.len()]
    }

    /// Drawing-team member currently holding draw permission. Members who
    /// left the session are skipped so the rotation never stalls on them.
    fn current_drawer(run: &PictionaryRun, shared: &Shared) -> Option<Uuid> {
        let present: Vec<Uuid> = Self::drawing_team(run)
            .members
            .iter()
            .copied()
            .filter(|id| shared.core.participants.contains_key(id))
            .collect();
        if present.is_empty() {
            None
        } else {
            Some(present[run.drawer_pos % present.len()])
        }
    }

    pub fn mode_snapshot(&self, shared: &Shared) -> ModeSnapshot {
        let snapshot = match &self.run {
            Some(run) => PictionarySnapshot {
                round_index: run.round_index,
                total_passages: run.total_passages,
                drawing_team: Some(Self::drawing_team(run).name.clone()),
                drawer: Self::current_drawer(run, shared),
                word_length: Some(self.config.word_pool[run.word_index].word.chars().count()),
                teams_found: run.teams_found.clone(),
            },
            None => PictionarySnapshot {
                round_index: 0,
                total_passages: self.config.actual_rounds as usize
                    * shared.core.teams().len(),
                drawing_team: None,
                drawer: None,
                word_length: None,
                teams_found: Vec::new(),
            },
        };
        ModeSnapshot::Pictionary(snapshot)
    }

    pub fn summary(&self, shared: &Shared) -> SessionSummary {
        summary_with(shared, self.mode_snapshot(shared))
    }

    pub fn admin_detail(&self) -> AdminDetail {
        match &self.run {
            Some(run) => AdminDetail::Pictionary {
                word: Some(self.config.word_pool[run.word_index].word.clone()),
                used_words: run
                    .used_words
                    .iter()
                    .map(|&index| self.config.word_pool[index].word.clone())
                    .collect(),
            },
            None => AdminDetail::Pictionary {
                word: None,
                used_words: Vec::new(),
            },
        }
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
        let teams = freeze_rosters(&shared.core);
        if teams.len() < 2 {
            return Err(CommandError::PreconditionFailed(
                "pictionary needs at least two teams".into(),
            ));
        }
        let total_passages = self.config.actual_rounds as usize * teams.len();
        if self.config.word_pool.len() < total_passages {
            return Err(CommandError::PreconditionFailed(format!(
                "word pool has {} words but {} passages are planned",
                self.config.word_pool.len(),
                total_passages
            )));
        }

        shared.core.apply_status(StatusEvent::Start)?;
        self.run = Some(PictionaryRun {
            teams,
            total_passages,
            round_index: 0,
            word_index: 0,
            used_words: HashSet::new(),
            drawer_pos: 0,
            teams_found: Vec::new(),
            round_over: false,
        });
        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Playing,
            session: self.summary(shared),
        });
        self.begin_passage(shared, 0);
        Ok(self.summary(shared))
    }

    fn begin_passage(&mut self, shared: &mut Shared, round: usize) {
        let candidates: Vec<usize> = match &self.run {
            Some(run) => (0..self.config.word_pool.len())
                .filter(|index| !run.used_words.contains(index))
                .collect(),
            None => return,
        };
        let Some(&word_index) = candidates.choose(&mut rng()) else {
            // The start precondition reserves one word per passage.
            warn!(round, "word pool exhausted before the final passage");
            self.finish(shared);
            return;
        };

        let config = &self.config;
        let Some(run) = self.run.as_mut() else { return };
        run.round_index = round;
        run.teams_found.clear();
        run.drawer_pos = 0;
        run.round_over = false;
        run.used_words.insert(word_index);
        run.word_index = word_index;

        let drawing_team = Self::drawing_team(run).name.clone();
        let member_count = Self::drawing_team(run).members.len();
        let word_length = config.word_pool[word_index].word.chars().count();

        shared.timers.arm(
            Duration::from_secs(config.time_per_round_secs),
            TimerKind::RoundTimeout { round },
        );
        if config.time_per_drawer_secs > 0 && member_count > 1 {
            // Nested rotation: every drawing-team member gets a turn without
            // ending the passage.
            shared.timers.arm(
                Duration::from_secs(config.time_per_drawer_secs),
                TimerKind::DrawerRotation { round },
            );
        } else {
            shared.timers.disarm(TimerKind::DrawerRotation { round });
        }

        let drawer = self
            .run
            .as_ref()
            .and_then(|run| Self::current_drawer(run, shared));
        shared.hub.broadcast(SessionEvent::RoundStarted {
            round,
            drawing_team,
            drawer,
            word_length,
            session: self.summary(shared),
        });
    }

    pub fn guess(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        text: String,
    ) -> Result<GuessOutcome, CommandError> {
        if shared.core.status() != SessionStatus::Playing {
            return Err(CommandError::InvalidState(
                "guesses are only accepted while playing".into(),
            ));
        }
        let Some(team) = shared.core.team_of(participant_id).map(str::to_string) else {
            return Err(CommandError::NotFound(format!(
                "participant `{participant_id}` not found"
            )));
        };
        let config = &self.config;
        let Some(run) = self.run.as_mut() else {
            return Err(CommandError::InvalidState("no passage is active".into()));
        };
        if run.round_over {
            return Err(CommandError::InvalidState(
                "the round has ended; wait for the next passage".into(),
            ));
        }

        let drawing_team = run.teams[run.round_index % run.teams.len()].name.clone();
        if team == drawing_team {
            return Err(CommandError::Forbidden(
                "the drawing team cannot guess its own word".into(),
            ));
        }
        if run.teams_found.contains(&team) {
            return Ok(GuessOutcome::AlreadyFound);
        }

        let word = &config.word_pool[run.word_index].word;
        if fold_guess(&text) != fold_guess(word) {
            return Ok(GuessOutcome::Incorrect);
        }

        let round = run.round_index;
        let rank = run.teams_found.len() + 1;
        run.teams_found.push(team.clone());
        let full_coverage = run.teams_found.len() == run.teams.len() - 1;
        let teams_found = run.teams_found.clone();

        let (points, reason) = if rank == 1 {
            (config.points_first_guess, "first_guess")
        } else {
            (config.points_other_guess, "guess")
        };
        shared.ledger.add_points(&team, round, points, reason);
        shared
            .ledger
            .add_points(&drawing_team, round, config.points_drawing_team, "drawing_team");

        shared.hub.broadcast(SessionEvent::WordFound {
            round,
            team: team.clone(),
            participant_id,
            rank,
            team_totals: team_scores(&shared.core, &shared.ledger),
        });

        if full_coverage {
            // Every non-drawing team got there; short-circuit the round
            // after the celebratory delay.
            if let Some(run) = self.run.as_mut() {
                run.round_over = true;
            }
            shared.timers.cancel_all();
            shared
                .timers
                .arm(shared.config.celebration_delay, TimerKind::PassageGap { round });
            shared.hub.broadcast(SessionEvent::RoundEnded {
                round,
                reason: RoundEndReason::AllFound,
                teams_found,
            });
        }

        Ok(GuessOutcome::Correct { rank, points })
    }

    pub fn timer_fired(&mut self, shared: &mut Shared, kind: TimerKind) {
        match kind {
            TimerKind::RoundTimeout { round } => self.round_timed_out(shared, round),
            TimerKind::PassageGap { round } => {
                let current = self
                    .run
                    .as_ref()
                    .map(|run| (run.round_index, run.round_over));
                if shared.core.status() != SessionStatus::Playing
                    || current != Some((round, true))
                {
                    debug!(round, "passage gap against superseded state ignored");
                    return;
                }
                self.advance_passage(shared, round);
            }
            TimerKind::DrawerRotation { round } => self.rotate_drawer(shared, round),
            other => debug!(kind = ?other, "timer kind does not belong to the pictionary engine"),
        }
    }

    fn round_timed_out(&mut self, shared: &mut Shared, round: usize) {
        let config = &self.config;
        let Some(run) = self.run.as_mut() else { return };
        if shared.core.status() != SessionStatus::Playing
            || run.round_index != round
            || run.round_over
        {
            debug!(round, "round timeout against superseded state ignored");
            return;
        }

        run.round_over = true;
        let word = config.word_pool[run.word_index].word.clone();
        let teams_found = run.teams_found.clone();

        shared.timers.disarm(TimerKind::DrawerRotation { round });
        // Reveal the word, then advance once viewers had a moment to read it.
        shared.hub.broadcast(SessionEvent::WordRevealed {
            round,
            word,
            teams_found: teams_found.clone(),
        });
        shared.hub.broadcast(SessionEvent::RoundEnded {
            round,
            reason: RoundEndReason::TimedOut,
            teams_found,
        });
        shared
            .timers
            .arm(shared.config.reveal_delay, TimerKind::PassageGap { round });
    }

    fn rotate_drawer(&mut self, shared: &mut Shared, round: usize) {
        let Some(run) = self.run.as_mut() else { return };
        if shared.core.status() != SessionStatus::Playing
            || run.round_index != round
            || run.round_over
        {
            debug!(round, "drawer rotation against superseded state ignored");
            return;
        }
        run.drawer_pos += 1;

        let drawer = self
            .run
            .as_ref()
            .and_then(|run| Self::current_drawer(run, shared));
        if let Some(drawer) = drawer {
            shared
                .hub
                .broadcast(SessionEvent::DrawerRotated { round, drawer });
        }
        shared.timers.arm(
            Duration::from_secs(self.config.time_per_drawer_secs),
            TimerKind::DrawerRotation { round },
        );
    }

    fn advance_passage(&mut self, shared: &mut Shared, round: usize) {
        let total = self.run.as_ref().map(|run| run.total_passages).unwrap_or(0);
        let next = round + 1;
        if next < total {
            self.begin_passage(shared, next);
        } else {
            self.finish(shared);
        }
    }

    pub fn advance(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        if !shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may skip a passage".into(),
            ));
        }
        if shared.core.status() != SessionStatus::Playing {
            return Err(CommandError::InvalidState(
                "passages can only be skipped while playing".into(),
            ));
        }
        let Some((round, round_over, word, teams_found)) = self.run.as_ref().map(|run| {
            (
                run.round_index,
                run.round_over,
                self.config.word_pool[run.word_index].word.clone(),
                run.teams_found.clone(),
            )
        }) else {
            return Err(CommandError::InvalidState("no passage is active".into()));
        };

        shared.timers.cancel_all();
        if !round_over {
            shared.hub.broadcast(SessionEvent::WordRevealed {
                round,
                word,
                teams_found: teams_found.clone(),
            });
            shared.hub.broadcast(SessionEvent::RoundEnded {
                round,
                reason: RoundEndReason::Skipped,
                teams_found,
            });
        }
        self.advance_passage(shared, round);
        Ok(self.summary(shared))
    }

    pub fn save_drawing(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        image_data: String,
    ) -> Result<DrawingReceipt, CommandError> {
        // Redundant or ineligible uploads are ignored, never errors: the
        // canvas is self-correcting and retries must stay idempotent.
        let eligible = shared.core.status() == SessionStatus::Playing
            && shared.core.participants.contains_key(&participant_id);
        let slot = self.run.as_ref().and_then(|run| {
            let roster = Self::drawing_team(run);
            // Only the first team member by join order uploads.
            (roster.members.first() == Some(&participant_id)).then(|| {
                (
                    run.round_index,
                    roster.name.clone(),
                    self.config.word_pool[run.word_index].word.clone(),
                )
            })
        });
        let Some((round, team, label)) = slot.filter(|_| eligible) else {
            return Ok(DrawingReceipt { stored: false });
        };

        let stored = shared.drawings.save(Drawing {
            round,
            team: team.clone(),
            label,
            image_data,
            uploaded_by: participant_id,
        });
        if stored {
            shared
                .hub
                .broadcast(SessionEvent::DrawingSaved { round, team });
        }
        Ok(DrawingReceipt { stored })
    }

    /// Strokes are accepted from the member currently holding draw
    /// permission, while a passage is live.
    pub fn allow_stroke(&self, shared: &Shared, participant_id: Uuid) -> bool {
        if shared.core.status() != SessionStatus::Playing {
            return false;
        }
        match &self.run {
            Some(run) if !run.round_over => {
                Self::current_drawer(run, shared) == Some(participant_id)
            }
            _ => false,
        }
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
        self.run = None;
        shared.drawings.clear();

        let summary = self.summary(shared);
        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Waiting,
            session: summary.clone(),
        });
        Ok(summary)
    }

    fn finish(&mut self, shared: &mut Shared) {
        if let Err(err) = shared.core.apply_status(StatusEvent::FinishNaturally) {
            warn!(error = %err, "pictionary finish rejected by the status machine");
            return;
        }
        shared.timers.cancel_all();
        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Finished,
            session: self.summary(shared),
        });
        shared.hub.broadcast(SessionEvent::SessionFinished {
            outcome: self.outcome(shared),
        });
    }

    pub fn outcome(&self, shared: &Shared) -> SessionOutcome {
        SessionOutcome {
            session_id: shared.core.id,
            mode: shared.core.mode,
            ranking: ranking(&shared.core, &shared.ledger),
            score_events: shared.ledger.events().to_vec(),
            drawings: shared.drawings.all(),
            chains: None,
        }
    }
}

/// Fold a guess for comparison: trim, lowercase, strip Latin diacritics.
fn fold_guess(input: &str) -> String {
    let mut folded = String::with_capacity(input.len());
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => folded.push('a'),
            'ç' => folded.push('c'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ñ' => folded.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => folded.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ý' | 'ÿ' => folded.push('y'),
            'æ' => folded.push_str("ae"),
            'œ' => folded.push_str("oe"),
            other => folded.push(other),
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_ignores_case_and_diacritics() {
        assert_eq!(fold_guess("Éléphant"), "elephant");
        assert_eq!(fold_guess("  château  "), "chateau");
        assert_eq!(fold_guess("NOËL"), "noel");
        assert_eq!(fold_guess("cœur"), "coeur");
    }

    #[test]
    fn fold_keeps_inner_spacing() {
        assert_eq!(fold_guess("tour eiffel"), "tour eiffel");
        assert_ne!(fold_guess("toureiffel"), fold_guess("tour eiffel"));
    }
}
