//! Relay session engine: chain assignment, two-phase rounds, reconstruction.

use std::time::Duration;

use rand::{rng, seq::SliceRandom};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    content::ReferenceImage,
    dto::{
        config::RelayConfig,
        events::SessionEvent,
        relay::{ChainAssignment, ChainLink, ChainReconstruction, ObservedSource, RelayPhase,
            RelaySnapshot},
        session::{AdminDetail, DrawingReceipt, ModeSnapshot, SessionOutcome, SessionSummary},
    },
    engine::{Shared, TeamRoster, drawing::Drawing, freeze_rosters, summary_with, timer::TimerKind},
    error::CommandError,
    state::{
        session::Origin,
        status::{SessionStatus, StatusEvent},
    },
};

/// Team index holding chain `chain` at `round`: the chain walks the team
/// ring one position per round.
fn chain_holder(chain: usize, round: usize, team_count: usize) -> usize {
    (chain + round) % team_count
}

/// Chain held by team `team` at `round`; the inverse of [`chain_holder`],
/// which is what makes every round's assignment a bijection.
fn held_chain(team: usize, round: usize, team_count: usize) -> usize {
    (team + team_count - round % team_count) % team_count
}

/// Per-run state, built at start and dropped on stop.
#[derive(Debug)]
struct RelayRun {
    /// Team rosters frozen at start; team index is the ring position.
    teams: Vec<TeamRoster>,
    /// Chain `c` descends from `references[c]`.
    references: Vec<ReferenceImage>,
    round_index: usize,
    phase: RelayPhase,
}

/// State machine for one relay session.
pub(crate) struct RelayEngine {
    config: RelayConfig,
    run: Option<RelayRun>,
}

impl RelayEngine {
    pub fn new(config: RelayConfig) -> Self {
        Self { config, run: None }
    }

    pub fn mode_snapshot(&self, shared: &Shared) -> ModeSnapshot {
        let snapshot = match &self.run {
            Some(run) => RelaySnapshot {
                round_index: run.round_index,
                passages: self.config.passages as usize,
                phase: Some(run.phase),
                assignments: self.assignments(shared),
            },
            None => RelaySnapshot {
                round_index: 0,
                passages: self.config.passages as usize,
                phase: None,
                assignments: Vec::new(),
            },
        };
        ModeSnapshot::Relay(snapshot)
    }

    pub fn summary(&self, shared: &Shared) -> SessionSummary {
        summary_with(shared, self.mode_snapshot(shared))
    }

    pub fn admin_detail(&self) -> AdminDetail {
        AdminDetail::Relay
    }

    pub fn start(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        if !shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may start a relay lobby".into(),
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
                "relay needs at least two teams".into(),
            ));
        }
        if self.config.reference_pool.len() < teams.len() {
            return Err(CommandError::PreconditionFailed(format!(
                "reference pool has {} images but {} teams are playing",
                self.config.reference_pool.len(),
                teams.len()
            )));
        }

        shared.core.apply_status(StatusEvent::Start)?;
        let mut references = self.config.reference_pool.clone();
        references.shuffle(&mut rng());
        references.truncate(teams.len());
        self.run = Some(RelayRun {
            teams,
            references,
            round_index: 0,
            phase: RelayPhase::Observation,
        });

        shared.hub.broadcast(SessionEvent::StatusChanged {
            status: SessionStatus::Playing,
            session: self.summary(shared),
        });
        self.open_phase(shared, 0, RelayPhase::Observation);
        Ok(self.summary(shared))
    }

    fn open_phase(&mut self, shared: &mut Shared, round: usize, phase: RelayPhase) {
        if let Some(run) = self.run.as_mut() {
            run.round_index = round;
            run.phase = phase;
        }
        let duration = match phase {
            RelayPhase::Observation => self.config.observation_secs,
            RelayPhase::Drawing => self.config.drawing_secs,
        };
        shared.timers.arm(
            Duration::from_secs(duration),
            TimerKind::PhaseTimeout { round, phase },
        );
        shared.hub.broadcast(SessionEvent::PhaseChanged {
            round,
            phase,
            session: self.summary(shared),
        });
    }

    pub fn timer_fired(&mut self, shared: &mut Shared, kind: TimerKind) {
        match kind {
            TimerKind::PhaseTimeout { round, phase } => {
                let current = self.run.as_ref().map(|run| (run.round_index, run.phase));
                if shared.core.status() != SessionStatus::Playing
                    || current != Some((round, phase))
                {
                    debug!(round, ?phase, "phase timeout against superseded state ignored");
                    return;
                }
                self.advance_phase(shared);
            }
            other => debug!(kind = ?other, "timer kind does not belong to the relay engine"),
        }
    }

    fn advance_phase(&mut self, shared: &mut Shared) {
        let Some((round, phase)) = self.run.as_ref().map(|run| (run.round_index, run.phase))
        else {
            return;
        };
        match phase {
            RelayPhase::Observation => self.open_phase(shared, round, RelayPhase::Drawing),
            RelayPhase::Drawing => {
                // Drawings for this round were collected through the save
                // protocol while the phase ran; missing slots stay empty.
                let next = round + 1;
                if next < self.config.passages as usize {
                    self.open_phase(shared, next, RelayPhase::Observation);
                } else {
                    self.finish(shared);
                }
            }
        }
    }

    pub fn advance(
        &mut self,
        shared: &mut Shared,
        origin: Origin,
    ) -> Result<SessionSummary, CommandError> {
        if !shared.core.is_master(origin) {
            return Err(CommandError::Forbidden(
                "only the admin or room master may skip a phase".into(),
            ));
        }
        if shared.core.status() != SessionStatus::Playing {
            return Err(CommandError::InvalidState(
                "phases can only be skipped while playing".into(),
            ));
        }
        if self.run.is_none() {
            return Err(CommandError::InvalidState("no round is active".into()));
        }
        shared.timers.cancel_all();
        self.advance_phase(shared);
        Ok(self.summary(shared))
    }

    pub fn save_drawing(
        &mut self,
        shared: &mut Shared,
        participant_id: Uuid,
        image_data: String,
    ) -> Result<DrawingReceipt, CommandError> {
        // Ineligible and redundant uploads are ignored, never errors.
        let eligible = shared.core.status() == SessionStatus::Playing
            && shared.core.participants.contains_key(&participant_id);
        let slot = self.run.as_ref().and_then(|run| {
            if run.phase != RelayPhase::Drawing {
                return None;
            }
            let team_count = run.teams.len();
            let (team_index, roster) = run
                .teams
                .iter()
                .enumerate()
                .find(|(_, roster)| roster.members.contains(&participant_id))?;
            // Only the first team member by join order uploads.
            if roster.members.first() != Some(&participant_id) {
                return None;
            }
            let chain = held_chain(team_index, run.round_index, team_count);
            Some((run.round_index, roster.name.clone(), chain.to_string()))
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

    /// During the drawing phase the whole team paints concurrently; during
    /// observation the canvas is locked.
    pub fn allow_stroke(&self, shared: &Shared, participant_id: Uuid) -> bool {
        if shared.core.status() != SessionStatus::Playing {
            return false;
        }
        match &self.run {
            Some(run) => {
                run.phase == RelayPhase::Drawing
                    && run
                        .teams
                        .iter()
                        .any(|roster| roster.members.contains(&participant_id))
                    && shared.core.participants.contains_key(&participant_id)
            }
            None => false,
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
            warn!(error = %err, "relay finish rejected by the status machine");
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

    /// Assignments of the current round: team <-> chain is a bijection, and
    /// each team observes the latest artifact of its chain.
    fn assignments(&self, shared: &Shared) -> Vec<ChainAssignment> {
        let Some(run) = self.run.as_ref() else {
            return Vec::new();
        };
        let team_count = run.teams.len();
        (0..team_count)
            .map(|team_index| {
                let chain = held_chain(team_index, run.round_index, team_count);
                ChainAssignment {
                    team: run.teams[team_index].name.clone(),
                    chain,
                    observed: self.observed_source(shared, run, chain),
                }
            })
            .collect()
    }

    /// What the holder of `chain` observes this round: the previous holder's
    /// drawing when it exists, else the latest earlier artifact, falling all
    /// the way back to the original reference (covers the documented
    /// uploader-disconnect data loss).
    fn observed_source(&self, shared: &Shared, run: &RelayRun, chain: usize) -> ObservedSource {
        let team_count = run.teams.len();
        for earlier in (0..run.round_index).rev() {
            let holder = &run.teams[chain_holder(chain, earlier, team_count)].name;
            if let Some(drawing) = shared.drawings.get(earlier, holder) {
                return ObservedSource::Drawing {
                    round: earlier,
                    team: holder.clone(),
                    image_data: drawing.image_data.clone(),
                };
            }
        }
        let reference = &run.references[chain];
        ObservedSource::Reference {
            name: reference.name.clone(),
            image_url: reference.image_url.clone(),
        }
    }

    /// Read-time join producing, per chain, the ordered (round, team,
    /// drawing) history prefixed by the original reference.
    fn reconstruct_chains(&self, shared: &Shared) -> Vec<ChainReconstruction> {
        let Some(run) = self.run.as_ref() else {
            return Vec::new();
        };
        let team_count = run.teams.len();
        let passages = self.config.passages as usize;
        (0..team_count)
            .map(|chain| ChainReconstruction {
                chain,
                reference: run.references[chain].clone(),
                links: (0..passages)
                    .map(|round| {
                        let team = run.teams[chain_holder(chain, round, team_count)].name.clone();
                        let image_data = shared
                            .drawings
                            .get(round, &team)
                            .map(|drawing| drawing.image_data.clone());
                        ChainLink {
                            round,
                            team,
                            image_data,
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn outcome(&self, shared: &Shared) -> SessionOutcome {
        SessionOutcome {
            session_id: shared.core.id,
            mode: shared.core.mode,
            // Relay rounds are not scored; the ranking stays empty.
            ranking: Vec::new(),
            score_events: shared.ledger.events().to_vec(),
            drawings: shared.drawings.all(),
            chains: Some(self.reconstruct_chains(shared)),
        }
    }
}
