//! Append-only point events and team-total aggregation.
//!
//! The quiz and pictionary engines never edit a score in place: corrections
//! append a compensating event, so the ledger doubles as an audit trail and
//! totals are always a pure reduction over it.

use std::collections::BTreeMap;

use serde::Serialize;

/// One appended point award (or compensation, when `points` is negative).
#[derive(Debug, Clone, Serialize)]
pub struct ScoreEvent {
    /// Team credited or debited by the event.
    pub team: String,
    /// Round or question index the event belongs to.
    pub round: usize,
    /// Signed point delta.
    pub points: i32,
    /// Short machine-readable reason, e.g. `first_guess` or `validation`.
    pub reason: String,
}

/// Append-only ledger shared by the quiz and pictionary engines.
#[derive(Debug, Default)]
pub struct ScoringLedger {
    events: Vec<ScoreEvent>,
}

impl ScoringLedger {
    /// Append a point event for `team`.
    pub fn add_points(&mut self, team: &str, round: usize, points: i32, reason: &str) {
        self.events.push(ScoreEvent {
            team: team.to_string(),
            round,
            points,
            reason: reason.to_string(),
        });
    }

    /// All events in append order.
    pub fn events(&self) -> &[ScoreEvent] {
        &self.events
    }

    /// Reduce the ledger into per-team totals.
    pub fn totals(&self) -> BTreeMap<String, i32> {
        let mut totals = BTreeMap::new();
        for event in &self.events {
            *totals.entry(event.team.clone()).or_insert(0) += event.points;
        }
        totals
    }

    /// Totals for `teams` (zero when a team never scored), sorted by score
    /// descending. Ties break by team name ascending; the order is arbitrary
    /// but stable and documented.
    pub fn standings<'a>(&self, teams: impl IntoIterator<Item = &'a str>) -> Vec<(String, i32)> {
        let totals = self.totals();
        let mut standings: Vec<(String, i32)> = teams
            .into_iter()
            .map(|team| (team.to_string(), totals.get(team).copied().unwrap_or(0)))
            .collect();
        standings.sort_by(|(name_a, score_a), (name_b, score_b)| {
            score_b.cmp(score_a).then_with(|| name_a.cmp(name_b))
        });
        standings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_reduce_over_all_events() {
        let mut ledger = ScoringLedger::default();
        ledger.add_points("red", 0, 3, "first_guess");
        ledger.add_points("blue", 0, 1, "guess");
        ledger.add_points("red", 1, 2, "guess");

        let totals = ledger.totals();
        assert_eq!(totals.get("red"), Some(&5));
        assert_eq!(totals.get("blue"), Some(&1));
    }

    #[test]
    fn compensating_event_cancels_out() {
        let mut ledger = ScoringLedger::default();
        ledger.add_points("red", 2, 4, "validation");
        ledger.add_points("red", 2, -4, "validation_revoked");

        assert_eq!(ledger.totals().get("red"), Some(&0));
        assert_eq!(ledger.events().len(), 2);
    }

    #[test]
    fn standings_sort_by_score_then_name() {
        let mut ledger = ScoringLedger::default();
        ledger.add_points("blue", 0, 2, "guess");
        ledger.add_points("amber", 0, 2, "guess");
        ledger.add_points("red", 0, 5, "first_guess");

        let standings = ledger.standings(["red", "blue", "amber", "zinc"]);
        assert_eq!(
            standings,
            vec![
                ("red".to_string(), 5),
                ("amber".to_string(), 2),
                ("blue".to_string(), 2),
                ("zinc".to_string(), 0),
            ]
        );
    }
}
