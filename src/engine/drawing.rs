//! Drawing artifacts and the idempotent save protocol.

use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

/// Immutable snapshot of a team's shared canvas at a round boundary.
///
/// The canvas wire format is delegated: `image_data` is an opaque string
/// (typically a data URL) passed through untouched.
#[derive(Debug, Clone, Serialize)]
pub struct Drawing {
    /// Round the drawing belongs to.
    pub round: usize,
    /// Team whose canvas was saved.
    pub team: String,
    /// What the drawing illustrates: the word (pictionary) or the chain
    /// index (relay).
    pub label: String,
    /// Opaque canvas snapshot.
    pub image_data: String,
    /// Participant whose upload was accepted.
    pub uploaded_by: Uuid,
}

/// Per-session store enforcing at most one drawing per (round, team) slot.
///
/// Later uploads for a filled slot are ignored rather than rejected, so
/// client retries stay idempotent.
#[derive(Debug, Default)]
pub(crate) struct DrawingStore {
    slots: IndexMap<(usize, String), Drawing>,
}

impl DrawingStore {
    /// Insert `drawing` unless its slot is already filled; returns whether
    /// it was stored.
    pub fn save(&mut self, drawing: Drawing) -> bool {
        let key = (drawing.round, drawing.team.clone());
        if self.slots.contains_key(&key) {
            return false;
        }
        self.slots.insert(key, drawing);
        true
    }

    /// Drawing saved for `(round, team)`, if any.
    pub fn get(&self, round: usize, team: &str) -> Option<&Drawing> {
        self.slots.get(&(round, team.to_string()))
    }

    /// All drawings in insertion order.
    pub fn all(&self) -> Vec<Drawing> {
        self.slots.values().cloned().collect()
    }

    /// Number of persisted drawings.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Drop every drawing (stop resets the run).
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
