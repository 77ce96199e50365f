use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::status::{InvalidTransition, SessionStatus, StatusEvent, StatusMachine};

/// Game mode a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Trivia quiz with admin-validated answers.
    Quiz,
    /// Draw-and-guess rounds with rotating drawing teams.
    Pictionary,
    /// Circular memory-drawing relay.
    Relay,
}

impl GameMode {
    /// Whether participants may join after the session left the lobby.
    ///
    /// Quiz auto-advance counts currently-present participants, so it
    /// tolerates membership changes mid-game; pictionary and relay freeze
    /// their team rosters at start.
    pub fn allows_late_join(self) -> bool {
        matches!(self, GameMode::Quiz)
    }
}

/// Who created the session and may drive its lifecycle alongside the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatorRef {
    /// The administrator created the session.
    Admin,
    /// A designated participant ("room master") created the session.
    Participant(Uuid),
}

/// Actor issuing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The administrator console.
    Admin,
    /// A connected participant.
    Participant(Uuid),
}

/// A connected player.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Unique participant identifier, assigned at join.
    pub id: Uuid,
    /// Display name chosen by the player.
    pub display_name: String,
    /// Team the player belongs to; teams are the unit of scoring.
    pub team_name: String,
}

/// Mode-independent session state: identity, lifecycle, and membership.
#[derive(Debug)]
pub struct SessionCore {
    /// Session identifier.
    pub id: Uuid,
    /// Mode this session runs.
    pub mode: GameMode,
    /// Creator reference used for room-master permission checks.
    pub creator: CreatorRef,
    status: StatusMachine,
    /// Participants in join order. The order is load-bearing: the
    /// drawing-save protocol designates the first team member by join order
    /// as the only accepted uploader.
    pub participants: IndexMap<Uuid, Participant>,
}

impl SessionCore {
    /// Build a fresh lobby in the waiting state.
    pub fn new(id: Uuid, mode: GameMode, creator: CreatorRef) -> Self {
        Self {
            id,
            mode,
            creator,
            status: StatusMachine::new(),
            participants: IndexMap::new(),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status.status()
    }

    /// Apply a lifecycle event through the explicit transition table.
    pub fn apply_status(&mut self, event: StatusEvent) -> Result<SessionStatus, InvalidTransition> {
        self.status.apply(event)
    }

    /// Whether `origin` may drive the session lifecycle (start/stop/advance).
    pub fn is_master(&self, origin: Origin) -> bool {
        match origin {
            Origin::Admin => true,
            Origin::Participant(id) => self.creator == CreatorRef::Participant(id),
        }
    }

    /// Team name of a present participant.
    pub fn team_of(&self, participant_id: Uuid) -> Option<&str> {
        self.participants
            .get(&participant_id)
            .map(|p| p.team_name.as_str())
    }

    /// Team rosters derived from the participant list, teams ordered by
    /// first appearance and members in join order.
    pub fn teams(&self) -> IndexMap<String, Vec<Uuid>> {
        let mut teams: IndexMap<String, Vec<Uuid>> = IndexMap::new();
        for participant in self.participants.values() {
            teams
                .entry(participant.team_name.clone())
                .or_default()
                .push(participant.id);
        }
        teams
    }
}
