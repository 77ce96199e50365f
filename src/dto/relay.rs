use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::content::ReferenceImage;

/// Phase within one relay round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPhase {
    /// Teams study their observed image; drawing is disabled.
    Observation,
    /// The whole team paints its reproduction concurrently.
    Drawing,
}

/// What a team observes at the start of a round.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservedSource {
    /// The chain's original reference image (round 0, or the fallback when
    /// earlier drawings were lost).
    Reference {
        /// Reference name.
        name: String,
        /// Image URL.
        image_url: String,
    },
    /// The drawing the previous holder produced for this chain.
    Drawing {
        /// Round the drawing was made in.
        round: usize,
        /// Team that made it.
        team: String,
        /// Canvas snapshot.
        image_data: String,
    },
}

/// One team's assignment for the current round.
#[derive(Debug, Clone, Serialize)]
pub struct ChainAssignment {
    /// Team holding the chain this round.
    pub team: String,
    /// Chain index.
    pub chain: usize,
    /// Image the team reproduces this round.
    pub observed: ObservedSource,
}

/// Relay state visible to every viewer.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct RelaySnapshot {
    /// Index of the current round.
    pub round_index: usize,
    /// Total number of rounds.
    pub passages: usize,
    /// Current phase, present while playing.
    pub phase: Option<RelayPhase>,
    /// Team-to-chain assignments of the current round; a bijection.
    pub assignments: Vec<ChainAssignment>,
}

/// One drawing slot in a reconstructed chain.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ChainLink {
    /// Round the slot belongs to.
    pub round: usize,
    /// Team that held the chain that round.
    pub team: String,
    /// Saved canvas snapshot; absent when the designated uploader
    /// disconnected before saving (documented data-loss case).
    pub image_data: Option<String>,
}

/// Ordered history of one chain, reconstructed at finish as a read-time join.
#[derive(Debug, Clone, Serialize)]
pub struct ChainReconstruction {
    /// Chain index.
    pub chain: usize,
    /// Original reference the chain descends from.
    pub reference: ReferenceImage,
    /// One link per round, in round order.
    pub links: Vec<ChainLink>,
}
