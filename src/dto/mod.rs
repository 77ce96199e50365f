//! Data-transfer objects: configuration inputs, public snapshots, broadcast
//! events, and command receipts.

/// Session-creation configuration inputs.
pub mod config;
/// Broadcast event payloads.
pub mod events;
/// Pictionary snapshots and guess outcomes.
pub mod pictionary;
/// Quiz snapshots, answer records, and receipts.
pub mod quiz;
/// Relay snapshots, assignments, and chain reconstructions.
pub mod relay;
/// Session-level snapshots, requests, and the finish payload.
pub mod session;
