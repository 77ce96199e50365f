//! Engine-level configuration: pacing delays and channel capacities.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/engine.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTYHALL_ENGINE_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared by every session.
pub struct EngineConfig {
    /// Delay between "everyone answered" and the quiz advancing.
    pub answer_grace: Duration,
    /// Celebration pause once every non-drawing team found the word.
    pub celebration_delay: Duration,
    /// Pause on the revealed word after a pictionary round times out.
    pub reveal_delay: Duration,
    /// Interval between countdown ticks pushed to viewers; `None` disables
    /// tick broadcasting (remaining time is still served in snapshots).
    pub tick_interval: Option<Duration>,
    /// Command queue capacity of a session task.
    pub command_capacity: usize,
    /// Broadcast buffer capacity of a session's event hub.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            answer_grace: Duration::from_secs(2),
            celebration_delay: Duration::from_secs(3),
            reveal_delay: Duration::from_secs(4),
            tick_interval: Some(Duration::from_secs(1)),
            command_capacity: 256,
            event_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Load the engine configuration from disk, falling back to the built-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded engine config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse engine config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "engine config not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read engine config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file. Durations are in seconds;
/// a `tick_interval_secs` of 0 disables tick broadcasting.
struct RawConfig {
    answer_grace_secs: Option<u64>,
    celebration_delay_secs: Option<u64>,
    reveal_delay_secs: Option<u64>,
    tick_interval_secs: Option<u64>,
    command_capacity: Option<usize>,
    event_capacity: Option<usize>,
}

impl From<RawConfig> for EngineConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = EngineConfig::default();
        Self {
            answer_grace: raw
                .answer_grace_secs
                .map_or(defaults.answer_grace, Duration::from_secs),
            celebration_delay: raw
                .celebration_delay_secs
                .map_or(defaults.celebration_delay, Duration::from_secs),
            reveal_delay: raw
                .reveal_delay_secs
                .map_or(defaults.reveal_delay, Duration::from_secs),
            tick_interval: match raw.tick_interval_secs {
                None => defaults.tick_interval,
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
            },
            command_capacity: raw.command_capacity.unwrap_or(defaults.command_capacity),
            event_capacity: raw.event_capacity.unwrap_or(defaults.event_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
