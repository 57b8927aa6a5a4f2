//! Host configuration structures and loaders.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tabletop_core::{Cost, GameConfig};
use tabletop_runtime::RuntimeConfig;

/// Configuration required to bootstrap a session host.
#[derive(Clone, Debug, Default)]
pub struct HostConfig {
    pub runtime: RuntimeConfig,
    pub enable_persistence: bool,
    pub session_id: Option<String>,
    pub map_path: Option<PathBuf>,
    pub save_data_dir: Option<PathBuf>,
}

impl HostConfig {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self {
            runtime,
            ..Self::default()
        }
    }

    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `TABLETOP_SESSION_ID` - Session identifier for save and log files (default: auto-generated)
    /// - `TABLETOP_MAP_PATH` - RON map to start a new session from (default: open 20x20 field)
    /// - `TABLETOP_DATA_DIR` - Directory for save data (default: platform-specific)
    /// - `TABLETOP_PERSISTENCE` - Persist the session to disk (default: false)
    /// - `TABLETOP_COMMIT_TIMEOUT_SECS` - Upper bound on a single request (default: 30)
    /// - `TABLETOP_POLL_INTERVAL_MS` - Refresh period without push (default: 2000)
    /// - `TABLETOP_EVENT_BUFFER` - Notifications buffered per topic (default: 100)
    /// - `TABLETOP_COMMAND_BUFFER` - Queued commands (default: 32)
    /// - `TABLETOP_DEFAULT_SPEED` - Squares of movement per turn (default: 6)
    /// - `TABLETOP_INITIATIVE_SEED` - Fixed seed for initiative rolls (default: entropy)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let runtime = &mut config.runtime;

        if let Some(secs) = read_env::<u64>("TABLETOP_COMMIT_TIMEOUT_SECS") {
            runtime.commit_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = read_env::<u64>("TABLETOP_POLL_INTERVAL_MS") {
            runtime.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(capacity) = read_env::<usize>("TABLETOP_EVENT_BUFFER") {
            runtime.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("TABLETOP_COMMAND_BUFFER") {
            runtime.command_buffer_size = capacity.max(1);
        }
        if let Some(squares) = read_env::<u32>("TABLETOP_DEFAULT_SPEED") {
            runtime.game_config = GameConfig {
                default_speed: Cost::squares(squares),
                ..runtime.game_config.clone()
            };
        }
        runtime.initiative_seed = read_env::<u64>("TABLETOP_INITIATIVE_SEED");

        if let Some(enable) = read_env::<bool>("TABLETOP_PERSISTENCE") {
            config.enable_persistence = enable;
        } else if env::var("TABLETOP_PERSISTENCE").is_ok() {
            // Also accept just setting the variable without value as "true"
            config.enable_persistence = true;
        }

        config.session_id = env::var("TABLETOP_SESSION_ID").ok();
        config.map_path = env::var("TABLETOP_MAP_PATH").ok().map(PathBuf::from);
        config.save_data_dir = env::var("TABLETOP_DATA_DIR").ok().map(PathBuf::from);

        config
    }

    /// Session id, generated from the current time when none was configured.
    pub fn session_id_or_generate(&self) -> String {
        self.session_id.clone().unwrap_or_else(|| {
            let timestamp = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or_default();
            format!("session_{timestamp}")
        })
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
