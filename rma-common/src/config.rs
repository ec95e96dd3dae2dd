//! Configuration loading and config file resolution
//!
//! The automation engine is configured once at startup from a TOML file.
//! Every field carries a built-in default, so a missing file (or a file that
//! only overrides a few keys) still yields a complete configuration.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`RMA_CONFIG`)
//! 3. `./config.toml` in the working directory
//! 4. `~/.config/rma/config.toml` (or `/etc/rma/config.toml` on Linux)
//!
//! If none of these exist the compiled defaults are used and a warning is logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RMA_CONFIG";

/// Complete automation configuration
///
/// Constructed once at startup and shared read-only (behind an `Arc`) by
/// every worker. Nothing mutates it after [`AutomationConfig::validate`].
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AutomationConfig {
    pub amcp: AmcpConfig,
    pub database: DatabaseConfig,
    pub playback: PlaybackConfig,
    pub scheduler: SchedulerConfig,
    pub refresher: RefresherConfig,
    pub monitor: MonitorConfig,
    pub supervisor: SupervisorConfig,
    pub logging: LoggingConfig,
}

/// Playout server connection settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmcpConfig {
    pub host: String,
    pub port: u16,
    /// Video channel all layers live on
    pub channel: u16,
    /// Socket read/write/connect timeout
    pub io_timeout_secs: u64,
    /// Fixed delay between connection attempts
    pub reconnect_delay_secs: u64,
}

impl Default for AmcpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5250,
            channel: 1,
            io_timeout_secs: 5,
            reconnect_delay_secs: 5,
        }
    }
}

/// Catalog database settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db/media_cache.db"),
        }
    }
}

/// Layers, assets and transition settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Path prefix (server-relative) of selectable music clips
    pub music_prefix: String,
    pub content_layer: u16,
    pub stinger_layer: u16,
    pub logo_layer: u16,
    /// Cross-fade duration in frames
    pub mix_duration: u32,
    /// On-air name overlay template
    pub now_play_name: String,
    pub logo_path: String,
    pub stinger_path: String,
    /// Plays between two stinger sequences
    pub stinger_interval: u32,
    /// Logo fill rectangle: x, y, scale x, scale y
    pub logo_fill: [f32; 4],
    /// How long the stinger holds before the logo is restored
    pub stinger_hold_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            music_prefix: "ROCK MUSIC/".to_string(),
            content_layer: 10,
            stinger_layer: 20,
            logo_layer: 30,
            mix_duration: 30,
            now_play_name: "NOW_PLAYING".to_string(),
            logo_path: "LOGO".to_string(),
            stinger_path: "STINGER".to_string(),
            stinger_interval: 5,
            logo_fill: [0.04, 0.04, 0.2, 0.19],
            stinger_hold_secs: 5,
        }
    }
}

/// Clip selection policy
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum time before the same clip may replay
    pub anti_repeat_secs: u64,
    /// Minimum time before the same artist is preferred again
    pub artist_cooldown_secs: u64,
    /// Uniform draws attempted before the artist cooldown is ignored
    pub draw_budget: usize,
    /// Back-off when no clip is eligible
    pub empty_retry_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            anti_repeat_secs: 3 * 3600,
            artist_cooldown_secs: 3600,
            draw_budget: 30,
            empty_retry_secs: 5,
        }
    }
}

/// Catalog refresher settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefresherConfig {
    pub interval_secs: u64,
    /// Extra attempts of a pass after a storage error
    pub storage_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            storage_retries: 1,
            retry_delay_secs: 1,
        }
    }
}

/// Progress monitor settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            error_backoff_ms: 1000,
        }
    }
}

/// Watchdog settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    pub interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AutomationConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a file, falling back to defaults if it is missing
    ///
    /// A missing file is not an error: a warning is logged and the compiled
    /// defaults are returned. A file that exists but cannot be parsed is.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let toml_str = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&toml_str)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values that would stall or spin a worker loop
    pub fn validate(&self) -> Result<()> {
        if self.amcp.host.trim().is_empty() {
            return Err(Error::Config("amcp.host must not be empty".to_string()));
        }
        if self.refresher.interval_secs == 0 {
            return Err(Error::Config("refresher.interval_secs must be > 0".to_string()));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(Error::Config("monitor.poll_interval_ms must be > 0".to_string()));
        }
        if self.supervisor.interval_secs == 0 {
            return Err(Error::Config("supervisor.interval_secs must be > 0".to_string()));
        }
        if self.scheduler.draw_budget == 0 {
            return Err(Error::Config("scheduler.draw_budget must be > 0".to_string()));
        }
        if self.playback.stinger_interval == 0 {
            return Err(Error::Config("playback.stinger_interval must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.amcp.io_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.amcp.reconnect_delay_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresher.interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.poll_interval_ms)
    }

    pub fn supervisor_interval(&self) -> Duration {
        Duration::from_secs(self.supervisor.interval_secs)
    }
}

/// Resolve which config file to read
///
/// Returns the first candidate that exists. When nothing exists the CLI or
/// environment choice is still returned (so the caller can report it), else
/// `./config.toml`.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: Working directory
    let local = PathBuf::from("config.toml");
    if local.exists() {
        return local;
    }

    // Priority 4: Platform config directory
    default_config_file().unwrap_or(local)
}

/// Platform config file, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("rma").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/rma/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
