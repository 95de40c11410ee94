//! Application-level configuration loading: session tuning, scoring and timers.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{scoring::ScoringPolicy, session::SessionSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZZIT_CONFIG_PATH";
const DEFAULT_QUESTION_BANK_PATH: &str = "config/questions.json";

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Number of digits of a join PIN.
    pub pin_length: usize,
    /// Players required before the host may start.
    pub min_players: usize,
    /// Entries carried by `SHOW_RESULTS`.
    pub leaderboard_top: usize,
    /// Points granted for correct answers.
    pub scoring: ScoringPolicy,
    /// How long a session survives without a host heartbeat.
    pub host_grace: Duration,
    /// How long a finished session stays queryable.
    pub retention: Duration,
    /// Period of the idle-session sweep.
    pub sweep_interval: Duration,
    /// Upper bound on waiting for a session's serializer.
    pub command_timeout: Duration,
    /// Capacity of each session's broadcast channel.
    pub event_capacity: usize,
    /// Events retained per session for stream resumption.
    pub event_history: usize,
    /// JSON file seeding the in-memory question bank.
    pub question_bank_path: PathBuf,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Per-session knobs derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            min_players: self.min_players,
            leaderboard_top: self.leaderboard_top,
            scoring: self.scoring,
            command_timeout: self.command_timeout,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    pin_length: usize,
    min_players: usize,
    leaderboard_top: usize,
    scoring: RawScoring,
    #[serde_as(as = "DurationSeconds<u64>")]
    host_grace_secs: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    retention_secs: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    sweep_interval_secs: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    command_timeout_ms: Duration,
    event_capacity: usize,
    event_history: usize,
    question_bank_path: PathBuf,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            pin_length: 6,
            min_players: 1,
            leaderboard_top: 5,
            scoring: RawScoring::default(),
            host_grace_secs: Duration::from_secs(60),
            retention_secs: Duration::from_secs(300),
            sweep_interval_secs: Duration::from_secs(10),
            command_timeout_ms: Duration::from_millis(2_000),
            event_capacity: 64,
            event_history: 256,
            question_bank_path: PathBuf::from(DEFAULT_QUESTION_BANK_PATH),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// Scoring block of the configuration file.
struct RawScoring {
    base_points: u32,
    min_fraction: f64,
    speed_weight: f64,
}

impl Default for RawScoring {
    fn default() -> Self {
        let policy = ScoringPolicy::default();
        Self {
            base_points: policy.base_points,
            min_fraction: policy.min_fraction,
            speed_weight: policy.speed_weight,
        }
    }
}

impl From<RawScoring> for ScoringPolicy {
    fn from(value: RawScoring) -> Self {
        Self {
            base_points: value.base_points,
            min_fraction: value.min_fraction.clamp(0.0, 1.0),
            speed_weight: value.speed_weight.max(0.0),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            // PINs shorter than 4 digits collide too often to be useful.
            pin_length: value.pin_length.clamp(4, 12),
            min_players: value.min_players,
            leaderboard_top: value.leaderboard_top,
            scoring: value.scoring.into(),
            host_grace: value.host_grace_secs,
            retention: value.retention_secs,
            sweep_interval: value.sweep_interval_secs.max(Duration::from_secs(1)),
            command_timeout: value.command_timeout_ms,
            event_capacity: value.event_capacity.max(1),
            event_history: value.event_history,
            question_bank_path: value.question_bank_path,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_defaults_for_missing_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"min_players": 2, "host_grace_secs": 30, "scoring": {"speed_weight": 1.0}}"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.min_players, 2);
        assert_eq!(config.host_grace, Duration::from_secs(30));
        assert_eq!(config.scoring.speed_weight, 1.0);
        assert_eq!(config.scoring.base_points, 1000);
        assert_eq!(config.pin_length, 6);
        assert_eq!(config.command_timeout, Duration::from_millis(2_000));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/app.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"pin_length": 2, "scoring": {"min_fraction": 3.0}}"#)
                .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.pin_length, 4);
        assert_eq!(config.scoring.min_fraction, 1.0);
    }
}
