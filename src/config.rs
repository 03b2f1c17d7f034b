use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HooterConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub streaks: StreaksConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub streaks_path: String,
    /// Upper bound for a single load or save, in seconds.
    pub io_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreaksConfig {
    /// Voice channel whose presence earns streak credit.
    pub study_channel_id: u64,
    /// Text channel the daily summary is addressed to.
    pub summary_channel_id: u64,
    pub minimum_minutes: u32,
    /// IANA zone name used for every "which day is it" decision.
    pub timezone: String,
    /// Wall-clock `HH:MM` in `timezone` when the daily summary runs.
    pub rollup_time: String,
    /// Open sessions older than this are reported as stuck.
    pub stale_session_hours: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let streaks_path = default_hooter_dir()
            .join("streaks.json")
            .to_string_lossy()
            .into_owned();
        Self {
            streaks_path,
            io_timeout_secs: 10,
        }
    }
}

impl Default for StreaksConfig {
    fn default() -> Self {
        Self {
            study_channel_id: 1236433017250250806,
            summary_channel_id: 1236433017250250805,
            minimum_minutes: 25,
            timezone: "US/Pacific".into(),
            rollup_time: "21:00".into(),
            stale_session_hours: 12,
        }
    }
}

impl StreaksConfig {
    /// Parsed reference timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }

    /// Parsed daily rollup time-of-day.
    pub fn rollup_at(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.rollup_time, "%H:%M")
            .with_context(|| format!("invalid rollup_time {:?}, expected HH:MM", self.rollup_time))
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.stale_session_hours))
    }
}

/// Returns `~/.hooter/`, or `./.hooter/` when no home directory is known.
pub fn default_hooter_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hooter")
}

/// Returns the default config file path: `~/.hooter/config.toml`
pub fn default_config_path() -> PathBuf {
    default_hooter_dir().join("config.toml")
}

impl HooterConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, apply env var overrides, then validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HooterConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (HOOTER_STREAKS_FILE, HOOTER_LOG_LEVEL,
    /// HOOTER_TIMEZONE, HOOTER_MINIMUM_MINUTES).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HOOTER_STREAKS_FILE") {
            self.storage.streaks_path = val;
        }
        if let Ok(val) = std::env::var("HOOTER_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("HOOTER_TIMEZONE") {
            self.streaks.timezone = val;
        }
        if let Ok(val) = std::env::var("HOOTER_MINIMUM_MINUTES") {
            match val.parse() {
                Ok(minutes) => self.streaks.minimum_minutes = minutes,
                Err(_) => tracing::warn!(value = %val, "ignoring non-numeric HOOTER_MINIMUM_MINUTES"),
            }
        }
    }

    /// Reject settings the streak core cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.streaks.tz()?;
        self.streaks.rollup_at()?;
        if self.streaks.minimum_minutes == 0 {
            bail!("minimum_minutes must be greater than zero");
        }
        if self.storage.io_timeout_secs == 0 {
            bail!("io_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Resolve the streaks file path, expanding `~` if needed.
    pub fn resolved_streaks_path(&self) -> PathBuf {
        expand_tilde(&self.storage.streaks_path)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.io_timeout_secs)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
