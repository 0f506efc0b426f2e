//! Runtime settings
//!
//! Tuning knobs for the blocking session (wait deadline, settle delays)
//! plus log output settings, persisted as JSON in the user's config
//! directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Timing knobs for the blocking session API.
///
/// The settle delays pace the hardware stack's internal command queue;
/// issuing requests back to back without them can starve its callback
/// delivery. All delays may be set to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Deadline in milliseconds for any blocking wait. Zero waits forever.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// Pause after fire-and-forget requests (writes without response,
    /// client registration).
    #[serde(default = "default_command_settle_ms")]
    pub command_settle_ms: u64,
    /// Pause after a connection opens, before the first GATT request.
    #[serde(default = "default_connect_settle_ms")]
    pub connect_settle_ms: u64,
    /// Pause after a service search completes.
    #[serde(default = "default_search_settle_ms")]
    pub search_settle_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: default_wait_timeout_ms(),
            command_settle_ms: default_command_settle_ms(),
            connect_settle_ms: default_connect_settle_ms(),
            search_settle_ms: default_search_settle_ms(),
        }
    }
}

fn default_wait_timeout_ms() -> u64 {
    30_000
}
fn default_command_settle_ms() -> u64 {
    100
}
fn default_connect_settle_ms() -> u64 {
    3_000
}
fn default_search_settle_ms() -> u64 {
    1_000
}

impl SessionSettings {
    /// Deadline for blocking waits, `None` meaning wait forever.
    pub fn wait_deadline(&self) -> Option<Duration> {
        if self.wait_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.wait_timeout_ms))
        }
    }

    pub(crate) fn command_settle(&self) -> Duration {
        Duration::from_millis(self.command_settle_ms)
    }

    pub(crate) fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_ms)
    }

    pub(crate) fn search_settle(&self) -> Duration {
        Duration::from_millis(self.search_settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "btctl".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Loads and saves [`Settings`] under the user's config directory.
pub struct SettingsStore {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsStore {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("btctl");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}
