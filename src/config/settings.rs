//! Application settings and paths.
//!
//! Manages XDG-compliant paths for configuration and data, and the tunables
//! injected into the scanner and the schedule trigger loop.

use crate::banner::BannerSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ScannerConfig;
use crate::scheduler::{PolicyKind, TriggerConfig};
use crate::types::Port;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portwatch)
    pub config_dir: PathBuf,
    /// Data directory (~/.local/share/portwatch)
    pub data_dir: PathBuf,
}

impl Paths {
    /// Locate the platform directories, creating them if needed.
    pub fn discover() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "portwatch", "portwatch").ok_or(ConfigError::DirectoryNotFound)?;

        Self::at(project.config_dir(), project.data_dir())
    }

    /// Use explicit directories, creating them if needed.
    pub fn at(config_dir: impl AsRef<Path>, data_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let paths = Self {
            config_dir: config_dir.as_ref().to_path_buf(),
            data_dir: data_dir.as_ref().to_path_buf(),
        };

        fs::create_dir_all(&paths.config_dir)?;
        fs::create_dir_all(&paths.data_dir)?;

        Ok(paths)
    }

    /// Replace the data directory.
    pub fn with_data_dir(self, data_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::at(&self.config_dir, data_dir)
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// Get the path to the job storage directory.
    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }

    /// Get the path to the schedule storage directory.
    pub fn schedules_dir(&self) -> PathBuf {
        self.data_dir.join("schedules")
    }
}

/// Well-known ports scanned for the `common` port specification.
pub const DEFAULT_COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 3306, 3389, 5432, 6379, 8080, 8443, 27017,
];

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-probe connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Banner read/write timeout in milliseconds.
    pub banner_timeout_ms: u64,
    /// Maximum banner lines read from a peer.
    pub banner_max_lines: usize,
    /// Maximum simultaneous in-flight probes per job.
    pub max_concurrent_probes: usize,
    /// Probes per second, 0 for unlimited.
    pub probe_rate_limit: u32,
    /// Ports used for the `common` specification.
    pub common_ports: Vec<u16>,
    /// Seconds between schedule evaluations.
    pub schedule_tick_secs: u64,
    /// Fixed interval between runs of a schedule, in seconds.
    pub schedule_interval_secs: u64,
    /// How schedules decide they are due.
    pub schedule_policy: PolicyKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            banner_timeout_ms: 2000,
            banner_max_lines: 10,
            max_concurrent_probes: 200,
            probe_rate_limit: 0,
            common_ports: DEFAULT_COMMON_PORTS.to_vec(),
            schedule_tick_secs: 60,
            schedule_interval_secs: 3600,
            schedule_policy: PolicyKind::Fixed,
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let file = paths.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        let file = paths.settings_file();

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&file, content).map_err(|e| ConfigError::WriteFailed {
            path: file,
            reason: e.to_string(),
        })
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = |field: &'static str, value: u64| {
            if value == 0 {
                Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                })
            } else {
                Ok(())
            }
        };

        positive("connect_timeout_ms", self.connect_timeout_ms)?;
        positive("banner_timeout_ms", self.banner_timeout_ms)?;
        positive("banner_max_lines", self.banner_max_lines as u64)?;
        positive("max_concurrent_probes", self.max_concurrent_probes as u64)?;
        positive("schedule_tick_secs", self.schedule_tick_secs)?;
        positive("schedule_interval_secs", self.schedule_interval_secs)?;

        if self.common_ports.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "common_ports",
                reason: "must not be empty".to_string(),
            });
        }
        if self.common_ports.contains(&0) {
            return Err(ConfigError::InvalidValue {
                field: "common_ports",
                reason: "port 0 is not a valid port".to_string(),
            });
        }

        Ok(())
    }

    /// Build the configuration value injected into the scan coordinator.
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            banner: BannerSettings {
                timeout: Duration::from_millis(self.banner_timeout_ms),
                max_lines: self.banner_max_lines,
            },
            max_concurrent_probes: self.max_concurrent_probes,
            probe_rate_limit: self.probe_rate_limit,
            common_ports: self.common_ports.iter().filter_map(|&p| Port::new(p)).collect(),
        }
    }

    /// Build the configuration for the schedule trigger loop.
    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            tick: Duration::from_secs(self.schedule_tick_secs),
            interval: Duration::from_secs(self.schedule_interval_secs),
            policy: self.schedule_policy,
        }
    }
}
