use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use leadscout_core::PollerSettings;
use leadscout_engine::{
    BackendSettings, ChromeSettings, CoordinatorSettings, ExtractionSettings, DEFAULT_BACKEND_URL,
    DEFAULT_SEARCH_BASE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::logging::LogDestination;

pub const DEFAULT_CONFIG_FILENAME: &str = "leadscout.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid url in `{field}`: {message}")]
    InvalidUrl { field: &'static str, message: String },
}

/// Runtime configuration, read from a RON file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub backend_base_url: String,
    pub search_base_url: String,
    pub poll_interval_secs: u64,
    /// Skip fetching while a dispatched task has not reported back.
    pub gate_fetch_on_pending_result: bool,
    /// Gated cycles after which a silent task is abandoned. 0 keeps it forever.
    pub stale_task_cycles: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub status_refresh_secs: u64,
    pub autostart: bool,
    pub state_dir: PathBuf,
    pub log_destination: LogDestination,
    pub headless: bool,
    pub browser_executable: Option<String>,
    pub extraction: ExtractionSettings,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_URL.to_string(),
            search_base_url: DEFAULT_SEARCH_BASE.to_string(),
            poll_interval_secs: 60,
            gate_fetch_on_pending_result: true,
            stale_task_cycles: 10,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            status_refresh_secs: 5,
            autostart: false,
            state_dir: PathBuf::from(".leadscout"),
            log_destination: LogDestination::Terminal,
            headless: false,
            browser_executable: None,
            extraction: ExtractionSettings::default(),
        }
    }
}

impl ScoutConfig {
    /// Loads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            gate_on_pending_result: self.gate_fetch_on_pending_result,
            stale_task_cycles: self.stale_task_cycles,
        }
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            base_url: self.backend_base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn coordinator_settings(&self) -> Result<CoordinatorSettings, ConfigError> {
        let search_base =
            Url::parse(&self.search_base_url).map_err(|err| ConfigError::InvalidUrl {
                field: "search_base_url",
                message: err.to_string(),
            })?;
        Ok(CoordinatorSettings {
            poller: self.poller_settings(),
            search_base,
            extraction: self.extraction.clone(),
        })
    }

    pub fn chrome_settings(&self) -> ChromeSettings {
        ChromeSettings {
            headless: self.headless,
            executable: self.browser_executable.clone(),
        }
    }

    pub fn status_refresh(&self) -> Duration {
        Duration::from_secs(self.status_refresh_secs.max(1))
    }
}

/// Config path: the first argument after the program name, else `leadscout.ron`.
pub fn config_path_from_args(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
}
