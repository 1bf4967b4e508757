//! RON configuration for the observer binary.
//!
//! Every field has a default, so an absent file or a partial file both work.
//! `OUTPUT_PATH` in the environment overrides `output_dir`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chan_core::{BoardTarget, Endpoints, ImageBoard};
use chan_engine::{FetchSettings, ObserverConfig};
use engine_logging::LogDestination;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "chan_observer.ron";
pub const OUTPUT_PATH_ENV: &str = "OUTPUT_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unknown log level {0:?}")]
    InvalidLevel(String),
    #[error("no boards configured")]
    NoTargets,
    #[error("invalid board name {0:?}")]
    InvalidBoard(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub logging: LoggingConfig,
    pub fetch: FetchConfig,
    pub endpoints: Endpoints,
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub to_terminal: bool,
    pub to_file: bool,
    /// Relative to `output_dir`.
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub image_board: ImageBoard,
    pub board: String,
    pub whitelist_enabled: bool,
    pub whitelist: Vec<u64>,
    pub catalog_delay_ms: u64,
    pub thread_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            logging: LoggingConfig::default(),
            fetch: FetchConfig::default(),
            endpoints: Endpoints::default(),
            targets: vec![TargetConfig::default()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            to_terminal: true,
            to_file: false,
            file_name: "chan_observer.log".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_ms: settings.connect_timeout.as_millis() as u64,
            request_timeout_ms: settings.request_timeout.as_millis() as u64,
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            image_board: ImageBoard::Dvach,
            board: "b".to_string(),
            whitelist_enabled: false,
            whitelist: Vec::new(),
            catalog_delay_ms: 5000,
            thread_delay_ms: 5000,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `chan_observer.ron` when no path is given.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = match fs::read_to_string(path) {
            Ok(text) => Self::from_ron(&text, path)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_ron(text: &str, path: &Path) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(OUTPUT_PATH_ENV).filter(|dir| !dir.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for target in &self.targets {
            let board = target.board.trim();
            if board.is_empty() || board.contains('/') {
                return Err(ConfigError::InvalidBoard(target.board.clone()));
            }
        }
        self.logging.level()?;
        Ok(())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.fetch.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.fetch.request_timeout_ms),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            ..FetchSettings::default()
        }
    }

    pub fn observer_configs(&self) -> Vec<ObserverConfig> {
        self.targets.iter().map(TargetConfig::observer_config).collect()
    }

    pub fn log_destination(&self) -> LogDestination {
        let file = self
            .logging
            .to_file
            .then(|| self.output_dir.join(&self.logging.file_name));
        LogDestination::from_flags(self.logging.to_terminal, file.as_deref())
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))
    }
}

impl TargetConfig {
    pub fn observer_config(&self) -> ObserverConfig {
        ObserverConfig {
            target: BoardTarget::new(self.image_board, self.board.trim()),
            whitelist: self.whitelist_enabled.then(|| self.whitelist.clone()),
            catalog_delay: Duration::from_millis(self.catalog_delay_ms),
            thread_delay: Duration::from_millis(self.thread_delay_ms),
        }
    }
}
