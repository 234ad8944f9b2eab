use crate::estimation::BatchSettings;
use crate::estimation::batch::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONCURRENT_BATCHES};
use crate::report::DEFAULT_OUTPUT_DIR;
use crate::source::DEFAULT_TIMEZONE;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const CONFIG_PATH_ENV: &str = "STORE_UPTIME_CONFIG";
pub const DEFAULT_SERVER_PORT: u16 = 8000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub data: DataSection,
    #[serde(default)]
    pub report: Option<ReportSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSection {
    pub store_status_path: PathBuf,
    pub business_hours_path: Option<PathBuf>,
    pub timezones_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSection {
    /// Directory report artifacts are written to (default: reports)
    pub output_dir: Option<PathBuf>,
    /// Stores per observation fetch (default: 500)
    pub batch_size: Option<usize>,
    pub max_concurrent_batches: Option<usize>,
    /// IANA zone for stores without a timezone entry (default: America/Chicago)
    pub default_timezone: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8000)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown default timezone: {0}")]
    InvalidTimezone(String),
}

/// Load from `STORE_UPTIME_CONFIG` when set, otherwise the default path.
pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(config_path())
}

pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|path| !path.as_os_str().is_empty())
}

impl Config {
    pub fn store_status_path(&self) -> &Path {
        &self.data.store_status_path
    }

    pub fn business_hours_path(&self) -> Option<&Path> {
        non_empty(self.data.business_hours_path.as_deref())
    }

    pub fn timezones_path(&self) -> Option<&Path> {
        non_empty(self.data.timezones_path.as_deref())
    }

    pub fn output_dir(&self) -> &Path {
        non_empty(self.report.as_ref().and_then(|r| r.output_dir.as_deref()))
            .unwrap_or(Path::new(DEFAULT_OUTPUT_DIR))
    }

    pub fn batch_settings(&self) -> BatchSettings {
        let report = self.report.as_ref();
        BatchSettings {
            batch_size: report
                .and_then(|r| r.batch_size)
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            max_concurrent_batches: report
                .and_then(|r| r.max_concurrent_batches)
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_MAX_CONCURRENT_BATCHES),
        }
    }

    /// Zone for stores without a timezone entry. An unknown name is a
    /// configuration error rather than a silent fallback.
    pub fn default_timezone(&self) -> Result<Tz, ConfigError> {
        match self
            .report
            .as_ref()
            .and_then(|r| r.default_timezone.as_deref())
            .filter(|name| !name.is_empty())
        {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name.to_string())),
            None => Ok(DEFAULT_TIMEZONE),
        }
    }

    /// Returns the server port (default: 8000)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }
}
