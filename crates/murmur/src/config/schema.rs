use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_EVENT_CAPACITY;

/// Service configuration. Every field has a default, so an empty document is
/// a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: PathBuf,
    #[serde(default = "default_transcript_directory")]
    pub transcript_directory: PathBuf,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default = "default_true")]
    pub retain_source_after_completion: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `~/.murmur/data`, or `.murmur/data` relative to the working directory
/// when no home directory is known.
pub fn default_data_directory() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".murmur").join("data"))
        .unwrap_or_else(|| PathBuf::from(".murmur").join("data"))
}

fn default_upload_directory() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_transcript_directory() -> PathBuf {
    PathBuf::from("transcripts")
}

fn default_true() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            upload_directory: default_upload_directory(),
            transcript_directory: default_transcript_directory(),
            database: DatabaseConfig::default(),
            workers: WorkersConfig::default(),
            events: EventsConfig::default(),
            retain_source_after_completion: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// A config rooted at `data_directory` with everything else defaulted.
    pub fn with_data_directory<P: AsRef<Path>>(data_directory: P) -> Self {
        Self {
            data_directory: data_directory.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_directory.join(path)
        }
    }

    pub fn upload_path(&self) -> PathBuf {
        self.resolve(&self.upload_directory)
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.resolve(&self.transcript_directory)
    }

    /// Database file location, or `None` for an in-memory store.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.database.in_memory {
            return None;
        }
        Some(match &self.database.path {
            Some(path) => self.resolve(path),
            None => crate::db::database_path_in(&self.data_directory),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Keep jobs in memory only; nothing survives a restart.
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkersConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Wall-clock budget per job. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_job_duration_secs: Option<u64>,
}

fn default_max_concurrent_jobs() -> usize {
    1
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_job_duration_secs: None,
        }
    }
}

impl WorkersConfig {
    pub fn max_job_duration(&self) -> Option<Duration> {
        self.max_job_duration_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsConfig {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
