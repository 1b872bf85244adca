use std::path::PathBuf;
use thiserror::Error;

use crate::formatter::OutputFormat;

/// Errors surfaced to callers of the orchestrator.
#[derive(Error, Debug)]
pub enum MurmurError {
    #[error("Invalid parameter '{field}': {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is not ready (status: {status})")]
    NotReady { job_id: String, status: String },

    #[error("Job {job_id} was not requested in {format} format")]
    UnsupportedFormat { job_id: String, format: OutputFormat },

    #[error("Invalid state transition for job {job_id}: {reason}")]
    InvalidState { job_id: String, reason: String },

    #[error("Inference failed: {0}")]
    InferenceFailure(#[from] InferenceError),

    #[error("Job {0} exceeded its processing budget")]
    Timeout(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Formatting failed: {0}")]
    Format(#[from] FormatError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Orchestrator is shutting down")]
    ShuttingDown,
}

impl From<StorageError> for MurmurError {
    fn from(err: StorageError) -> Self {
        MurmurError::StorageFailure(err.to_string())
    }
}

impl From<crate::store::StoreError> for MurmurError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound(id) => MurmurError::NotFound(id),
            other => MurmurError::StorageFailure(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source reference: {0}")]
    InvalidReference(String),
}

/// Raised by the output formatter when its input breaks an invariant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("Segment {index} starts at {start}s, before the previous segment at {previous}s")]
    OutOfOrder {
        index: usize,
        start: f64,
        previous: f64,
    },

    #[error("Segment {index} has an invalid time span ({start}s -> {end}s)")]
    InvalidSpan { index: usize, start: f64, end: f64 },

    #[error("Failed to serialize transcript: {0}")]
    Serialize(String),
}

/// Failure reported by an inference adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Inference engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, MurmurError>;
