//! The job record and its lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MurmurError;
use crate::formatter::OutputFormat;
use crate::job::params::{ModelSize, TranscriptionParams};
use crate::storage::SourceRef;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true for states no job ever leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    fn can_become(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => matches!(
                next,
                JobStatus::Processing | JobStatus::Failed | JobStatus::Cancelled
            ),
            JobStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Timing of a single word inside a segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordTiming {
    pub start: f64,
    pub end: f64,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
}

/// A timed span of transcribed text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<WordTiming>) -> Self {
        self.words = words;
        self
    }
}

/// Category of a background failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InferenceFailure,
    Timeout,
    StorageFailure,
    FormatError,
    /// The process stopped while the job was running.
    Interrupted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InferenceFailure => "inference_failure",
            FailureKind::Timeout => "timeout",
            FailureKind::StorageFailure => "storage_failure",
            FailureKind::FormatError => "format_error",
            FailureKind::Interrupted => "interrupted",
        }
    }
}

impl FromStr for FailureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inference_failure" => Ok(FailureKind::InferenceFailure),
            "timeout" => Ok(FailureKind::Timeout),
            "storage_failure" => Ok(FailureKind::StorageFailure),
            "format_error" => Ok(FailureKind::FormatError),
            "interrupted" => Ok(FailureKind::Interrupted),
            other => Err(format!("unknown failure kind '{}'", other)),
        }
    }
}

/// Structured failure recorded on a failed job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Throughput details accompanying the progress fraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    pub segments_processed: u64,
    /// Seconds of audio covered by the segments so far.
    pub covered_duration: f64,
    /// Seconds of audio processed per wall-clock second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_speed: Option<f64>,
    /// Estimated seconds until inference finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
}

/// A transcription job with its full lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    /// Store-assigned creation sequence; orders listings.
    pub seq: u64,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub source: SourceRef,
    pub filename: String,
    pub filesize: u64,
    pub parameters: TranscriptionParams,
    pub progress: f64,
    #[serde(default)]
    pub progress_info: ProgressInfo,
    /// Media duration reported by the inference adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Language detected by the model, or the requested one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub output_paths: BTreeMap<OutputFormat, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

impl Job {
    /// Creates a queued job. The sequence number is assigned by the store.
    pub fn new(
        id: String,
        source: SourceRef,
        filename: impl Into<String>,
        filesize: u64,
        parameters: TranscriptionParams,
    ) -> Self {
        let now = Utc::now();
        let language = parameters.language.clone();
        Self {
            id,
            seq: 0,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            source,
            filename: filename.into(),
            filesize,
            parameters,
            progress: 0.0,
            progress_info: ProgressInfo::default(),
            duration: None,
            language,
            segments: Vec::new(),
            output_paths: BTreeMap::new(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the job to `next`, stamping the relevant timestamps.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), MurmurError> {
        if !self.status.can_become(next) {
            return Err(MurmurError::InvalidState {
                job_id: self.id.clone(),
                reason: format!("cannot move from {} to {}", self.status, next),
            });
        }

        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        match next {
            JobStatus::Processing => self.started_at = Some(now),
            s if s.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }
        if next == JobStatus::Completed {
            self.progress = 1.0;
        }
        Ok(())
    }

    /// Marks the job failed with the given detail.
    pub fn fail(&mut self, detail: FailureDetail) -> Result<(), MurmurError> {
        self.transition(JobStatus::Failed)?;
        self.output_paths.clear();
        self.error = Some(detail);
        Ok(())
    }

    /// Records a newly produced segment together with the progress it implies.
    pub fn push_segment(&mut self, segment: Segment, progress: f64, info: ProgressInfo) {
        self.segments.push(segment);
        self.progress = self.progress.max(progress);
        self.progress_info = info;
        self.updated_at = Utc::now();
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            filename: self.filename.clone(),
            model: self.parameters.model,
            output_formats: self.parameters.output_formats.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            duration: self.duration,
            language: self.language.clone(),
            error: self.error.clone(),
        }
    }
}

/// Lightweight view of a job for listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub filename: String,
    pub model: ModelSize,
    pub output_formats: Vec<OutputFormat>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}
