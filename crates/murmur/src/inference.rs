//! Boundary to the speech-to-text engine.
//!
//! The engine itself lives outside this crate. The orchestrator drives it
//! through [`InferenceAdapter`] and consumes the segments it yields one at a
//! time.

use std::fmt;
use std::path::Path;

use crate::error::InferenceError;
use crate::job::{Segment, TranscriptionParams};
use crate::storage::SourceRef;

/// Lazy, finite, non-restartable stream of segments. Any item may be an
/// error; the orchestrator stops at the first one.
pub type SegmentStream = Box<dyn Iterator<Item = Result<Segment, InferenceError>> + Send>;

/// Result of starting a transcription.
pub struct Transcription {
    /// Total media duration in seconds, if the engine could probe it.
    pub duration: Option<f64>,
    /// Language detected by the engine.
    pub language: Option<String>,
    pub segments: SegmentStream,
}

impl Transcription {
    pub fn new(segments: SegmentStream) -> Self {
        Self {
            duration: None,
            language: None,
            segments,
        }
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }
}

impl fmt::Debug for Transcription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcription")
            .field("duration", &self.duration)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

/// A speech model that turns stored audio into timed segments.
///
/// Called from worker threads; one call per job, never retried.
pub trait InferenceAdapter: Send + Sync {
    /// Starts transcribing `source`. `local_path` is set when the storage
    /// layer keeps the audio on the local filesystem.
    fn transcribe(
        &self,
        source: &SourceRef,
        local_path: Option<&Path>,
        params: &TranscriptionParams,
    ) -> Result<Transcription, InferenceError>;
}
