//! Output formatting for transcription results.
//!
//! Every formatter is a pure function of the segments: the same input always
//! produces byte-identical output. Timing is rendered as produced by the
//! model; overlapping or zero-length segments pass through untouched.

pub mod captions;
pub mod json;
pub mod text;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FormatError, MurmurError};
use crate::job::Segment;

pub use captions::{format_timestamp, render_srt, render_vtt};
pub use json::render_json;
pub use text::render_text;

/// Serialization formats an artifact can be written in.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Srt,
    Vtt,
    Txt,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Json,
        OutputFormat::Srt,
        OutputFormat::Vtt,
        OutputFormat::Txt,
    ];

    /// File extension, also the wire name of the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
            OutputFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension() == s)
            .ok_or_else(|| MurmurError::InvalidParameter {
                field: "output_format",
                reason: format!("unknown output format '{}'", s),
            })
    }
}

/// The material a formatter works from.
#[derive(Debug, Clone, Copy)]
pub struct Transcript<'a> {
    pub segments: &'a [Segment],
    pub language: Option<&'a str>,
    pub duration: Option<f64>,
}

impl<'a> Transcript<'a> {
    pub fn new(segments: &'a [Segment]) -> Self {
        Self {
            segments,
            language: None,
            duration: None,
        }
    }

    pub fn with_language(mut self, language: Option<&'a str>) -> Self {
        self.language = language;
        self
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }
}

/// Renders `transcript` in the requested format.
pub fn format(transcript: &Transcript<'_>, kind: OutputFormat) -> Result<String, FormatError> {
    check_ordering(transcript.segments)?;

    match kind {
        OutputFormat::Txt => Ok(render_text(transcript.segments)),
        OutputFormat::Srt => Ok(render_srt(transcript.segments)),
        OutputFormat::Vtt => Ok(render_vtt(transcript.segments)),
        OutputFormat::Json => render_json(transcript),
    }
}

/// Segments must carry finite, non-negative spans and start in time order.
/// Non-blank lines of a segment's text, trimmed.
pub(crate) fn text_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

fn check_ordering(segments: &[Segment]) -> Result<(), FormatError> {
    let mut previous: Option<f64> = None;
    for (index, segment) in segments.iter().enumerate() {
        if !segment.start.is_finite()
            || !segment.end.is_finite()
            || segment.start < 0.0
            || segment.end < segment.start
        {
            return Err(FormatError::InvalidSpan {
                index,
                start: segment.start,
                end: segment.end,
            });
        }
        if let Some(prev) = previous {
            if segment.start < prev {
                return Err(FormatError::OutOfOrder {
                    index,
                    start: segment.start,
                    previous: prev,
                });
            }
        }
        previous = Some(segment.start);
    }
    Ok(())
}
