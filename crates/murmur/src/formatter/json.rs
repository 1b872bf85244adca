use serde::Serialize;

use crate::error::FormatError;
use crate::formatter::Transcript;
use crate::job::{Segment, WordTiming};

#[derive(Serialize)]
struct JsonSegment<'a> {
    start: f64,
    end: f64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    words: Option<&'a [WordTiming]>,
}

impl<'a> From<&'a Segment> for JsonSegment<'a> {
    fn from(segment: &'a Segment) -> Self {
        Self {
            start: segment.start,
            end: segment.end,
            text: &segment.text,
            words: (!segment.words.is_empty()).then_some(segment.words.as_slice()),
        }
    }
}

#[derive(Serialize)]
struct JsonTranscript<'a> {
    segments: Vec<JsonSegment<'a>>,
    language: Option<&'a str>,
    duration: Option<f64>,
}

/// Structured record `{ segments, language, duration }` with stable field order.
pub fn render_json(transcript: &Transcript<'_>) -> Result<String, FormatError> {
    let document = JsonTranscript {
        segments: transcript.segments.iter().map(JsonSegment::from).collect(),
        language: transcript.language,
        duration: transcript.duration,
    };
    serde_json::to_string_pretty(&document).map_err(|e| FormatError::Serialize(e.to_string()))
}
