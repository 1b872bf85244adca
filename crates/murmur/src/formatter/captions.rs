//! SRT and WebVTT caption rendering.

use std::fmt::Write;

use crate::formatter::text_lines;
use crate::job::Segment;

/// Formats `seconds` as `HH:MM:SS<sep>mmm`, rounding to the nearest millisecond.
pub fn format_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, separator, millis
    )
}

/// Blank lines end a cue, so they are dropped from the cue text.
fn write_cues(out: &mut String, segments: &[Segment], separator: char) {
    for (i, segment) in segments.iter().enumerate() {
        let text = text_lines(&segment.text).collect::<Vec<_>>().join("\n");
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(segment.start, separator),
            format_timestamp(segment.end, separator),
            text
        );
    }
}

pub fn render_srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    write_cues(&mut out, segments, ',');
    out
}

pub fn render_vtt(segments: &[Segment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    write_cues(&mut out, segments, '.');
    out
}
