use crate::formatter::text_lines;
use crate::job::Segment;

/// One line per segment, in the model's own segmentation. Line breaks
/// inside a segment are folded into spaces.
pub fn render_text(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push_str(&text_lines(&segment.text).collect::<Vec<_>>().join(" "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_per_segment() {
        let segs = vec![
            Segment::new(0.0, 1.0, " first"),
            Segment::new(1.0, 2.0, " second "),
            Segment::new(2.0, 3.0, "third"),
        ];
        assert_eq!(render_text(&segs), "first\nsecond\nthird\n");
    }

    #[test]
    fn test_segments_are_not_merged() {
        let segs = vec![
            Segment::new(0.0, 1.0, "same"),
            Segment::new(1.0, 2.0, "same"),
        ];
        assert_eq!(render_text(&segs).lines().count(), 2);
    }

    #[test]
    fn test_multiline_segment_stays_on_one_line() {
        let segs = vec![
            Segment::new(0.0, 1.0, "line one\nline two"),
            Segment::new(1.0, 2.0, "next\r\n\r\nafter blank"),
        ];
        let out = render_text(&segs);
        assert_eq!(out, "line one line two\nnext after blank\n");
        assert_eq!(out.lines().count(), segs.len());
    }

    #[test]
    fn test_empty_segment_keeps_its_line() {
        let segs = vec![Segment::new(0.0, 1.0, "a"), Segment::new(1.0, 2.0, "  ")];
        assert_eq!(render_text(&segs), "a\n\n");
    }
}
