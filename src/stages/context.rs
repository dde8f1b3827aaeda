use crate::models::{ContextWindow, Segment, WindowConfig};

/// How many preceding segments feed the textual context string
const CONTEXT_BEFORE_LIMIT: usize = 10;
/// How many following segments feed the textual context string.
///
/// Deliberately small: generous backward context helps the oracle judge
/// coherence, but forward context would leak upcoming plot into the
/// correction prompt.
const CONTEXT_AFTER_LIMIT: usize = 2;

/// Builds bounded context windows around each segment
#[derive(Debug, Clone)]
pub struct ContextWindowBuilder {
    config: WindowConfig,
}

impl ContextWindowBuilder {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    /// Create one window per segment, in original order.
    ///
    /// For the segment at position `i`, `before` covers
    /// `[max(0, i - window_size/2), i)` and `after` covers
    /// `(i, min(len, i + 1 + window_size/2))`.
    pub fn build_windows<'a>(&self, segments: &'a [Segment]) -> Vec<ContextWindow<'a>> {
        let half = self.config.window_size / 2;

        segments
            .iter()
            .enumerate()
            .map(|(i, focus)| {
                let before_start = i.saturating_sub(half);
                let after_end = (i + 1 + half).min(segments.len());
                ContextWindow {
                    focus,
                    index: i,
                    before: &segments[before_start..i],
                    after: &segments[i + 1..after_end],
                }
            })
            .collect()
    }

    /// Slide a fixed-size window over the sequence with stride
    /// `window_size - overlap`, stopping once a chunk reaches the end.
    /// Never emits empty chunks.
    pub fn build_overlapping_chunks<'a>(&self, segments: &'a [Segment]) -> Vec<&'a [Segment]> {
        let mut chunks = Vec::new();
        if segments.is_empty() {
            return chunks;
        }

        let mut start = 0;
        loop {
            let end = (start + self.config.window_size).min(segments.len());
            chunks.push(&segments[start..end]);
            if end >= segments.len() {
                break;
            }
            start += self.config.stride();
        }

        chunks
    }
}

/// Concatenate a window's neighborhood into the context string consumed by
/// the correction oracle: up to the last 10 preceding texts oldest-first,
/// then up to the first 2 following texts.
pub fn context_text(window: &ContextWindow<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    let before_start = window.before.len().saturating_sub(CONTEXT_BEFORE_LIMIT);
    for segment in &window.before[before_start..] {
        parts.push(segment.text.as_str());
    }
    for segment in window.after.iter().take(CONTEXT_AFTER_LIMIT) {
        parts.push(segment.text.as_str());
    }

    parts.join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(texts: &[&str]) -> Vec<Segment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                text: text.to_string(),
                speaker: "SPEAKER_00".to_string(),
                start_time: i as f64,
                end_time: i as f64 + 1.0,
                confidence: Some(0.9),
            })
            .collect()
    }

    fn texts<'a>(slice: &'a [Segment]) -> Vec<&'a str> {
        slice.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_build_windows_first_segment() {
        let segs = segments(&["A", "B", "C", "D", "E"]);
        let builder = ContextWindowBuilder::new(WindowConfig::new(3, 1).unwrap());

        let windows = builder.build_windows(&segs);
        assert_eq!(windows.len(), 5);

        assert_eq!(windows[0].focus.text, "A");
        assert!(windows[0].before.is_empty());
        assert_eq!(texts(windows[0].after), vec!["B"]);
    }

    #[test]
    fn test_build_windows_middle_segment() {
        let segs = segments(&["A", "B", "C", "D", "E"]);
        let builder = ContextWindowBuilder::new(WindowConfig::new(4, 1).unwrap());

        let windows = builder.build_windows(&segs);
        let middle = &windows[2];

        assert_eq!(middle.focus.text, "C");
        assert_eq!(texts(middle.before), vec!["A", "B"]);
        assert_eq!(texts(middle.after), vec!["D", "E"]);
    }

    #[test]
    fn test_build_windows_empty() {
        let builder = ContextWindowBuilder::new(WindowConfig::default());
        assert!(builder.build_windows(&[]).is_empty());
    }

    #[test]
    fn test_overlapping_chunks() {
        let segs = segments(&["A", "B", "C", "D", "E"]);
        let builder = ContextWindowBuilder::new(WindowConfig::new(3, 1).unwrap());

        let chunks = builder.build_overlapping_chunks(&segs);
        assert_eq!(chunks.len(), 2);
        assert_eq!(texts(chunks[0]), vec!["A", "B", "C"]);
        assert_eq!(texts(chunks[1]), vec!["C", "D", "E"]);
    }

    #[test]
    fn test_overlapping_chunks_empty() {
        let builder = ContextWindowBuilder::new(WindowConfig::default());
        assert!(builder.build_overlapping_chunks(&[]).is_empty());
    }

    #[test]
    fn test_context_text_limits() {
        let names: Vec<String> = (0..15).map(|i| format!("s{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let segs = segments(&refs);

        let window = ContextWindow {
            focus: &segs[12],
            index: 12,
            before: &segs[..12],
            after: &segs[13..],
        };

        let text = context_text(&window);
        // Last 10 before (s2..s11), then first 2 after (s13, s14)
        assert!(text.starts_with("s2 "));
        assert!(!text.contains("s1 "));
        assert!(text.ends_with("s13 s14"));
        assert!(!text.contains("s12"));
    }

    #[test]
    fn test_context_text_no_neighbors() {
        let segs = segments(&["only"]);
        let window = ContextWindow {
            focus: &segs[0],
            index: 0,
            before: &[],
            after: &[],
        };
        assert!(context_text(&window).is_empty());
    }
}
