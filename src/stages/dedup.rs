use tracing::{debug, info};

use crate::models::Segment;

/// Start times closer than this count as the same utterance when ranges overlap
const START_PROXIMITY_SECS: f64 = 5.0;
/// Shared leading word count that marks a repetition
const REPETITION_PREFIX_WORDS: usize = 3;

/// Result of the deduplication pass
#[derive(Debug)]
pub struct DedupResult {
    /// Cleaned segments, ascending by start time
    pub segments: Vec<Segment>,
    /// Number of segments dropped or merged away
    pub duplicates_removed: usize,
}

/// Remove duplicate and overlapping segments from a repaired sequence.
///
/// Sorts by start time, then scans forward comparing each segment only to
/// the immediately preceding kept one. Repeats separated by one accepted
/// distinct segment are deliberately not merged; the lookback is bounded,
/// not transitive.
pub fn deduplicate(segments: Vec<Segment>) -> DedupResult {
    if segments.is_empty() {
        return DedupResult {
            segments,
            duplicates_removed: 0,
        };
    }

    let mut sorted = segments;
    sorted.sort_by(|a, b| {
        a.start_time
            .partial_cmp(&b.start_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Segment> = Vec::with_capacity(sorted.len());
    let mut duplicates_removed = 0;

    for segment in sorted {
        let Some(prev) = kept.last() else {
            kept.push(segment);
            continue;
        };

        let current_text = segment.text.trim();
        let prev_text = prev.text.trim();

        // Exact repeats
        if current_text == prev_text {
            debug!("Dropping exact duplicate: {:.50}", current_text);
            duplicates_removed += 1;
            continue;
        }

        // Overlapping time ranges where one text contains the other: keep
        // the longer, more complete one
        let overlaps = segment.start_time < prev.end_time
            && segment.end_time > prev.start_time
            && (segment.start_time - prev.start_time).abs() < START_PROXIMITY_SECS;

        if overlaps && !current_text.is_empty() && !prev_text.is_empty() {
            if current_text.contains(prev_text) || prev_text.contains(current_text) {
                if current_text.len() > prev_text.len() {
                    debug!("Replacing shorter segment with longer overlapping version");
                    let last = kept.len() - 1;
                    kept[last] = segment;
                } else {
                    debug!("Dropping shorter overlapping segment");
                }
                duplicates_removed += 1;
                continue;
            }
        }

        // Two long segments opening with the same words are a stutter of
        // the decoder, not new speech
        let current_words: Vec<&str> = current_text.split_whitespace().collect();
        let prev_words: Vec<&str> = prev_text.split_whitespace().collect();
        if current_words.len() > REPETITION_PREFIX_WORDS
            && prev_words.len() > REPETITION_PREFIX_WORDS
            && current_words[..REPETITION_PREFIX_WORDS] == prev_words[..REPETITION_PREFIX_WORDS]
        {
            debug!("Dropping likely repetition: {:.50}", current_text);
            duplicates_removed += 1;
            continue;
        }

        kept.push(segment);
    }

    if duplicates_removed > 0 {
        info!("Removed {} duplicate/overlapping segments", duplicates_removed);
    }

    DedupResult {
        segments: kept,
        duplicates_removed,
    }
}
