use serde::{Deserialize, Serialize};

/// One timestamped unit of transcribed speech attributed to a speaker.
///
/// Segments are produced by the transcription service, mutated in place by
/// repair (only the text changes), and removed only by deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Transcribed text for this span
    pub text: String,
    /// Speaker identifier (diarization label or resolved name)
    pub speaker: String,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds (always greater than start_time)
    pub end_time: f64,
    /// Transcription confidence in [0, 1], absent when the aligner did not
    /// report one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Segment {
    /// Duration of this segment in seconds
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Whether this segment carries enough timing data to retranscribe
    pub fn has_valid_span(&self) -> bool {
        self.start_time >= 0.0 && self.end_time > self.start_time
    }
}

/// Metadata carried alongside the segment sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub segment_count: usize,
}

/// Complete transcript: the working segment sequence plus metadata.
///
/// The repair orchestrator owns this for the duration of a pipeline run;
/// nothing is shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub metadata: TranscriptMetadata,
    /// Total audio duration in seconds
    #[serde(default)]
    pub audio_duration: f64,
}

impl Transcript {
    /// Build a transcript, deriving the audio duration from the last segment
    /// end time when the source did not report one.
    pub fn new(segments: Vec<Segment>, metadata: TranscriptMetadata, audio_duration: f64) -> Self {
        let audio_duration = if audio_duration > 0.0 {
            audio_duration
        } else {
            segments
                .iter()
                .map(|s| s.end_time)
                .fold(0.0f64, f64::max)
        };

        let mut metadata = metadata;
        metadata.segment_count = segments.len();

        Self {
            segments,
            metadata,
            audio_duration,
        }
    }

    /// Distinct speaker labels in order of first appearance
    pub fn speakers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if !seen.contains(&segment.speaker.as_str()) {
                seen.push(segment.speaker.as_str());
            }
        }
        seen
    }
}
