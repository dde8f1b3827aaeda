use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{Segment, Transcript, TranscriptMetadata};

/// Raw aligned-transcript document as produced by the transcription service
#[derive(Debug, Deserialize)]
struct AlignedDocument {
    #[serde(default)]
    segments: Vec<AlignedSegment>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AlignedSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parse an aligned-transcript JSON file into a Transcript
pub fn parse_transcript_file(path: &Path) -> Result<Transcript> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_transcript_json(&content)
}

/// Parse an aligned-transcript JSON string into a Transcript
pub fn parse_transcript_json(json: &str) -> Result<Transcript> {
    let document: AlignedDocument =
        serde_json::from_str(json).context("Failed to parse transcript JSON")?;

    let segments: Vec<Segment> = document
        .segments
        .into_iter()
        .map(|raw| Segment {
            text: raw.text.trim().to_string(),
            speaker: raw.speaker.unwrap_or_else(|| "Unknown".to_string()),
            start_time: raw.start,
            end_time: raw.end,
            confidence: raw.confidence,
        })
        .collect();

    let metadata = TranscriptMetadata {
        language: document.language,
        model: document.model,
        segment_count: segments.len(),
    };

    Ok(Transcript::new(
        segments,
        metadata,
        document.duration.unwrap_or(0.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcript_json() {
        let json = r#"{
            "segments": [
                {"text": " I roll initiative ", "speaker": "SPEAKER_00", "start": 0.5, "end": 2.1, "confidence": 0.92},
                {"text": "nineteen", "start": 2.4, "end": 3.0}
            ],
            "language": "en",
            "model": "large-v2",
            "duration": 3.5
        }"#;

        let transcript = parse_transcript_json(json).unwrap();

        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "I roll initiative");
        assert_eq!(transcript.segments[0].speaker, "SPEAKER_00");
        assert_eq!(transcript.segments[0].confidence, Some(0.92));
        assert_eq!(transcript.segments[1].speaker, "Unknown");
        assert!(transcript.segments[1].confidence.is_none());
        assert_eq!(transcript.metadata.language.as_deref(), Some("en"));
        assert!((transcript.audio_duration - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_empty_document() {
        let transcript = parse_transcript_json("{}").unwrap();
        assert!(transcript.segments.is_empty());
        assert_eq!(transcript.metadata.segment_count, 0);
    }

    #[test]
    fn test_duration_falls_back_to_last_segment() {
        let json = r#"{"segments": [{"text": "hi", "start": 0.0, "end": 4.2}]}"#;
        let transcript = parse_transcript_json(json).unwrap();
        assert!((transcript.audio_duration - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_parse_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{"segments": [{"text": "hello", "speaker": "DM", "start": 0.0, "end": 1.0}]}"#,
        )
        .unwrap();

        let transcript = parse_transcript_file(&path).unwrap();
        assert_eq!(transcript.segments.len(), 1);
        assert_eq!(transcript.segments[0].speaker, "DM");
    }
}
