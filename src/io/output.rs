use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Transcript;

/// Export a transcript, choosing the format from the output extension:
/// `.json` and `.srt` are structured, anything else is plain text.
pub fn export_transcript(transcript: &Transcript, path: &Path) -> Result<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::to_string_pretty(transcript)
            .context("Failed to serialize transcript")?,
        Some("srt") => export_srt(transcript),
        _ => export_text(transcript),
    };

    std::fs::write(path, content).with_context(|| format!("Failed to write file: {:?}", path))?;
    Ok(())
}

/// Plain-text export: one `[H:MM:SS] speaker: text` line per segment
pub fn export_text(transcript: &Transcript) -> String {
    let mut lines = Vec::new();

    for segment in &transcript.segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        lines.push(format!(
            "[{}] {}: {}",
            format_readable(segment.start_time),
            segment.speaker,
            text
        ));
    }

    lines.join("\n")
}

/// SRT subtitle export with speaker-prefixed cues
pub fn export_srt(transcript: &Transcript) -> String {
    let mut blocks = Vec::new();
    let mut cue = 1;

    for segment in &transcript.segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }
        blocks.push(format!(
            "{}\n{} --> {}\n{}: {}\n",
            cue,
            format_srt_time(segment.start_time),
            format_srt_time(segment.end_time),
            segment.speaker,
            text
        ));
        cue += 1;
    }

    blocks.join("\n")
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    // Integer milliseconds first, so 2.4s renders as ,400 and not ,399
    let total_ms = (seconds * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Format seconds as a readable timestamp (H:MM:SS, or M:SS under an hour)
pub fn format_readable(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let secs = (seconds % 60.0) as u64;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Parse a H:MM:SS, MM:SS, or bare-seconds timestamp into seconds
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let parts: Vec<&str> = timestamp.trim().split(':').collect();
    let parsed: Result<Vec<f64>, _> = parts.iter().map(|p| p.parse::<f64>()).collect();
    let parsed = parsed.with_context(|| format!("Invalid timestamp: {}", timestamp))?;

    match parsed.as_slice() {
        [hours, minutes, seconds] => Ok(hours * 3600.0 + minutes * 60.0 + seconds),
        [minutes, seconds] => Ok(minutes * 60.0 + seconds),
        [seconds] => Ok(*seconds),
        _ => anyhow::bail!("Invalid timestamp: {}", timestamp),
    }
}
