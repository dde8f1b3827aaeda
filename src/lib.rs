pub mod error;
pub mod io;
pub mod models;
pub mod services;
pub mod stages;

pub use error::ConfigError;
pub use io::{export_transcript, parse_transcript_file, parse_transcript_json};
pub use models::{
    ContextWindow, RepairAttempt, RepairOutcome, RepairSource, RepairState, Roster, Segment,
    Transcript, TranscriptMetadata, WindowConfig,
};
pub use services::{
    CorrectionOracle, HttpTranscriber, OllamaOracle, OracleConfig, SpanTranscriber,
    TranscriberConfig,
};
pub use stages::{
    ContextWindowBuilder, DedupResult, RepairConfig, RepairOrchestrator, RepairResult,
    deduplicate, group_adjacent, identify_low_confidence,
};
