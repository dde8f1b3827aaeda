use serde::{Deserialize, Serialize};

/// Where a winning repair candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairSource {
    /// The oracle judged the (name-corrected) text to fit its context
    ContextAccepted,
    /// Audio span re-transcription produced an accepted candidate
    Retranscription,
    /// The correction oracle rewrote the text
    LlmCorrection,
}

/// States of the per-segment repair state machine.
///
/// Transitions always run in declaration order and the visited sequence is
/// recorded on the outcome, so tests assert state paths directly rather
/// than inferring them from output text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    /// Roster name normalization, applied unconditionally
    NameCorrect,
    /// Context-fit oracle query on the current text
    ContextCheck,
    /// Audio span re-transcription with conservative decoding
    Retranscription,
    /// Constrained LLM text correction, the last resort
    LlmCorrection,
    /// Winning text written back, intermediate candidates discarded
    Terminal,
}

/// A single repair candidate, alive only while one segment is orchestrated
#[derive(Debug, Clone)]
pub struct RepairAttempt {
    pub original_text: String,
    pub candidate_text: String,
    pub source: RepairSource,
    pub confidence_before: Option<f64>,
    pub confidence_after: Option<f64>,
}

impl RepairAttempt {
    /// Whether the candidate improves on the original confidence by more
    /// than `margin`. Absent confidences never satisfy the margin rule.
    pub fn improves_confidence(&self, margin: f64) -> bool {
        match (self.confidence_before, self.confidence_after) {
            (Some(before), Some(after)) => after > before + margin,
            // A candidate with a reported confidence beats an original
            // that never had one
            (None, Some(_)) => true,
            _ => false,
        }
    }
}

/// Final decision for one segment after the state machine terminates
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// Text to write back to the segment
    pub text: String,
    /// Source of the winning text, None when nothing changed it
    pub source: Option<RepairSource>,
    /// States visited, in order, ending with Terminal
    pub states: Vec<RepairState>,
}

impl RepairOutcome {
    pub fn visited(&self, state: RepairState) -> bool {
        self.states.contains(&state)
    }
}
