use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::models::{
    RepairAttempt, RepairOutcome, RepairSource, RepairState, Roster, Transcript, WindowConfig,
};
use crate::services::{CorrectionOracle, SpanTranscriber};
use crate::stages::classify::identify_low_confidence;
use crate::stages::context::{ContextWindowBuilder, context_text};

/// Configuration for the repair orchestrator
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Segments with confidence below this are flagged for repair
    pub confidence_threshold: f64,
    /// A retranscription candidate must beat the original confidence by
    /// more than this absolute margin to be accepted without a fit check
    pub improvement_margin: f64,
    /// Context window shape
    pub window: WindowConfig,
    /// Whether audio re-transcription is attempted at all
    pub use_retranscription: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            improvement_margin: 0.05,
            window: WindowConfig::default(),
            use_retranscription: true,
        }
    }
}

impl RepairConfig {
    /// Fail fast on thresholds that can never classify anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ConfidenceThreshold(self.confidence_threshold));
        }
        Ok(())
    }
}

/// Result of running repair over a transcript
#[derive(Debug, Default)]
pub struct RepairResult {
    /// Segments that entered the repair state machine
    pub segments_repaired: usize,
    /// Segments the oracle accepted as fitting their context
    pub context_accepted: usize,
    /// Segments replaced by an accepted retranscription candidate
    pub retranscriptions_accepted: usize,
    /// Segments rewritten by the correction oracle
    pub llm_corrections: usize,
}

/// Per-segment repair state machine driver.
///
/// All collaborators are injected at construction and live for the whole
/// run; nothing is mutated post-construction. Segments are processed one at
/// a time in chronological order so each context window reflects the
/// already-repaired text of earlier neighbors.
pub struct RepairOrchestrator<'a> {
    oracle: &'a dyn CorrectionOracle,
    transcriber: Option<&'a dyn SpanTranscriber>,
    roster: Option<&'a Roster>,
    config: RepairConfig,
    roster_hint: String,
}

impl<'a> RepairOrchestrator<'a> {
    pub fn new(
        oracle: &'a dyn CorrectionOracle,
        transcriber: Option<&'a dyn SpanTranscriber>,
        roster: Option<&'a Roster>,
        config: RepairConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let roster_hint = roster.map(Roster::prompt_hint).unwrap_or_default();
        Ok(Self {
            oracle,
            transcriber,
            roster,
            config,
            roster_hint,
        })
    }

    /// Whether a segment should enter the repair state machine: flagged by
    /// the confidence classifier, or (with a roster configured) containing
    /// a token that looks like a proper noun. The capitalization heuristic
    /// also fires on ordinary sentence-initial words; that over-triggering
    /// is accepted.
    pub fn needs_repair(&self, flagged: bool, text: &str) -> bool {
        flagged || (self.roster.is_some() && might_contain_names(text))
    }

    /// Run repair over every segment of the transcript, in order.
    ///
    /// `audio_ref` enables retranscription; without it the state machine
    /// falls straight from a failed context check to LLM correction.
    pub async fn execute(&self, transcript: &mut Transcript, audio_ref: Option<&str>) -> RepairResult {
        let flagged: HashSet<usize> =
            identify_low_confidence(&transcript.segments, self.config.confidence_threshold)
                .into_iter()
                .collect();

        let builder = ContextWindowBuilder::new(self.config.window.clone());
        let total = transcript.segments.len();
        let mut result = RepairResult::default();

        info!(
            "Repair: {} segments, {} flagged low-confidence",
            total,
            flagged.len()
        );

        for index in 0..total {
            // Windows are rebuilt each iteration so context reflects repairs
            // already written back to earlier segments
            let windows = builder.build_windows(&transcript.segments);
            let window = &windows[index];
            let context = context_text(window);

            let segment = window.focus;
            let needs_repair = self.needs_repair(flagged.contains(&index), &segment.text);
            let span = match (audio_ref, segment.has_valid_span()) {
                (Some(audio), true) => Some((audio, segment.start_time, segment.end_time)),
                _ => None,
            };
            let text = segment.text.clone();
            let confidence = segment.confidence;

            let outcome = if needs_repair {
                debug!("Repairing segment {}/{}", index + 1, total);
                result.segments_repaired += 1;
                self.repair_segment(&text, confidence, &context, span).await
            } else {
                // The name pass is cheap and lossless, so it runs even for
                // segments that need no other repair
                self.name_correct_only(&text)
            };

            match outcome.source {
                Some(RepairSource::ContextAccepted) => result.context_accepted += 1,
                Some(RepairSource::Retranscription) => result.retranscriptions_accepted += 1,
                Some(RepairSource::LlmCorrection) => result.llm_corrections += 1,
                None => {}
            }

            transcript.segments[index].text = outcome.text;
        }

        info!(
            "Repair: {} repaired ({} context-accepted, {} retranscribed, {} LLM-corrected)",
            result.segments_repaired,
            result.context_accepted,
            result.retranscriptions_accepted,
            result.llm_corrections
        );

        result
    }

    /// Run the full state machine for one segment and return the decision.
    ///
    /// States run in a fixed order: NameCorrect, ContextCheck,
    /// Retranscription, LlmCorrection, Terminal. Every external failure is
    /// absorbed here; the worst case is returning the input text unchanged.
    pub async fn repair_segment(
        &self,
        text: &str,
        confidence: Option<f64>,
        context: &str,
        audio_span: Option<(&str, f64, f64)>,
    ) -> RepairOutcome {
        let mut states = vec![RepairState::NameCorrect];
        let current = self.apply_name_correction(text);

        // ContextCheck: a fast filter before spending a retranscription
        // call. An oracle failure counts as "does not fit" so possibly-bad
        // text is never silently accepted.
        if !context.is_empty() {
            states.push(RepairState::ContextCheck);
            let fits = self
                .oracle
                .ask_fits(&current, context, &self.roster_hint)
                .await
                .unwrap_or_else(|e| {
                    debug!("Fit check failed, assuming no fit: {}", e);
                    false
                });

            if fits {
                states.push(RepairState::Terminal);
                return RepairOutcome {
                    text: current,
                    source: Some(RepairSource::ContextAccepted),
                    states,
                };
            }
        }

        // Retranscription: a second listen fixes genuine acoustic misses
        // before handing the text to an open-ended rewrite
        if self.config.use_retranscription {
            if let (Some(transcriber), Some((audio, start, end))) = (self.transcriber, audio_span) {
                states.push(RepairState::Retranscription);

                match transcriber.transcribe_span(audio, start, end).await {
                    Ok(span) => {
                        let attempt = RepairAttempt {
                            original_text: current.clone(),
                            candidate_text: span.text,
                            source: RepairSource::Retranscription,
                            confidence_before: confidence,
                            confidence_after: span.confidence,
                        };

                        if self.accept_candidate(&attempt, context).await {
                            states.push(RepairState::Terminal);
                            return RepairOutcome {
                                text: attempt.candidate_text,
                                source: Some(RepairSource::Retranscription),
                                states,
                            };
                        }
                        debug!("Retranscription candidate discarded");
                    }
                    Err(e) => {
                        warn!("Retranscription unavailable for segment: {}", e);
                    }
                }
            }
        }

        // LlmCorrection: the last resort, for what no re-listen can fix
        // (homophones, fantasy terms). Failure returns the input unchanged.
        states.push(RepairState::LlmCorrection);
        let corrected = self
            .oracle
            .correct(&current, context, &self.roster_hint)
            .await
            .unwrap_or_else(|e| {
                debug!("LLM correction failed, keeping text: {}", e);
                current.clone()
            });

        let source = if corrected != current {
            Some(RepairSource::LlmCorrection)
        } else {
            None
        };

        states.push(RepairState::Terminal);
        RepairOutcome {
            text: corrected,
            source,
            states,
        }
    }

    /// Acceptance rule for a retranscription candidate: it must either fit
    /// the context or clear the confidence improvement margin.
    async fn accept_candidate(&self, attempt: &RepairAttempt, context: &str) -> bool {
        if !context.is_empty() {
            let fits = self
                .oracle
                .ask_fits(&attempt.candidate_text, context, &self.roster_hint)
                .await
                .unwrap_or(false);
            if fits {
                return true;
            }
        }

        attempt.improves_confidence(self.config.improvement_margin)
    }

    fn apply_name_correction(&self, text: &str) -> String {
        match self.roster {
            Some(roster) => roster.correct_names(text),
            None => text.to_string(),
        }
    }

    fn name_correct_only(&self, text: &str) -> RepairOutcome {
        RepairOutcome {
            text: self.apply_name_correction(text),
            source: None,
            states: vec![RepairState::NameCorrect, RepairState::Terminal],
        }
    }
}

/// Coarse proper-noun check: any capitalized token longer than 2 characters
fn might_contain_names(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        word.len() > 2
            && word
                .chars()
                .next()
                .is_some_and(|c| c.is_uppercase())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::models::{Segment, TranscriptMetadata};
    use crate::services::{OracleError, SpanTranscription, TranscribeError};

    struct MockOracle {
        fits: Result<bool, ()>,
        correction: Option<String>,
        fit_calls: AtomicUsize,
        correct_calls: AtomicUsize,
    }

    impl MockOracle {
        fn fitting(fits: bool) -> Self {
            Self {
                fits: Ok(fits),
                correction: None,
                fit_calls: AtomicUsize::new(0),
                correct_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fits: Err(()),
                correction: None,
                fit_calls: AtomicUsize::new(0),
                correct_calls: AtomicUsize::new(0),
            }
        }

        fn with_correction(mut self, text: &str) -> Self {
            self.correction = Some(text.to_string());
            self
        }
    }

    #[async_trait]
    impl CorrectionOracle for MockOracle {
        async fn ask_fits(&self, _: &str, _: &str, _: &str) -> Result<bool, OracleError> {
            self.fit_calls.fetch_add(1, Ordering::SeqCst);
            self.fits
                .map_err(|_| OracleError::Timeout)
        }

        async fn correct(&self, text: &str, _: &str, _: &str) -> Result<String, OracleError> {
            self.correct_calls.fetch_add(1, Ordering::SeqCst);
            match &self.correction {
                Some(corrected) => Ok(corrected.clone()),
                None => Ok(text.to_string()),
            }
        }
    }

    struct MockTranscriber {
        result: Result<SpanTranscription, ()>,
        calls: AtomicUsize,
    }

    impl MockTranscriber {
        fn returning(text: &str, confidence: Option<f64>) -> Self {
            Self {
                result: Ok(SpanTranscription {
                    text: text.to_string(),
                    confidence,
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                result: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpanTranscriber for MockTranscriber {
        async fn transcribe_span(
            &self,
            _: &str,
            start: f64,
            end: f64,
        ) -> Result<SpanTranscription, TranscribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .map_err(|_| TranscribeError::InvalidSpan { start, end })
        }
    }

    fn orchestrator<'a>(
        oracle: &'a MockOracle,
        transcriber: Option<&'a MockTranscriber>,
        roster: Option<&'a Roster>,
    ) -> RepairOrchestrator<'a> {
        RepairOrchestrator::new(
            oracle,
            transcriber.map(|t| t as &dyn SpanTranscriber),
            roster,
            RepairConfig::default(),
        )
        .unwrap()
    }

    fn thorin_roster() -> Roster {
        let mut roster = Roster::default();
        roster
            .characters
            .insert("Thorin".to_string(), "dwarf king".to_string());
        roster
    }

    #[tokio::test]
    async fn test_context_fit_is_terminal() {
        let oracle = MockOracle::fitting(true);
        let transcriber = MockTranscriber::returning("unused", Some(0.99));
        let orch = orchestrator(&oracle, Some(&transcriber), None);

        let outcome = orch
            .repair_segment(
                "I cast fireball",
                Some(0.5),
                "the wizard chants",
                Some(("session.wav", 1.0, 3.0)),
            )
            .await;

        assert_eq!(outcome.text, "I cast fireball");
        assert_eq!(outcome.source, Some(RepairSource::ContextAccepted));
        assert_eq!(
            outcome.states,
            vec![
                RepairState::NameCorrect,
                RepairState::ContextCheck,
                RepairState::Terminal
            ]
        );
        assert_eq!(oracle.fit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.correct_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oracle_failure_treated_as_no_fit() {
        let oracle = MockOracle::failing();
        let orch = orchestrator(&oracle, None, None);

        let outcome = orch
            .repair_segment("garbled text", Some(0.5), "some context", None)
            .await;

        // Failed fit check falls through to LLM correction; the mock
        // echoes its input, so the text survives unchanged
        assert_eq!(outcome.text, "garbled text");
        assert!(outcome.visited(RepairState::LlmCorrection));
        assert_eq!(oracle.correct_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retranscription_accepted_by_margin() {
        let oracle = MockOracle::fitting(false);
        let transcriber = MockTranscriber::returning("I cast firebolt", Some(0.9));
        let orch = orchestrator(&oracle, Some(&transcriber), None);

        let outcome = orch
            .repair_segment(
                "I cast fire salt",
                Some(0.5),
                "the wizard chants",
                Some(("session.wav", 1.0, 3.0)),
            )
            .await;

        assert_eq!(outcome.text, "I cast firebolt");
        assert_eq!(outcome.source, Some(RepairSource::Retranscription));
        assert_eq!(
            outcome.states,
            vec![
                RepairState::NameCorrect,
                RepairState::ContextCheck,
                RepairState::Retranscription,
                RepairState::Terminal
            ]
        );
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.correct_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_weak_candidate_falls_through_to_llm() {
        // Candidate confidence 0.54 does not clear 0.5 + 0.05, and the
        // oracle never reports a fit
        let oracle = MockOracle::fitting(false).with_correction("I cast fireball");
        let transcriber = MockTranscriber::returning("I cast fire ball", Some(0.54));
        let orch = orchestrator(&oracle, Some(&transcriber), None);

        let outcome = orch
            .repair_segment(
                "I cast fire salt",
                Some(0.5),
                "the wizard chants",
                Some(("session.wav", 1.0, 3.0)),
            )
            .await;

        assert_eq!(outcome.text, "I cast fireball");
        assert_eq!(outcome.source, Some(RepairSource::LlmCorrection));
        assert!(outcome.visited(RepairState::Retranscription));
        assert!(outcome.visited(RepairState::LlmCorrection));
        assert_eq!(oracle.correct_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retranscription_error_is_recoverable() {
        let oracle = MockOracle::fitting(false).with_correction("fixed");
        let transcriber = MockTranscriber::failing();
        let orch = orchestrator(&oracle, Some(&transcriber), None);

        let outcome = orch
            .repair_segment("broken", Some(0.5), "ctx", Some(("session.wav", 1.0, 3.0)))
            .await;

        assert_eq!(outcome.text, "fixed");
        assert!(outcome.visited(RepairState::Retranscription));
        assert!(outcome.visited(RepairState::LlmCorrection));
    }

    #[tokio::test]
    async fn test_no_audio_skips_retranscription_state() {
        let oracle = MockOracle::fitting(false);
        let transcriber = MockTranscriber::returning("unused", Some(0.99));
        let orch = orchestrator(&oracle, Some(&transcriber), None);

        let outcome = orch
            .repair_segment("text", Some(0.5), "ctx", None)
            .await;

        assert!(!outcome.visited(RepairState::Retranscription));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_context_skips_context_check() {
        let oracle = MockOracle::fitting(true);
        let orch = orchestrator(&oracle, None, None);

        let outcome = orch.repair_segment("text", Some(0.5), "", None).await;

        assert!(!outcome.visited(RepairState::ContextCheck));
        assert!(outcome.visited(RepairState::LlmCorrection));
        assert_eq!(oracle.fit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_name_correction_always_applied() {
        let oracle = MockOracle::fitting(true);
        let roster = thorin_roster();
        let orch = orchestrator(&oracle, None, Some(&roster));

        let outcome = orch
            .repair_segment("Thoron swings his axe", Some(0.9), "battle rages", None)
            .await;

        assert_eq!(outcome.text, "Thorin swings his axe");
        assert_eq!(outcome.source, Some(RepairSource::ContextAccepted));
    }

    #[test]
    fn test_needs_repair_triggers() {
        let oracle = MockOracle::fitting(true);
        let roster = thorin_roster();
        let orch = orchestrator(&oracle, None, Some(&roster));

        assert!(orch.needs_repair(true, "anything"));
        assert!(orch.needs_repair(false, "Thorin attacks"));
        // Sentence-initial capitals also trigger; a known false positive
        assert!(orch.needs_repair(false, "The party rests"));
        assert!(!orch.needs_repair(false, "they all rest"));

        let no_roster = orchestrator(&oracle, None, None);
        assert!(!no_roster.needs_repair(false, "Thorin attacks"));
    }

    #[test]
    fn test_invalid_threshold_fails_construction() {
        let oracle = MockOracle::fitting(true);
        let config = RepairConfig {
            confidence_threshold: 1.5,
            ..RepairConfig::default()
        };
        assert!(RepairOrchestrator::new(&oracle, None, None, config).is_err());
    }

    #[tokio::test]
    async fn test_execute_skips_clean_segments() {
        let oracle = MockOracle::fitting(true);
        let orch = orchestrator(&oracle, None, None);

        let segments = vec![
            Segment {
                text: "all fine here".to_string(),
                speaker: "SPEAKER_00".to_string(),
                start_time: 0.0,
                end_time: 2.0,
                confidence: Some(0.95),
            },
            Segment {
                text: "mumbled words".to_string(),
                speaker: "SPEAKER_01".to_string(),
                start_time: 2.0,
                end_time: 4.0,
                confidence: Some(0.4),
            },
        ];
        let mut transcript = Transcript::new(segments, TranscriptMetadata::default(), 0.0);

        let result = orch.execute(&mut transcript, None).await;

        // Only the low-confidence segment entered the state machine, and
        // the always-fitting oracle accepted it unchanged
        assert_eq!(result.segments_repaired, 1);
        assert_eq!(result.context_accepted, 1);
        assert_eq!(oracle.fit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(oracle.correct_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transcript.segments[1].text, "mumbled words");
    }

    #[tokio::test]
    async fn test_execute_repaired_text_feeds_later_context() {
        // After the LLM rewrites segment 0, segment 1's backward context
        // must contain the rewritten text
        struct ContextCapture {
            inner: MockOracle,
            seen: std::sync::Mutex<Vec<String>>,
        }

        #[async_trait]
        impl CorrectionOracle for ContextCapture {
            async fn ask_fits(
                &self,
                text: &str,
                context: &str,
                hint: &str,
            ) -> Result<bool, OracleError> {
                self.seen.lock().unwrap().push(context.to_string());
                self.inner.ask_fits(text, context, hint).await
            }

            async fn correct(
                &self,
                text: &str,
                context: &str,
                hint: &str,
            ) -> Result<String, OracleError> {
                self.inner.correct(text, context, hint).await
            }
        }

        let oracle = ContextCapture {
            inner: MockOracle::fitting(false).with_correction("the rewritten line"),
            seen: std::sync::Mutex::new(Vec::new()),
        };

        let orch =
            RepairOrchestrator::new(&oracle, None, None, RepairConfig::default()).unwrap();

        let segments = vec![
            Segment {
                text: "garbled opening".to_string(),
                speaker: "SPEAKER_00".to_string(),
                start_time: 0.0,
                end_time: 2.0,
                confidence: Some(0.3),
            },
            Segment {
                text: "second line".to_string(),
                speaker: "SPEAKER_00".to_string(),
                start_time: 2.0,
                end_time: 4.0,
                confidence: Some(0.3),
            },
        ];
        let mut transcript = Transcript::new(segments, TranscriptMetadata::default(), 0.0);

        orch.execute(&mut transcript, None).await;

        let seen = oracle.seen.lock().unwrap();
        assert!(seen.iter().any(|c| c.contains("the rewritten line")));
    }
}
