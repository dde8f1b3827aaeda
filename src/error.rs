use thiserror::Error;

/// Configuration errors that fail fast at construction time.
///
/// Everything else in the pipeline recovers locally: external-call failures
/// fall through to the next repair strategy, and malformed segment data only
/// disables the affected capability for that segment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Context window overlap must be strictly smaller than the window size.
    #[error("window overlap ({overlap}) must be less than window size ({window_size})")]
    WindowOverlap { window_size: usize, overlap: usize },

    /// A confidence threshold outside [0, 1] can never classify correctly.
    #[error("confidence threshold {0} is outside [0.0, 1.0]")]
    ConfidenceThreshold(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::WindowOverlap {
            window_size: 3,
            overlap: 3,
        };
        assert!(err.to_string().contains("overlap"));
        assert!(err.to_string().contains("3"));
    }
}
