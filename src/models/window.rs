use crate::error::ConfigError;
use crate::models::Segment;

/// Configuration for context window generation
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Number of segments a window spans
    pub window_size: usize,
    /// Number of segments shared between consecutive chunks
    pub overlap: usize,
}

impl WindowConfig {
    /// Build a window configuration, failing fast when the overlap is not
    /// strictly smaller than the window size.
    pub fn new(window_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if overlap >= window_size {
            return Err(ConfigError::WindowOverlap {
                window_size,
                overlap,
            });
        }
        Ok(Self {
            window_size,
            overlap,
        })
    }

    /// Stride between consecutive overlapping chunks
    pub fn stride(&self) -> usize {
        self.window_size - self.overlap
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            overlap: 1,
        }
    }
}

/// Bounded neighborhood of one segment, recomputed per pipeline run.
///
/// `before` and `after` never include the focus segment and preserve the
/// original chronological order.
#[derive(Debug)]
pub struct ContextWindow<'a> {
    /// The segment under consideration
    pub focus: &'a Segment,
    /// Index of the focus segment in the working sequence
    pub index: usize,
    /// Segments immediately preceding the focus
    pub before: &'a [Segment],
    /// Segments immediately following the focus
    pub after: &'a [Segment],
}
