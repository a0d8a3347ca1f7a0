/*!
 * Timeline segmentation and time remapping.
 *
 * The source timeline is cut into alternating gap and dialogue intervals
 * (`segmenter`), then every interval is given its position and length on the
 * output timeline (`remapper`). The resulting `RemapTable` is the only place
 * output timing lives: the video renderer and the caption rewriter both read
 * it and never recompute it.
 */

use std::fmt;

use crate::errors::RetimeError;

pub mod segmenter;
pub mod remapper;

pub use segmenter::segment;
pub use remapper::{remap, RemapTable, RemappedInterval};

/// Playback-rate multipliers by interval kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedProfile {
    /// Factor applied to spans covered by a caption
    pub dialogue: f64,
    /// Factor applied to spans without a caption
    pub gap: f64,
}

impl SpeedProfile {
    /// Create a profile, rejecting factors that are not finite and positive
    pub fn new(dialogue: f64, gap: f64) -> Result<Self, RetimeError> {
        for (name, factor) in [("subtitle speed factor", dialogue), ("non-subtitle speed factor", gap)] {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(RetimeError::Configuration(format!(
                    "{} must be a positive number, got {}",
                    name, factor
                )));
            }
        }
        Ok(Self { dialogue, gap })
    }

    /// Both kinds at the same rate
    pub fn uniform(factor: f64) -> Result<Self, RetimeError> {
        Self::new(factor, factor)
    }

    pub fn factor_for(&self, kind: IntervalKind) -> f64 {
        match kind {
            IntervalKind::Dialogue => self.dialogue,
            IntervalKind::Gap => self.gap,
        }
    }
}

/// Whether a span of the source is covered by a caption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    Gap,
    Dialogue,
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalKind::Gap => write!(f, "gap"),
            IntervalKind::Dialogue => write!(f, "dialogue"),
        }
    }
}

/// A span of the source timeline, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub kind: IntervalKind,
    pub source_start: f64,
    pub source_end: f64,
    pub speed_factor: f64,
}

impl Interval {
    pub fn new(kind: IntervalKind, source_start: f64, source_end: f64, speed_factor: f64) -> Self {
        Self {
            kind,
            source_start,
            source_end,
            speed_factor,
        }
    }

    pub fn source_duration(&self) -> f64 {
        self.source_end - self.source_start
    }

    /// Zero-length gaps appear before a cue at 0 and between contiguous cues
    pub fn is_empty(&self) -> bool {
        self.source_end <= self.source_start
    }

    pub fn is_dialogue(&self) -> bool {
        self.kind == IntervalKind::Dialogue
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:.3}s, {:.3}s) x{}",
            self.kind, self.source_start, self.source_end, self.speed_factor
        )
    }
}
