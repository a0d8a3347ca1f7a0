/*!
 * Source-to-output time remapping.
 *
 * `remap` is the single place where output positions are computed. Its
 * `RemapTable` is immutable once built; fields of `RemappedInterval` are
 * private so downstream code can read output timing but never derive its own.
 */

use std::slice;

use super::{Interval, IntervalKind};

/// An interval together with its place on the output timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemappedInterval {
    interval: Interval,
    output_start: f64,
    output_duration: f64,
}

impl RemappedInterval {
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn kind(&self) -> IntervalKind {
        self.interval.kind
    }

    pub fn source_start(&self) -> f64 {
        self.interval.source_start
    }

    pub fn source_end(&self) -> f64 {
        self.interval.source_end
    }

    pub fn speed_factor(&self) -> f64 {
        self.interval.speed_factor
    }

    pub fn output_start(&self) -> f64 {
        self.output_start
    }

    pub fn output_duration(&self) -> f64 {
        self.output_duration
    }

    /// Where this interval ends on the output timeline. Also the next interval's start.
    pub fn output_end(&self) -> f64 {
        self.output_start + self.output_duration
    }
}

/// Ordered remap table shared by the renderer and the caption rewriter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemapTable {
    entries: Vec<RemappedInterval>,
}

impl RemapTable {
    pub fn intervals(&self) -> &[RemappedInterval] {
        &self.entries
    }

    pub fn iter(&self) -> slice::Iter<'_, RemappedInterval> {
        self.entries.iter()
    }

    /// Dialogue intervals in order; the i-th one belongs to the i-th cue
    pub fn dialogue(&self) -> impl Iterator<Item = &RemappedInterval> {
        self.entries.iter().filter(|entry| entry.kind() == IntervalKind::Dialogue)
    }

    pub fn dialogue_count(&self) -> usize {
        self.dialogue().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of the retimed video
    pub fn total_output_duration(&self) -> f64 {
        self.entries.last().map_or(0.0, |entry| entry.output_end())
    }

    pub fn total_source_duration(&self) -> f64 {
        self.entries.last().map_or(0.0, |entry| entry.source_end())
    }
}

impl<'a> IntoIterator for &'a RemapTable {
    type Item = &'a RemappedInterval;
    type IntoIter = slice::Iter<'a, RemappedInterval>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Place every interval on the output timeline in one left-to-right pass.
///
/// `output_duration = source length / speed factor`, and each interval starts
/// where the previous one ended. Pure and deterministic.
pub fn remap(intervals: &[Interval]) -> RemapTable {
    let mut entries = Vec::with_capacity(intervals.len());
    let mut output_start = 0.0;

    for interval in intervals {
        let entry = RemappedInterval {
            interval: *interval,
            output_start,
            output_duration: interval.source_duration() / interval.speed_factor,
        };
        output_start = entry.output_end();
        entries.push(entry);
    }

    RemapTable { entries }
}
