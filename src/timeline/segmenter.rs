/*!
 * Timeline segmentation.
 *
 * Turns an ordered caption list into a gap/dialogue partition of
 * `[0, source_duration]`. The partition always starts and ends with a gap
 * and holds exactly one dialogue interval per cue, so the i-th dialogue
 * interval belongs to the i-th cue.
 */

use log::debug;

use super::{Interval, IntervalKind, SpeedProfile};
use crate::errors::RetimeError;
use crate::subtitle_processor::Cue;

/// Cue timing after the offset has been applied, in ms
#[derive(Debug, Clone, Copy)]
struct AdjustedCue {
    index: usize,
    start_ms: i64,
    end_ms: i64,
}

/// Partition the source timeline from an ordered cue list.
///
/// `offset_ms` is added to every cue before anything else happens; a cue
/// pushed before zero is a configuration error. Cues must then be well formed
/// (`start < end`), sorted, non-overlapping and end within the source.
pub fn segment(
    cues: &[Cue],
    offset_ms: i64,
    source_duration_secs: f64,
    speeds: &SpeedProfile,
) -> Result<Vec<Interval>, RetimeError> {
    if !source_duration_secs.is_finite() || source_duration_secs < 0.0 {
        return Err(RetimeError::Input(format!(
            "Source duration must be a non-negative number of seconds, got {}",
            source_duration_secs
        )));
    }

    let adjusted = apply_offset(cues, offset_ms)?;
    validate_order(&adjusted, source_duration_secs)?;

    let mut intervals = Vec::with_capacity(adjusted.len() * 2 + 1);
    let mut last_end = 0.0;

    for cue in &adjusted {
        let start = ms_to_secs(cue.start_ms);
        let end = ms_to_secs(cue.end_ms);
        intervals.push(Interval::new(IntervalKind::Gap, last_end, start, speeds.gap));
        intervals.push(Interval::new(IntervalKind::Dialogue, start, end, speeds.dialogue));
        last_end = end;
    }
    intervals.push(Interval::new(IntervalKind::Gap, last_end, source_duration_secs, speeds.gap));

    debug!(
        "Segmented {:.3}s of source into {} intervals from {} cues",
        source_duration_secs,
        intervals.len(),
        cues.len()
    );

    Ok(intervals)
}

fn apply_offset(cues: &[Cue], offset_ms: i64) -> Result<Vec<AdjustedCue>, RetimeError> {
    cues.iter()
        .map(|cue| {
            let shift = |ms: u64| -> Result<i64, RetimeError> {
                to_signed_ms(ms)?.checked_add(offset_ms).ok_or_else(|| {
                    RetimeError::Configuration(format!(
                        "Offset of {}ms moves cue {} out of the representable time range",
                        offset_ms, cue.index
                    ))
                })
            };
            let start_ms = shift(cue.start_ms)?;
            let end_ms = shift(cue.end_ms)?;
            if start_ms < 0 {
                return Err(RetimeError::Configuration(format!(
                    "Offset of {}ms moves cue {} to start at {}ms, before the start of the video",
                    offset_ms, cue.index, start_ms
                )));
            }
            Ok(AdjustedCue {
                index: cue.index,
                start_ms,
                end_ms,
            })
        })
        .collect()
}

fn validate_order(cues: &[AdjustedCue], source_duration_secs: f64) -> Result<(), RetimeError> {
    let mut previous: Option<&AdjustedCue> = None;

    for cue in cues {
        if cue.end_ms <= cue.start_ms {
            return Err(RetimeError::Input(format!(
                "Cue {} ends at {}ms, not after its start at {}ms",
                cue.index, cue.end_ms, cue.start_ms
            )));
        }

        if let Some(prev) = previous {
            if cue.start_ms < prev.start_ms {
                return Err(RetimeError::Input(format!(
                    "Cues are not sorted: cue {} starts at {}ms, before cue {} at {}ms",
                    cue.index, cue.start_ms, prev.index, prev.start_ms
                )));
            }
            if cue.start_ms < prev.end_ms {
                return Err(RetimeError::Input(format!(
                    "Cue {} overlaps cue {}: starts at {}ms, previous ends at {}ms",
                    cue.index, prev.index, cue.start_ms, prev.end_ms
                )));
            }
        }

        if ms_to_secs(cue.end_ms) > source_duration_secs {
            return Err(RetimeError::Input(format!(
                "Cue {} ends at {}ms, past the end of the video ({:.3}s)",
                cue.index, cue.end_ms, source_duration_secs
            )));
        }

        previous = Some(cue);
    }

    Ok(())
}

fn to_signed_ms(ms: u64) -> Result<i64, RetimeError> {
    i64::try_from(ms).map_err(|_| RetimeError::Input(format!("Timestamp {}ms is out of range", ms)))
}

fn ms_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}
