use log::debug;

use crate::errors::RetimeError;
use crate::subtitle_processor::Cue;
use crate::timeline::RemapTable;

// @module: Caption retiming from the shared remap table

/// Retime cues onto the output timeline.
///
/// The i-th cue takes the output position of the i-th dialogue interval;
/// index and text are copied unchanged. Times are rounded to the nearest
/// millisecond, the resolution of the caption format.
pub fn rewrite(cues: &[Cue], table: &RemapTable) -> Result<Vec<Cue>, RetimeError> {
    let dialogue_count = table.dialogue_count();
    if dialogue_count != cues.len() {
        return Err(RetimeError::Input(format!(
            "Remap table has {} dialogue intervals for {} cues",
            dialogue_count,
            cues.len()
        )));
    }

    let rewritten: Vec<Cue> = cues
        .iter()
        .zip(table.dialogue())
        .map(|(cue, entry)| {
            let start_ms = secs_to_ms(entry.output_start());
            let end_ms = secs_to_ms(entry.output_end()).max(start_ms);
            cue.with_times(start_ms, end_ms)
        })
        .collect();

    debug!("Rewrote {} cues onto a {:.3}s output timeline", rewritten.len(), table.total_output_duration());

    Ok(rewritten)
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}
