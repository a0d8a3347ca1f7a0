/*!
 * Tests for the video renderer against a recording codec
 */

use std::path::Path;
use anyhow::Result;

use subspeed::errors::RetimeError;
use subspeed::renderer::{plan_clips, RenderTarget, VideoRenderer, MIN_CLIP_SECS};
use subspeed::subtitle_processor::Cue;
use subspeed::timeline::{remap, segment, IntervalKind, RemapTable, SpeedProfile};
use crate::common::{self, CodecCall, RecordingCodec};

fn target() -> RenderTarget {
    RenderTarget {
        width: 640,
        height: 360,
        fps: 25,
        threads: 2,
    }
}

fn table_for(cues: &[Cue], duration: f64) -> RemapTable {
    let speeds = SpeedProfile::new(2.0, 5.0).unwrap();
    remap(&segment(cues, 0, duration, &speeds).unwrap())
}

#[test]
fn test_plan_clips_withCueAtZero_shouldSkipEmptyLeadingGap() {
    let cues = vec![Cue::new(1, 0, 2000, "a"), Cue::new(2, 2000, 3000, "b")];
    let table = table_for(&cues, 5.0);
    let clips = plan_clips(&table);

    // leading gap and the gap between the touching cues are empty
    assert_eq!(table.len(), 5);
    assert_eq!(clips.len(), 3);
    assert_eq!(clips.iter().map(|c| c.ordinal).collect::<Vec<_>>(), vec![1, 3, 4]);
    assert_eq!(clips[0].kind, IntervalKind::Dialogue);
    assert_eq!(clips[2].kind, IntervalKind::Gap);
}

#[test]
fn test_plan_clips_withSubMillisecondGap_shouldSkipIt() {
    // 2ms gap at x5 lasts 0.4ms on the output timeline
    let cues = vec![Cue::new(1, 0, 2000, "a"), Cue::new(2, 2002, 3000, "b")];
    let table = table_for(&cues, 5.0);
    let clips = plan_clips(&table);

    assert!(table.intervals()[2].output_duration() < MIN_CLIP_SECS);
    assert_eq!(clips.iter().map(|c| c.ordinal).collect::<Vec<_>>(), vec![1, 3, 4]);
    assert!(clips.iter().all(|c| c.output_duration >= MIN_CLIP_SECS));
}

#[test]
fn test_plan_clips_withScenario_shouldCarryRemapTiming() {
    let cues = vec![Cue::new(1, 2000, 4000, "a")];
    let table = table_for(&cues, 10.0);
    let clips = plan_clips(&table);

    assert_eq!(clips.len(), 3);
    assert_eq!(clips[1].source_start, 2.0);
    assert_eq!(clips[1].source_end, 4.0);
    assert_eq!(clips[1].speed_factor, 2.0);
    assert_eq!(clips[1].source_duration(), 2.0);
    assert_eq!(clips[1].output_duration, table.intervals()[1].output_duration());
}

#[tokio::test]
async fn test_render_withRecordingCodec_shouldExtractInOrderThenEncode() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("out").join("faster_video.mp4");
    let cues = vec![Cue::new(1, 2000, 4000, "a"), Cue::new(2, 6000, 7000, "b")];
    let table = table_for(&cues, 10.0);

    let renderer = VideoRenderer::new(RecordingCodec::new(10.0), target()).without_progress();
    let report = renderer.render(Path::new("video.mp4"), &table, &output).await?;

    assert_eq!(report.clip_count, 5);
    assert_eq!(report.skipped_intervals, 0);
    assert!((report.output_duration_secs - table.total_output_duration()).abs() < 1e-9);
    assert!(output.exists());

    let calls = renderer.codec().calls();
    assert!(matches!(calls.first(), Some(CodecCall::Probe(_))));
    assert_eq!(
        calls.last(),
        Some(&CodecCall::Concat {
            clips: 5,
            target: target()
        })
    );

    let ordinals: Vec<usize> = renderer.codec().extracted().iter().map(|c| c.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_render_withFailingEncode_shouldReturnRenderErrorAndRemoveOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("faster_video.mp4");
    let table = table_for(&[Cue::new(1, 1000, 2000, "a")], 3.0);

    let renderer = VideoRenderer::new(RecordingCodec::failing(3.0), target()).without_progress();
    let result = renderer.render(Path::new("video.mp4"), &table, &output).await;

    match result {
        Err(RetimeError::Render(message)) => assert!(message.contains("Conversion failed")),
        other => panic!("Expected Render error, got {:?}", other),
    }
    assert!(!output.exists(), "partial output should be removed");
    Ok(())
}

#[test]
fn test_render_withZeroLengthSource_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("faster_video.mp4");
    let table = table_for(&[], 0.0);

    let renderer = VideoRenderer::new(RecordingCodec::new(0.0), target()).without_progress();
    let result = tokio_test::block_on(renderer.render(Path::new("video.mp4"), &table, &output));

    assert!(matches!(result, Err(RetimeError::Render(_))));
    assert!(renderer.codec().extracted().is_empty());
    Ok(())
}
