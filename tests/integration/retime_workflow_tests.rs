/*!
 * Integration tests for the retiming workflow, from caption file to outputs
 */

use std::fs;
use std::path::PathBuf;
use anyhow::Result;

use subspeed::app_config::{Config, InputSelection};
use subspeed::app_controller::{exit_code, retime_error, Controller, RunOptions, RunOutcome};
use subspeed::errors::RetimeError;
use subspeed::subtitle_processor::SubtitleCollection;
use crate::common::{self, CodecCall, RecordingCodec};

/// Lay out `<title>.mp4` and `<title>.srt` in a temp dir and return the title
fn prepare_title(dir: &PathBuf) -> Result<String> {
    common::create_test_file(dir, "lecture.mp4", "not really a video")?;
    common::create_test_subtitle(dir, "lecture.srt")?;
    Ok(dir.join("lecture").to_string_lossy().into_owned())
}

fn controller(config: Config, duration: f64) -> Result<Controller<RecordingCodec>> {
    common::init_test_logging();
    Ok(Controller::with_codec(config, RecordingCodec::new(duration))?.without_progress())
}

/// Expected cue times for the sample subtitle at the default 1.5/3.0 speeds
const EXPECTED_TIMES: [(u64, u64); 3] = [(333, 2333), (2667, 5333), (5667, 8333)];

#[tokio::test]
async fn test_run_withTitle_shouldWriteRetimedVideoAndSubtitles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;

    let controller = controller(Config::default(), 15.0)?;
    let outcome = controller
        .run(&InputSelection::TitleDerived { title }, &RunOptions::default())
        .await?;

    let summary = match outcome {
        RunOutcome::Completed(summary) => summary,
        other => panic!("Expected Completed, got {:?}", other),
    };
    assert_eq!(summary.cue_count, 3);
    assert_eq!(summary.interval_count, 7);
    assert_eq!(summary.source_duration_secs, 15.0);
    assert!((summary.output_duration_secs - 26.0 / 3.0).abs() < 1e-9);

    assert!(dir.join("faster_lecture.mp4").exists());
    let rewritten = SubtitleCollection::from_file(dir.join("faster_lecture.srt"))?;
    let times: Vec<(u64, u64)> = rewritten.entries.iter().map(|c| (c.start_ms, c.end_ms)).collect();
    assert_eq!(times, EXPECTED_TIMES.to_vec());
    assert_eq!(rewritten.entries[1].text, "It contains multiple entries.");

    // the input caption file is untouched
    let original = SubtitleCollection::from_file(dir.join("lecture.srt"))?;
    assert_eq!(original.entries[0].start_ms, 1000);
    Ok(())
}

#[tokio::test]
async fn test_run_withDryRun_shouldPlanWithoutWriting() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;

    let controller = controller(Config::default(), 15.0)?;
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };
    let outcome = controller.run(&InputSelection::TitleDerived { title }, &options).await?;

    assert!(matches!(outcome, RunOutcome::Planned(ref summary) if summary.interval_count == 7));
    assert!(!dir.join("faster_lecture.mp4").exists());
    assert!(!dir.join("faster_lecture.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withExistingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;
    let existing = common::create_test_file(&dir, "faster_lecture.srt", "old")?;
    let selection = InputSelection::TitleDerived { title };

    let controller = controller(Config::default(), 15.0)?;
    let outcome = controller.run(&selection, &RunOptions::default()).await?;
    assert_eq!(outcome, RunOutcome::Skipped { existing: existing.clone() });
    assert_eq!(fs::read_to_string(&existing)?, "old");

    let forced = RunOptions {
        force_overwrite: true,
        ..RunOptions::default()
    };
    let outcome = controller.run(&selection, &forced).await?;
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(SubtitleCollection::from_file(&existing)?.entries.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_run_withOffsetBeforeZero_shouldFailWithConfigurationError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;

    let mut config = Config::default();
    config.subtitle_offset_secs = -2.0;
    let controller = controller(config, 15.0)?;

    let err = controller
        .run(&InputSelection::TitleDerived { title }, &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(retime_error(&err), Some(RetimeError::Configuration(_))));
    assert_eq!(exit_code(&err), 2);
    assert!(!dir.join("faster_lecture.mp4").exists());
    assert!(!dir.join("faster_lecture.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withOffset_shouldShiftRetimedCaptions() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;

    let mut config = Config::default();
    config.subtitle_offset_secs = -1.0;
    config.subtitle_speed_factor = 1.0;
    config.non_subtitle_speed_factor = 1.0;
    let controller = controller(config, 15.0)?;

    controller
        .run(&InputSelection::TitleDerived { title }, &RunOptions::default())
        .await?;

    let rewritten = SubtitleCollection::from_file(dir.join("faster_lecture.srt"))?;
    assert_eq!((rewritten.entries[0].start_ms, rewritten.entries[0].end_ms), (0, 3000));
    assert_eq!((rewritten.entries[2].start_ms, rewritten.entries[2].end_ms), (9000, 13000));
    Ok(())
}

#[tokio::test]
async fn test_run_withCaptionsOnlyAndNoVideo_shouldOnlyWriteSubtitles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let caption = common::create_test_subtitle(&dir, "talk.en.srt")?;
    let selection = InputSelection::ExplicitPaths {
        video: dir.join("talk.mkv"),
        caption,
    };

    let controller = controller(Config::default(), 15.0)?;
    let options = RunOptions {
        captions_only: true,
        output_caption: Some(dir.join("out").join("talk.fast.srt")),
        ..RunOptions::default()
    };
    let outcome = controller.run(&selection, &options).await?;

    // no video to probe: the source ends with the last caption
    match outcome {
        RunOutcome::Completed(summary) => assert_eq!(summary.source_duration_secs, 14.0),
        other => panic!("Expected Completed, got {:?}", other),
    }
    assert!(controller_calls_empty(&controller));
    assert!(!dir.join("faster_talk.mkv").exists());

    let rewritten = SubtitleCollection::from_file(dir.join("out").join("talk.fast.srt"))?;
    let times: Vec<(u64, u64)> = rewritten.entries.iter().map(|c| (c.start_ms, c.end_ms)).collect();
    assert_eq!(times, EXPECTED_TIMES.to_vec());
    Ok(())
}

#[tokio::test]
async fn test_run_withCaptionsOnlyAndUnsortedCues_shouldReportOrdering() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    common::create_test_file(
        &dir,
        "unsorted.srt",
        "1\n00:00:05,000 --> 00:00:06,000\nLater\n\n2\n00:00:01,000 --> 00:00:02,000\nEarlier\n",
    )?;

    let controller = controller(Config::default(), 15.0)?;
    let err = controller
        .run(
            &InputSelection::TitleDerived {
                title: dir.join("unsorted").to_string_lossy().into_owned(),
            },
            &RunOptions {
                captions_only: true,
                ..RunOptions::default()
            },
        )
        .await
        .unwrap_err();

    match retime_error(&err) {
        Some(RetimeError::Input(msg)) => assert!(msg.contains("not sorted"), "unexpected message: {}", msg),
        other => panic!("Expected Input error, got {:?}", other),
    }
    assert_eq!(exit_code(&err), 3);
    assert!(!dir.join("faster_unsorted.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withCaptionsOnlyAndHugeOffset_shouldFailWithConfigurationError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;

    let mut config = Config::default();
    config.subtitle_offset_secs = 1e16;
    let controller = controller(config, 15.0)?;
    let err = controller
        .run(
            &InputSelection::TitleDerived { title },
            &RunOptions {
                captions_only: true,
                ..RunOptions::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(retime_error(&err), Some(RetimeError::Configuration(_))));
    assert_eq!(exit_code(&err), 2);
    assert!(!dir.join("faster_lecture.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withMissingInputs_shouldFailWithConfigurationError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    common::create_test_subtitle(&dir, "only_captions.srt")?;

    let controller = controller(Config::default(), 15.0)?;

    let missing_video = controller
        .run(
            &InputSelection::TitleDerived {
                title: dir.join("only_captions").to_string_lossy().into_owned(),
            },
            &RunOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(exit_code(&missing_video), 2);

    let missing_caption = controller
        .run(
            &InputSelection::TitleDerived {
                title: dir.join("nothing_here").to_string_lossy().into_owned(),
            },
            &RunOptions {
                captions_only: true,
                ..RunOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(exit_code(&missing_caption), 2);
    Ok(())
}

#[tokio::test]
async fn test_run_withOverlappingCaptions_shouldFailWithInputError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    common::create_test_file(&dir, "clip.mp4", "video")?;
    common::create_test_file(
        &dir,
        "clip.srt",
        "1\n00:00:01,000 --> 00:00:03,000\nA\n\n2\n00:00:02,000 --> 00:00:04,000\nB\n",
    )?;

    let controller = controller(Config::default(), 10.0)?;
    let err = controller
        .run(
            &InputSelection::TitleDerived {
                title: dir.join("clip").to_string_lossy().into_owned(),
            },
            &RunOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(exit_code(&err), 3);
    assert!(!dir.join("faster_clip.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withCustomTarget_shouldPassResolutionAndFpsToEncoder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let title = prepare_title(&dir)?;

    let mut config = Config::default();
    config.target_resolution = "1280x720".parse()?;
    config.target_fps = 30;
    config.encode_threads = 4;
    let controller = controller(config, 15.0)?;

    controller
        .run(&InputSelection::TitleDerived { title }, &RunOptions::default())
        .await?;

    let concat = controller
        .renderer()
        .codec()
        .calls()
        .into_iter()
        .find_map(|call| match call {
            CodecCall::Concat { target, .. } => Some(target),
            _ => None,
        })
        .expect("encoder should have been called");
    assert_eq!((concat.width, concat.height, concat.fps, concat.threads), (1280, 720, 30, 4));
    Ok(())
}

fn controller_calls_empty(controller: &Controller<RecordingCodec>) -> bool {
    controller.renderer().codec().calls().is_empty()
}
