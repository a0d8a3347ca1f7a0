use anyhow::Result;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::app_config::{Config, InputSelection, ResolvedPaths};
use crate::caption_rewriter;
use crate::errors::RetimeError;
use crate::file_utils::FileManager;
use crate::renderer::{FfmpegCodec, RenderTarget, VideoCodec, VideoRenderer};
use crate::subtitle_processor::{Cue, SubtitleCollection};
use crate::timeline::{remap, segment, RemapTable};

// @module: Application controller for one retiming run

/// Per-run switches coming from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Replace existing output files
    pub force_overwrite: bool,
    /// Rewrite the caption file only, leave the video alone
    pub captions_only: bool,
    /// Compute and log the remap table, write nothing
    pub dry_run: bool,
    /// Explicit output video path instead of the prefixed default
    pub output_video: Option<PathBuf>,
    /// Explicit output caption path instead of the prefixed default
    pub output_caption: Option<PathBuf>,
}

/// Figures for a planned or finished run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cue_count: usize,
    pub interval_count: usize,
    pub source_duration_secs: f64,
    pub output_duration_secs: f64,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// An output already existed and overwriting was not requested
    Skipped { existing: PathBuf },
    /// Dry run: the remap table was computed but nothing was written
    Planned(RunSummary),
    /// Outputs were written
    Completed(RunSummary),
}

/// Main application controller: captions in, retimed captions and video out
pub struct Controller<C: VideoCodec = FfmpegCodec> {
    // @field: App configuration
    config: Config,
    // @field: Renderer wrapping the codec collaborator
    renderer: VideoRenderer<C>,
}

impl Controller<FfmpegCodec> {
    // @method: Create a controller backed by ffmpeg
    pub fn with_config(config: Config) -> Result<Self> {
        let codec = FfmpegCodec::new(config.ffmpeg.clone());
        Self::with_codec(config, codec)
    }
}

impl<C: VideoCodec> Controller<C> {
    // @method: Create a controller with any codec implementation
    pub fn with_codec(config: Config, codec: C) -> Result<Self> {
        config.validate()?;
        let renderer = VideoRenderer::new(codec, RenderTarget::from_config(&config));
        Ok(Self { config, renderer })
    }

    /// Hide the render progress bar
    pub fn without_progress(mut self) -> Self {
        self.renderer = self.renderer.without_progress();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &VideoRenderer<C> {
        &self.renderer
    }

    /// Run the retiming pipeline once
    pub async fn run(&self, selection: &InputSelection, options: &RunOptions) -> Result<RunOutcome> {
        let start_time = Instant::now();

        let paths = selection.resolve(
            &self.config,
            options.output_video.clone(),
            options.output_caption.clone(),
        )?;
        self.check_inputs(&paths, options)?;

        if !options.dry_run && !options.force_overwrite {
            if let Some(existing) = self.existing_output(&paths, options) {
                warn!("Skipping, output already exists: {:?} (use -f to force overwrite)", existing);
                return Ok(RunOutcome::Skipped { existing });
            }
        }

        let collection = SubtitleCollection::from_file(&paths.caption)?;
        let cues = collection.entries;
        info!("Loaded {} cues from {:?}", cues.len(), paths.caption);

        let source_duration_secs = if options.captions_only && !FileManager::file_exists(&paths.video) {
            let duration = self.caption_span_secs(&cues);
            debug!("No video to probe, using caption span of {:.3}s as source duration", duration);
            duration
        } else {
            self.renderer.probe(&paths.video).await?.duration_secs
        };

        let speeds = self.config.speed_profile()?;
        let intervals = segment(&cues, self.config.offset_ms(), source_duration_secs, &speeds)?;
        let table = remap(&intervals);
        let rewritten = caption_rewriter::rewrite(&cues, &table)?;

        let summary = RunSummary {
            cue_count: cues.len(),
            interval_count: table.len(),
            source_duration_secs,
            output_duration_secs: table.total_output_duration(),
        };

        if options.dry_run {
            Self::log_table(&table);
            info!(
                "Dry run: {:.3}s of source would become {:.3}s",
                summary.source_duration_secs, summary.output_duration_secs
            );
            return Ok(RunOutcome::Planned(summary));
        }

        if !options.captions_only {
            self.renderer.render(&paths.video, &table, &paths.output_video).await?;
        }

        let output = SubtitleCollection {
            source_file: paths.output_caption.clone(),
            entries: rewritten,
        };
        if let Err(e) = output.write_to_srt(&paths.output_caption) {
            // a video without its captions is not a usable result
            if !options.captions_only {
                FileManager::remove_partial(&paths.output_video);
            }
            FileManager::remove_partial(&paths.output_caption);
            return Err(e.into());
        }

        info!(
            "Retimed {:.3}s to {:.3}s in {}",
            summary.source_duration_secs,
            summary.output_duration_secs,
            Self::format_duration(start_time.elapsed())
        );
        if options.captions_only {
            info!("Success: {:?}", paths.output_caption);
        } else {
            info!("Success: {:?}, {:?}", paths.output_video, paths.output_caption);
        }

        Ok(RunOutcome::Completed(summary))
    }

    fn check_inputs(&self, paths: &ResolvedPaths, options: &RunOptions) -> Result<(), RetimeError> {
        if !FileManager::file_exists(&paths.caption) {
            return Err(RetimeError::Configuration(format!("Subtitle file not found: {:?}", paths.caption)));
        }
        if !options.captions_only && !FileManager::file_exists(&paths.video) {
            return Err(RetimeError::Configuration(format!("Video file not found: {:?}", paths.video)));
        }
        Ok(())
    }

    fn existing_output(&self, paths: &ResolvedPaths, options: &RunOptions) -> Option<PathBuf> {
        let mut outputs: Vec<&Path> = vec![paths.output_caption.as_path()];
        if !options.captions_only {
            outputs.insert(0, paths.output_video.as_path());
        }
        outputs.into_iter().find(|path| path.exists()).map(Path::to_path_buf)
    }

    /// Latest cue end after the offset, used when there is no video to probe.
    /// Ordering problems are left for the segmenter to report.
    fn caption_span_secs(&self, cues: &[Cue]) -> f64 {
        cues.iter()
            .map(|cue| cue.end_ms)
            .max()
            .map(|end_ms| (i128::from(end_ms) + i128::from(self.config.offset_ms())).max(0) as f64 / 1000.0)
            .unwrap_or(0.0)
    }

    fn log_table(table: &RemapTable) {
        for (i, entry) in table.iter().enumerate() {
            info!(
                "{:>4} {:<8} {:>10.3}s -> {:>10.3}s  x{:<5} => {:>10.3}s +{:.3}s",
                i,
                entry.kind().to_string(),
                entry.source_start(),
                entry.source_end(),
                entry.speed_factor(),
                entry.output_start(),
                entry.output_duration()
            );
        }
    }

    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Pull the pipeline error back out of an anyhow chain
pub fn retime_error(error: &anyhow::Error) -> Option<&RetimeError> {
    error.downcast_ref::<RetimeError>()
}

/// Exit status for a failed run, by error kind
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match retime_error(error) {
        Some(RetimeError::Configuration(_)) => 2,
        Some(RetimeError::Input(_)) => 3,
        Some(RetimeError::Render(_)) => 4,
        Some(RetimeError::File(_)) => 5,
        None => 1,
    }
}
