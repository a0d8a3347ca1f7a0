/*!
 * Video segment rendering.
 *
 * The renderer walks the shared remap table, asks the codec for one
 * speed-scaled clip per non-empty interval, and hands the ordered clip list
 * back to the codec to be joined, resized and encoded. Decoding and encoding
 * are the codec's business; this module owns clip order and clip timing.
 */

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use crate::app_config::Config;
use crate::errors::{CodecError, RetimeError};
use crate::file_utils::FileManager;
use crate::timeline::{IntervalKind, RemapTable};

pub mod ffmpeg;

pub use ffmpeg::FfmpegCodec;

/// Probed properties of a source video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Whether the container has an audio stream to retime
    pub has_audio: bool,
}

/// Final encode settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// 0 lets the encoder pick
    pub threads: usize,
}

impl RenderTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            width: config.target_resolution.width,
            height: config.target_resolution.height,
            fps: config.target_fps,
            threads: config.encode_threads,
        }
    }
}

/// One source sub-span to extract and speed up
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    /// Position of the interval in the remap table
    pub ordinal: usize,
    pub kind: IntervalKind,
    pub source_start: f64,
    pub source_end: f64,
    pub speed_factor: f64,
    /// Length the clip must have after speed scaling
    pub output_duration: f64,
}

impl ClipSpec {
    pub fn source_duration(&self) -> f64 {
        self.source_end - self.source_start
    }
}

/// What a finished render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub clip_count: usize,
    /// Intervals too short to encode that were not sent to the codec
    pub skipped_intervals: usize,
    /// Sum of the rendered clips' output durations
    pub output_duration_secs: f64,
}

/// Codec collaborator: probing, clip extraction and the final encode
#[async_trait]
pub trait VideoCodec: Send + Sync {
    /// Read duration and stream layout of a video file
    async fn probe(&self, path: &Path) -> Result<VideoInfo, CodecError>;

    /// Write `[source_start, source_end)` of `source`, played `speed_factor` times faster, to `dest`
    async fn extract_clip(
        &self,
        source: &Path,
        clip: &ClipSpec,
        with_audio: bool,
        dest: &Path,
    ) -> Result<(), CodecError>;

    /// Join clips in order, resize, and encode at the target fps to `output`
    async fn concat_encode(
        &self,
        clips: &[PathBuf],
        target: &RenderTarget,
        with_audio: bool,
        output: &Path,
    ) -> Result<(), CodecError>;
}

/// Clips shorter than this on the output timeline are below caption resolution
/// and would encode to an empty file
pub const MIN_CLIP_SECS: f64 = 0.001;

/// Turn the remap table into the ordered clip list, dropping intervals too short to encode
pub fn plan_clips(table: &RemapTable) -> Vec<ClipSpec> {
    table
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.interval().is_empty() && entry.output_duration() >= MIN_CLIP_SECS)
        .map(|(ordinal, entry)| ClipSpec {
            ordinal,
            kind: entry.kind(),
            source_start: entry.source_start(),
            source_end: entry.source_end(),
            speed_factor: entry.speed_factor(),
            output_duration: entry.output_duration(),
        })
        .collect()
}

/// Renders a retimed video from a remap table
pub struct VideoRenderer<C: VideoCodec> {
    codec: C,
    target: RenderTarget,
    show_progress: bool,
}

impl<C: VideoCodec> VideoRenderer<C> {
    pub fn new(codec: C, target: RenderTarget) -> Self {
        Self {
            codec,
            target,
            show_progress: true,
        }
    }

    /// Disable the progress bar (tests, non-interactive runs)
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Probe a source through the renderer's codec
    pub async fn probe(&self, source: &Path) -> Result<VideoInfo, RetimeError> {
        Ok(self.codec.probe(source).await?)
    }

    /// Render `source` retimed by `table` into `output`.
    ///
    /// On failure no output file is left behind.
    pub async fn render(&self, source: &Path, table: &RemapTable, output: &Path) -> Result<RenderReport, RetimeError> {
        let result = self.render_inner(source, table, output).await;
        if result.is_err() {
            FileManager::remove_partial(output);
        }
        result
    }

    async fn render_inner(&self, source: &Path, table: &RemapTable, output: &Path) -> Result<RenderReport, RetimeError> {
        let info = self.codec.probe(source).await?;

        let source_span = table.total_source_duration();
        if (info.duration_secs - source_span).abs() > 0.5 {
            warn!(
                "Remap table covers {:.3}s but {:?} is {:.3}s long",
                source_span, source, info.duration_secs
            );
        }

        let clips = plan_clips(table);
        if clips.is_empty() {
            return Err(RetimeError::Render(format!("Nothing to render: {:?} has zero length", source)));
        }
        let skipped_intervals = table.len() - clips.len();
        debug!("Rendering {} clips, skipping {} intervals shorter than {}s", clips.len(), skipped_intervals, MIN_CLIP_SECS);

        let scratch = tempfile::Builder::new()
            .prefix("subspeed-")
            .tempdir()
            .map_err(|e| RetimeError::Render(format!("Failed to create scratch directory: {}", e)))?;

        let progress_bar = self.progress_bar(clips.len() as u64);
        let mut clip_paths = Vec::with_capacity(clips.len());

        for clip in &clips {
            let dest = scratch.path().join(format!("clip_{:05}.mp4", clip.ordinal));
            self.codec
                .extract_clip(source, clip, info.has_audio, &dest)
                .await
                .map_err(|e| {
                    RetimeError::Render(format!(
                        "Clip {} ({} {:.3}s-{:.3}s): {}",
                        clip.ordinal, clip.kind, clip.source_start, clip.source_end, e
                    ))
                })?;
            clip_paths.push(dest);
            progress_bar.inc(1);
        }

        progress_bar.set_message("encoding");
        if let Some(parent) = output.parent() {
            FileManager::ensure_dir(parent).map_err(|e| RetimeError::File(e.to_string()))?;
        }
        self.codec
            .concat_encode(&clip_paths, &self.target, info.has_audio, output)
            .await?;
        progress_bar.finish_and_clear();

        let output_duration_secs = clips.iter().map(|clip| clip.output_duration).sum();
        info!(
            "Rendered {} clips to {:?} ({:.3}s at {}x{}, {} fps)",
            clips.len(),
            output,
            output_duration_secs,
            self.target.width,
            self.target.height,
            self.target.fps
        );

        Ok(RenderReport {
            clip_count: clips.len(),
            skipped_intervals,
            output_duration_secs,
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress_bar = ProgressBar::new(len);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} clips ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message("extracting");
        progress_bar
    }
}
