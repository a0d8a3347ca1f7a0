use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use serde::Deserialize;
use tokio::process::Command;

use super::{ClipSpec, RenderTarget, VideoCodec, VideoInfo};
use crate::app_config::FfmpegConfig;
use crate::errors::CodecError;

// @module: ffmpeg/ffprobe backed codec

// atempo accepts 0.5..=2.0 per stage on older ffmpeg builds
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// FFprobe JSON output format
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Codec that shells out to ffmpeg and ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    config: FfmpegConfig,
}

impl FfmpegCodec {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Fail early when ffmpeg or ffprobe is missing
    pub fn check_tools() -> Result<(), CodecError> {
        for tool in ["ffmpeg", "ffprobe"] {
            which::which(tool).map_err(|_| CodecError::ToolNotFound(tool.to_string()))?;
        }
        Ok(())
    }

    /// `atempo` filter chain for an arbitrary speed factor
    pub fn atempo_chain(speed: f64) -> String {
        let mut stages = Vec::new();
        let mut remaining = speed;

        while remaining > ATEMPO_MAX {
            stages.push(ATEMPO_MAX);
            remaining /= ATEMPO_MAX;
        }
        while remaining < ATEMPO_MIN {
            stages.push(ATEMPO_MIN);
            remaining /= ATEMPO_MIN;
        }
        stages.push(remaining);

        stages
            .iter()
            .map(|stage| format!("atempo={:.6}", stage))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Concat demuxer list, one quoted path per line
    pub fn concat_list(clips: &[PathBuf]) -> String {
        clips
            .iter()
            .map(|clip| format!("file '{}'\n", clip.display().to_string().replace('\'', "'\\''")))
            .collect()
    }

    /// Arguments for extracting and speeding up one clip
    pub fn clip_args(&self, source: &Path, clip: &ClipSpec, with_audio: bool, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-ss".into(),
            format!("{:.6}", clip.source_start).into(),
            "-t".into(),
            format!("{:.6}", clip.source_duration()).into(),
            "-i".into(),
            source.into(),
            "-vf".into(),
            format!("setpts=(PTS-STARTPTS)/{:.6}", clip.speed_factor).into(),
        ];

        if with_audio {
            args.push("-af".into());
            args.push(format!("asetpts=PTS-STARTPTS,{}", Self::atempo_chain(clip.speed_factor)).into());
            args.push("-c:a".into());
            args.push(self.config.audio_codec.clone().into());
        } else {
            args.push("-an".into());
        }

        // pin the clip to its remapped length so the joined video tracks the captions
        let tail: [OsString; 11] = [
            "-t".into(),
            format!("{:.6}", clip.output_duration).into(),
            "-c:v".into(),
            self.config.video_codec.clone().into(),
            "-preset".into(),
            self.config.preset.clone().into(),
            "-crf".into(),
            self.config.crf.to_string().into(),
            "-avoid_negative_ts".into(),
            "make_zero".into(),
            dest.into(),
        ];
        args.extend(tail);
        args
    }

    /// Arguments for joining clips and producing the final encode
    pub fn concat_args(&self, list: &Path, target: &RenderTarget, with_audio: bool, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list.into(),
            "-vf".into(),
            format!("scale={}:{},fps={}", target.width, target.height, target.fps).into(),
            "-c:v".into(),
            self.config.video_codec.clone().into(),
            "-preset".into(),
            self.config.preset.clone().into(),
            "-crf".into(),
            self.config.crf.to_string().into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ];

        if with_audio {
            args.push("-c:a".into());
            args.push(self.config.audio_codec.clone().into());
        } else {
            args.push("-an".into());
        }

        let tail: [OsString; 5] = [
            "-threads".into(),
            target.threads.to_string().into(),
            "-movflags".into(),
            "+faststart".into(),
            output.into(),
        ];
        args.extend(tail);
        args
    }

    async fn run(&self, tool: &str, args: Vec<OsString>) -> Result<Output, CodecError> {
        let program = which::which(tool).map_err(|_| CodecError::ToolNotFound(tool.to_string()))?;
        debug!("Running {} {:?}", tool, args);

        let future = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::select! {
            result = future => result?,
            _ = tokio::time::sleep(timeout_duration) => {
                return Err(CodecError::Timeout { tool: tool.to_string(), secs: self.config.timeout_secs });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = filter_ffmpeg_stderr(&stderr);
            error!("{} failed: {}", tool, message);
            return Err(CodecError::CommandFailed {
                tool: tool.to_string(),
                message,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl VideoCodec for FfmpegCodec {
    async fn probe(&self, path: &Path) -> Result<VideoInfo, CodecError> {
        if !path.exists() {
            return Err(CodecError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Video file not found: {:?}", path),
            )));
        }

        let args: Vec<OsString> = vec![
            "-v".into(),
            "quiet".into(),
            "-print_format".into(),
            "json".into(),
            "-show_format".into(),
            "-show_streams".into(),
            path.into(),
        ];
        let output = self.run("ffprobe", args).await?;
        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn extract_clip(
        &self,
        source: &Path,
        clip: &ClipSpec,
        with_audio: bool,
        dest: &Path,
    ) -> Result<(), CodecError> {
        self.run("ffmpeg", self.clip_args(source, clip, with_audio, dest)).await?;
        Ok(())
    }

    async fn concat_encode(
        &self,
        clips: &[PathBuf],
        target: &RenderTarget,
        with_audio: bool,
        output: &Path,
    ) -> Result<(), CodecError> {
        let list_dir = clips
            .first()
            .and_then(|clip| clip.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let list = list_dir.join("concat.txt");
        tokio::fs::write(&list, Self::concat_list(clips)).await?;

        self.run("ffmpeg", self.concat_args(&list, target, with_audio, output)).await?;
        Ok(())
    }
}

/// Extract duration and stream layout from ffprobe JSON
pub fn parse_probe_output(json: &str) -> Result<VideoInfo, CodecError> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| CodecError::ProbeParse(e.to_string()))?;

    let duration_secs = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| CodecError::ProbeParse("missing or invalid format duration".to_string()))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| CodecError::ProbeParse("no video stream".to_string()))?;

    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    Ok(VideoInfo {
        duration_secs,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps: video.r_frame_rate.as_deref().and_then(parse_frame_rate).unwrap_or(0.0),
        has_audio,
    })
}

/// "30000/1001" or "25"
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 { None } else { Some(num / den) }
        }
        None => rate.trim().parse().ok(),
    }
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "ffprobe version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
