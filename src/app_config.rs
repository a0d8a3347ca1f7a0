use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::RetimeError;
use crate::file_utils::FileManager;
use crate::timeline::SpeedProfile;

/// Application configuration module
/// This module holds the retiming options, the encoder settings handed to
/// ffmpeg, and the resolution of input/output paths.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Shift applied to every caption before segmenting, in seconds (may be negative)
    #[serde(default)]
    pub subtitle_offset_secs: f64,

    /// Playback rate for spans covered by a caption
    #[serde(default = "default_subtitle_speed_factor")]
    pub subtitle_speed_factor: f64,

    /// Playback rate for spans without a caption
    #[serde(default = "default_non_subtitle_speed_factor")]
    pub non_subtitle_speed_factor: f64,

    /// Output frame size
    #[serde(default)]
    pub target_resolution: Resolution,

    /// Output frame rate
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Encoder threads, 0 lets ffmpeg use every core
    #[serde(default)]
    pub encode_threads: usize,

    /// Marker prepended to input file names to build default output names
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Encoder settings
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Output frame size in pixels
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// Accepts "640x360" (also "640X360" and "640:360")
impl FromStr for Resolution {
    type Err = RetimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RetimeError::Configuration(format!("Invalid resolution '{}', expected WIDTHxHEIGHT", s));
        let (width, height) = s
            .trim()
            .split_once(['x', 'X', ':'])
            .ok_or_else(invalid)?;

        Ok(Self {
            width: width.trim().parse().map_err(|_| invalid())?,
            height: height.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// ffmpeg encoder settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FfmpegConfig {
    /// Video encoder passed to -c:v
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Audio encoder passed to -c:a
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// x264-style preset
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Timeout for a single ffmpeg/ffprobe invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            preset: default_preset(),
            crf: default_crf(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_subtitle_speed_factor() -> f64 {
    1.5
}

fn default_non_subtitle_speed_factor() -> f64 {
    3.0
}

fn default_target_fps() -> u32 {
    25
}

fn default_output_prefix() -> String {
    "faster_".to_string()
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_preset() -> String {
    "veryfast".to_string()
}

fn default_crf() -> u8 {
    20
}

fn default_timeout_secs() -> u64 {
    3600 // long sources take a while to re-encode
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), RetimeError> {
        self.speed_profile()?;

        if !self.subtitle_offset_secs.is_finite() {
            return Err(RetimeError::Configuration(format!(
                "Subtitle offset must be a finite number of seconds, got {}",
                self.subtitle_offset_secs
            )));
        }

        if self.target_fps == 0 {
            return Err(RetimeError::Configuration("Target fps must be positive".to_string()));
        }

        let Resolution { width, height } = self.target_resolution;
        if width == 0 || height == 0 {
            return Err(RetimeError::Configuration(format!(
                "Target resolution must be non-zero, got {}",
                self.target_resolution
            )));
        }
        // yuv420p output needs even dimensions
        if width % 2 != 0 || height % 2 != 0 {
            return Err(RetimeError::Configuration(format!(
                "Target resolution must have even dimensions, got {}",
                self.target_resolution
            )));
        }

        if self.output_prefix.is_empty() {
            return Err(RetimeError::Configuration(
                "Output prefix must not be empty, default outputs would overwrite the inputs".to_string(),
            ));
        }

        if self.ffmpeg.timeout_secs == 0 {
            return Err(RetimeError::Configuration("ffmpeg timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Dialogue and gap factors for the segmenter
    pub fn speed_profile(&self) -> Result<SpeedProfile, RetimeError> {
        SpeedProfile::new(self.subtitle_speed_factor, self.non_subtitle_speed_factor)
    }

    /// Offset in whole milliseconds, the resolution of caption timestamps
    pub fn offset_ms(&self) -> i64 {
        (self.subtitle_offset_secs * 1000.0).round() as i64
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            subtitle_offset_secs: 0.0,
            subtitle_speed_factor: default_subtitle_speed_factor(),
            non_subtitle_speed_factor: default_non_subtitle_speed_factor(),
            target_resolution: Resolution::default(),
            target_fps: default_target_fps(),
            encode_threads: 0,
            output_prefix: default_output_prefix(),
            ffmpeg: FfmpegConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

/// How the input files were named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSelection {
    /// `<title>.mp4` and `<title>.srt`
    TitleDerived { title: String },
    /// Video and caption paths given independently
    ExplicitPaths { video: PathBuf, caption: PathBuf },
}

/// Every path one run touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub video: PathBuf,
    pub caption: PathBuf,
    pub output_video: PathBuf,
    pub output_caption: PathBuf,
}

impl InputSelection {
    pub const VIDEO_EXTENSION: &'static str = "mp4";
    pub const CAPTION_EXTENSION: &'static str = "srt";

    /// Pick exactly one naming style from optional CLI values
    pub fn from_parts(
        title: Option<String>,
        video: Option<PathBuf>,
        caption: Option<PathBuf>,
    ) -> Result<Self, RetimeError> {
        match (title, video, caption) {
            (Some(title), None, None) => {
                if title.trim().is_empty() {
                    return Err(RetimeError::Configuration("Title must not be empty".to_string()));
                }
                Ok(Self::TitleDerived { title })
            }
            (None, Some(video), Some(caption)) => Ok(Self::ExplicitPaths { video, caption }),
            (Some(_), _, _) => Err(RetimeError::Configuration(
                "Use either a title or explicit video and subtitle paths, not both".to_string(),
            )),
            (None, Some(_), None) => Err(RetimeError::Configuration(
                "A video path was given without a subtitle path".to_string(),
            )),
            (None, None, Some(_)) => Err(RetimeError::Configuration(
                "A subtitle path was given without a video path".to_string(),
            )),
            (None, None, None) => Err(RetimeError::Configuration(
                "No input given: pass a title or both a video and a subtitle path".to_string(),
            )),
        }
    }

    /// Derive input and output paths. Explicit outputs win over prefixed defaults.
    pub fn resolve(
        &self,
        config: &Config,
        output_video: Option<PathBuf>,
        output_caption: Option<PathBuf>,
    ) -> Result<ResolvedPaths, RetimeError> {
        let (video, caption) = match self {
            Self::TitleDerived { title } => (
                PathBuf::from(format!("{}.{}", title, Self::VIDEO_EXTENSION)),
                PathBuf::from(format!("{}.{}", title, Self::CAPTION_EXTENSION)),
            ),
            Self::ExplicitPaths { video, caption } => (video.clone(), caption.clone()),
        };

        let output_video = match output_video {
            Some(path) => path,
            None => Self::default_output(&video, &config.output_prefix)?,
        };
        let output_caption = match output_caption {
            Some(path) => path,
            None => Self::default_output(&caption, &config.output_prefix)?,
        };

        if output_video == video || output_caption == caption {
            return Err(RetimeError::Configuration(
                "Output paths must differ from the input paths".to_string(),
            ));
        }
        if output_video == output_caption {
            return Err(RetimeError::Configuration(
                "Video and subtitle outputs must be different files".to_string(),
            ));
        }

        Ok(ResolvedPaths {
            video,
            caption,
            output_video,
            output_caption,
        })
    }

    fn default_output(input: &Path, prefix: &str) -> Result<PathBuf, RetimeError> {
        FileManager::prefixed_path(input, prefix).ok_or_else(|| {
            RetimeError::Configuration(format!("Cannot derive an output name from {:?}", input))
        })
    }
}
