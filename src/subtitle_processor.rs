use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use regex::Regex;
use once_cell::sync::Lazy;
use log::{debug, warn};

use crate::errors::RetimeError;
use crate::file_utils::FileManager;

// @module: SRT caption parsing and serialization

// @const: SRT timing line regex (comma or dot before the milliseconds)
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2})[,.](\d{3})").unwrap()
});

// @struct: Single caption record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    // @field: Index as written in the caption file
    pub index: usize,

    // @field: Start time in ms
    pub start_ms: u64,

    // @field: End time in ms
    pub end_ms: u64,

    // @field: Caption text, lines joined with '\n'
    pub text: String,
}

impl Cue {
    pub fn new(index: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Cue {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Same index and text, new timing
    pub fn with_times(&self, start_ms: u64, end_ms: u64) -> Self {
        Cue {
            index: self.index,
            start_ms,
            end_ms,
            text: self.text.clone(),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64, RetimeError> {
        let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

        if parts.len() != 4 {
            return Err(RetimeError::Input(format!("Invalid timestamp format: {}", timestamp)));
        }

        let mut values = [0u64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part.parse().map_err(|_| {
                RetimeError::Input(format!("Invalid timestamp component '{}' in {}", part, timestamp))
            })?;
        }

        Self::components_to_ms(values[0], values[1], values[2], values[3])
            .ok_or_else(|| RetimeError::Input(format!("Invalid time components in timestamp: {}", timestamp)))
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }

    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_ms)
    }

    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_ms)
    }

    fn components_to_ms(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return None;
        }
        hours
            .checked_mul(3_600_000)?
            .checked_add(minutes * 60_000 + seconds * 1_000 + millis)
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Caption file contents in file order
#[derive(Debug)]
pub struct SubtitleCollection {
    /// Source filename
    pub source_file: PathBuf,

    /// Cues in the order they appear in the file
    pub entries: Vec<Cue>,
}

impl SubtitleCollection {
    pub fn new(source_file: PathBuf) -> Self {
        SubtitleCollection {
            source_file,
            entries: Vec::new(),
        }
    }

    /// Read and parse an SRT file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RetimeError> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path).map_err(|e| RetimeError::File(format!("{:#}", e)))?;

        let entries = Self::parse_srt_string(&content)?;
        debug!("Parsed {} cues from {}", entries.len(), path.display());

        Ok(SubtitleCollection {
            source_file: path.to_path_buf(),
            entries,
        })
    }

    /// Write cues to an SRT file
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<(), RetimeError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| RetimeError::File(format!("Failed to create directory {}: {}", parent.display(), e)))?;
            }
        }

        let mut file = File::create(path)
            .map_err(|e| RetimeError::File(format!("Failed to create caption file {}: {}", path.display(), e)))?;
        file.write_all(Self::compose(&self.entries).as_bytes())
            .map_err(|e| RetimeError::File(format!("Failed to write caption file {}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Serialize cues back to SRT text
    pub fn compose(cues: &[Cue]) -> String {
        cues.iter().map(|cue| cue.to_string()).collect()
    }

    /// Parse SRT text into cues.
    ///
    /// Blocks are kept in file order with their original indices; ordering and
    /// overlap are the segmenter's concern. A malformed index or timing line is
    /// an input error naming the offending line.
    pub fn parse_srt_string(content: &str) -> Result<Vec<Cue>, RetimeError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut cues = Vec::new();
        let mut block: Vec<(usize, &str)> = Vec::new();

        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                if !block.is_empty() {
                    cues.push(Self::parse_block(&block)?);
                    block.clear();
                }
                continue;
            }
            block.push((i + 1, line));
        }

        if !block.is_empty() {
            cues.push(Self::parse_block(&block)?);
        }

        if cues.is_empty() {
            warn!("No cues found in caption content");
        }

        Ok(cues)
    }

    fn parse_block(block: &[(usize, &str)]) -> Result<Cue, RetimeError> {
        let (index_line_no, index_line) = block[0];
        let index: usize = index_line.trim().parse().map_err(|_| {
            RetimeError::Input(format!(
                "Line {}: expected cue index, found '{}'",
                index_line_no,
                index_line.trim()
            ))
        })?;

        let (timing_line_no, timing_line) = block.get(1).copied().ok_or_else(|| {
            RetimeError::Input(format!("Line {}: cue {} has no timing line", index_line_no, index))
        })?;

        let caps = TIMESTAMP_REGEX.captures(timing_line.trim()).ok_or_else(|| {
            RetimeError::Input(format!(
                "Line {}: expected 'start --> end' timing, found '{}'",
                timing_line_no,
                timing_line.trim()
            ))
        })?;

        let start_ms = Self::captured_ms(&caps, 1).ok_or_else(|| {
            RetimeError::Input(format!("Line {}: invalid start time", timing_line_no))
        })?;
        let end_ms = Self::captured_ms(&caps, 5).ok_or_else(|| {
            RetimeError::Input(format!("Line {}: invalid end time", timing_line_no))
        })?;

        let text = block[2..]
            .iter()
            .map(|(_, line)| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Cue::new(index, start_ms, end_ms, text))
    }

    fn captured_ms(caps: &regex::Captures, start_idx: usize) -> Option<u64> {
        let field = |offset: usize| -> Option<u64> {
            caps.get(start_idx + offset)?.as_str().parse().ok()
        };
        Cue::components_to_ms(field(0)?, field(1)?, field(2)?, field(3)?)
    }
}

impl fmt::Display for SubtitleCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Collection")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Entries: {}", self.entries.len())?;
        Ok(())
    }
}
