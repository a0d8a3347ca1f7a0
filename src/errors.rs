/*!
 * Error types for the subspeed application.
 *
 * The retiming core reports three kinds of failure: bad configuration,
 * bad caption input, and codec failures while rendering. Codec failures
 * are raised with their own type by the ffmpeg layer and folded into
 * `RetimeError::Render` at the renderer boundary.
 */

use thiserror::Error;

/// Errors raised by the codec collaborator (ffmpeg/ffprobe)
#[derive(Error, Debug)]
pub enum CodecError {
    /// Required executable is not on PATH
    #[error("{0} not found on PATH")]
    ToolNotFound(String),

    /// The tool ran but exited with a failure status
    #[error("{tool} failed: {message}")]
    CommandFailed {
        /// Executable name
        tool: String,
        /// Filtered stderr output
        message: String,
    },

    /// The tool did not finish within the configured timeout
    #[error("{tool} timed out after {secs} seconds")]
    Timeout {
        /// Executable name
        tool: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// Probe output could not be interpreted
    #[error("Failed to parse probe output: {0}")]
    ProbeParse(String),

    /// Spawning the process or touching scratch files failed
    #[error("Codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for the retiming pipeline
#[derive(Error, Debug)]
pub enum RetimeError {
    /// Missing or contradictory inputs, or a timestamp pushed negative by the offset
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed, unsorted or overlapping captions, or a cue/dialogue count mismatch
    #[error("Input error: {0}")]
    Input(String),

    /// Decoding or encoding the video failed
    #[error("Render error: {0}")]
    Render(String),

    /// Reading or writing a file failed
    #[error("File error: {0}")]
    File(String),
}

impl From<CodecError> for RetimeError {
    fn from(error: CodecError) -> Self {
        Self::Render(error.to_string())
    }
}

impl From<std::io::Error> for RetimeError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
