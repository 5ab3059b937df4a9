//! Error types for dubsync.

use crate::timeline::SegmentState;
use std::time::Duration;
use thiserror::Error;

/// Failure of an external tool invocation (ffmpeg, ffprobe, synthesizer).
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", timeout.as_secs_f64())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected output from {program}: {message}")]
    Output { program: String, message: String },
}

#[derive(Error, Debug)]
pub enum DubError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Timeline and transcript errors
    #[error("Invalid segment {index}: {message}")]
    Validation { index: usize, message: String },

    #[error("Segment {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: usize,
        from: SegmentState,
        to: SegmentState,
    },

    #[error("Video is {duration:.1}s long, outside the accepted {min:.1}s..{max:.1}s")]
    VideoRejected { duration: f64, min: f64, max: f64 },

    #[error("Transcript error: {message}")]
    Transcript { message: String },

    // Per-segment, recoverable
    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Synthesis failed for segment {index}: {message}")]
    Synthesis { index: usize, message: String },

    #[error("Stretch failed for segment {index}: {message}")]
    Stretch { index: usize, message: String },

    #[error("Overlay failed for segment {index}: {message}")]
    Overlay { index: usize, message: String },

    // Job-level, fatal
    #[error("Failed to create dub canvas: {message}")]
    CanvasCreation { message: String },

    #[error("Failed to mix dub track: {message}")]
    Mix { message: String },

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Workspace {} is in use by another running job", dir.display())]
    WorkspaceBusy { dir: std::path::PathBuf },

    #[error("{operation} timed out after {}s", timeout.as_secs_f64())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DubError {
    /// Whether the error aborts the whole job.
    ///
    /// Per-segment failures (validation, synthesis, stretch, overlay,
    /// translation) are absorbed by the pipeline; everything else is surfaced
    /// to the caller as a failed job.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DubError::Validation { .. }
                | DubError::Translation { .. }
                | DubError::Synthesis { .. }
                | DubError::Stretch { .. }
                | DubError::Overlay { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DubError>;
