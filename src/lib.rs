//! dubsync - Timing-aligned dubbing for short videos
//!
//! Re-times synthesized speech to the source transcript and lays it over the
//! attenuated original audio.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod error;
pub mod job;
pub mod media;
pub mod services;
pub mod sync;
pub mod timeline;
pub mod transcript;

// Capabilities
pub use media::{AudioTool, FfmpegTool, PcmAudioTool, VideoMuxer};
pub use services::{SpeechSynthesizer, Translator};
pub use transcript::TranscriptSource;

// Engine
pub use job::{DubJob, JobContext, JobReport};
pub use sync::{TempoAligner, TempoBounds, TrackComposer};
pub use timeline::{RawSegment, Segment, SegmentState, Timeline};

// Error handling
pub use error::{DubError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
