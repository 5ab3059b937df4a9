//! Media-processing capabilities the dubbing engine depends on.
//!
//! Everything the engine does to audio goes through [`AudioTool`]; the
//! container-level steps (pulling the original audio out, putting the new
//! track back in) go through [`VideoMuxer`]. Any backend implementing these
//! is substitutable.

pub mod command;
pub mod ffmpeg;
pub mod mock;
pub mod wav;

pub use command::{ToolOutput, run_tool};
pub use ffmpeg::FfmpegTool;
pub use mock::RecordingMuxer;
pub use wav::PcmAudioTool;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Audio operations on clip files. Every operation writes a new file at
/// `output` and leaves its inputs untouched.
#[async_trait]
pub trait AudioTool: Send + Sync {
    /// Duration of an audio file in seconds.
    async fn probe_duration(&self, clip: &Path) -> Result<f64>;

    /// Plays `clip` at `factor` times its speed (factor > 1 shortens it).
    async fn stretch(&self, clip: &Path, factor: f64, output: &Path) -> Result<()>;

    /// Writes `duration` seconds of mono silence at `sample_rate`.
    async fn generate_silence(&self, duration: f64, sample_rate: u32, output: &Path)
    -> Result<()>;

    /// Adds `clip` onto `canvas` starting `offset` seconds in.
    ///
    /// The result has exactly the canvas length; any part of the clip past
    /// the canvas end is discarded. Samples are summed, not normalized.
    async fn overlay_at(&self, canvas: &Path, clip: &Path, offset: f64, output: &Path)
    -> Result<()>;

    /// `track_a * gain_a + track_b * gain_b`, exactly `duration` seconds
    /// long. Inputs shorter than that are padded with silence, longer ones cut.
    async fn mix_volumes(
        &self,
        track_a: &Path,
        gain_a: f32,
        track_b: &Path,
        gain_b: f32,
        duration: f64,
        output: &Path,
    ) -> Result<()>;
}

/// Container-level operations on the source video.
#[async_trait]
pub trait VideoMuxer: Send + Sync {
    /// Duration of the video in seconds.
    async fn video_duration(&self, video: &Path) -> Result<f64>;

    /// Decodes the video's audio stream to a mono WAV at `sample_rate`.
    async fn extract_audio(&self, video: &Path, sample_rate: u32, output: &Path) -> Result<()>;

    /// Replaces the audio stream of `video` with `audio`, copying the video
    /// stream without re-encoding.
    async fn remux_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}
