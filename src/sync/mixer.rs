//! Lays the dub canvas over the attenuated original audio and remuxes it
//! into the source video.

use crate::error::{DubError, Result};
use crate::job::context::{JobContext, JobWorkspace};
use crate::media::{AudioTool, VideoMuxer};
use crate::sync::composer::ComposedCanvas;
use crate::sync::with_one_retry;
use std::path::{Path, PathBuf};
use tracing::info;

/// Final assembly step. Every failure here is fatal for the job; there is
/// no fallback to a partially mixed track.
pub struct Mixer<'a> {
    tool: &'a dyn AudioTool,
    muxer: &'a dyn VideoMuxer,
    ctx: &'a JobContext,
}

impl<'a> Mixer<'a> {
    pub fn new(tool: &'a dyn AudioTool, muxer: &'a dyn VideoMuxer, ctx: &'a JobContext) -> Self {
        Self { tool, muxer, ctx }
    }

    /// Mixes `original_audio` at the job attenuation with the canvas at full
    /// scale. The result is exactly `duration` seconds long: canvas tail past
    /// that point is dropped, and an audio stream shorter than the video is
    /// padded with silence so no dub clip inside the video is lost.
    pub async fn mix(
        &self,
        original_audio: &Path,
        canvas: &ComposedCanvas,
        duration: f64,
        output: &Path,
    ) -> Result<()> {
        with_one_retry("mix", || {
            self.tool.mix_volumes(
                original_audio,
                self.ctx.attenuation,
                canvas.path(),
                1.0,
                duration,
                output,
            )
        })
        .await
        .map_err(|e| DubError::Mix {
            message: e.to_string(),
        })
    }

    /// Extracts the original audio, mixes the canvas in and remuxes the
    /// result into a copy of `video` staged inside the workspace.
    ///
    /// `video_duration` is the length of the video stream; the new audio
    /// track is cut or padded to it. Returns the staged file; the caller
    /// publishes it.
    pub async fn assemble(
        &self,
        video: &Path,
        video_duration: f64,
        canvas: &ComposedCanvas,
        workspace: &JobWorkspace,
    ) -> Result<PathBuf> {
        let original = workspace.original_audio();
        with_one_retry("audio extraction", || {
            self.muxer
                .extract_audio(video, self.ctx.sample_rate, &original)
        })
        .await
        .map_err(|e| DubError::Mix {
            message: format!("could not extract original audio: {e}"),
        })?;

        let mixed = workspace.mixed_audio();
        self.mix(&original, canvas, video_duration, &mixed).await?;

        let staged = workspace.staged_output(&self.ctx.output_extension);
        with_one_retry("remux", || self.muxer.remux_audio(video, &mixed, &staged))
            .await
            .map_err(|e| DubError::Mix {
                message: format!("could not remux audio: {e}"),
            })?;

        info!(video = %video.display(), staged = %staged.display(), "assembled dubbed video");
        Ok(staged)
    }
}
