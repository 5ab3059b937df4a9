//! `ffmpeg`/`ffprobe` backend for [`AudioTool`] and [`VideoMuxer`].

use crate::defaults;
use crate::error::{DubError, Result, ToolError};
use crate::media::command::run_tool;
use crate::media::{AudioTool, VideoMuxer};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Drives the system `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: String,
    ffprobe: String,
    sample_rate: u32,
    timeout: Duration,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new(
            defaults::SAMPLE_RATE,
            Duration::from_secs(defaults::TOOL_TIMEOUT_SECS),
        )
    }
}

impl FfmpegTool {
    /// `sample_rate` is the rate every intermediate clip is written at.
    pub fn new(sample_rate: u32, timeout: Duration) -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            sample_rate,
            timeout,
        }
    }

    /// Use different binaries (e.g. a static build outside `PATH`).
    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    async fn ffmpeg(&self, args: Vec<String>) -> Result<()> {
        let mut full = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
        ];
        full.extend(args);
        run_tool(&self.ffmpeg, &full, self.timeout).await?;
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path_arg(path),
        ];
        let output = run_tool(&self.ffprobe, &args, self.timeout).await?;
        parse_duration(&output.stdout).ok_or_else(|| {
            DubError::Tool(ToolError::Output {
                program: self.ffprobe.clone(),
                message: format!(
                    "no duration for {}: {:?}",
                    path.display(),
                    output.stdout.trim()
                ),
            })
        })
    }

    /// Output options for every intermediate WAV this backend writes.
    fn pcm_output(&self, output: &Path) -> Vec<String> {
        vec![
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            path_arg(output),
        ]
    }
}

#[async_trait]
impl AudioTool for FfmpegTool {
    async fn probe_duration(&self, clip: &Path) -> Result<f64> {
        self.probe(clip).await
    }

    async fn stretch(&self, clip: &Path, factor: f64, output: &Path) -> Result<()> {
        let mut args = vec![
            "-i".to_string(),
            path_arg(clip),
            "-filter:a".to_string(),
            format!("atempo={factor:.6}"),
        ];
        args.extend(self.pcm_output(output));
        self.ffmpeg(args).await
    }

    async fn generate_silence(
        &self,
        duration: f64,
        sample_rate: u32,
        output: &Path,
    ) -> Result<()> {
        let samples = (duration * f64::from(sample_rate)).round() as u64;
        let args = vec![
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            format!("anullsrc=channel_layout=mono:sample_rate={sample_rate}"),
            "-af".to_string(),
            format!("atrim=end_sample={samples}"),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            path_arg(output),
        ];
        self.ffmpeg(args).await
    }

    async fn overlay_at(
        &self,
        canvas: &Path,
        clip: &Path,
        offset: f64,
        output: &Path,
    ) -> Result<()> {
        let delay_ms = (offset * 1000.0).round().max(0.0) as u64;
        let mut args = vec![
            "-i".to_string(),
            path_arg(canvas),
            "-i".to_string(),
            path_arg(clip),
            "-filter_complex".to_string(),
            format!(
                "[1:a]aresample={rate},aformat=channel_layouts=mono,adelay=delays={delay_ms}:all=1[clip];\
                 [0:a][clip]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[out]",
                rate = self.sample_rate,
            ),
            "-map".to_string(),
            "[out]".to_string(),
        ];
        args.extend(self.pcm_output(output));
        self.ffmpeg(args).await
    }

    async fn mix_volumes(
        &self,
        track_a: &Path,
        gain_a: f32,
        track_b: &Path,
        gain_b: f32,
        duration: f64,
        output: &Path,
    ) -> Result<()> {
        let samples = (duration.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        let mut args = vec![
            "-i".to_string(),
            path_arg(track_a),
            "-i".to_string(),
            path_arg(track_b),
            "-filter_complex".to_string(),
            mix_filter(gain_a, gain_b, self.sample_rate, samples),
            "-map".to_string(),
            "[out]".to_string(),
        ];
        args.extend(self.pcm_output(output));
        self.ffmpeg(args).await
    }
}

#[async_trait]
impl VideoMuxer for FfmpegTool {
    async fn video_duration(&self, video: &Path) -> Result<f64> {
        self.probe(video).await
    }

    async fn extract_audio(&self, video: &Path, sample_rate: u32, output: &Path) -> Result<()> {
        let args = vec![
            "-i".to_string(),
            path_arg(video),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            sample_rate.to_string(),
            "-ac".to_string(),
            "1".to_string(),
            path_arg(output),
        ];
        self.ffmpeg(args).await
    }

    async fn remux_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let args = vec![
            "-i".to_string(),
            path_arg(video),
            "-i".to_string(),
            path_arg(audio),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            path_arg(output),
        ];
        self.ffmpeg(args).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Weighted sum of two inputs, padded with silence and cut to `samples`.
fn mix_filter(gain_a: f32, gain_b: f32, rate: u32, samples: u64) -> String {
    format!(
        "[0:a]aresample={rate},volume={gain_a:.4}[a0];[1:a]aresample={rate},volume={gain_b:.4}[a1];\
         [a0][a1]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0,\
         apad=whole_len={samples},atrim=end_sample={samples}[out]"
    )
}

fn parse_duration(stdout: &str) -> Option<f64> {
    let value: f64 = stdout.lines().next()?.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
