//! In-memory [`VideoMuxer`] for tests and dry runs.

use crate::error::{DubError, Result};
use crate::media::VideoMuxer;
use crate::media::wav::write_clip;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pretends every video carries `original` as its audio track.
///
/// The video is as long as its audio unless [`with_video_duration`] says
/// otherwise. `remux_audio` copies the audio file to the output and records
/// the call, so tests can check what would have been muxed.
///
/// [`with_video_duration`]: RecordingMuxer::with_video_duration
#[derive(Debug)]
pub struct RecordingMuxer {
    sample_rate: u32,
    original: Vec<i16>,
    video_duration: Option<f64>,
    fail_remux: bool,
    remux_attempts: AtomicUsize,
    remuxed: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingMuxer {
    pub fn new(sample_rate: u32, original: Vec<i16>) -> Self {
        Self {
            sample_rate,
            original,
            video_duration: None,
            fail_remux: false,
            remux_attempts: AtomicUsize::new(0),
            remuxed: Mutex::new(Vec::new()),
        }
    }

    /// Report a video length that differs from the audio stream's.
    pub fn with_video_duration(mut self, seconds: f64) -> Self {
        self.video_duration = Some(seconds);
        self
    }

    /// Make every remux fail.
    pub fn failing_remux(mut self) -> Self {
        self.fail_remux = true;
        self
    }

    /// `(video, audio)` pairs of every successful remux.
    pub fn remuxed(&self) -> Vec<(PathBuf, PathBuf)> {
        self.remuxed
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn remux_attempts(&self) -> usize {
        self.remux_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoMuxer for RecordingMuxer {
    async fn video_duration(&self, _video: &Path) -> Result<f64> {
        Ok(self
            .video_duration
            .unwrap_or(self.original.len() as f64 / f64::from(self.sample_rate)))
    }

    async fn extract_audio(&self, _video: &Path, _sample_rate: u32, output: &Path) -> Result<()> {
        write_clip(output, self.sample_rate, &self.original)
    }

    async fn remux_audio(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.remux_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_remux {
            return Err(DubError::Other("mock remux failure".to_string()));
        }
        tokio::fs::copy(audio, output).await?;
        if let Ok(mut calls) = self.remuxed.lock() {
            calls.push((video.to_path_buf(), audio.to_path_buf()));
        }
        Ok(())
    }
}
