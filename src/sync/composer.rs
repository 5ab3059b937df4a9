//! Folds tempo-adjusted clips into a silent full-length canvas.

use crate::error::{DubError, Result};
use crate::job::context::{JobContext, JobWorkspace};
use crate::media::AudioTool;
use crate::sync::with_one_retry;
use crate::timeline::{SegmentState, Timeline};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A finished canvas: every placeable segment has been folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedCanvas {
    path: PathBuf,
    duration: f64,
    placed: usize,
}

impl ComposedCanvas {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `total_duration + trailing_pad`.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of segments whose clip made it onto the canvas.
    pub fn placed(&self) -> usize {
        self.placed
    }
}

/// Builds the dub track for one job.
///
/// The fold is strictly sequential: each overlay reads the canvas the
/// previous one wrote. Clips are summed where they overlap and may run past
/// their slot; neither is corrected.
pub struct TrackComposer<'a> {
    tool: &'a dyn AudioTool,
    ctx: &'a JobContext,
}

impl<'a> TrackComposer<'a> {
    pub fn new(tool: &'a dyn AudioTool, ctx: &'a JobContext) -> Self {
        Self { tool, ctx }
    }

    /// Composes the canvas, moving each segment to a terminal state.
    ///
    /// Failing to create the silent base canvas is fatal. A failed overlay
    /// only skips that segment. Cancellation is checked between fold steps
    /// and yields [`DubError::Cancelled`] without returning a canvas.
    pub async fn compose(
        &self,
        timeline: &mut Timeline,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<ComposedCanvas> {
        let duration = self.ctx.canvas_duration(timeline.total_duration());
        let mut generation = 0;
        let base = workspace.canvas(generation);

        with_one_retry("canvas creation", || {
            self.tool
                .generate_silence(duration, self.ctx.sample_rate, &base)
        })
        .await
        .map_err(|e| DubError::CanvasCreation {
            message: e.to_string(),
        })?;
        debug!(duration, path = %base.display(), "created silent canvas");

        let mut placed = 0;
        for segment in timeline.iter_mut() {
            if cancel.is_cancelled() {
                return Err(DubError::Cancelled);
            }

            match segment.state() {
                SegmentState::TempoAdjusted => {}
                SegmentState::SkippedSilent | SegmentState::Placed => continue,
                SegmentState::Pending | SegmentState::Synthesized => {
                    segment.mark_skipped("no tempo-adjusted clip")?;
                    continue;
                }
            }

            let Some(clip) = segment.placement_clip().map(Path::to_path_buf) else {
                segment.mark_skipped("no tempo-adjusted clip")?;
                continue;
            };

            let current = workspace.canvas(generation);
            let next = workspace.canvas(generation + 1);
            match self
                .tool
                .overlay_at(&current, &clip, segment.start(), &next)
                .await
            {
                Ok(()) => {
                    generation += 1;
                    placed += 1;
                    segment.mark_placed()?;
                    debug!(segment = segment.index(), offset = segment.start(), "placed clip");
                }
                Err(e) => {
                    let error = DubError::Overlay {
                        index: segment.index(),
                        message: e.to_string(),
                    };
                    warn!(segment = segment.index(), error = %error, "leaving slot silent");
                    segment.mark_skipped(error.to_string())?;
                }
            }
        }

        info!(placed, segments = timeline.len(), duration, "composed dub canvas");
        Ok(ComposedCanvas {
            path: workspace.canvas(generation),
            duration,
            placed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::media::PcmAudioTool;
    use crate::media::wav::{read_clip, write_clip};
    use crate::timeline::RawSegment;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const RATE: u32 = 1000;

    fn context(root: &Path) -> JobContext {
        let mut config = Config::default();
        config.audio.sample_rate = RATE;
        config.jobs.work_dir = root.to_path_buf();
        config.jobs.output_dir = root.join("out");
        JobContext::from_config("compose", &config).unwrap()
    }

    /// Drives a segment to `TempoAdjusted` with a constant-amplitude clip.
    fn prepare(ws: &JobWorkspace, timeline: &mut Timeline, index: usize, len: usize, amp: i16) {
        let path = ws.speech_clip(index);
        write_clip(&path, RATE, &vec![amp; len]).unwrap();
        let seg = timeline.get_mut(index).unwrap();
        seg.mark_synthesized(path).unwrap();
        seg.mark_tempo_adjusted(1.0, None).unwrap();
    }

    /// Overlay fails for clips whose file name contains `poison`.
    struct FlakyOverlay {
        inner: PcmAudioTool,
        fail_silence: bool,
    }

    #[async_trait]
    impl AudioTool for FlakyOverlay {
        async fn probe_duration(&self, clip: &Path) -> Result<f64> {
            self.inner.probe_duration(clip).await
        }
        async fn stretch(&self, clip: &Path, factor: f64, output: &Path) -> Result<()> {
            self.inner.stretch(clip, factor, output).await
        }
        async fn generate_silence(&self, d: f64, rate: u32, output: &Path) -> Result<()> {
            if self.fail_silence {
                return Err(DubError::Other("no space left".to_string()));
            }
            self.inner.generate_silence(d, rate, output).await
        }
        async fn overlay_at(&self, c: &Path, clip: &Path, o: f64, out: &Path) -> Result<()> {
            if clip.to_string_lossy().contains("poison") {
                return Err(DubError::Other("corrupt clip".to_string()));
            }
            self.inner.overlay_at(c, clip, o, out).await
        }
        async fn mix_volumes(
            &self,
            a: &Path,
            ga: f32,
            b: &Path,
            gb: f32,
            duration: f64,
            out: &Path,
        ) -> Result<()> {
            self.inner.mix_volumes(a, ga, b, gb, duration, out).await
        }
    }

    #[tokio::test]
    async fn canvas_spans_total_duration_plus_pad() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = PcmAudioTool::new(RATE);
        let mut timeline = Timeline::from_raw(vec![
            RawSegment::new(0.0, 1.0, "a"),
            RawSegment::new(2.0, 3.5, "b"),
        ]);
        prepare(&ws, &mut timeline, 0, 500, 100);

        let canvas = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(canvas.duration(), 4.0);
        assert_eq!(read_clip(canvas.path()).unwrap().samples.len(), 4000);
        assert_eq!(canvas.placed(), 1);
    }

    #[tokio::test]
    async fn clips_land_at_segment_start() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = PcmAudioTool::new(RATE);
        let mut timeline = Timeline::from_raw(vec![RawSegment::new(1.5, 2.0, "a")]);
        prepare(&ws, &mut timeline, 0, 200, 42);

        let canvas = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap();

        let samples = read_clip(canvas.path()).unwrap().samples;
        assert!(samples[..1500].iter().all(|&s| s == 0));
        assert!(samples[1500..1700].iter().all(|&s| s == 42));
        assert!(samples[1700..].iter().all(|&s| s == 0));
        assert_eq!(timeline.get(0).unwrap().state(), SegmentState::Placed);
    }

    #[tokio::test]
    async fn overlapping_clips_are_summed() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = PcmAudioTool::new(RATE);
        let mut timeline = Timeline::from_raw(vec![
            RawSegment::new(0.0, 1.0, "a"),
            RawSegment::new(0.5, 1.5, "b"),
        ]);
        prepare(&ws, &mut timeline, 0, 1000, 100);
        prepare(&ws, &mut timeline, 1, 1000, 30);

        let canvas = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap();

        let samples = read_clip(canvas.path()).unwrap().samples;
        assert!(samples[..500].iter().all(|&s| s == 100));
        assert!(samples[500..1000].iter().all(|&s| s == 130));
        assert!(samples[1000..1500].iter().all(|&s| s == 30));
    }

    #[tokio::test]
    async fn clip_longer_than_slot_bleeds_into_next_slot() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = PcmAudioTool::new(RATE);
        let mut timeline = Timeline::from_raw(vec![
            RawSegment::new(0.0, 1.0, "a"),
            RawSegment::new(1.0, 3.0, "b"),
        ]);
        prepare(&ws, &mut timeline, 0, 1500, 9);

        let canvas = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap();

        let samples = read_clip(canvas.path()).unwrap().samples;
        assert!(samples[1000..1500].iter().all(|&s| s == 9));
    }

    #[tokio::test]
    async fn failed_overlay_skips_only_that_segment() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = FlakyOverlay {
            inner: PcmAudioTool::new(RATE),
            fail_silence: false,
        };
        let mut timeline = Timeline::from_raw(vec![
            RawSegment::new(0.0, 1.0, "a"),
            RawSegment::new(1.0, 2.0, "b"),
            RawSegment::new(2.0, 3.0, "c"),
        ]);
        prepare(&ws, &mut timeline, 0, 1000, 10);
        prepare(&ws, &mut timeline, 2, 1000, 30);
        let poison = ws.path().join("poison.wav");
        write_clip(&poison, RATE, &[20; 1000]).unwrap();
        let seg = timeline.get_mut(1).unwrap();
        seg.mark_synthesized(poison).unwrap();
        seg.mark_tempo_adjusted(1.0, None).unwrap();

        let canvas = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap();

        let samples = read_clip(canvas.path()).unwrap().samples;
        assert!(samples[..1000].iter().all(|&s| s == 10));
        assert!(samples[1000..2000].iter().all(|&s| s == 0));
        assert!(samples[2000..3000].iter().all(|&s| s == 30));
        assert_eq!(
            timeline.get(1).unwrap().state(),
            SegmentState::SkippedSilent
        );
        assert_eq!(canvas.placed(), 2);
    }

    #[tokio::test]
    async fn canvas_creation_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = FlakyOverlay {
            inner: PcmAudioTool::new(RATE),
            fail_silence: true,
        };
        let mut timeline = Timeline::from_raw(vec![RawSegment::new(0.0, 1.0, "a")]);
        prepare(&ws, &mut timeline, 0, 100, 1);

        let err = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DubError::CanvasCreation { .. }));
        assert_eq!(
            timeline.get(0).unwrap().state(),
            SegmentState::TempoAdjusted
        );
    }

    #[tokio::test]
    async fn unprepared_segments_become_silent() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = PcmAudioTool::new(RATE);
        let mut timeline = Timeline::from_raw(vec![RawSegment::new(0.0, 1.0, "")]);

        let canvas = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(canvas.placed(), 0);
        assert_eq!(
            timeline.get(0).unwrap().state(),
            SegmentState::SkippedSilent
        );
    }

    #[tokio::test]
    async fn cancelled_fold_returns_no_canvas() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let tool = PcmAudioTool::new(RATE);
        let mut timeline = Timeline::from_raw(vec![RawSegment::new(0.0, 1.0, "a")]);
        prepare(&ws, &mut timeline, 0, 100, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = TrackComposer::new(&tool, &ctx)
            .compose(&mut timeline, &ws, &cancel)
            .await;

        assert!(matches!(result, Err(DubError::Cancelled)));
    }
}
