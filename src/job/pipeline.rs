//! End-to-end dubbing job: transcript in, dubbed video out.

use crate::error::{DubError, Result};
use crate::job::context::{JobContext, JobWorkspace};
use crate::job::report::JobReport;
use crate::media::{AudioTool, VideoMuxer};
use crate::services::{SpeechSynthesizer, Translator, translate_or_original};
use crate::sync::{Mixer, TempoAligner, TrackComposer};
use crate::timeline::Timeline;
use crate::transcript::TranscriptSource;
use futures_util::StreamExt;
use futures_util::stream;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Runs one dubbing job against a set of collaborators.
///
/// A job either publishes `<output_dir>/<job_id>_<lang>_dub.<ext>` and
/// returns a [`JobReport`], or fails and leaves no output behind.
pub struct DubJob {
    ctx: JobContext,
    tool: Arc<dyn AudioTool>,
    muxer: Arc<dyn VideoMuxer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    translator: Arc<dyn Translator>,
}

/// Work order for preparing one segment's clip.
struct SegmentWork {
    index: usize,
    slot_width: f64,
    text: String,
}

/// Result of preparing one segment, applied to the timeline afterwards.
enum Prepared {
    Ready {
        clip: PathBuf,
        factor: f64,
        stretched: Option<PathBuf>,
    },
    Failed(DubError),
    Cancelled,
}

impl DubJob {
    pub fn new(
        ctx: JobContext,
        tool: Arc<dyn AudioTool>,
        muxer: Arc<dyn VideoMuxer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            ctx,
            tool,
            muxer,
            synthesizer,
            translator,
        }
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    /// Dubs `video` using segments from `transcript`.
    ///
    /// Per-segment failures leave that slot silent. Canvas, mix and remux
    /// failures, cancellation and rejected input fail the job.
    pub async fn run(
        &self,
        video: &Path,
        transcript: &dyn TranscriptSource,
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        let span = info_span!("job", id = %self.ctx.job_id, lang = %self.ctx.target_language);
        self.run_inner(video, transcript, cancel)
            .instrument(span)
            .await
            .inspect_err(|e| match e {
                DubError::Cancelled => warn!(job = %self.ctx.job_id, "job cancelled"),
                e => error!(job = %self.ctx.job_id, error = %e, "job failed"),
            })
    }

    async fn run_inner(
        &self,
        video: &Path,
        transcript: &dyn TranscriptSource,
        cancel: &CancellationToken,
    ) -> Result<JobReport> {
        let video_duration = self.check_video(video).await?;

        let raw = transcript.fetch().await?;
        let mut timeline = Timeline::from_raw(raw);
        info!(
            segments = timeline.len(),
            rejected = timeline.rejected().len(),
            duration = timeline.total_duration(),
            "built timeline"
        );

        self.translate(&mut timeline, cancel).await?;

        let workspace = JobWorkspace::create(&self.ctx).await?;
        self.prepare(&mut timeline, &workspace, cancel).await?;

        let canvas = TrackComposer::new(self.tool.as_ref(), &self.ctx)
            .compose(&mut timeline, &workspace, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(DubError::Cancelled);
        }
        let staged = Mixer::new(self.tool.as_ref(), self.muxer.as_ref(), &self.ctx)
            .assemble(video, video_duration, &canvas, &workspace)
            .await?;

        if cancel.is_cancelled() {
            return Err(DubError::Cancelled);
        }
        let output = self.ctx.output_path();
        publish(&staged, &output).await?;

        let report = JobReport::new(&self.ctx.job_id, output, canvas.duration(), &timeline);
        info!(
            output = %report.output.display(),
            placed = report.placed(),
            skipped = report.skipped(),
            "job finished"
        );
        Ok(report)
    }

    /// Returns the video length, which the final audio track is fitted to.
    async fn check_video(&self, video: &Path) -> Result<f64> {
        let duration = self.muxer.video_duration(video).await?;
        let (min, max) = self.ctx.video_duration_range;
        if !(min..=max).contains(&duration) {
            return Err(DubError::VideoRejected { duration, min, max });
        }
        Ok(duration)
    }

    /// Replaces each segment's text with its translation where one is available.
    async fn translate(&self, timeline: &mut Timeline, cancel: &CancellationToken) -> Result<()> {
        let source = self.ctx.source_language.as_str();
        let target = self.ctx.target_language.as_str();
        let translator = self.translator.as_ref();

        let pending: Vec<(usize, String)> = timeline
            .iter()
            .filter(|s| s.has_speech())
            .map(|s| (s.index(), s.source_text().to_string()))
            .collect();

        let translated: Vec<Option<(usize, String)>> = stream::iter(pending)
            .map(|(index, text)| async move {
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    text = translate_or_original(translator, &text, source, target) => {
                        Some((index, text))
                    }
                }
            })
            .buffer_unordered(self.ctx.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(DubError::Cancelled);
        }

        for (index, text) in translated.into_iter().flatten() {
            if let Some(segment) = timeline.get_mut(index) {
                segment.set_translated_text(&text)?;
            }
        }
        Ok(())
    }

    /// Synthesizes and tempo-adjusts every segment with text, at most
    /// `concurrency` at a time. Segments without text are skipped here and
    /// never reach the synthesizer.
    async fn prepare(
        &self,
        timeline: &mut Timeline,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut work = Vec::new();
        for segment in timeline.iter_mut() {
            if segment.has_speech() {
                work.push(SegmentWork {
                    index: segment.index(),
                    slot_width: segment.slot_width(),
                    text: segment.text().to_string(),
                });
            } else {
                segment.mark_skipped("no text")?;
            }
        }

        let aligner = TempoAligner::new(self.ctx.tempo);
        let mut outcomes: Vec<(usize, Prepared)> = stream::iter(work)
            .map(|item| {
                let aligner = &aligner;
                async move {
                    let index = item.index;
                    (index, self.prepare_segment(item, aligner, workspace, cancel).await)
                }
            })
            .buffer_unordered(self.ctx.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(DubError::Cancelled);
        }

        outcomes.sort_by_key(|(index, _)| *index);
        for (index, outcome) in outcomes {
            let Some(segment) = timeline.get_mut(index) else {
                continue;
            };
            match outcome {
                Prepared::Ready {
                    clip,
                    factor,
                    stretched,
                } => {
                    segment.mark_synthesized(clip)?;
                    segment.mark_tempo_adjusted(factor, stretched)?;
                }
                Prepared::Failed(error) => {
                    warn!(segment = index, error = %error, "leaving slot silent");
                    segment.mark_skipped(error.to_string())?;
                }
                Prepared::Cancelled => return Err(DubError::Cancelled),
            }
        }
        Ok(())
    }

    async fn prepare_segment(
        &self,
        work: SegmentWork,
        aligner: &TempoAligner,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Prepared {
        if cancel.is_cancelled() {
            return Prepared::Cancelled;
        }

        let index = work.index;
        let clip = workspace.speech_clip(index);
        let synthesized = bounded(
            cancel,
            self.ctx.synth_timeout,
            "synthesis",
            self.synthesizer
                .synthesize(&work.text, &self.ctx.target_language, &clip),
        )
        .await;
        match synthesized {
            Ok(()) => {}
            Err(DubError::Cancelled) => return Prepared::Cancelled,
            Err(e) => {
                return Prepared::Failed(DubError::Synthesis {
                    index,
                    message: e.to_string(),
                });
            }
        }

        match self.stretch(&work, aligner, &clip, workspace, cancel).await {
            Ok((factor, stretched)) => Prepared::Ready {
                clip,
                factor,
                stretched,
            },
            Err(DubError::Cancelled) => Prepared::Cancelled,
            Err(e) => {
                warn!(segment = index, error = %e, "placing clip at original tempo");
                Prepared::Ready {
                    clip,
                    factor: 1.0,
                    stretched: None,
                }
            }
        }
    }

    /// Measures the clip and writes a tempo-adjusted copy.
    ///
    /// Returns the applied factor and the new clip, or no clip when the raw
    /// one already fits. Any error means the raw clip is placed unmodified.
    async fn stretch(
        &self,
        work: &SegmentWork,
        aligner: &TempoAligner,
        clip: &Path,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<(f64, Option<PathBuf>)> {
        let index = work.index;
        let stretch_error = |e: DubError| match e {
            DubError::Cancelled => DubError::Cancelled,
            other => DubError::Stretch {
                index,
                message: other.to_string(),
            },
        };

        let duration = bounded(
            cancel,
            self.ctx.stretch_timeout,
            "probe",
            self.tool.probe_duration(clip),
        )
        .await
        .map_err(stretch_error)?;

        let factor = aligner.align(work.slot_width, duration);
        debug!(segment = index, slot = work.slot_width, clip = duration, factor, "aligned tempo");
        if factor == 1.0 {
            return Ok((factor, None));
        }

        let stretched = workspace.stretched_clip(index);
        bounded(
            cancel,
            self.ctx.stretch_timeout,
            "stretch",
            self.tool.stretch(clip, factor, &stretched),
        )
        .await
        .map_err(stretch_error)?;
        Ok((factor, Some(stretched)))
    }
}

/// Awaits `operation` under a deadline, giving up early on cancellation.
async fn bounded<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    operation: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(DubError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(DubError::Timeout {
                operation: operation.to_string(),
                timeout,
            }),
        },
    }
}

/// Moves the staged file to `output`, replacing any earlier result.
///
/// Falls back to copy-then-rename when the workspace and output directory
/// are on different filesystems, so `output` never holds a partial file.
async fn publish(staged: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if tokio::fs::rename(staged, output).await.is_ok() {
        return Ok(());
    }

    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = output.with_file_name(format!(".{file_name}.partial"));
    tokio::fs::copy(staged, &partial).await?;
    if let Err(e) = tokio::fs::rename(&partial, output).await {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            warn!(path = %partial.display(), error = %cleanup, "failed to remove partial output");
        }
        return Err(e.into());
    }
    Ok(())
}
