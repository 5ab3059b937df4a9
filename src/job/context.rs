//! Per-job immutable settings and the job's private scratch directory.

use crate::config::Config;
use crate::error::{DubError, Result};
use crate::sync::tempo::TempoBounds;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Everything a job needs to know, fixed for the job's lifetime.
///
/// Built once from [`Config`] and shared by reference with every stage;
/// nothing in the engine reads global state.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Namespace for intermediate files and the output name (e.g. the source video id).
    pub job_id: String,
    pub sample_rate: u32,
    /// Silence kept after the last segment end, in seconds.
    pub trailing_pad: f64,
    /// Gain applied to the original audio under the dub.
    pub attenuation: f32,
    pub tempo: TempoBounds,
    /// Maximum number of segments prepared at once.
    pub concurrency: usize,
    pub synth_timeout: Duration,
    pub stretch_timeout: Duration,
    pub source_language: String,
    pub target_language: String,
    pub work_root: PathBuf,
    pub output_dir: PathBuf,
    pub output_extension: String,
    pub keep_temp: bool,
    /// Accepted source video length range in seconds.
    pub video_duration_range: (f64, f64),
}

impl JobContext {
    pub fn from_config(job_id: &str, config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            job_id: sanitize_job_id(job_id)?,
            sample_rate: config.audio.sample_rate,
            trailing_pad: config.audio.trailing_pad_secs,
            attenuation: config.audio.attenuation,
            tempo: TempoBounds {
                min_factor: config.tempo.min_factor,
                max_factor: config.tempo.max_factor,
                slot_epsilon: config.tempo.slot_epsilon_secs,
            },
            concurrency: config.jobs.concurrency,
            synth_timeout: Duration::from_secs(config.jobs.synth_timeout_secs),
            stretch_timeout: Duration::from_secs(config.jobs.stretch_timeout_secs),
            source_language: config.translate.source_language.clone(),
            target_language: config.translate.target_language.clone(),
            work_root: config.jobs.work_dir.clone(),
            output_dir: config.jobs.output_dir.clone(),
            output_extension: config.jobs.output_extension.clone(),
            keep_temp: config.jobs.keep_temp,
            video_duration_range: (config.jobs.min_video_secs, config.jobs.max_video_secs),
        })
    }

    /// Deterministic location of the finished asset, always directly
    /// inside `output_dir`.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_dub.{}",
            self.job_id,
            path_component(&self.target_language),
            self.output_extension
        ))
    }

    /// Canvas length for a timeline of `total_duration` seconds.
    pub fn canvas_duration(&self, total_duration: f64) -> f64 {
        total_duration + self.trailing_pad
    }
}

/// Replaces everything but `[A-Za-z0-9._-]` so `raw` can't leave its directory.
fn path_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Keeps job ids usable as a single path component.
fn sanitize_job_id(job_id: &str) -> Result<String> {
    let cleaned = path_component(job_id);

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(DubError::ConfigInvalidValue {
            key: "job_id".to_string(),
            message: format!("{job_id:?} is not a usable job id"),
        });
    }
    Ok(cleaned)
}

/// Workspace directories claimed by jobs running in this process.
static ACTIVE_WORKSPACES: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

const OWNER_FILE: &str = ".owner";

/// Marks a workspace directory as in use until dropped.
#[derive(Debug)]
struct WorkspaceClaim(PathBuf);

impl WorkspaceClaim {
    fn acquire(dir: &Path) -> Result<Self> {
        let mut active = ACTIVE_WORKSPACES
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if !active.insert(dir.to_path_buf()) {
            return Err(DubError::WorkspaceBusy {
                dir: dir.to_path_buf(),
            });
        }
        Ok(Self(dir.to_path_buf()))
    }
}

impl Drop for WorkspaceClaim {
    fn drop(&mut self) {
        let mut active = ACTIVE_WORKSPACES
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        active.remove(&self.0);
    }
}

/// Pid recorded in a workspace by another process that is still running.
async fn foreign_owner(dir: &Path) -> Option<u32> {
    let content = tokio::fs::read_to_string(dir.join(OWNER_FILE)).await.ok()?;
    let pid: u32 = content.trim().parse().ok()?;
    let alive = Path::new("/proc").join(pid.to_string()).exists();
    (pid != std::process::id() && alive).then_some(pid)
}

/// Scratch directory `<work_root>/<job_id>/` holding every intermediate file.
///
/// Only one job may use a workspace at a time: a second job with the same id
/// fails with [`DubError::WorkspaceBusy`] while the first is running, in
/// this process or another one. Removed on drop unless the job asked to keep it.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
    keep: bool,
    _claim: WorkspaceClaim,
}

impl JobWorkspace {
    /// Creates a fresh workspace, clearing leftovers from an earlier,
    /// finished run of the same job.
    pub async fn create(ctx: &JobContext) -> Result<Self> {
        let dir = ctx.work_root.join(&ctx.job_id);
        let claim = WorkspaceClaim::acquire(&dir)?;

        if tokio::fs::try_exists(&dir).await? {
            if let Some(pid) = foreign_owner(&dir).await {
                debug!(dir = %dir.display(), pid, "workspace owned by a running process");
                return Err(DubError::WorkspaceBusy { dir });
            }
            debug!(dir = %dir.display(), "clearing stale workspace");
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(OWNER_FILE), std::process::id().to_string()).await?;

        Ok(Self {
            dir,
            keep: ctx.keep_temp,
            _claim: claim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Raw synthesized clip of a segment.
    pub fn speech_clip(&self, index: usize) -> PathBuf {
        self.dir.join(format!("seg_{index:04}.wav"))
    }

    /// Tempo-adjusted clip of a segment.
    pub fn stretched_clip(&self, index: usize) -> PathBuf {
        self.dir.join(format!("seg_{index:04}_fixed.wav"))
    }

    /// Canvas buffers; the fold alternates between two files.
    pub fn canvas(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("canvas_{}.wav", generation % 2))
    }

    pub fn original_audio(&self) -> PathBuf {
        self.dir.join("original.wav")
    }

    pub fn mixed_audio(&self) -> PathBuf {
        self.dir.join("mixed.wav")
    }

    /// Remux target; only moved to the output path once complete.
    pub fn staged_output(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("dubbed.{extension}"))
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove job workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(root: &Path, job_id: &str) -> JobContext {
        let mut config = Config::default();
        config.jobs.work_dir = root.join("work");
        config.jobs.output_dir = root.join("out");
        JobContext::from_config(job_id, &config).unwrap()
    }

    #[test]
    fn context_carries_config_values() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), "abc123");
        assert_eq!(ctx.sample_rate, 16000);
        assert_eq!(ctx.attenuation, 0.15);
        assert_eq!(ctx.tempo, TempoBounds::default());
        assert_eq!(ctx.canvas_duration(10.0), 10.5);
    }

    #[test]
    fn output_path_is_derived_from_job_id() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), "dQw4w9WgXcQ");
        assert_eq!(
            ctx.output_path(),
            dir.path().join("out").join("dQw4w9WgXcQ_ar_dub.mp4")
        );
    }

    #[test]
    fn output_path_stays_inside_output_dir() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(dir.path(), "clip");
        ctx.target_language = "ar/../../x".to_string();

        let path = ctx.output_path();
        assert_eq!(path.parent(), Some(dir.path().join("out").as_path()));
        assert_eq!(path.file_name().unwrap(), "clip_ar_.._.._x_dub.mp4");
    }

    #[test]
    fn job_id_is_sanitized() {
        assert_eq!(sanitize_job_id("a/b c").unwrap(), "a_b_c");
        assert_eq!(sanitize_job_id(" id-1.x ").unwrap(), "id-1.x");
        assert!(sanitize_job_id("   ").is_err());
        assert!(sanitize_job_id("..").is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = Config::default();
        config.audio.attenuation = 0.0;
        assert!(JobContext::from_config("job", &config).is_err());
    }

    #[tokio::test]
    async fn workspaces_are_namespaced_per_job() {
        let dir = TempDir::new().unwrap();
        let a = JobWorkspace::create(&context(dir.path(), "video-a"))
            .await
            .unwrap();
        let b = JobWorkspace::create(&context(dir.path(), "video-b"))
            .await
            .unwrap();

        assert_ne!(a.speech_clip(0), b.speech_clip(0));
        assert!(a.speech_clip(3).ends_with("video-a/seg_0003.wav"));
        assert!(a.path().is_dir());
    }

    #[tokio::test]
    async fn canvas_alternates_between_two_files() {
        let dir = TempDir::new().unwrap();
        let ws = JobWorkspace::create(&context(dir.path(), "job"))
            .await
            .unwrap();
        assert_eq!(ws.canvas(0), ws.canvas(2));
        assert_ne!(ws.canvas(0), ws.canvas(1));
    }

    #[tokio::test]
    async fn workspace_is_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let ws = JobWorkspace::create(&context(dir.path(), "job"))
            .await
            .unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(path.join("junk.wav"), b"x").unwrap();

        drop(ws);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn kept_workspace_survives_drop() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(dir.path(), "job");
        ctx.keep_temp = true;
        let ws = JobWorkspace::create(&ctx).await.unwrap();
        let path = ws.path().to_path_buf();

        drop(ws);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn stale_workspace_is_cleared() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), "job");
        let stale = ctx.work_root.join("job");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("seg_0000.wav"), b"old").unwrap();

        let ws = JobWorkspace::create(&ctx).await.unwrap();
        assert!(!ws.speech_clip(0).exists());
    }

    #[tokio::test]
    async fn second_job_with_same_id_is_refused() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), "job");
        let first = JobWorkspace::create(&ctx).await.unwrap();
        std::fs::write(first.speech_clip(0), b"in progress").unwrap();

        let err = JobWorkspace::create(&ctx).await.unwrap_err();
        assert!(matches!(err, DubError::WorkspaceBusy { .. }));
        assert!(first.speech_clip(0).exists());

        drop(first);
        let again = JobWorkspace::create(&ctx).await.unwrap();
        assert!(!again.speech_clip(0).exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn workspace_of_running_process_is_not_cleared() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), "job");
        let mut other = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let taken = ctx.work_root.join("job");
        std::fs::create_dir_all(&taken).unwrap();
        std::fs::write(taken.join(OWNER_FILE), other.id().to_string()).unwrap();
        std::fs::write(taken.join("seg_0000.wav"), b"theirs").unwrap();

        let result = JobWorkspace::create(&ctx).await;
        other.kill().unwrap();
        other.wait().unwrap();

        assert!(matches!(result, Err(DubError::WorkspaceBusy { .. })));
        assert!(taken.join("seg_0000.wav").exists());
    }
}
