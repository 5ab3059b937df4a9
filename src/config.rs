use crate::defaults;
use crate::error::{DubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub tempo: TempoConfig,
    pub jobs: JobsConfig,
    pub translate: TranslateConfig,
    pub synth: SynthConfig,
}

/// Audio track configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Gain applied to the original audio under the dub (0, 1].
    pub attenuation: f32,
    pub trailing_pad_secs: f64,
}

/// Tempo alignment bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TempoConfig {
    pub min_factor: f64,
    pub max_factor: f64,
    pub slot_epsilon_secs: f64,
}

/// Job execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_extension: String,
    pub concurrency: usize,
    pub synth_timeout_secs: u64,
    pub stretch_timeout_secs: u64,
    /// Upper bound for any single ffmpeg/ffprobe run.
    pub tool_timeout_secs: u64,
    pub keep_temp: bool,
    pub min_video_secs: f64,
    pub max_video_secs: f64,
}

/// Translation service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    /// LibreTranslate-compatible `/translate` URL. Unset means no translation.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub timeout_secs: u64,
}

/// Speech synthesizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthConfig {
    pub program: String,
    /// Argument templates; `{text}`, `{lang}` and `{output}` are substituted.
    pub args: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            attenuation: defaults::ATTENUATION,
            trailing_pad_secs: defaults::TRAILING_PAD_SECS,
        }
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_factor: defaults::MIN_TEMPO,
            max_factor: defaults::MAX_TEMPO,
            slot_epsilon_secs: defaults::SLOT_EPSILON_SECS,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        let data = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("dubsync");
        Self {
            work_dir: std::env::temp_dir().join("dubsync"),
            output_dir: data.join("dubs"),
            output_extension: defaults::OUTPUT_EXTENSION.to_string(),
            concurrency: defaults::CONCURRENCY,
            synth_timeout_secs: defaults::SYNTH_TIMEOUT_SECS,
            stretch_timeout_secs: defaults::STRETCH_TIMEOUT_SECS,
            tool_timeout_secs: defaults::TOOL_TIMEOUT_SECS,
            keep_temp: false,
            min_video_secs: defaults::MIN_VIDEO_SECS,
            max_video_secs: defaults::MAX_VIDEO_SECS,
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            source_language: defaults::SOURCE_LANGUAGE.to_string(),
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            timeout_secs: defaults::TRANSLATE_TIMEOUT_SECS,
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            program: defaults::SYNTH_PROGRAM.to_string(),
            args: defaults::SYNTH_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DubError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                DubError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(DubError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DUBSYNC_TARGET_LANGUAGE → translate.target_language
    /// - DUBSYNC_TRANSLATE_ENDPOINT → translate.endpoint
    /// - DUBSYNC_WORK_DIR → jobs.work_dir
    /// - DUBSYNC_OUTPUT_DIR → jobs.output_dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("DUBSYNC_TARGET_LANGUAGE")
            && !language.is_empty()
        {
            self.translate.target_language = language;
        }

        if let Ok(endpoint) = std::env::var("DUBSYNC_TRANSLATE_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.translate.endpoint = Some(endpoint);
        }

        if let Ok(dir) = std::env::var("DUBSYNC_WORK_DIR")
            && !dir.is_empty()
        {
            self.jobs.work_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("DUBSYNC_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.jobs.output_dir = PathBuf::from(dir);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/dubsync/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("dubsync").join("config.toml"))
            .ok_or_else(|| DubError::Other("Could not determine config directory".to_string()))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: impl Into<String>) -> Result<()> {
            Err(DubError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.into(),
            })
        }

        if self.audio.sample_rate == 0 {
            return invalid("audio.sample_rate", "must be positive");
        }
        if !(self.audio.attenuation > 0.0 && self.audio.attenuation <= 1.0) {
            return invalid(
                "audio.attenuation",
                format!("{} is outside (0, 1]", self.audio.attenuation),
            );
        }
        if !self.audio.trailing_pad_secs.is_finite() || self.audio.trailing_pad_secs < 0.0 {
            return invalid("audio.trailing_pad_secs", "must be zero or positive");
        }

        let tempo = &self.tempo;
        if !(tempo.min_factor > 0.0 && tempo.min_factor <= 1.0) {
            return invalid("tempo.min_factor", "must be in (0, 1]");
        }
        if !(tempo.max_factor >= 1.0 && tempo.max_factor.is_finite()) {
            return invalid("tempo.max_factor", "must be at least 1");
        }
        if !tempo.slot_epsilon_secs.is_finite() || tempo.slot_epsilon_secs < 0.0 {
            return invalid("tempo.slot_epsilon_secs", "must be zero or positive");
        }

        let jobs = &self.jobs;
        if jobs.concurrency == 0 {
            return invalid("jobs.concurrency", "must be at least 1");
        }
        for (key, secs) in [
            ("jobs.synth_timeout_secs", jobs.synth_timeout_secs),
            ("jobs.stretch_timeout_secs", jobs.stretch_timeout_secs),
            ("jobs.tool_timeout_secs", jobs.tool_timeout_secs),
            ("translate.timeout_secs", self.translate.timeout_secs),
        ] {
            if secs == 0 {
                return invalid(key, "must be at least 1 second");
            }
        }
        if jobs.output_extension.is_empty() || jobs.output_extension.contains(['/', '.']) {
            return invalid("jobs.output_extension", "must be a bare extension like \"mp4\"");
        }
        if !(jobs.min_video_secs >= 0.0 && jobs.min_video_secs <= jobs.max_video_secs) {
            return invalid(
                "jobs.min_video_secs",
                format!(
                    "{} must not exceed jobs.max_video_secs ({})",
                    jobs.min_video_secs, jobs.max_video_secs
                ),
            );
        }

        if self.translate.target_language.trim().is_empty() {
            return invalid("translate.target_language", "must not be empty");
        }
        if self.synth.program.trim().is_empty() {
            return invalid("synth.program", "must not be empty");
        }
        if !self.synth.args.iter().any(|a| a.contains("{output}")) {
            return invalid("synth.args", "must reference {output}");
        }

        Ok(())
    }
}
