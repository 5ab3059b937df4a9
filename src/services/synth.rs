//! Text-to-speech collaborators.

use crate::defaults;
use crate::error::{DubError, Result};
use crate::media::command::run_tool;
use crate::media::wav::write_clip;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Produces one speech clip per call.
///
/// Callers never submit empty or whitespace-only text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speaks `text` in `language`, writing an audio file to `output`.
    async fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Runs an external TTS program once per clip.
///
/// Arguments are templates: `{text}`, `{lang}` and `{output}` are replaced
/// per call. Text is passed as a single argument, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(
            defaults::SYNTH_PROGRAM,
            defaults::SYNTH_ARGS.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(defaults::SYNTH_TIMEOUT_SECS),
        )
    }
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn render_args(&self, text: &str, language: &str, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{lang}", language)
                    .replace("{output}", &output)
                    .replace("{text}", text)
            })
            .collect()
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()> {
        let args = self.render_args(text, language, output);
        run_tool(&self.program, &args, self.timeout).await?;

        if !tokio::fs::try_exists(output).await? {
            return Err(DubError::Other(format!(
                "{} exited successfully but wrote no file at {}",
                self.program,
                output.display()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Mock synthesizer for testing.
///
/// Writes a constant-amplitude WAV whose length is set per text (default
/// one second). Specific texts can be made to fail or to hang.
#[derive(Debug)]
pub struct MockSynthesizer {
    sample_rate: u32,
    amplitude: i16,
    default_secs: f64,
    durations: HashMap<String, f64>,
    failures: Vec<String>,
    delay: Option<(String, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl MockSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            amplitude: 1000,
            default_secs: 1.0,
            durations: HashMap::new(),
            failures: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sample value of every generated clip.
    pub fn with_amplitude(mut self, amplitude: i16) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Clip length for a specific text.
    pub fn with_duration(mut self, text: &str, secs: f64) -> Self {
        self.durations.insert(text.to_string(), secs);
        self
    }

    /// Fail whenever `text` is synthesized.
    pub fn with_failure(mut self, text: &str) -> Self {
        self.failures.push(text.to_string());
        self
    }

    /// Sleep for `delay` before synthesizing `text`.
    pub fn with_delay(mut self, text: &str, delay: Duration) -> Self {
        self.delay = Some((text.to_string(), delay));
        self
    }

    /// Texts submitted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str, output: &Path) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }

        if let Some((slow_text, delay)) = &self.delay
            && slow_text == text
        {
            tokio::time::sleep(*delay).await;
        }

        if self.failures.iter().any(|f| f == text) {
            return Err(DubError::Other("mock synthesis failure".to_string()));
        }

        let secs = self.durations.get(text).copied().unwrap_or(self.default_secs);
        let len = (secs * f64::from(self.sample_rate)).round() as usize;
        write_clip(output, self.sample_rate, &vec![self.amplitude; len])
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::wav::read_clip;
    use tempfile::TempDir;

    #[test]
    fn render_args_substitutes_placeholders() {
        let synth = CommandSynthesizer::default();
        let args = synth.render_args("hello {world}", "ar", Path::new("/tmp/seg_0001.wav"));
        assert_eq!(
            args,
            vec!["-v", "ar", "-w", "/tmp/seg_0001.wav", "hello {world}"]
        );
    }

    #[test]
    fn render_args_keeps_text_as_one_argument() {
        let synth = CommandSynthesizer::new(
            "gtts-cli",
            vec!["--lang".into(), "{lang}".into(), "--output".into(), "{output}".into(), "{text}".into()],
            Duration::from_secs(5),
        );
        let args = synth.render_args("a; rm -rf /", "en", Path::new("o.mp3"));
        assert_eq!(args.last().map(String::as_str), Some("a; rm -rf /"));
        assert_eq!(args.len(), 5);
    }

    #[tokio::test]
    async fn missing_program_fails() {
        let dir = TempDir::new().unwrap();
        let synth = CommandSynthesizer::new(
            "dubsync-no-such-tts",
            vec!["{text}".into()],
            Duration::from_secs(1),
        );
        let result = synth
            .synthesize("hi", "en", &dir.path().join("out.wav"))
            .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn program_that_writes_nothing_fails() {
        let dir = TempDir::new().unwrap();
        let synth = CommandSynthesizer::new("true", vec![], Duration::from_secs(5));
        let result = synth
            .synthesize("hi", "en", &dir.path().join("out.wav"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mock_writes_clip_of_configured_length() {
        let dir = TempDir::new().unwrap();
        let synth = MockSynthesizer::new(1000)
            .with_amplitude(7)
            .with_duration("long", 2.5);
        let out = dir.path().join("clip.wav");

        synth.synthesize("long", "ar", &out).await.unwrap();

        let clip = read_clip(&out).unwrap();
        assert_eq!(clip.samples.len(), 2500);
        assert!(clip.samples.iter().all(|&s| s == 7));
        assert_eq!(synth.calls(), vec!["long"]);
    }

    #[tokio::test]
    async fn mock_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let synth = MockSynthesizer::new(1000).with_failure("bad");
        let out = dir.path().join("clip.wav");

        assert!(synth.synthesize("bad", "ar", &out).await.is_err());
        assert!(!out.exists());
    }
}
