//! Default configuration constants for dubsync.
//!
//! Shared between the TOML config defaults and the job context so both agree.

/// Default working sample rate in Hz for every intermediate clip.
///
/// 16kHz mono is plenty for synthesized speech.
pub const SAMPLE_RATE: u32 = 16000;

/// Silence appended after the last segment end, in seconds.
pub const TRAILING_PAD_SECS: f64 = 0.5;

/// Gain applied to the original audio when mixed under the dub track.
pub const ATTENUATION: f32 = 0.15;

/// Lowest tempo factor a clip is stretched by (half speed).
pub const MIN_TEMPO: f64 = 0.5;

/// Highest tempo factor a clip is stretched by (double speed).
pub const MAX_TEMPO: f64 = 2.0;

/// Slots narrower than this (seconds) are not stretched at all.
pub const SLOT_EPSILON_SECS: f64 = 0.01;

/// Number of segments prepared concurrently.
pub const CONCURRENCY: usize = 4;

/// Per-call timeout for speech synthesis, in seconds.
pub const SYNTH_TIMEOUT_SECS: u64 = 60;

/// Per-call timeout for tempo stretching, in seconds.
pub const STRETCH_TIMEOUT_SECS: u64 = 30;

/// Timeout for every other media tool call (probe, overlay, mix, remux), in seconds.
pub const TOOL_TIMEOUT_SECS: u64 = 300;

/// Source language of the transcript.
pub const SOURCE_LANGUAGE: &str = "en";

/// Language the video is dubbed into.
pub const TARGET_LANGUAGE: &str = "ar";

/// Timeout for one translation request, in seconds.
pub const TRANSLATE_TIMEOUT_SECS: u64 = 30;

/// Default external speech synthesizer.
pub const SYNTH_PROGRAM: &str = "espeak-ng";

/// Default synthesizer arguments; `{lang}`, `{output}` and `{text}` are substituted.
pub const SYNTH_ARGS: &[&str] = &["-v", "{lang}", "-w", "{output}", "{text}"];

/// Container extension of the finished asset.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Shortest source video accepted, in seconds.
pub const MIN_VIDEO_SECS: f64 = 5.0;

/// Longest source video accepted, in seconds.
pub const MAX_VIDEO_SECS: f64 = 60.0;
