//! Command-line interface for dubsync
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Timing-aligned dubbing for short videos
#[derive(Parser, Debug)]
#[command(name = "dubsync", version, about = "Timing-aligned dubbing for short videos")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: job progress, -vv: per-segment diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a timeout string into seconds.
///
/// Accepts bare numbers (seconds) and anything `humantime` understands
/// (`30s`, `2m`, `1m30s`).
fn parse_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

/// Parse the attenuation gain, which must lie in (0, 1].
fn parse_attenuation(s: &str) -> Result<f32, String> {
    let value: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(format!("{value} is outside (0, 1]"))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dub a video using a timed transcript (SRT)
    Dub {
        /// Source video file
        #[arg(long, value_name = "FILE")]
        video: PathBuf,

        /// Transcript in SubRip (.srt) format
        #[arg(long, value_name = "FILE")]
        transcript: PathBuf,

        /// Job id used for the workspace and output name (default: video file stem)
        #[arg(long, value_name = "ID")]
        job_id: Option<String>,

        /// Target language code (e.g., ar, de, fr)
        #[arg(long, value_name = "LANG")]
        target: Option<String>,

        /// Directory for the finished video
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Gain applied to the original audio under the dub, in (0, 1]
        #[arg(long, value_name = "GAIN", value_parser = parse_attenuation)]
        attenuation: Option<f32>,

        /// Number of segments synthesized at once
        #[arg(long, short = 'j', value_name = "N")]
        concurrency: Option<usize>,

        /// Per-clip synthesis timeout. Examples: 60, 45s, 2m
        #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
        synth_timeout: Option<u64>,

        /// Keep intermediate files after the job finishes
        #[arg(long)]
        keep_temp: bool,

        /// Print the job report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tempo factor for a clip in a slot (seconds)
    Align {
        /// Slot width in seconds
        #[arg(long, value_name = "SECONDS")]
        slot: f64,

        /// Raw clip duration in seconds
        #[arg(long, value_name = "SECONDS")]
        clip: f64,
    },

    /// Check external tool dependencies
    Check,

    /// View and manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
