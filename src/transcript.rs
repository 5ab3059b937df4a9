//! Transcript sources.
//!
//! A transcript source hands over the whole ordered list of timed triples
//! for one video, or fails as a whole.

use crate::error::{DubError, Result};
use crate::timeline::RawSegment;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Yields the timed utterances of one video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawSegment>>;
}

/// SubRip (`.srt`) file on disk.
#[derive(Debug, Clone)]
pub struct SrtFile {
    path: PathBuf,
}

impl SrtFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TranscriptSource for SrtFile {
    async fn fetch(&self) -> Result<Vec<RawSegment>> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| DubError::Transcript {
                    message: format!("Failed to read {}: {}", self.path.display(), e),
                })?;
        parse_srt(&contents)
    }
}

/// In-memory transcript, mainly for tests and library callers.
#[derive(Debug, Clone, Default)]
pub struct StaticTranscript {
    segments: Vec<RawSegment>,
}

impl StaticTranscript {
    pub fn new(segments: Vec<RawSegment>) -> Self {
        Self { segments }
    }
}

#[async_trait]
impl TranscriptSource for StaticTranscript {
    async fn fetch(&self) -> Result<Vec<RawSegment>> {
        Ok(self.segments.clone())
    }
}

/// Parses SubRip text into raw triples, in file order.
///
/// Blocks are separated by blank lines. Each block is a counter line, a
/// `start --> end` line and one or more text lines (joined with spaces).
/// A block whose timing line is missing or malformed fails the whole parse.
pub fn parse_srt(contents: &str) -> Result<Vec<RawSegment>> {
    let normalized = contents.replace("\r\n", "\n");
    let normalized = normalized.trim_start_matches('\u{feff}');

    let mut segments = Vec::new();
    for (block_no, block) in normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .enumerate()
    {
        let mut lines = block.lines();
        let mut timing = lines.next().unwrap_or_default();
        // The counter line is optional in practice; accept blocks starting at the timing line.
        if !timing.contains("-->") {
            timing = lines.next().unwrap_or_default();
        }

        let (start, end) = parse_timing_line(timing).ok_or_else(|| DubError::Transcript {
            message: format!("block {}: malformed timing line {:?}", block_no + 1, timing),
        })?;

        let text = lines
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        segments.push(RawSegment::new(start, end, text));
    }

    Ok(segments)
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, end) = line.split_once("-->")?;
    // Some writers append position hints after the end timestamp.
    let end = end.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// `HH:MM:SS,mmm` (or `.` as the millisecond separator) to seconds.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let mut parts = ts.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let rest = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }

    let (secs, millis) = match rest.split_once([',', '.']) {
        Some((s, ms)) => (s, ms),
        None => (rest, "0"),
    };
    let secs: u64 = secs.parse().ok()?;
    let millis: u64 = millis.parse().ok()?;
    if minutes >= 60 || secs >= 60 || millis >= 1000 {
        return None;
    }

    Some((hours * 3600 + minutes * 60 + secs) as f64 + millis as f64 / 1000.0)
}
