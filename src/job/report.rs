//! Summary of a finished job.

use crate::timeline::{Segment, SegmentState, Timeline};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    pub index: usize,
    /// Offset the clip was placed at, in seconds.
    pub start: f64,
    pub end: f64,
    pub state: SegmentState,
    pub tempo_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl From<&Segment> for SegmentReport {
    fn from(segment: &Segment) -> Self {
        Self {
            index: segment.index(),
            start: segment.start(),
            end: segment.end(),
            state: segment.state(),
            tempo_factor: segment.tempo_factor(),
            skip_reason: segment.skip_reason().map(str::to_string),
        }
    }
}

/// What a successful job produced.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: String,
    pub output: PathBuf,
    /// Length of the composed dub canvas in seconds.
    pub canvas_duration: f64,
    /// Segments in timeline (start) order.
    pub segments: Vec<SegmentReport>,
    /// Input indices dropped for invalid timing.
    pub rejected: Vec<usize>,
}

impl JobReport {
    pub fn new(job_id: &str, output: PathBuf, canvas_duration: f64, timeline: &Timeline) -> Self {
        Self {
            job_id: job_id.to_string(),
            output,
            canvas_duration,
            segments: timeline.iter().map(SegmentReport::from).collect(),
            rejected: timeline.rejected().to_vec(),
        }
    }

    pub fn placed(&self) -> usize {
        self.count(SegmentState::Placed)
    }

    pub fn skipped(&self) -> usize {
        self.count(SegmentState::SkippedSilent)
    }

    pub fn segment(&self, index: usize) -> Option<&SegmentReport> {
        self.segments.iter().find(|s| s.index == index)
    }

    fn count(&self, state: SegmentState) -> usize {
        self.segments.iter().filter(|s| s.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::RawSegment;

    #[test]
    fn report_counts_states_and_keeps_rejections() {
        let mut timeline = Timeline::from_raw(vec![
            RawSegment::new(0.0, 1.0, "a"),
            RawSegment::new(2.0, 1.0, "bad"),
            RawSegment::new(1.0, 2.0, ""),
        ]);
        timeline.get_mut(2).unwrap().mark_skipped("no text").unwrap();

        let report = JobReport::new("job", PathBuf::from("out.mp4"), 2.5, &timeline);

        assert_eq!(report.rejected, vec![1]);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.placed(), 0);
        assert_eq!(report.segment(2).unwrap().skip_reason.as_deref(), Some("no text"));
    }

    #[test]
    fn report_serializes_states_in_snake_case() {
        let timeline = Timeline::from_raw(vec![RawSegment::new(0.0, 1.0, "a")]);
        let report = JobReport::new("job", PathBuf::from("out.mp4"), 1.5, &timeline);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["segments"][0]["state"], "pending");
        assert!(json["segments"][0].get("skip_reason").is_none());
    }
}
