//! Ordered timeline of timed text segments.
//!
//! Built once per job from transcript triples. Invalid triples are dropped
//! with a warning; every surviving segment keeps the index it had in the
//! input so that later stages can refer to it stably.

pub mod segment;

pub use segment::{Segment, SegmentState};

use tracing::warn;

/// A `(start, end, text)` triple as delivered by a transcript source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Segments sorted by start time (stable; ties keep input order).
///
/// Segments may overlap.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    segments: Vec<Segment>,
    /// Input index → position in `segments`; `None` for rejected triples.
    positions: Vec<Option<usize>>,
    rejected: Vec<usize>,
}

impl Timeline {
    /// Validates and orders transcript triples.
    ///
    /// A triple with `end <= start` is dropped and logged; it does not fail
    /// the timeline. The input position becomes the segment index.
    pub fn from_raw(raw: impl IntoIterator<Item = RawSegment>) -> Self {
        let mut segments = Vec::new();
        let mut rejected = Vec::new();
        let mut input_len = 0;

        for (index, triple) in raw.into_iter().enumerate() {
            input_len = index + 1;
            match Segment::new(index, triple.start, triple.end, &triple.text) {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    warn!(segment = index, error = %e, "dropping invalid segment");
                    rejected.push(index);
                }
            }
        }

        // `sort_by` is stable and segments are already in index order.
        segments.sort_by(|a, b| a.start().total_cmp(&b.start()));

        let mut positions = vec![None; input_len];
        for (position, segment) in segments.iter().enumerate() {
            positions[segment.index()] = Some(position);
        }

        Self {
            segments,
            positions,
            rejected,
        }
    }

    /// Latest segment end, or 0 for an empty timeline.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(Segment::end).fold(0.0, f64::max)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in start order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.iter_mut()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Looks a segment up by its input index.
    pub fn get(&self, index: usize) -> Option<&Segment> {
        let position = (*self.positions.get(index)?)?;
        self.segments.get(position)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Segment> {
        let position = (*self.positions.get(index)?)?;
        self.segments.get_mut(position)
    }

    /// Input indices of the triples that failed validation.
    pub fn rejected(&self) -> &[usize] {
        &self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(start: f64, end: f64, text: &str) -> RawSegment {
        RawSegment::new(start, end, text)
    }

    #[test]
    fn sorts_by_start_keeping_indices() {
        let timeline = Timeline::from_raw(vec![
            raw(5.0, 6.0, "c"),
            raw(0.0, 1.0, "a"),
            raw(2.0, 3.0, "b"),
        ]);

        let order: Vec<usize> = timeline.iter().map(Segment::index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(timeline.get(0).unwrap().source_text(), "c");
    }

    #[test]
    fn ties_are_broken_by_index() {
        let timeline = Timeline::from_raw(vec![
            raw(1.0, 4.0, "first"),
            raw(0.0, 1.0, "zero"),
            raw(1.0, 2.0, "second"),
        ]);
        let order: Vec<usize> = timeline.iter().map(Segment::index).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn invalid_triples_are_dropped_without_shifting_indices() {
        let timeline = Timeline::from_raw(vec![
            raw(0.0, 1.0, "ok"),
            raw(3.0, 2.0, "backwards"),
            raw(4.0, 5.0, "later"),
        ]);

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.rejected(), &[1]);
        assert!(timeline.get(1).is_none());
        assert_eq!(timeline.get(2).unwrap().source_text(), "later");
    }

    #[test]
    fn empty_text_is_preserved() {
        let timeline = Timeline::from_raw(vec![raw(0.0, 1.0, "  "), raw(1.0, 2.0, "x")]);
        assert_eq!(timeline.len(), 2);
        assert!(!timeline.get(0).unwrap().has_speech());
    }

    #[test]
    fn total_duration_is_max_end() {
        let timeline = Timeline::from_raw(vec![
            raw(0.0, 9.0, "long"),
            raw(1.0, 2.0, "short"),
            raw(3.0, 4.5, "mid"),
        ]);
        assert_eq!(timeline.total_duration(), 9.0);
    }

    #[test]
    fn empty_timeline_has_zero_duration() {
        let timeline = Timeline::from_raw(Vec::new());
        assert!(timeline.is_empty());
        assert_eq!(timeline.total_duration(), 0.0);
        assert!(timeline.get(0).is_none());
    }

    #[test]
    fn get_mut_reaches_sorted_segment() {
        let mut timeline = Timeline::from_raw(vec![raw(2.0, 3.0, "b"), raw(0.0, 1.0, "a")]);
        timeline
            .get_mut(0)
            .unwrap()
            .mark_skipped("test")
            .unwrap();
        assert_eq!(timeline.segments()[1].state(), SegmentState::SkippedSilent);
    }
}
