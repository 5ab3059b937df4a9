//! A single timed utterance and its per-segment lifecycle.

use crate::error::{DubError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a segment is in the per-segment pipeline.
///
/// Happy path: `Pending → Synthesized → TempoAdjusted → Placed`.
/// Any non-terminal state may fall to `SkippedSilent`. Nothing leaves
/// `Placed` or `SkippedSilent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    Pending,
    Synthesized,
    TempoAdjusted,
    Placed,
    SkippedSilent,
}

impl SegmentState {
    /// Returns true for `Placed` and `SkippedSilent`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SegmentState::Placed | SegmentState::SkippedSilent)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SegmentState) -> bool {
        use SegmentState::*;
        match (self, next) {
            (Pending, Synthesized) => true,
            (Synthesized, TempoAdjusted) => true,
            (TempoAdjusted, Placed) => true,
            (from, SkippedSilent) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentState::Pending => "pending",
            SegmentState::Synthesized => "synthesized",
            SegmentState::TempoAdjusted => "tempo-adjusted",
            SegmentState::Placed => "placed",
            SegmentState::SkippedSilent => "skipped",
        };
        f.write_str(name)
    }
}

/// One timed utterance of the source video.
///
/// Timing and text are fixed at construction. The synthesized clip, the
/// tempo factor and the state are each set exactly once by the per-segment
/// pipeline through the `mark_*` methods.
#[derive(Debug, Clone)]
pub struct Segment {
    index: usize,
    start: f64,
    end: f64,
    source_text: String,
    translated_text: Option<String>,
    speech_clip: Option<PathBuf>,
    stretched_clip: Option<PathBuf>,
    tempo_factor: Option<f64>,
    state: SegmentState,
    skip_reason: Option<String>,
}

impl Segment {
    /// Creates a pending segment.
    ///
    /// Rejects timing where `end <= start`, non-finite values and negative
    /// starts. Text is trimmed; empty text is kept.
    pub fn new(index: usize, start: f64, end: f64, text: &str) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(DubError::Validation {
                index,
                message: format!("timing must be finite (start {start}, end {end})"),
            });
        }
        if start < 0.0 {
            return Err(DubError::Validation {
                index,
                message: format!("start ({start}) must not be negative"),
            });
        }
        if end <= start {
            return Err(DubError::Validation {
                index,
                message: format!("end ({end}) must be greater than start ({start})"),
            });
        }

        Ok(Self {
            index,
            start,
            end,
            source_text: text.trim().to_string(),
            translated_text: None,
            speech_clip: None,
            stretched_clip: None,
            tempo_factor: None,
            state: SegmentState::Pending,
            skip_reason: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Time budget the original utterance occupied (`end - start`).
    pub fn slot_width(&self) -> f64 {
        self.end - self.start
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Text to synthesize: the translation when present, else the source text.
    pub fn text(&self) -> &str {
        self.translated_text.as_deref().unwrap_or(&self.source_text)
    }

    /// False when the text is empty or whitespace; such segments are never synthesized.
    pub fn has_speech(&self) -> bool {
        !self.text().trim().is_empty()
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn speech_clip(&self) -> Option<&Path> {
        self.speech_clip.as_deref()
    }

    pub fn tempo_factor(&self) -> Option<f64> {
        self.tempo_factor
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// The clip folded into the canvas: the stretched clip when stretching
    /// succeeded, otherwise the raw synthesized clip.
    pub fn placement_clip(&self) -> Option<&Path> {
        self.stretched_clip.as_deref().or(self.speech_clip.as_deref())
    }

    /// Records the translated text. Only allowed once, while still pending.
    pub fn set_translated_text(&mut self, text: &str) -> Result<()> {
        if self.translated_text.is_some() || self.state != SegmentState::Pending {
            return Err(DubError::Other(format!(
                "segment {} translation already set",
                self.index
            )));
        }
        self.translated_text = Some(text.trim().to_string());
        Ok(())
    }

    /// `Pending → Synthesized`, recording the raw clip.
    pub fn mark_synthesized(&mut self, clip: PathBuf) -> Result<()> {
        self.transition(SegmentState::Synthesized)?;
        self.speech_clip = Some(clip);
        Ok(())
    }

    /// `Synthesized → TempoAdjusted`.
    ///
    /// `stretched` is `None` when stretching failed and the raw clip is placed unmodified.
    pub fn mark_tempo_adjusted(&mut self, factor: f64, stretched: Option<PathBuf>) -> Result<()> {
        self.transition(SegmentState::TempoAdjusted)?;
        self.tempo_factor = Some(factor);
        self.stretched_clip = stretched;
        Ok(())
    }

    /// `TempoAdjusted → Placed`.
    pub fn mark_placed(&mut self) -> Result<()> {
        self.transition(SegmentState::Placed)
    }

    /// Any non-terminal state `→ SkippedSilent`.
    pub fn mark_skipped(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(SegmentState::SkippedSilent)?;
        self.skip_reason = Some(reason.into());
        Ok(())
    }

    fn transition(&mut self, next: SegmentState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DubError::InvalidTransition {
                index: self.index,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_text_and_starts_pending() {
        let seg = Segment::new(0, 1.0, 2.5, "  hello world \n").unwrap();
        assert_eq!(seg.source_text(), "hello world");
        assert_eq!(seg.state(), SegmentState::Pending);
        assert!((seg.slot_width() - 1.5).abs() < 1e-9);
        assert!(seg.speech_clip().is_none());
        assert!(seg.tempo_factor().is_none());
    }

    #[test]
    fn new_rejects_end_before_or_at_start() {
        assert!(matches!(
            Segment::new(4, 2.0, 1.0, "x"),
            Err(DubError::Validation { index: 4, .. })
        ));
        assert!(Segment::new(4, 2.0, 2.0, "x").is_err());
    }

    #[test]
    fn new_rejects_non_finite_and_negative() {
        assert!(Segment::new(0, f64::NAN, 1.0, "x").is_err());
        assert!(Segment::new(0, 0.0, f64::INFINITY, "x").is_err());
        assert!(Segment::new(0, -0.5, 1.0, "x").is_err());
    }

    #[test]
    fn empty_text_is_kept_but_has_no_speech() {
        let seg = Segment::new(0, 0.0, 1.0, "   ").unwrap();
        assert_eq!(seg.source_text(), "");
        assert!(!seg.has_speech());
    }

    #[test]
    fn text_prefers_translation() {
        let mut seg = Segment::new(0, 0.0, 1.0, "hello").unwrap();
        assert_eq!(seg.text(), "hello");
        seg.set_translated_text(" مرحبا ").unwrap();
        assert_eq!(seg.text(), "مرحبا");
        assert_eq!(seg.source_text(), "hello");
        assert!(seg.set_translated_text("again").is_err());
    }

    #[test]
    fn happy_path_transitions() {
        let mut seg = Segment::new(2, 0.0, 2.0, "hi").unwrap();
        seg.mark_synthesized(PathBuf::from("seg_0002.wav")).unwrap();
        seg.mark_tempo_adjusted(0.5, Some(PathBuf::from("seg_0002_fixed.wav")))
            .unwrap();
        seg.mark_placed().unwrap();

        assert_eq!(seg.state(), SegmentState::Placed);
        assert_eq!(seg.tempo_factor(), Some(0.5));
        assert_eq!(seg.speech_clip(), Some(Path::new("seg_0002.wav")));
        assert_eq!(seg.placement_clip(), Some(Path::new("seg_0002_fixed.wav")));
    }

    #[test]
    fn stretch_fallback_places_raw_clip() {
        let mut seg = Segment::new(0, 0.0, 2.0, "hi").unwrap();
        seg.mark_synthesized(PathBuf::from("raw.wav")).unwrap();
        seg.mark_tempo_adjusted(1.3, None).unwrap();
        assert_eq!(seg.placement_clip(), Some(Path::new("raw.wav")));
    }

    #[test]
    fn terminal_states_cannot_be_left() {
        let mut seg = Segment::new(0, 0.0, 1.0, "hi").unwrap();
        seg.mark_skipped("synthesis failed").unwrap();
        assert_eq!(seg.skip_reason(), Some("synthesis failed"));
        assert!(seg.mark_synthesized(PathBuf::from("x.wav")).is_err());
        assert!(seg.mark_skipped("again").is_err());
        assert_eq!(seg.state(), SegmentState::SkippedSilent);
    }

    #[test]
    fn clip_is_set_exactly_once() {
        let mut seg = Segment::new(0, 0.0, 1.0, "hi").unwrap();
        seg.mark_synthesized(PathBuf::from("a.wav")).unwrap();
        let err = seg.mark_synthesized(PathBuf::from("b.wav")).unwrap_err();
        assert!(matches!(err, DubError::InvalidTransition { .. }));
        assert_eq!(seg.speech_clip(), Some(Path::new("a.wav")));
    }

    #[test]
    fn skipping_steps_is_rejected() {
        let mut seg = Segment::new(0, 0.0, 1.0, "hi").unwrap();
        assert!(seg.mark_placed().is_err());
        assert!(seg.mark_tempo_adjusted(1.0, None).is_err());
        assert_eq!(seg.state(), SegmentState::Pending);
    }

    #[test]
    fn transition_table() {
        use SegmentState::*;
        assert!(Pending.can_transition_to(SkippedSilent));
        assert!(TempoAdjusted.can_transition_to(SkippedSilent));
        assert!(!Placed.can_transition_to(SkippedSilent));
        assert!(!SkippedSilent.can_transition_to(Placed));
        assert!(!Synthesized.can_transition_to(Pending));
    }
}
