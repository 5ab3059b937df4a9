//! Tempo factor computation.
//!
//! Pure arithmetic: no I/O. Callers hand the returned factor to
//! [`AudioTool::stretch`](crate::media::AudioTool::stretch).

use crate::defaults;

/// Clamp range and degenerate-slot threshold for tempo alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoBounds {
    pub min_factor: f64,
    pub max_factor: f64,
    /// Slots at or below this width (seconds) are never stretched.
    pub slot_epsilon: f64,
}

impl Default for TempoBounds {
    fn default() -> Self {
        Self {
            min_factor: defaults::MIN_TEMPO,
            max_factor: defaults::MAX_TEMPO,
            slot_epsilon: defaults::SLOT_EPSILON_SECS,
        }
    }
}

/// Computes the speed a raw clip should be played at to fill its slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempoAligner {
    bounds: TempoBounds,
}

impl TempoAligner {
    pub fn new(bounds: TempoBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> TempoBounds {
        self.bounds
    }

    /// Tempo factor for a clip of `raw_clip_duration` seconds in a slot of
    /// `slot_width` seconds.
    ///
    /// A factor above 1 speeds the clip up. The desired factor is
    /// `slot_width / raw_clip_duration`, clamped to the bounds; whatever the
    /// clamp cuts off is left as drift. Degenerate slots, zero-length clips
    /// and non-finite inputs yield `1.0`.
    pub fn align(&self, slot_width: f64, raw_clip_duration: f64) -> f64 {
        if slot_width.is_nan()
            || slot_width <= self.bounds.slot_epsilon
            || !raw_clip_duration.is_finite()
        {
            return 1.0;
        }

        let raw_speed = raw_clip_duration / slot_width;
        let desired = if raw_speed > 0.0 { 1.0 / raw_speed } else { 1.0 };

        desired.clamp(self.bounds.min_factor, self.bounds.max_factor)
    }
}
