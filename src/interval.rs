//! Tempo to beat-time interval conversion

use crate::config::{GRADATIONS_PER_QUARTER, STOPPED_INTERVAL};

/// Converts a tempo into the microseconds between beat-time increments.
///
/// The float conversion runs on every slow tick, so the last input is cached and an unchanged
/// tempo returns the cached interval without recomputing.
#[derive(Debug, Clone)]
pub struct IntervalConverter {
    last_exact_bpm: f32,
    micros_per_gradation: u16,
    conversions: u32,
}

impl Default for IntervalConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalConverter {
    pub fn new() -> Self {
        Self {
            last_exact_bpm: 0.0,
            micros_per_gradation: STOPPED_INTERVAL,
            conversions: 0,
        }
    }

    /// Current interval; `STOPPED_INTERVAL` means the tempo is 0 BPM
    pub fn interval(&self) -> u16 {
        self.micros_per_gradation
    }

    pub fn last_exact_bpm(&self) -> f32 {
        self.last_exact_bpm
    }

    /// Number of conversions actually performed (cache misses)
    pub fn conversions(&self) -> u32 {
        self.conversions
    }

    pub fn set_bpm(&mut self, exact_bpm: f32) -> u16 {
        if exact_bpm == self.last_exact_bpm {
            return self.micros_per_gradation;
        }
        self.last_exact_bpm = exact_bpm;
        self.conversions = self.conversions.wrapping_add(1);
        self.micros_per_gradation = bpm_to_interval(exact_bpm);
        self.micros_per_gradation
    }
}

/// Uncached conversion. Floors to whole microseconds and keeps real tempos clear of the
/// stopped sentinel.
pub fn bpm_to_interval(exact_bpm: f32) -> u16 {
    if exact_bpm.is_nan() || exact_bpm <= 0.0 {
        return STOPPED_INTERVAL;
    }

    let beats_per_second = exact_bpm / 60.0;
    let seconds_per_beat = 1.0 / beats_per_second;
    let micros_per_quarter = seconds_per_beat * 1_000_000.0;
    let micros_per_gradation = (micros_per_quarter / GRADATIONS_PER_QUARTER).floor();

    micros_per_gradation.clamp(1.0, f32::from(STOPPED_INTERVAL - 1)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_stopped() {
        let converter = IntervalConverter::new();
        assert_eq!(converter.interval(), STOPPED_INTERVAL);
        assert_eq!(converter.conversions(), 0);
    }

    #[test]
    fn test_zero_bpm_is_stopped() {
        let mut converter = IntervalConverter::new();
        assert_eq!(converter.set_bpm(0.0), STOPPED_INTERVAL);
        converter.set_bpm(120.0);
        assert_eq!(converter.set_bpm(0.0), STOPPED_INTERVAL);
    }

    #[test]
    fn test_nominal_tempo() {
        let mut converter = IntervalConverter::new();
        // 500000us per quarter / 128
        assert_eq!(converter.set_bpm(120.0), 3906);
        assert_eq!(converter.set_bpm(60.0), 7812);
    }

    #[test]
    fn test_same_bpm_converts_once() {
        let mut converter = IntervalConverter::new();
        let first = converter.set_bpm(97.3);
        let second = converter.set_bpm(97.3);
        assert_eq!(first, second);
        assert_eq!(converter.conversions(), 1);

        converter.set_bpm(97.4);
        assert_eq!(converter.conversions(), 2);
    }

    #[test]
    fn test_result_is_floored() {
        // 60e6 / 200 / 128 = 2343.75
        assert_eq!(bpm_to_interval(200.0), 2343);
    }

    #[test]
    fn test_extreme_tempos_saturate() {
        assert_eq!(bpm_to_interval(0.001), STOPPED_INTERVAL - 1);
        assert_eq!(bpm_to_interval(1.0e9), 1);
        assert_eq!(bpm_to_interval(-10.0), STOPPED_INTERVAL);
        assert_eq!(bpm_to_interval(f32::NAN), STOPPED_INTERVAL);
    }
}
