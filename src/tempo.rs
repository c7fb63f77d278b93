//! Tempo estimation from external clock pulses
//!
//! Every pulse adds the time since the previous pulse to a fixed 64-slot history. The estimate
//! is the mean of the filled slots converted to BPM at the configured PPQN. Slots start at zero
//! and are skipped until their first write, so a half-empty history does not skew fast.

use crate::config::{Ppqn, CLOCKIN_BUFFER_SIZE, DEFAULT_BPM};

/// Estimates land 0.01% low; an estimate slightly under the true tempo avoids double-triggering
/// downstream when the next real pulse arrives a hair early.
const UNDERESTIMATE: f32 = 0.9999;

#[derive(Debug, Clone)]
pub struct TempoEstimator {
    intervals: [u64; CLOCKIN_BUFFER_SIZE],
    cursor: usize,
    last_pulse_micros: u64,
    estimated_bpm: f32,
    ppqn: Ppqn,
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new(Ppqn::default())
    }
}

impl TempoEstimator {
    pub fn new(ppqn: Ppqn) -> Self {
        Self {
            intervals: [0; CLOCKIN_BUFFER_SIZE],
            cursor: 0,
            last_pulse_micros: 0,
            estimated_bpm: DEFAULT_BPM,
            ppqn,
        }
    }

    pub fn set_ppqn(&mut self, ppqn: Ppqn) {
        self.ppqn = ppqn;
    }

    pub fn ppqn(&self) -> Ppqn {
        self.ppqn
    }

    pub fn estimated_bpm(&self) -> f32 {
        self.estimated_bpm
    }

    pub fn last_pulse_micros(&self) -> u64 {
        self.last_pulse_micros
    }

    /// Records a pulse and recomputes the estimate
    pub fn record_pulse(&mut self, now_micros: u64) -> f32 {
        self.intervals[self.cursor] = now_micros.wrapping_sub(self.last_pulse_micros);
        self.last_pulse_micros = now_micros;
        self.cursor = (self.cursor + 1) % CLOCKIN_BUFFER_SIZE;

        if let Some(mean_seconds) = self.mean_interval_seconds() {
            self.estimated_bpm =
                (1.0 / mean_seconds) * (60.0 / f32::from(self.ppqn.pulses())) * UNDERESTIMATE;
        }
        self.estimated_bpm
    }

    /// Records only the pulse time. Used for the first pulse after the clock has been idle,
    /// whose gap to the previous pulse says nothing about the tempo.
    pub fn record_pulse_timestamp_only(&mut self, now_micros: u64) {
        self.last_pulse_micros = now_micros;
    }

    /// Mean of the filled history slots in seconds, or `None` while nothing is filled
    fn mean_interval_seconds(&self) -> Option<f32> {
        let (sum, filled) = self
            .intervals
            .iter()
            .filter(|&&interval| interval != 0)
            .fold((0.0f32, 0u32), |(sum, filled), &interval| {
                (sum + interval as f32 / 1_000_000.0, filled + 1)
            });

        if filled == 0 {
            None
        } else {
            Some(sum / filled as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_to_nominal_tempo() {
        let estimator = TempoEstimator::default();
        assert_eq!(estimator.estimated_bpm(), 120.0);
        assert_eq!(estimator.ppqn(), Ppqn::Ppqn24);
    }

    #[test]
    fn test_timestamp_only_leaves_estimate_alone() {
        let mut estimator = TempoEstimator::default();
        estimator.record_pulse_timestamp_only(5_000_000);
        assert_eq!(estimator.last_pulse_micros(), 5_000_000);
        assert_eq!(estimator.estimated_bpm(), 120.0);
    }

    #[test]
    fn test_repeated_timestamp_does_not_divide_by_zero() {
        let mut estimator = TempoEstimator::default();
        // A zero-length interval lands in the history as "unfilled"
        let bpm = estimator.record_pulse(0);
        assert_eq!(bpm, 120.0);
        assert!(bpm.is_finite());
    }

    #[test]
    fn test_quarter_note_pulses_at_ppqn_one() {
        let mut estimator = TempoEstimator::new(Ppqn::Ppqn1);
        estimator.record_pulse_timestamp_only(1_000);
        for i in 1..=8u64 {
            estimator.record_pulse(1_000 + i * 500_000);
        }
        assert_relative_eq!(estimator.estimated_bpm(), 119.988, epsilon = 1e-3);
    }

    #[test]
    fn test_skips_unfilled_slots() {
        let mut estimator = TempoEstimator::new(Ppqn::Ppqn4);
        estimator.record_pulse_timestamp_only(0);
        estimator.record_pulse(125_000);
        // One filled slot out of 64: 0.125s per pulse at 4 PPQN is 120 BPM
        assert_relative_eq!(estimator.estimated_bpm(), 120.0 * 0.9999, epsilon = 1e-3);
    }

    #[test]
    fn test_history_wraps_after_capacity() {
        let mut estimator = TempoEstimator::new(Ppqn::Ppqn1);
        let mut now = 0u64;
        estimator.record_pulse_timestamp_only(now);
        for _ in 0..CLOCKIN_BUFFER_SIZE {
            now += 1_000_000;
            estimator.record_pulse(now);
        }
        // Replace the whole history with twice the tempo
        for _ in 0..CLOCKIN_BUFFER_SIZE {
            now += 500_000;
            estimator.record_pulse(now);
        }
        assert_relative_eq!(estimator.estimated_bpm(), 120.0 * 0.9999, epsilon = 1e-2);
    }

    #[test]
    fn test_ppqn_change_applies_to_next_estimate() {
        let mut estimator = TempoEstimator::new(Ppqn::Ppqn1);
        estimator.record_pulse_timestamp_only(0);
        estimator.record_pulse(500_000);
        estimator.set_ppqn(Ppqn::Ppqn4);
        estimator.record_pulse(1_000_000);
        assert_relative_eq!(estimator.estimated_bpm(), 30.0 * 0.9999, epsilon = 1e-3);
    }
}
