//! Simulated front panel
//!
//! Stands in for the hardware I/O layer: edge flags raised by input handlers and consumed
//! exactly once by the transport, knob/CV values that producers write at any rate, and the
//! gate/LED outputs the transport publishes. Everything is atomic, so producers never wait on
//! the transport lock.

use crate::gate::NUM_GATES;
use crate::transport::{FastInputs, IndicatorRequest, LedState, PulseEdges, SlowInputs};
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU16, AtomicU8, Ordering};

/// Knob readings at or below this mean the selector is between detents
const GROUNDED_KNOB: u16 = 128;
const ADC_FULL_SCALE: u16 = 4095;
const MAX_USER_DIVISION: u8 = 7;

/// A latched rising edge. `raise` may be called any number of times between reads; `take`
/// reports it once.
#[derive(Debug, Default)]
pub struct EdgeFlag(AtomicBool);

impl EdgeFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Play,
    Clock,
    Reset,
}

#[derive(Debug, Default)]
pub struct PanelInputs {
    pub clock: EdgeFlag,
    pub reset: EdgeFlag,
    pub play: EdgeFlag,
    reset_high: AtomicBool,
    bpm_knob: AtomicU16,
    swing_knob: AtomicU16,
    time_mult_switch: AtomicU8,
    user_division: AtomicU8,
    user_division_cv: AtomicI16,
    scrub_cv: AtomicI16,
    time_mult_cv: AtomicI16,
    swing_cv: AtomicI16,
}

impl PulseEdges for PanelInputs {
    fn take_clock(&self) -> bool {
        self.clock.take()
    }

    fn take_reset(&self) -> bool {
        self.reset.take()
    }
}

impl PanelInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset jack level. A rising level latches the reset edge.
    pub fn set_reset_level(&self, high: bool) {
        let was_high = self.reset_high.swap(high, Ordering::AcqRel);
        if high && !was_high {
            self.reset.raise();
        }
    }

    pub fn set_bpm_knob(&self, value: u16) {
        self.bpm_knob.store(value.min(ADC_FULL_SCALE), Ordering::Relaxed);
    }

    pub fn set_swing_knob(&self, value: u16) {
        self.swing_knob.store(value.min(ADC_FULL_SCALE), Ordering::Relaxed);
    }

    pub fn set_time_mult_switch(&self, position: u8) {
        self.time_mult_switch.store(position, Ordering::Relaxed);
    }

    /// Feeds the raw user-division selector reading; a grounded reading keeps the old index
    pub fn set_user_division_knob(&self, raw: u16) {
        let current = self.user_division.load(Ordering::Relaxed);
        self.user_division
            .store(user_division_index(raw, current), Ordering::Relaxed);
    }

    pub fn set_user_division_cv(&self, value: i16) {
        self.user_division_cv.store(value, Ordering::Relaxed);
    }

    pub fn set_scrub_cv(&self, value: i16) {
        self.scrub_cv.store(value, Ordering::Relaxed);
    }

    pub fn set_time_mult_cv(&self, value: i16) {
        self.time_mult_cv.store(value, Ordering::Relaxed);
    }

    pub fn set_swing_cv(&self, value: i16) {
        self.swing_cv.store(value, Ordering::Relaxed);
    }

    pub fn fast_inputs(&self, elapsed_micros: u32) -> FastInputs {
        FastInputs {
            elapsed_micros,
            time_mult_switch: self.time_mult_switch.load(Ordering::Relaxed),
            user_division: self.user_division.load(Ordering::Relaxed),
            user_division_cv: self.user_division_cv.load(Ordering::Relaxed),
        }
    }

    /// Snapshot for the slow phase. Consumes the play button edge.
    pub fn slow_inputs(&self) -> SlowInputs {
        SlowInputs {
            play_pressed: self.play.take(),
            bpm_knob: self.bpm_knob.load(Ordering::Relaxed),
            time_mult_cv: self.time_mult_cv.load(Ordering::Relaxed),
            swing_knob: self.swing_knob.load(Ordering::Relaxed),
            swing_cv: self.swing_cv.load(Ordering::Relaxed),
            scrub_cv: self.scrub_cv.load(Ordering::Relaxed),
            reset_active: self.reset_high.load(Ordering::Relaxed) || self.reset.is_raised(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PanelOutputs {
    gates: [AtomicBool; NUM_GATES],
    leds: [AtomicU8; 3],
}

impl PanelOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_gates(&self, gates: &[bool; NUM_GATES]) {
        for (out, &level) in self.gates.iter().zip(gates.iter()) {
            out.store(level, Ordering::Relaxed);
        }
    }

    pub fn gates(&self) -> [bool; NUM_GATES] {
        std::array::from_fn(|i| self.gates[i].load(Ordering::Relaxed))
    }

    pub fn write_indicators(&self, request: &IndicatorRequest) {
        self.set_led(Indicator::Play, request.play);
        self.set_led(Indicator::Clock, request.clock);
        self.set_led(Indicator::Reset, request.reset);
    }

    pub fn set_led(&self, led: Indicator, state: LedState) {
        self.leds[led as usize].store(led_to_u8(state), Ordering::Relaxed);
    }

    pub fn led(&self, led: Indicator) -> LedState {
        led_from_u8(self.leds[led as usize].load(Ordering::Relaxed))
    }
}

fn led_to_u8(state: LedState) -> u8 {
    match state {
        LedState::SolidOff => 0,
        LedState::SolidOn => 1,
        LedState::SolidHalf => 2,
        LedState::FadeSlow => 3,
        LedState::FadeFastest => 4,
    }
}

fn led_from_u8(value: u8) -> LedState {
    match value {
        1 => LedState::SolidOn,
        2 => LedState::SolidHalf,
        3 => LedState::FadeSlow,
        4 => LedState::FadeFastest,
        _ => LedState::SolidOff,
    }
}

/// Quantizes the user-division selector into 0..=7. Readings at or below the grounded level
/// mean the selector sits between detents, so the previous index is kept.
pub fn user_division_index(raw: u16, previous: u8) -> u8 {
    if raw <= GROUNDED_KNOB {
        return previous;
    }
    let detent = ADC_FULL_SCALE / u16::from(MAX_USER_DIVISION);
    (raw.min(ADC_FULL_SCALE) / detent).min(u16::from(MAX_USER_DIVISION)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_flag_reports_once() {
        let flag = EdgeFlag::default();
        assert!(!flag.take());
        flag.raise();
        flag.raise();
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_reset_level_latches_rising_edge_only() {
        let panel = PanelInputs::new();
        panel.set_reset_level(true);
        panel.set_reset_level(true);
        assert!(panel.take_reset());
        assert!(!panel.take_reset());
        panel.set_reset_level(false);
        assert!(!panel.take_reset());
        panel.set_reset_level(true);
        assert!(panel.take_reset());
    }

    #[test]
    fn test_slow_inputs_consume_play_edge() {
        let panel = PanelInputs::new();
        panel.play.raise();
        assert!(panel.slow_inputs().play_pressed);
        assert!(!panel.slow_inputs().play_pressed);
    }

    #[test]
    fn test_user_division_index() {
        assert_eq!(user_division_index(0, 3), 3);
        assert_eq!(user_division_index(128, 5), 5);
        assert_eq!(user_division_index(129, 5), 0);
        assert_eq!(user_division_index(4095, 0), 7);
        assert_eq!(user_division_index(2047, 0), 3);
    }

    #[test]
    fn test_cv_inputs_reach_tick_snapshots() {
        let panel = PanelInputs::new();
        panel.set_user_division_cv(-2);
        panel.set_time_mult_cv(1024);
        panel.set_swing_cv(512);
        assert_eq!(panel.fast_inputs(40).user_division_cv, -2);
        let slow = panel.slow_inputs();
        assert_eq!(slow.time_mult_cv, 1024);
        assert_eq!(slow.swing_cv, 512);
    }

    #[test]
    fn test_outputs_round_trip_leds() {
        let outputs = PanelOutputs::new();
        outputs.write_indicators(&IndicatorRequest {
            play: LedState::SolidHalf,
            clock: LedState::SolidOn,
            reset: LedState::FadeFastest,
        });
        assert_eq!(outputs.led(Indicator::Play), LedState::SolidHalf);
        assert_eq!(outputs.led(Indicator::Clock), LedState::SolidOn);
        assert_eq!(outputs.led(Indicator::Reset), LedState::FadeFastest);
    }
}
