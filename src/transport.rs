//! Transport state machine
//!
//! The transport owns the beat-time counter and decides where tempo comes from:
//!
//! - **Stopped**: beat-time held at zero until a clock pulse arrives.
//! - **PlayingInternal**: free-running at the tempo set by the BPM knob and time-multiplier CV.
//! - **FollowingExternal**: slaved to pulses on the clock input. Tempo comes from the
//!   [`TempoEstimator`] and beat-time snaps to the nearest quarter note every PPQN pulses.
//!
//! [`Transport::fast_tick`] runs at audio rate and must not block, allocate or log.
//! [`Transport::slow_tick`] runs about once a millisecond and does the float-heavy tempo work.
//! Callers must not run the two concurrently on the same transport (see `runtime`).

use crate::config::{
    ModuleSettings, TimeMultiplier, BEAT_TIME_QUARTER, BPM_KNOB_RANGE, CLOCKIN_MIN_WAIT,
    CLOCKIN_WAIT_MULT, DEFAULT_GATE_LENGTH, KNOB_FULL_SCALE, STOPPED_INTERVAL,
};
use crate::gate::{gate, gate_bank, NUM_GATES};
use crate::interval::IntervalConverter;
use crate::swing::{swing_amount_from, TimeWarp};
use crate::tempo::TempoEstimator;
use log::debug;

/// Divisor whose rising edge an internal-play reset waits for
const RESET_ALIGN_DIVISOR: u32 = 64;
/// Divisor the play LED blinks at
const PLAY_LED_DIVISOR: u32 = 64;

/// Read-and-clear access to the edge-triggered pulse inputs.
///
/// Each call to `take_*` reports a pending edge at most once. An edge that is not taken stays
/// pending for a later tick.
pub trait PulseEdges {
    fn take_clock(&self) -> bool;
    fn take_reset(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stopped,
    PlayingInternal,
    FollowingExternal,
}

/// Values read from the panel on every fast tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FastInputs {
    pub elapsed_micros: u32,
    pub time_mult_switch: u8,
    pub user_division: u8,
    pub user_division_cv: i16,
}

/// Values read from the panel on every slow tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlowInputs {
    /// Play button edge, already consumed from the panel
    pub play_pressed: bool,
    pub bpm_knob: u16,
    pub time_mult_cv: i16,
    pub swing_knob: u16,
    pub swing_cv: i16,
    pub scrub_cv: i16,
    /// Reset input is currently high; only drives the reset LED
    pub reset_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedState {
    SolidOn,
    SolidHalf,
    #[default]
    SolidOff,
    FadeSlow,
    FadeFastest,
}

/// Requested state of the three panel indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorRequest {
    pub play: LedState,
    pub clock: LedState,
    pub reset: LedState,
}

/// Point-in-time copy of the transport for display and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub mode: TransportMode,
    pub beat_time: u32,
    pub warped_beat_time: u32,
    pub interval_micros: u16,
    pub estimated_bpm: f32,
    pub target_bpm: f32,
    pub gates: [bool; NUM_GATES],
}

#[derive(Debug, Clone)]
pub struct Transport {
    play_enabled: bool,
    follow_enabled: bool,
    beat_time: u32,
    previous_beat_time: u32,
    warped_beat_time: u32,
    gate_length: u16,
    interval: IntervalConverter,
    accumulated_micros: u32,
    pulses_since_quarter: u16,
    keepalive_micros: i32,
    clock_micros: u64,
    tempo: TempoEstimator,
    warp: TimeWarp,
    gates: [bool; NUM_GATES],
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(&ModuleSettings::default())
    }
}

impl Transport {
    pub fn new(settings: &ModuleSettings) -> Self {
        Self {
            play_enabled: false,
            follow_enabled: false,
            beat_time: 0,
            previous_beat_time: 0,
            warped_beat_time: 0,
            gate_length: settings.gate_length,
            interval: IntervalConverter::new(),
            accumulated_micros: 0,
            pulses_since_quarter: 0,
            keepalive_micros: 0,
            clock_micros: 0,
            tempo: TempoEstimator::new(settings.ppqn),
            warp: TimeWarp {
                subdivisions: settings.swing_subdivisions,
                ..TimeWarp::default()
            },
            gates: [false; NUM_GATES],
        }
    }

    pub fn mode(&self) -> TransportMode {
        if self.follow_enabled {
            TransportMode::FollowingExternal
        } else if self.play_enabled {
            TransportMode::PlayingInternal
        } else {
            TransportMode::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.play_enabled
    }

    pub fn is_following(&self) -> bool {
        self.follow_enabled
    }

    /// Authoritative beat-time in 512ths of a quarter note, before swing and scrub
    pub fn beat_time(&self) -> u32 {
        self.beat_time
    }

    /// Beat-time after swing and scrub; this is what the gates follow
    pub fn warped_beat_time(&self) -> u32 {
        self.warped_beat_time
    }

    pub fn interval_micros(&self) -> u16 {
        self.interval.interval()
    }

    pub fn accumulated_micros(&self) -> u32 {
        self.accumulated_micros
    }

    pub fn pulses_since_quarter(&self) -> u16 {
        self.pulses_since_quarter
    }

    pub fn keepalive_micros(&self) -> i32 {
        self.keepalive_micros
    }

    pub fn gates(&self) -> [bool; NUM_GATES] {
        self.gates
    }

    pub fn gate_length(&self) -> u16 {
        self.gate_length
    }

    pub fn tempo(&self) -> &TempoEstimator {
        &self.tempo
    }

    pub fn time_warp(&self) -> TimeWarp {
        self.warp
    }

    /// Sets the tempo directly; the slow tick normally does this
    pub fn set_bpm(&mut self, exact_bpm: f32) -> u16 {
        self.interval.set_bpm(exact_bpm)
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            mode: self.mode(),
            beat_time: self.beat_time,
            warped_beat_time: self.warped_beat_time,
            interval_micros: self.interval.interval(),
            estimated_bpm: self.tempo.estimated_bpm(),
            target_bpm: self.interval.last_exact_bpm(),
            gates: self.gates,
        }
    }

    /// Audio-rate update. Consumes pulse edges, advances beat-time and returns the six gates.
    pub fn fast_tick<E>(&mut self, edges: &E, inputs: &FastInputs) -> [bool; NUM_GATES]
    where
        E: PulseEdges + ?Sized,
    {
        self.clock_micros = self
            .clock_micros
            .wrapping_add(u64::from(inputs.elapsed_micros));
        let step = TimeMultiplier::from_switch(inputs.time_mult_switch).step();

        match self.mode() {
            TransportMode::FollowingExternal => {
                self.follow_tick(edges, inputs.elapsed_micros, step)
            }
            TransportMode::PlayingInternal => {
                self.internal_tick(edges, inputs.elapsed_micros, step)
            }
            TransportMode::Stopped => self.stopped_tick(edges),
        }

        self.gates = gate_bank(
            self.warped_beat_time,
            self.gate_length,
            inputs.user_division,
            inputs.user_division_cv,
        );
        self.previous_beat_time = self.beat_time;
        self.gates
    }

    fn follow_tick<E>(&mut self, edges: &E, elapsed: u32, step: u32)
    where
        E: PulseEdges + ?Sized,
    {
        if edges.take_clock() {
            self.tempo.record_pulse(self.clock_micros);
            self.refresh_keepalive();
            self.pulses_since_quarter = self.pulses_since_quarter.saturating_add(1);
            self.play_enabled = true;
        }

        // After the clock, so a stop + reset does not leave beat-time advanced
        if edges.take_reset() {
            self.pulses_since_quarter = 0;
            self.previous_beat_time = 0;
            self.beat_time = 0;
        }

        if self.play_enabled {
            self.advance(elapsed, step);

            let ppqn = self.tempo.ppqn().pulses();
            if self.pulses_since_quarter >= ppqn {
                self.pulses_since_quarter -= ppqn;
                self.beat_time = snap_to_quarter(self.beat_time);
            }
            self.warped_beat_time = self.warp.apply(self.beat_time);
        }

        // Last, so a pulse that just arrived is never aged out in the same tick
        self.keepalive_micros = self
            .keepalive_micros
            .saturating_sub(i32::try_from(elapsed).unwrap_or(i32::MAX));
        if self.keepalive_micros < 0 {
            // A stopped master clock must stop us too, not leave us free-running
            self.follow_enabled = false;
            self.play_enabled = false;
        }
    }

    fn internal_tick<E>(&mut self, edges: &E, elapsed: u32, step: u32)
    where
        E: PulseEdges + ?Sized,
    {
        if edges.take_clock() {
            self.enter_follow();
        }

        if self.interval.interval() != STOPPED_INTERVAL {
            self.advance(elapsed, step);
            self.warped_beat_time = self.warp.apply(self.beat_time);
        }

        // Resets wait for the next 1/16 boundary so a running gate is not cut short.
        // The edge is only taken on that boundary; until then it stays pending.
        let on_boundary = gate(self.beat_time, RESET_ALIGN_DIVISOR, self.gate_length)
            && !gate(
                self.previous_beat_time,
                RESET_ALIGN_DIVISOR,
                self.gate_length,
            );
        if on_boundary && edges.take_reset() {
            self.beat_time = 0;
            self.warped_beat_time = self.warp.apply(0);
        }
    }

    fn stopped_tick<E>(&mut self, edges: &E)
    where
        E: PulseEdges + ?Sized,
    {
        if edges.take_clock() {
            self.enter_follow();
        }
        self.beat_time = 0;
        self.warped_beat_time = 0;
    }

    fn enter_follow(&mut self) {
        // The gap since the last pulse spans the idle period, so it stays out of the average
        self.tempo.record_pulse_timestamp_only(self.clock_micros);
        self.follow_enabled = true;
        self.play_enabled = true;
        self.refresh_keepalive();
    }

    fn refresh_keepalive(&mut self) {
        // No tempo yet (power-on or 0 BPM): only the floor applies
        let interval = self.interval.interval();
        let window = if interval == STOPPED_INTERVAL {
            CLOCKIN_MIN_WAIT
        } else {
            (u32::from(interval) * CLOCKIN_WAIT_MULT).max(CLOCKIN_MIN_WAIT)
        };
        self.keepalive_micros = window as i32;
    }

    fn advance(&mut self, elapsed: u32, step: u32) {
        let interval = u32::from(self.interval.interval()).max(1);
        self.accumulated_micros = self.accumulated_micros.saturating_add(elapsed);
        if self.accumulated_micros >= interval {
            let gradations = self.accumulated_micros / interval;
            self.accumulated_micros %= interval;
            self.beat_time = self
                .beat_time
                .wrapping_add(gradations.wrapping_mul(step));
        }
    }

    /// Control-rate update: play button, tempo reconciliation, time-warp parameters and LEDs
    pub fn slow_tick(&mut self, inputs: &SlowInputs) -> IndicatorRequest {
        if inputs.play_pressed && !self.follow_enabled {
            self.play_enabled = !self.play_enabled;
            debug!("Play toggled: {}", self.play_enabled);
        }

        self.warp.swing_amount = swing_amount_from(inputs.swing_knob, inputs.swing_cv);
        self.warp.scrub = inputs.scrub_cv;

        let reset = if inputs.reset_active {
            LedState::FadeFastest
        } else {
            LedState::SolidOff
        };

        if self.follow_enabled {
            self.apply_bpm(self.tempo.estimated_bpm());
            IndicatorRequest {
                play: self.beat_led(),
                clock: LedState::SolidOn,
                reset,
            }
        } else if self.play_enabled {
            self.apply_bpm(knob_bpm(inputs.bpm_knob, inputs.time_mult_cv));
            IndicatorRequest {
                play: self.beat_led(),
                clock: LedState::SolidOff,
                reset,
            }
        } else {
            IndicatorRequest {
                play: LedState::FadeSlow,
                clock: LedState::SolidOff,
                reset,
            }
        }
    }

    fn apply_bpm(&mut self, exact_bpm: f32) {
        let before = self.interval.conversions();
        let interval = self.interval.set_bpm(exact_bpm);
        if self.interval.conversions() != before {
            debug!(
                "Tempo {:.3} BPM -> {} us per gradation ({} us per quarter)",
                exact_bpm,
                interval,
                u32::from(interval) * 128
            );
        }
    }

    fn beat_led(&self) -> LedState {
        if gate(self.beat_time, PLAY_LED_DIVISOR, DEFAULT_GATE_LENGTH) {
            LedState::SolidOn
        } else {
            LedState::SolidHalf
        }
    }
}

/// Rounds beat-time to the nearest quarter note, halves rounding up
pub fn snap_to_quarter(beat_time: u32) -> u32 {
    let quarter = u64::from(BEAT_TIME_QUARTER);
    let snapped = (u64::from(beat_time) + quarter / 2) / quarter * quarter;
    u32::try_from(snapped).unwrap_or(u32::MAX / BEAT_TIME_QUARTER * BEAT_TIME_QUARTER)
}

/// Internal tempo from the BPM knob (0..4095 -> 0..200 BPM) scaled by the time-multiplier CV
/// (-2048..2048 -> x1..x6)
pub fn knob_bpm(knob: u16, time_mult_cv: i16) -> f32 {
    let base = f32::from(knob) / KNOB_FULL_SCALE * BPM_KNOB_RANGE;
    let multiplier = (f32::from(time_mult_cv) / 2048.0 * 5.0 + 1.0).clamp(1.0, 6.0);
    base * multiplier
}
