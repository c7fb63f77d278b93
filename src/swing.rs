//! Swing and scrub time-warping
//!
//! Swing bends beat-time along a cosine so that every other subdivision lands late. The
//! curve was fitted by ear:
//!
//! `y = x + cos(x / (65536 / (2π·n))) · (9300 / n) − (9300 / n)`
//!
//! with `x` the position inside the bar on a 0..65535 scale and `n` the swings per bar. The
//! swing amount then blends between the straight and the fully swung position.

use crate::config::{BEAT_TIME_QUARTER, SWING_CALIBRATION, SWING_FULL_SCALE, SWING_THRESHOLD};
use std::f32::consts::PI;

const BAR_PHASE_SCALE: u32 = 128;
const BAR_PHASE_RANGE: f32 = 65536.0;

/// Swing and scrub parameters, refreshed by the slow phase and read by the fast phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWarp {
    pub swing_amount: u16,
    pub subdivisions: u8,
    pub scrub: i16,
}

impl Default for TimeWarp {
    fn default() -> Self {
        Self {
            swing_amount: 0,
            subdivisions: 4,
            scrub: 0,
        }
    }
}

impl TimeWarp {
    pub fn apply(&self, beat_time: u32) -> u32 {
        let swung = apply_swing(beat_time, self.swing_amount, self.subdivisions);
        apply_scrub(swung, self.scrub)
    }
}

/// Combines the swing knob with the swing CV. The CV only counts once it clears the
/// threshold, and the sum never passes full scale.
pub fn swing_amount_from(knob: u16, cv: i16) -> u16 {
    let mut swing = knob.min(SWING_FULL_SCALE);
    if cv > SWING_THRESHOLD as i16 {
        swing = swing.saturating_add(cv as u16).min(SWING_FULL_SCALE);
    }
    swing
}

pub fn apply_swing(beat_time: u32, swing_amount: u16, subdivisions: u8) -> u32 {
    // Not worth the cosine while swing is effectively off
    if swing_amount <= SWING_THRESHOLD || subdivisions == 0 {
        return beat_time;
    }

    let n = f32::from(subdivisions);
    let bar_phase = ((beat_time % BEAT_TIME_QUARTER) * BAR_PHASE_SCALE) as f32;
    let depth = SWING_CALIBRATION / n;
    let warp = ((bar_phase / (BAR_PHASE_RANGE / (2.0 * PI * n))).cos() * depth - depth)
        / BAR_PHASE_SCALE as f32;

    let straight = beat_time as f64;
    let swung = straight + f64::from(warp);
    let blend = f64::from(swing_amount.min(SWING_FULL_SCALE)) / f64::from(SWING_FULL_SCALE);
    let result = straight + blend * (swung - straight);

    result.clamp(0.0, u32::MAX as f64) as u32
}

/// Adds the scrub CV offset. Beat-time never goes below zero.
pub fn apply_scrub(beat_time: u32, scrub: i16) -> u32 {
    beat_time.saturating_add_signed(i32::from(scrub))
}
