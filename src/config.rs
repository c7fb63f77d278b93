// config.rs

use crate::error::{ChronosError, Result};
use log::{debug, info};
use serde::Deserialize;
use std::path::Path;

/// Slots in the clock-in interval history
pub const CLOCKIN_BUFFER_SIZE: usize = 64;

/// Shortest keepalive window after a clock pulse, in microseconds
pub const CLOCKIN_MIN_WAIT: u32 = 100_000;
/// Keepalive window in units of the current gradation interval
pub const CLOCKIN_WAIT_MULT: u32 = 32;

/// Time gradations in one quarter note
pub const GRADATIONS_PER_QUARTER: f32 = 128.0;
/// Beat-time units per snapped quarter note
pub const BEAT_TIME_QUARTER: u32 = 512;

/// Interval value meaning "0 BPM". Anything else would leave a tiny but real tempo running.
pub const STOPPED_INTERVAL: u16 = u16::MAX;

/// Peak swing displacement, tuned by ear across 1..16 swings per bar
pub const SWING_CALIBRATION: f32 = 9300.0;
/// Swing amounts at or below this are treated as off
pub const SWING_THRESHOLD: u16 = 300;
/// Full-scale swing amount (knob + CV)
pub const SWING_FULL_SCALE: u16 = 4096;

/// 50% duty cycle out of 1024
pub const DEFAULT_GATE_LENGTH: u16 = 512;
pub const GATE_LENGTH_SCALE: u32 = 1024;

/// BPM knob full scale maps to this tempo
pub const BPM_KNOB_RANGE: f32 = 200.0;
pub const KNOB_FULL_SCALE: f32 = 4096.0;

/// Interrupt period of the fast phase on the reference hardware (25kHz)
pub const FAST_PERIOD_MICROS: u32 = 40;
/// Target period of the slow phase
pub const SLOW_PERIOD_MICROS: u32 = 1_000;

pub const DEFAULT_BPM: f32 = 120.0;

/// Supported external clock resolutions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u16")]
pub enum Ppqn {
    Ppqn1 = 1,
    Ppqn4 = 4,
    Ppqn8 = 8,
    Ppqn16 = 16,
    Ppqn24 = 24,
    Ppqn32 = 32,
    Ppqn48 = 48,
}

impl Ppqn {
    pub const ALL: [Ppqn; 7] = [
        Ppqn::Ppqn1,
        Ppqn::Ppqn4,
        Ppqn::Ppqn8,
        Ppqn::Ppqn16,
        Ppqn::Ppqn24,
        Ppqn::Ppqn32,
        Ppqn::Ppqn48,
    ];

    pub fn pulses(self) -> u16 {
        self as u16
    }
}

impl Default for Ppqn {
    fn default() -> Self {
        Ppqn::Ppqn24
    }
}

impl TryFrom<u16> for Ppqn {
    type Error = ChronosError;

    fn try_from(value: u16) -> Result<Self> {
        Ppqn::ALL
            .iter()
            .copied()
            .find(|p| p.pulses() == value)
            .ok_or(ChronosError::InvalidPpqn(value))
    }
}

/// Position of the time-multiplier switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMultiplier {
    #[default]
    X1,
    X2,
    X4,
    /// Switch reads between positions; time does not advance
    Unknown,
}

impl TimeMultiplier {
    pub fn from_switch(position: u8) -> Self {
        match position {
            0 => TimeMultiplier::X1,
            1 => TimeMultiplier::X2,
            2 => TimeMultiplier::X4,
            _ => TimeMultiplier::Unknown,
        }
    }

    /// Beat-time units added per elapsed gradation
    pub fn step(self) -> u32 {
        match self {
            TimeMultiplier::X1 => 1,
            TimeMultiplier::X2 => 2,
            TimeMultiplier::X4 => 4,
            TimeMultiplier::Unknown => 0,
        }
    }
}

/// Settings of the simulated module that stay fixed for a run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub ppqn: Ppqn,
    pub swing_subdivisions: u8,
    pub gate_length: u16,
    pub fast_period_micros: u32,
    pub slow_period_micros: u32,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            ppqn: Ppqn::default(),
            swing_subdivisions: 4,
            gate_length: DEFAULT_GATE_LENGTH,
            fast_period_micros: FAST_PERIOD_MICROS,
            slow_period_micros: SLOW_PERIOD_MICROS,
        }
    }
}

impl ModuleSettings {
    /// Loads settings from an optional file, then applies `CHRONOS_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!("Loading module settings from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: ModuleSettings = builder
            .add_source(config::Environment::with_prefix("CHRONOS"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ChronosError::Config(e.to_string()))?;

        debug!("Module settings: {:?}", settings);
        settings.validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.swing_subdivisions == 0 {
            return Err(ChronosError::Config(
                "swing_subdivisions must be at least 1".to_string(),
            ));
        }
        if u32::from(self.gate_length) > GATE_LENGTH_SCALE {
            debug!("Clamping gate length {} to 1024", self.gate_length);
            self.gate_length = GATE_LENGTH_SCALE as u16;
        }
        if self.fast_period_micros == 0 || self.slow_period_micros == 0 {
            return Err(ChronosError::Config(
                "phase periods must be non-zero".to_string(),
            ));
        }
        Ok(self)
    }
}
