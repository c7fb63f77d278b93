use crate::config::Ppqn;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Module settings file (TOML, YAML or JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// External clock resolution; overrides the settings file
    #[arg(long)]
    pub ppqn: Option<u16>,

    /// BPM knob reading (0-4095, full scale is 200 BPM)
    #[arg(long, default_value_t = 2458)]
    pub bpm_knob: u16,

    /// Drive the clock input at this tempo instead of free-running
    #[arg(long)]
    pub external_bpm: Option<f64>,

    /// Swing knob reading (0-4095)
    #[arg(long, default_value_t = 0)]
    pub swing: u16,

    /// Scrub CV offset in beat-time units
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub scrub: i16,

    /// Time-multiplier CV (-2048..2048 scales internal tempo x1..x6)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub time_mult_cv: i16,

    /// Swing CV; added to the swing knob once it passes 300
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub swing_cv: i16,

    /// User-division CV offset in selector steps (positive selects faster divisions)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub ud_cv: i16,

    /// Time-multiplier switch position (0 = x1, 1 = x2, 2 = x4)
    #[arg(long, default_value_t = 2)]
    pub time_mult: u8,

    /// User-division selector index (0-7)
    #[arg(long, default_value_t = 4)]
    pub user_division: u8,

    /// Seconds to run before exiting
    #[arg(long, default_value_t = 10)]
    pub duration_secs: u64,

    /// Log to stderr instead of the log file
    #[arg(long)]
    pub verbose: bool,
}

pub fn validate_ppqn(value: u16) -> Result<Ppqn, String> {
    Ppqn::try_from(value).map_err(|_| {
        let mut error_msg = format!("Error: PPQN {} is not supported. Choose one of:\n", value);
        for ppqn in Ppqn::ALL {
            error_msg.push_str(&format!("  - {}\n", ppqn.pulses()));
        }
        error_msg
    })
}

pub fn validate_knob(name: &str, value: u16) -> Result<u16, String> {
    if value > 4095 {
        return Err(format!(
            "Error: {} reading {} is outside 0-4095",
            name, value
        ));
    }
    Ok(value)
}
