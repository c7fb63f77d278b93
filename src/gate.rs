use crate::config::GATE_LENGTH_SCALE;

pub const NUM_GATES: usize = 6;

/// Divisors of the four fixed outputs, in beat-time units
pub const FIXED_DIVISORS: [u32; 4] = [512, 256, 128, 64];

const USER_DIVISION_BASE: u32 = 8;
const USER_DIVISION_HALF_BASE: u32 = 16;
const MAX_USER_DIVISION_INDEX: i32 = 7;

/// Whether a gate of `divisor` beat-time units is high at `beat_time`.
///
/// High for the first `gate_length / 1024` of each cycle. Integer multiply-before-compare, so
/// boundaries are exact for every divisor.
pub fn gate(beat_time: u32, divisor: u32, gate_length: u16) -> bool {
    debug_assert!(divisor > 0);
    u64::from(beat_time % divisor) * u64::from(GATE_LENGTH_SCALE)
        < u64::from(divisor) * u64::from(gate_length)
}

/// Shift applied to the user-division base divisors.
///
/// Clamped to `1..=7` so neither a zero/negative shift nor an overlong one can occur.
pub fn user_division_shift(index: u8, cv_mult: i16) -> u32 {
    ((MAX_USER_DIVISION_INDEX - i32::from(index)) - i32::from(cv_mult)).clamp(1, 7) as u32
}

/// Divisors of all six outputs for the given user-division selection
pub fn divisors(index: u8, cv_mult: i16) -> [u32; NUM_GATES] {
    let shift = user_division_shift(index, cv_mult);
    [
        FIXED_DIVISORS[0],
        FIXED_DIVISORS[1],
        FIXED_DIVISORS[2],
        FIXED_DIVISORS[3],
        USER_DIVISION_BASE << shift,
        USER_DIVISION_HALF_BASE << shift,
    ]
}

/// The six output gates: 1, 1/2, 1/4, 1/16, user division and user division / 2
pub fn gate_bank(beat_time: u32, gate_length: u16, index: u8, cv_mult: i16) -> [bool; NUM_GATES] {
    divisors(index, cv_mult).map(|divisor| gate(beat_time, divisor, gate_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_duty_examples() {
        assert!(gate(0, 64, 512));
        assert!(gate(31, 64, 512));
        assert!(!gate(32, 64, 512));
        assert!(!gate(63, 64, 512));
        assert!(gate(64, 64, 512));
    }

    #[test]
    fn test_half_duty_is_exactly_half_of_every_cycle() {
        for divisor in [2u32, 8, 64, 100, 512, 2048] {
            let high = (0..divisor * 3)
                .filter(|&t| gate(t, divisor, 512))
                .count() as u32;
            assert_eq!(high, divisor / 2 * 3, "divisor {}", divisor);
        }
    }

    #[test]
    fn test_extreme_lengths() {
        for t in 0..512 {
            assert!(!gate(t, 128, 0));
            assert!(gate(t, 128, 1024));
        }
    }

    #[test]
    fn test_user_division_shift_is_clamped() {
        assert_eq!(user_division_shift(0, 0), 7);
        assert_eq!(user_division_shift(7, 0), 1);
        assert_eq!(user_division_shift(3, 1), 3);
        assert_eq!(user_division_shift(7, 5), 1);
        assert_eq!(user_division_shift(0, -20), 7);
        assert_eq!(user_division_shift(6, i16::MAX), 1);
    }

    #[test]
    fn test_divisors() {
        assert_eq!(divisors(7, 0), [512, 256, 128, 64, 16, 32]);
        assert_eq!(divisors(0, 0), [512, 256, 128, 64, 1024, 2048]);
    }

    #[test]
    fn test_all_gates_high_at_zero() {
        assert_eq!(gate_bank(0, 512, 4, 0), [true; NUM_GATES]);
    }
}
