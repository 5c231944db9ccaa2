//! Step-wise dimming arithmetic.
//!
//! Brightness is handled in percent (0-100) here; lights report and accept a
//! raw 0-255 value, converted with [`brightness_pct_from_raw`] and
//! [`brightness_raw_from_pct`].

use tracing::debug;

pub const BRIGHTNESS_RAW_MAX: u8 = 255;
pub const BRIGHTNESS_PCT_MIN: u8 = 0;
pub const BRIGHTNESS_PCT_MAX: u8 = 100;

/// Lowest brightness a dimming step will leave a light on at.
pub const DIM_FLOOR_PCT: u8 = 1;

/// Direction of a single dimming step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn sign(self) -> i32 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

pub fn brightness_pct_from_raw(raw: u8) -> u8 {
    (f64::from(raw) / f64::from(BRIGHTNESS_RAW_MAX) * f64::from(BRIGHTNESS_PCT_MAX)).round() as u8
}

pub fn brightness_raw_from_pct(pct: u8) -> u8 {
    let pct = pct.min(BRIGHTNESS_PCT_MAX);
    (f64::from(pct) / f64::from(BRIGHTNESS_PCT_MAX) * f64::from(BRIGHTNESS_RAW_MAX)).round() as u8
}

/// Compute the brightness one dimming step away from `current_pct`.
///
/// The current value is first snapped to a whole number of steps (ceiling
/// when dimming down, floor when dimming up) so repeated presses land on
/// step boundaries. Dimming down never goes below [`DIM_FLOOR_PCT`] unless
/// the light is already there, in which case it goes to 0 (off). Dimming up
/// from 0 turns the light on at [`DIM_FLOOR_PCT`].
///
/// `step_pct` must be non-zero; config validation guarantees this.
pub fn desired_brightness_pct(direction: Direction, current_pct: u8, step_pct: u8) -> u8 {
    debug!("current light brightness: {}%", current_pct);

    let current = i32::from(current_pct);
    let step = i32::from(step_pct.max(1));

    let whole_steps = match direction {
        Direction::Down => (current + step - 1) / step,
        Direction::Up => current / step,
    };
    debug!("number of whole steps rounded for dimming: {}", whole_steps);

    let snapped = whole_steps * step;
    debug!(
        "desired brightness rounded to nearest whole step for dimming: {}%",
        snapped
    );

    let stepped = snapped + step * direction.sign();
    debug!("desired brightness dimmed by brightness step: {}%", stepped);

    let desired = match direction {
        Direction::Down if current <= i32::from(DIM_FLOOR_PCT) => i32::from(BRIGHTNESS_PCT_MIN),
        Direction::Down if current <= step => i32::from(DIM_FLOOR_PCT),
        Direction::Down => stepped,
        Direction::Up if current == i32::from(BRIGHTNESS_PCT_MIN) => i32::from(DIM_FLOOR_PCT),
        Direction::Up => stepped.min(i32::from(BRIGHTNESS_PCT_MAX)),
    };

    desired.clamp(
        i32::from(BRIGHTNESS_PCT_MIN),
        i32::from(BRIGHTNESS_PCT_MAX),
    ) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dim_down_snaps_up_then_steps() {
        // ceil(60 / 25) = 3 -> 75%, minus one step
        assert_eq!(desired_brightness_pct(Direction::Down, 60, 25), 50);
        assert_eq!(desired_brightness_pct(Direction::Down, 50, 25), 25);
        assert_eq!(desired_brightness_pct(Direction::Down, 100, 25), 75);
    }

    #[test]
    fn test_dim_down_floor() {
        assert_eq!(desired_brightness_pct(Direction::Down, 25, 25), 1);
        assert_eq!(desired_brightness_pct(Direction::Down, 10, 25), 1);
        assert_eq!(desired_brightness_pct(Direction::Down, 2, 25), 1);
        assert_eq!(desired_brightness_pct(Direction::Down, 1, 25), 0);
        assert_eq!(desired_brightness_pct(Direction::Down, 0, 25), 0);
    }

    #[test]
    fn test_dim_down_lands_on_step_boundaries() {
        for current in 2..=100u8 {
            let desired = desired_brightness_pct(Direction::Down, current, 25);
            assert!(desired < current, "{}% dimmed to {}%", current, desired);
            if desired != DIM_FLOOR_PCT {
                assert_eq!(desired % 25, 0, "{}% dimmed to {}%", current, desired);
            }
        }
    }

    #[test]
    fn test_dim_up() {
        assert_eq!(desired_brightness_pct(Direction::Up, 0, 25), 1);
        assert_eq!(desired_brightness_pct(Direction::Up, 1, 25), 25);
        assert_eq!(desired_brightness_pct(Direction::Up, 60, 25), 75);
        assert_eq!(desired_brightness_pct(Direction::Up, 75, 25), 100);
        assert_eq!(desired_brightness_pct(Direction::Up, 90, 25), 100);
        assert_eq!(desired_brightness_pct(Direction::Up, 100, 25), 100);
    }

    #[test]
    fn test_dim_up_never_decreases() {
        for current in 0..=100u8 {
            let desired = desired_brightness_pct(Direction::Up, current, 10);
            assert!(desired >= current, "{}% dimmed up to {}%", current, desired);
            assert!(desired <= BRIGHTNESS_PCT_MAX);
        }
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Up.sign(), 1);
        assert_eq!(Direction::Down.sign(), -1);
    }

    #[test]
    fn test_raw_conversions() {
        assert_eq!(brightness_pct_from_raw(0), 0);
        assert_eq!(brightness_pct_from_raw(255), 100);
        assert_eq!(brightness_pct_from_raw(153), 60);
        assert_eq!(brightness_raw_from_pct(0), 0);
        assert_eq!(brightness_raw_from_pct(1), 3);
        assert_eq!(brightness_raw_from_pct(50), 128);
        assert_eq!(brightness_raw_from_pct(100), 255);
        assert_eq!(brightness_raw_from_pct(150), 255);
    }
}
