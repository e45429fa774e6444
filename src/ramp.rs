//! Constant-rate altitude ramps for the takeoff and landing phases.
//!
//! A trapezoidal or S-curve profile would be gentler on the vehicle, but the
//! onboard controller already smooths position setpoints; a linear ramp keeps
//! this side trivial. Zero-length ramps (non-positive target or duration)
//! yield no steps at all, so callers can treat them as a no-op phase.

/// Strictly monotone sequence of z setpoints between 0 and `z_target`.
///
/// Produces `N = ceil(duration * rate)` values. Ascending ramps end exactly
/// at `z_target`, descending ramps start one step below `z_target` and end
/// exactly at 0. The terminal stop command after a landing ramp is the
/// streamer's job, not the ramp's.
#[derive(Debug, Clone)]
pub struct Ramp {
    z_target: f64,
    steps: usize,
    next: usize,
    descending: bool,
}

impl Ramp {
    /// Takeoff ramp: 0 (exclusive) up to `z_target` (inclusive).
    pub fn up(z_target: f64, duration_s: f64, rate_hz: f64) -> Self {
        Self::new(z_target, duration_s, rate_hz, false)
    }

    /// Landing ramp: `z_target` (exclusive) down to 0 (inclusive).
    pub fn down(z_target: f64, duration_s: f64, rate_hz: f64) -> Self {
        Self::new(z_target, duration_s, rate_hz, true)
    }

    fn new(z_target: f64, duration_s: f64, rate_hz: f64, descending: bool) -> Self {
        let steps = if z_target <= 0. || duration_s <= 0. || rate_hz <= 0. {
            0
        } else {
            (duration_s * rate_hz).ceil() as usize
        };
        Self {
            z_target,
            steps,
            next: 0,
            descending,
        }
    }
}

impl Iterator for Ramp {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next >= self.steps {
            return None;
        }
        self.next += 1;
        let u = self.next as f64 / self.steps as f64;
        let z = if self.descending {
            (1. - u) * self.z_target
        } else {
            u * self.z_target
        };
        Some(z)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.steps - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Ramp {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takeoff_ramp_is_strictly_increasing_and_lands_on_target() {
        let values: Vec<f64> = Ramp::up(1.0, 2.0, 50.).collect();
        assert_eq!(values.len(), 100);
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(values[values.len() - 1], 1.0);
    }

    #[test]
    fn landing_ramp_is_strictly_decreasing_and_reaches_zero() {
        let values: Vec<f64> = Ramp::down(0.8, 1.5, 25.).collect();
        assert_eq!(values.len(), 38); // ceil(1.5 * 25)
        for pair in values.windows(2) {
            assert!(pair[1] < pair[0]);
        }
        assert!(values[0] < 0.8);
        assert_eq!(values[values.len() - 1], 0.);
    }

    #[test]
    fn degenerate_ramps_are_empty() {
        assert_eq!(Ramp::up(0., 2., 50.).count(), 0);
        assert_eq!(Ramp::up(-1., 2., 50.).count(), 0);
        assert_eq!(Ramp::up(1., 0., 50.).count(), 0);
        assert_eq!(Ramp::down(1., -3., 50.).count(), 0);
    }

    #[test]
    fn fractional_durations_round_up() {
        assert_eq!(Ramp::up(1., 0.01, 25.).len(), 1);
        assert_eq!(Ramp::up(1., 1.01, 25.).len(), 26);
    }
}
