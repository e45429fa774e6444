//! Small angle/interpolation helpers shared by the trajectory sampler.

/// Linear interpolation between `a` and `b` for a fraction `u` in `[0, 1]`.
pub fn lerp(a: f64, b: f64, u: f64) -> f64 {
    a + u * (b - a)
}

/// Wraps an angle in degrees to the interval `(-180, 180]`.
///
/// Used to pick the shortest rotation between two yaw values: the wrapped
/// difference never exceeds a half turn in magnitude, and an exactly
/// opposite target resolves to `+180` so the direction is deterministic.
pub fn wrap_180(angle_deg: f64) -> f64 {
    let wrapped = angle_deg.rem_euclid(360.);
    if wrapped > 180. {
        wrapped - 360.
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerp(2., 6., 0.), 2.);
        assert_eq!(lerp(2., 6., 1.), 6.);
        assert_eq!(lerp(2., 6., 0.5), 4.);
    }

    #[test]
    fn wrap_keeps_small_angles() {
        assert_eq!(wrap_180(0.), 0.);
        assert_eq!(wrap_180(45.), 45.);
        assert_eq!(wrap_180(-90.), -90.);
    }

    #[test]
    fn wrap_crosses_the_circle_boundary() {
        // 350 -> 10 should be a +20 rotation through zero
        assert_eq!(wrap_180(10. - 350.), 20.);
        assert_eq!(wrap_180(350. - 10.), -20.);
        assert_eq!(wrap_180(370.), 10.);
        assert_eq!(wrap_180(-370.), -10.);
    }

    #[test]
    fn wrap_half_turn_is_positive() {
        assert_eq!(wrap_180(180.), 180.);
        assert_eq!(wrap_180(-180.), 180.);
        assert_eq!(wrap_180(540.), 180.);
    }
}
