//! Time-indexed waypoint table and the pure interpolator over it.
//!
//! A [`Trajectory`] is loaded once from waypoint rows, sorted by time, and
//! never mutated afterwards. [`Trajectory::sample`] maps any query time to a
//! continuous [`Sample`]; queries carry no cursor state and may arrive in any
//! order, so the streamer can be restarted or rewound without touching the
//! table.

use serde::Deserialize;

use crate::math::{lerp, wrap_180};

/// One anchor point of the desired path.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Waypoint {
    /// trajectory-relative time in seconds
    #[serde(rename = "time_s")]
    pub t: f64,
    /// world-frame position in meters
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// world-frame yaw in degrees
    #[serde(rename = "yaw_deg")]
    pub yaw: f64,
    /// optional y-velocity hint in m/s, feeds the lookahead correction only
    #[serde(rename = "vy", default)]
    pub vy_hint: f64,
}

/// Interpolated point of the trajectory at some query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub vy: f64,
}

impl From<Waypoint> for Sample {
    fn from(w: Waypoint) -> Self {
        Sample {
            t: w.t,
            x: w.x,
            y: w.y,
            z: w.z,
            yaw: w.yaw,
            vy: w.vy_hint,
        }
    }
}

/// How the velocity hint behaves between two waypoints.
///
/// The hint feeds a lookahead correction rather than a position setpoint, so
/// a mid-segment discontinuity is acceptable; `StepHold` matches the source
/// scripts and is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VyPolicy {
    /// continuous linear interpolation
    Linear,
    /// hold the segment start's hint until the midpoint, then the end's
    #[default]
    StepHold,
}

#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    #[error("trajectory needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),
}

/// Immutable, time-ordered waypoint table.
#[derive(Debug, Clone)]
pub struct Trajectory {
    points: Vec<Waypoint>,
    vy_policy: VyPolicy,
}

impl Trajectory {
    /// Builds a trajectory from raw waypoint rows.
    ///
    /// Rows are sorted ascending by time; rows sharing the same time keep
    /// only the last occurrence so times are strictly increasing afterwards.
    /// Fails if fewer than 2 waypoints remain.
    pub fn load(mut rows: Vec<Waypoint>, vy_policy: VyPolicy) -> Result<Self, TrajectoryError> {
        rows.sort_by(|a, b| a.t.total_cmp(&b.t));
        // later rows win on duplicate times, same as every other
        // last-write-wins rule in this crate
        rows.reverse();
        rows.dedup_by(|a, b| a.t == b.t);
        rows.reverse();

        if rows.len() < 2 {
            return Err(TrajectoryError::TooFewWaypoints(rows.len()));
        }
        Ok(Self {
            points: rows,
            vy_policy,
        })
    }

    /// Built-in 5 s hover-and-shift demo at z = 1 m, used when no trajectory
    /// file is supplied.
    pub fn demo(vy_policy: VyPolicy) -> Self {
        let rows = [
            (0.0, 0.00, 0.00, 1.0, 0.0, 0.00),
            (1.0, 0.50, 0.00, 1.0, 0.0, 0.00),
            (2.0, 0.50, 0.30, 1.0, 0.0, 0.10),
            (3.0, 0.00, 0.30, 1.0, 0.0, 0.00),
            (4.0, 0.00, 0.00, 1.0, 0.0, -0.10),
            (5.0, 0.00, 0.00, 1.0, 0.0, 0.00),
        ]
        .into_iter()
        .map(|(t, x, y, z, yaw, vy_hint)| Waypoint {
            t,
            x,
            y,
            z,
            yaw,
            vy_hint,
        })
        .collect();
        Self::load(rows, vy_policy).expect("demo trajectory is well-formed")
    }

    /// Time of the last waypoint, i.e. the nominal flight duration.
    pub fn total_duration(&self) -> f64 {
        self.points[self.points.len() - 1].t
    }

    pub fn first(&self) -> &Waypoint {
        &self.points[0]
    }

    pub fn last(&self) -> &Waypoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Interpolated sample at time `t`.
    ///
    /// Clamps to the first/last waypoint outside the table. Inside, position
    /// is linearly interpolated, yaw takes the shortest rotation (never more
    /// than a half turn, even across the 0/360 boundary) and the velocity
    /// hint follows the configured [`VyPolicy`].
    pub fn sample(&self, t: f64) -> Sample {
        let first = self.points[0];
        if t <= first.t {
            return first.into();
        }
        let last = self.points[self.points.len() - 1];
        if t >= last.t {
            return last.into();
        }

        // position of the first waypoint strictly after t; the partition
        // point is >= 1 because t > first.t
        let after = self.points.partition_point(|w| w.t <= t);
        let a = self.points[after - 1];
        let b = self.points[after];

        let u = (t - a.t) / (b.t - a.t);
        let vy = match self.vy_policy {
            VyPolicy::Linear => lerp(a.vy_hint, b.vy_hint, u),
            VyPolicy::StepHold => {
                if u < 0.5 {
                    a.vy_hint
                } else {
                    b.vy_hint
                }
            }
        };
        Sample {
            t,
            x: lerp(a.x, b.x, u),
            y: lerp(a.y, b.y, u),
            z: lerp(a.z, b.z, u),
            yaw: a.yaw + u * wrap_180(b.yaw - a.yaw),
            vy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(t: f64, x: f64, y: f64, z: f64, yaw: f64) -> Waypoint {
        Waypoint {
            t,
            x,
            y,
            z,
            yaw,
            vy_hint: 0.,
        }
    }

    fn square_traj() -> Trajectory {
        Trajectory::load(
            vec![
                wp(0., 0., 0., 0., 0.),
                wp(1., 1., 0., 0., 90.),
                wp(2., 1., 1., 0., 180.),
            ],
            VyPolicy::StepHold,
        )
        .expect("valid trajectory")
    }

    #[test]
    fn rejects_short_tables() {
        assert!(matches!(
            Trajectory::load(vec![wp(0., 0., 0., 0., 0.)], VyPolicy::StepHold),
            Err(TrajectoryError::TooFewWaypoints(1))
        ));
        // duplicates collapse before the length check
        assert!(matches!(
            Trajectory::load(
                vec![wp(1., 0., 0., 0., 0.), wp(1., 5., 0., 0., 0.)],
                VyPolicy::StepHold
            ),
            Err(TrajectoryError::TooFewWaypoints(1))
        ));
    }

    #[test]
    fn sorts_and_dedups_on_load() {
        let traj = Trajectory::load(
            vec![
                wp(2., 2., 0., 0., 0.),
                wp(0., 0., 0., 0., 0.),
                wp(1., 9., 0., 0., 0.),
                wp(1., 1., 0., 0., 0.), // later row wins over the t=1 above
            ],
            VyPolicy::StepHold,
        )
        .expect("valid trajectory");
        assert_eq!(traj.len(), 3);
        assert_eq!(traj.sample(1.).x, 1.);
        assert_eq!(traj.total_duration(), 2.);
    }

    #[test]
    fn clamps_outside_the_table() {
        let traj = square_traj();
        assert_eq!(traj.sample(-5.), (*traj.first()).into());
        assert_eq!(traj.sample(0.), (*traj.first()).into());
        assert_eq!(traj.sample(2.), (*traj.last()).into());
        assert_eq!(traj.sample(100.), (*traj.last()).into());
    }

    #[test]
    fn passes_through_knots() {
        let traj = square_traj();
        let s = traj.sample(1.);
        assert!((s.x - 1.).abs() < 1e-12);
        assert!((s.y - 0.).abs() < 1e-12);
        assert!((s.yaw - 90.).abs() < 1e-12);
    }

    #[test]
    fn interpolates_the_two_segment_example() {
        let traj = square_traj();

        let s = traj.sample(0.5);
        assert!((s.x - 0.5).abs() < 1e-12);
        assert!((s.y - 0.).abs() < 1e-12);
        assert!((s.z - 0.).abs() < 1e-12);
        assert!((s.yaw - 45.).abs() < 1e-12);

        let s = traj.sample(1.5);
        assert!((s.x - 1.).abs() < 1e-12);
        assert!((s.y - 0.5).abs() < 1e-12);
        assert!((s.yaw - 135.).abs() < 1e-12);
    }

    #[test]
    fn yaw_takes_the_short_way_around() {
        let traj = Trajectory::load(
            vec![wp(0., 0., 0., 0., 350.), wp(1., 0., 0., 0., 10.)],
            VyPolicy::StepHold,
        )
        .expect("valid trajectory");
        // 350 -> 10 is the +20 path through 0, not the -340 one
        let s = traj.sample(0.5);
        assert!((s.yaw - 360.).abs() < 1e-12);
        // every query stays within the 20 degree arc between the endpoints
        for i in 0..=100 {
            let yaw = traj.sample(i as f64 / 100.).yaw;
            assert!(wrap_180(yaw - 350.).abs() <= 20. + 1e-9);
        }
    }

    #[test]
    fn vy_step_hold_switches_at_the_midpoint() {
        let mut a = wp(0., 0., 0., 0., 0.);
        let mut b = wp(1., 1., 0., 0., 0.);
        a.vy_hint = 0.2;
        b.vy_hint = -0.4;

        let traj = Trajectory::load(vec![a, b], VyPolicy::StepHold).expect("valid trajectory");
        assert_eq!(traj.sample(0.25).vy, 0.2);
        assert_eq!(traj.sample(0.5).vy, -0.4);
        assert_eq!(traj.sample(0.75).vy, -0.4);

        let traj = Trajectory::load(vec![a, b], VyPolicy::Linear).expect("valid trajectory");
        assert!((traj.sample(0.5).vy - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn sampling_is_pure() {
        let traj = square_traj();
        let forward: Vec<_> = (0..=20).map(|i| traj.sample(i as f64 * 0.1)).collect();
        let backward: Vec<_> = (0..=20).rev().map(|i| traj.sample(i as f64 * 0.1)).collect();
        for (f, b) in forward.iter().zip(backward.iter().rev()) {
            assert_eq!(f, b);
        }
    }
}
