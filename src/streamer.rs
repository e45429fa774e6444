//! Real-time setpoint streaming loop.
//!
//! One dedicated task walks the flight through
//! `Idle -> Takeoff -> Tracking -> Landing -> Stopped`, dispatching one
//! position setpoint per wake. Wakes use absolute deadlines
//! (`next_wake = phase_start + k * P` via [`tokio::time::interval_at`])
//! rather than fixed-duration sleeps, so cumulative drift stays bounded by
//! one period regardless of flight length. A tick that overruns its period
//! skips the missed wakes entirely ([`MissedTickBehavior::Skip`]): a stalled
//! loop must not flush a burst of stale ramp commands at the vehicle when it
//! recovers.

use std::{
    fmt::Debug,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    commander::VehicleCommander,
    ramp::Ramp,
    trajectory::Trajectory,
};

/// Hard floor on the wake period, bounding the vehicle-link load no matter
/// how high the configured rate is.
pub const MIN_COMMAND_PERIOD: Duration = Duration::from_millis(10);

/// Extra time past the nominal trajectory end before landing starts; absorbs
/// scheduling jitter so the final setpoint is sent at least once.
pub const TRACKING_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    Idle,
    Takeoff,
    Tracking,
    Landing,
    /// terminal, entered exactly once
    Stopped,
}

/// Knobs of the streaming loop. Defaults mirror the flight scripts this
/// client grew out of: 25 Hz, 1 m takeoff over 1.5 s, no lookahead.
#[derive(Debug, Clone, Copy)]
pub struct StreamerConfig {
    pub rate_hz: f64,
    pub takeoff_z: f64,
    pub takeoff_s: f64,
    pub land_s: f64,
    /// feed-forward lookahead in seconds: `y_cmd = y + vy * lookahead_s`
    pub lookahead_s: f64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            rate_hz: 25.,
            takeoff_z: 1.,
            takeoff_s: 1.5,
            land_s: 1.5,
            lookahead_s: 0.,
        }
    }
}

impl StreamerConfig {
    /// Wake period, clamped to [`MIN_COMMAND_PERIOD`].
    pub fn period(&self) -> Duration {
        if self.rate_hz <= 0. {
            return MIN_COMMAND_PERIOD;
        }
        Duration::from_secs_f64(1. / self.rate_hz).max(MIN_COMMAND_PERIOD)
    }

    /// Rate actually flown after the period clamp.
    pub fn effective_rate_hz(&self) -> f64 {
        1. / self.period().as_secs_f64()
    }
}

/// Cooperative stop signal, polled once per tick by the streaming loop.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a finished (or aborted) flight looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightReport {
    pub setpoints_sent: usize,
    pub cancelled: bool,
}

pub struct SetpointStreamer<C, E> {
    commander: C,
    config: StreamerConfig,
    phase: FlightPhase,
    setpoints_sent: usize,
    _error: PhantomData<E>,
}

impl<C, E> SetpointStreamer<C, E>
where
    E: Debug,
    C: VehicleCommander<E>,
{
    pub fn new(commander: C, config: StreamerConfig) -> Self {
        Self {
            commander,
            config,
            phase: FlightPhase::Idle,
            setpoints_sent: 0,
            _error: PhantomData,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// Gives the commander back, e.g. to `close()` it after the flight.
    pub fn into_commander(self) -> C {
        self.commander
    }

    /// Flies the whole trajectory: takeoff ramp, tracking, landing ramp,
    /// terminal stop. Returns after the stop setpoint went out, whether the
    /// flight completed or was cancelled mid-phase.
    pub async fn fly(&mut self, trajectory: &Trajectory, cancel: &CancelToken) -> FlightReport {
        let period = self.config.period();
        let rate = self.config.effective_rate_hz();

        self.phase = FlightPhase::Takeoff;
        info!(
            "takeoff to {}m over {}s at {:.0}Hz",
            self.config.takeoff_z, self.config.takeoff_s, rate
        );
        let up = Ramp::up(self.config.takeoff_z, self.config.takeoff_s, rate);
        if self.run_ramp(up, (0., 0., 0.), period, cancel).await {
            return self.stopped(true);
        }

        self.phase = FlightPhase::Tracking;
        let total = trajectory.total_duration();
        info!("tracking {} waypoints over {}s", trajectory.len(), total);
        let phase_start = Instant::now();
        let mut interval = interval_at(phase_start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await; // first tick fires immediately at the phase start
            if cancel.is_cancelled() {
                return self.emergency_stop().await;
            }
            let t = phase_start.elapsed().as_secs_f64();
            let sample = trajectory.sample(t);
            let y_cmd = sample.y + sample.vy * self.config.lookahead_s;
            self.dispatch(sample.x, y_cmd, sample.z, sample.yaw).await;
            if t > total + TRACKING_GRACE.as_secs_f64() {
                break;
            }
        }

        self.phase = FlightPhase::Landing;
        let last = *trajectory.last();
        info!("landing from {}m over {}s", last.z, self.config.land_s);
        let down = Ramp::down(last.z, self.config.land_s, rate);
        // descend in place over the trajectory's endpoint
        if self.run_ramp(down, (last.x, last.y, last.yaw), period, cancel).await {
            return self.stopped(true);
        }

        if let Err(e) = self.commander.send_stop_setpoint().await {
            warn!("couldn't send final stop setpoint: {:?}", e);
        }
        self.stopped(false)
    }

    /// Streams one ramp at the loop rate, anchored at a fixed `(x, y, yaw)`.
    /// Returns true if the flight was cancelled mid-ramp.
    async fn run_ramp(
        &mut self,
        ramp: Ramp,
        anchor: (f64, f64, f64),
        period: Duration,
        cancel: &CancelToken,
    ) -> bool {
        let (x, y, yaw) = anchor;
        let mut interval = interval_at(Instant::now(), period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        for z in ramp {
            interval.tick().await;
            if cancel.is_cancelled() {
                self.emergency_stop().await;
                return true;
            }
            self.dispatch(x, y, z, yaw).await;
        }
        false
    }

    /// Fire-and-forget dispatch: one lost send is logged, never escalated,
    /// and never alters the trajectory state.
    async fn dispatch(&mut self, x: f64, y: f64, z: f64, yaw: f64) {
        self.setpoints_sent += 1;
        if let Err(e) = self.commander.send_position_setpoint(x, y, z, yaw).await {
            warn!("setpoint dispatch failed (dropped): {:?}", e);
        }
    }

    /// One hard stop right now, skipping any remaining ramp.
    async fn emergency_stop(&mut self) -> FlightReport {
        info!("flight cancelled in {:?}, sending stop setpoint", self.phase);
        if let Err(e) = self.commander.send_stop_setpoint().await {
            warn!("couldn't send stop setpoint on cancel: {:?}", e);
        }
        self.stopped(true)
    }

    fn stopped(&mut self, cancelled: bool) -> FlightReport {
        self.phase = FlightPhase::Stopped;
        FlightReport {
            setpoints_sent: self.setpoints_sent,
            cancelled,
        }
    }
}
