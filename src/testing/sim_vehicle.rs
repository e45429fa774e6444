//! In-process simulated vehicle.
//!
//! Tracks the last position setpoint with first-order lag dynamics and
//! serves the telemetry catalog on independently-clocked channels, which is
//! all the flight client can observe of a real vehicle. Used by the demo
//! binaries and the integration tests.

use std::{
    convert::Infallible,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::Rng;
use tokio::{
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    commander::VehicleCommander,
    protocol::VehiclePacket,
    telemetry::{ChannelConfig, ChannelHandle, TelemetryLink},
    IgnoreMutexErr,
};

/// dynamics integration rate
const DYNAMICS_PERIOD: Duration = Duration::from_millis(10);
/// first-order position lag constant
const LAG_TAU_S: f64 = 0.3;
const GRAVITY: f64 = 9.81;

#[derive(Default)]
struct SimState {
    /// last position setpoint, None before the first and after a stop
    target: Option<(f64, f64, f64, f64)>,
    pos: [f64; 3],
    vel: [f64; 3],
    acc: [f64; 3],
    armed: bool,
    params: Vec<(String, f64)>,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct SimVehicle {
    state: Arc<Mutex<SimState>>,
    started: Instant,
    /// sensor noise amplitude added to every served value
    noise: f64,
}

impl SimVehicle {
    pub fn new(noise: f64) -> Self {
        let vehicle = Self {
            state: Arc::new(Mutex::new(SimState {
                // a vehicle at rest still measures gravity on z
                acc: [0., 0., GRAVITY],
                ..SimState::default()
            })),
            started: Instant::now(),
            noise,
        };
        let task = tokio::spawn(run_dynamics(vehicle.state.clone()));
        vehicle.state.lock().unwrap_ignore_poison().tasks.push(task);
        vehicle
    }

    /// A cheap cloneable command endpoint into this vehicle.
    pub fn commander(&self) -> SimVehicleCommander {
        SimVehicleCommander {
            state: self.state.clone(),
        }
    }

    /// Applies one wire command, exactly as the UDP endpoint would.
    pub fn apply(&self, packet: &VehiclePacket) {
        apply(&self.state, packet);
    }

    pub fn position(&self) -> [f64; 3] {
        self.state.lock().unwrap_ignore_poison().pos
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().unwrap_ignore_poison().armed
    }

    /// Last written value of a firmware parameter.
    pub fn param(&self, name: &str) -> Option<f64> {
        let state = self.state.lock().unwrap_ignore_poison();
        state
            .params
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Vehicle-side clock in seconds.
    pub fn clock(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Serves one catalog variable with sensor noise applied.
    pub fn sample_variable(&self, variable: &str) -> Option<f64> {
        let state = self.state.lock().unwrap_ignore_poison();
        let value = match variable {
            "stateEstimate.x" => state.pos[0],
            "stateEstimate.y" => state.pos[1],
            "stateEstimate.z" => state.pos[2],
            "stateEstimate.vx" => state.vel[0],
            "stateEstimate.vy" => state.vel[1],
            "stateEstimate.vz" => state.vel[2],
            "acc.x" => state.acc[0],
            "acc.y" => state.acc[1],
            "acc.z" => state.acc[2],
            _ => return None,
        };
        drop(state);
        let noise = if self.noise > 0. {
            rand::thread_rng().gen_range(-self.noise..=self.noise)
        } else {
            0.
        };
        Some(value + noise)
    }

    /// Aborts the dynamics and channel tasks. The subscriptions die with the
    /// flight, mirroring the teardown a real link does on disconnect.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap_ignore_poison();
        for task in state.tasks.drain(..) {
            task.abort();
        }
    }
}

impl TelemetryLink<Infallible> for SimVehicle {
    /// Spawns one task per channel, delivering at the channel's own cadence.
    async fn subscribe(
        &mut self,
        config: ChannelConfig,
        handle: ChannelHandle,
    ) -> Result<(), Infallible> {
        let vehicle = self.clone();
        debug!(
            "sim vehicle serving channel `{}` every {:?}",
            config.name, config.period
        );
        let task = tokio::spawn(async move {
            let mut ticker = interval(config.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let values: Vec<(String, f64)> = config
                    .variables
                    .iter()
                    .filter_map(|v| vehicle.sample_variable(v).map(|value| (v.clone(), value)))
                    .collect();
                handle.deliver(vehicle.clock(), &values);
            }
        });
        self.state.lock().unwrap_ignore_poison().tasks.push(task);
        Ok(())
    }
}

fn apply(state: &Arc<Mutex<SimState>>, packet: &VehiclePacket) {
    let mut state = state.lock().unwrap_ignore_poison();
    match packet {
        VehiclePacket::PositionSetpoint { x, y, z, yaw_deg } => {
            state.target = Some((*x, *y, *z, *yaw_deg));
        }
        VehiclePacket::StopSetpoint => {
            state.target = None;
            state.vel = [0.; 3];
        }
        VehiclePacket::ParamSet { name, value } => {
            state.params.push((name.clone(), *value));
        }
        VehiclePacket::Arm { armed } => {
            state.armed = *armed;
        }
    }
}

/// First-order lag toward the target; velocity and accelerometer output are
/// finite differences, with gravity on the accelerometer z axis.
async fn run_dynamics(state: Arc<Mutex<SimState>>) {
    let dt = DYNAMICS_PERIOD.as_secs_f64();
    let alpha = (dt / LAG_TAU_S).min(1.);
    let mut ticker = interval(DYNAMICS_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let mut state = state.lock().unwrap_ignore_poison();
        let Some((tx, ty, tz, _yaw)) = state.target else {
            // idle or stopped: no motion, the accelerometer reads gravity
            state.acc = [0., 0., GRAVITY];
            continue;
        };
        let old_pos = state.pos;
        let old_vel = state.vel;
        let target = [tx, ty, tz];
        for i in 0..3 {
            let pos = old_pos[i] + (target[i] - old_pos[i]) * alpha;
            let vel = (pos - old_pos[i]) / dt;
            state.pos[i] = pos;
            state.vel[i] = vel;
            state.acc[i] = (vel - old_vel[i]) / dt;
        }
        state.acc[2] += GRAVITY;
    }
}

/// Commander half of the simulated vehicle; every command applies instantly.
#[derive(Clone)]
pub struct SimVehicleCommander {
    state: Arc<Mutex<SimState>>,
}

impl VehicleCommander<Infallible> for SimVehicleCommander {
    fn send_position_setpoint(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        yaw_deg: f64,
    ) -> impl Future<Output = Result<(), Infallible>> + Send {
        apply(
            &self.state,
            &VehiclePacket::PositionSetpoint { x, y, z, yaw_deg },
        );
        std::future::ready(Ok(()))
    }

    fn send_stop_setpoint(&mut self) -> impl Future<Output = Result<(), Infallible>> + Send {
        apply(&self.state, &VehiclePacket::StopSetpoint);
        std::future::ready(Ok(()))
    }

    async fn set_param(&mut self, name: &str, value: f64) -> Result<(), Infallible> {
        apply(
            &self.state,
            &VehiclePacket::ParamSet {
                name: name.to_string(),
                value,
            },
        );
        Ok(())
    }

    async fn send_arming_request(&mut self, armed: bool) -> Result<(), Infallible> {
        apply(&self.state, &VehiclePacket::Arm { armed });
        Ok(())
    }

    async fn close(mut self) -> Result<(), Infallible> {
        self.send_stop_setpoint().await
    }
}
