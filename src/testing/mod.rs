//! Test and simulation support: a commander that records what was sent, and
//! an in-process simulated vehicle for end-to-end runs without hardware.

pub mod sim_vehicle;

pub use sim_vehicle::{SimVehicle, SimVehicleCommander};

use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
};

use crate::{commander::VehicleCommander, protocol::VehiclePacket};

/// Commander that appends every command to a shared vec instead of sending
/// it anywhere. The streamer tests assert on the recorded sequence.
#[derive(Clone, Default)]
pub struct RecordingCommander {
    sent: Arc<Mutex<Vec<VehiclePacket>>>,
}

impl RecordingCommander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Arc<Mutex<Vec<VehiclePacket>>> {
        self.sent.clone()
    }

    fn push(&self, packet: VehiclePacket) {
        self.sent.lock().expect("recording lock").push(packet);
    }
}

impl VehicleCommander<Infallible> for RecordingCommander {
    async fn send_position_setpoint(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        yaw_deg: f64,
    ) -> Result<(), Infallible> {
        self.push(VehiclePacket::PositionSetpoint { x, y, z, yaw_deg });
        Ok(())
    }

    async fn send_stop_setpoint(&mut self) -> Result<(), Infallible> {
        self.push(VehiclePacket::StopSetpoint);
        Ok(())
    }

    async fn set_param(&mut self, name: &str, value: f64) -> Result<(), Infallible> {
        self.push(VehiclePacket::ParamSet {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    async fn send_arming_request(&mut self, armed: bool) -> Result<(), Infallible> {
        self.push(VehiclePacket::Arm { armed });
        Ok(())
    }

    async fn close(self) -> Result<(), Infallible> {
        Ok(())
    }
}
