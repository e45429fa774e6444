use std::{future::Future, net::Ipv4Addr};

use crate::{
    net::{udp_transceiver::UdpTransceiver, SendError},
    protocol::VehiclePacket,
};

use super::VehicleCommander;

/// Vehicle commander over a connected UDP socket, one JSON command per
/// datagram. Pointed at the bundled `sim_vehicle` binary by default, or at
/// whatever bridge fronts the real radio link.
pub struct UdpVehicleCommander {
    socket: UdpTransceiver,
}

impl UdpVehicleCommander {
    pub async fn new(
        ip: Ipv4Addr,
        port: u16,
    ) -> Result<Self, crate::net::udp_transceiver::UdpTransceiverCreationError> {
        Ok(Self {
            socket: UdpTransceiver::new(ip, port).await?,
        })
    }

    async fn send(&self, packet: VehiclePacket) -> Result<(), SendError> {
        self.socket.send(&packet).await.map(|_| ())
    }
}

impl VehicleCommander<SendError> for UdpVehicleCommander {
    fn send_position_setpoint(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        yaw_deg: f64,
    ) -> impl Future<Output = Result<(), SendError>> + Send {
        self.send(VehiclePacket::PositionSetpoint { x, y, z, yaw_deg })
    }

    fn send_stop_setpoint(&mut self) -> impl Future<Output = Result<(), SendError>> + Send {
        self.send(VehiclePacket::StopSetpoint)
    }

    async fn set_param(&mut self, name: &str, value: f64) -> Result<(), SendError> {
        self.send(VehiclePacket::ParamSet {
            name: name.to_string(),
            value,
        })
        .await
    }

    async fn send_arming_request(&mut self, armed: bool) -> Result<(), SendError> {
        self.send(VehiclePacket::Arm { armed }).await
    }

    // the stop setpoint doubles as the teardown command so a dropped link
    // never leaves the vehicle chasing a stale target
    async fn close(mut self) -> Result<(), SendError> {
        self.send_stop_setpoint().await
    }
}
