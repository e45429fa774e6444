//! JSON datagram protocol spoken between the client and the (simulated)
//! vehicle endpoint.
//!
//! The real radio link frames the same commands in its own binary format;
//! for this client plus the bundled simulator, tagged JSON over UDP is
//! enough and keeps the packets inspectable with tcpdump.

use serde::{Deserialize, Serialize};

/// Client -> vehicle commands.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum VehiclePacket {
    /// world-frame position + yaw target, fire-and-forget
    PositionSetpoint { x: f64, y: f64, z: f64, yaw_deg: f64 },
    /// cut setpoint streaming, motors off
    StopSetpoint,
    /// firmware parameter write
    ParamSet { name: String, value: f64 },
    /// arming request
    Arm { armed: bool },
}

/// Vehicle -> client telemetry delivery for one channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TelemetryPacket {
    /// channel the values belong to, e.g. `stateEstimate`
    pub channel: String,
    /// vehicle-side timestamp in seconds
    pub timestamp: f64,
    /// named values, e.g. `stateEstimate.x`
    pub values: Vec<(String, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_round_trip_through_json() {
        let packet = VehiclePacket::PositionSetpoint {
            x: 0.5,
            y: -0.25,
            z: 1.,
            yaw_deg: 45.,
        };
        let encoded = serde_json::to_string(&packet).expect("packet serializes");
        assert!(encoded.contains("PositionSetpoint"));
        let decoded: VehiclePacket = serde_json::from_str(&encoded).expect("packet parses");
        assert_eq!(decoded, packet);
    }
}
