//! Standalone simulated vehicle endpoint: applies JSON commands arriving on
//! the command port and serves the stock telemetry channels back over UDP.
//! Run it first, then fly against it with `udp_flight`.

use std::{net::Ipv4Addr, time::Duration};

use colibri_async::{
    net::{udp_receiver::UdpReceiver, udp_transceiver::UdpTransceiver},
    protocol::{TelemetryPacket, VehiclePacket},
    testing::SimVehicle,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const COMMAND_PORT: u16 = 8500;
const TELEMETRY_PORT: u16 = 8600;
const SENSOR_NOISE: f64 = 0.005;

const CHANNELS: [(&str, &[&str], Duration); 2] = [
    (
        "stateEstimate",
        &[
            "stateEstimate.x",
            "stateEstimate.y",
            "stateEstimate.z",
            "stateEstimate.vx",
            "stateEstimate.vy",
            "stateEstimate.vz",
        ],
        Duration::from_millis(40),
    ),
    ("acc", &["acc.x", "acc.y", "acc.z"], Duration::from_millis(10)),
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut commands = UdpReceiver::bind(COMMAND_PORT)
        .await
        .expect("couldn't bind the command port");
    let vehicle = SimVehicle::new(SENSOR_NOISE);

    for (channel, variables, period) in CHANNELS {
        let vehicle = vehicle.clone();
        tokio::spawn(async move {
            let socket = UdpTransceiver::new(Ipv4Addr::LOCALHOST, TELEMETRY_PORT)
                .await
                .expect("couldn't open the telemetry socket");
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let values: Vec<(String, f64)> = variables
                    .iter()
                    .filter_map(|v| vehicle.sample_variable(v).map(|x| (v.to_string(), x)))
                    .collect();
                let packet = TelemetryPacket {
                    channel: channel.to_string(),
                    timestamp: vehicle.clock(),
                    values,
                };
                if let Err(e) = socket.send(&packet).await {
                    warn!("telemetry send failed: {:?}", e);
                }
            }
        });
    }

    {
        let vehicle = vehicle.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let pos = vehicle.position();
                info!(
                    "vehicle at ({:.2}, {:.2}, {:.2}), armed: {}",
                    pos[0],
                    pos[1],
                    pos[2],
                    vehicle.is_armed()
                );
            }
        });
    }

    info!("sim vehicle: commands on :{COMMAND_PORT}, telemetry to :{TELEMETRY_PORT}");
    loop {
        match commands.receive::<VehiclePacket>().await {
            Ok(packet) => vehicle.apply(&packet),
            Err(e) => warn!("bad command packet: {:?}", e),
        }
    }
}
