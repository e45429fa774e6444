//! Flight client over the UDP link. Expects a vehicle endpoint speaking the
//! JSON datagram protocol on the configured address: the bundled
//! `sim_vehicle` binary, or a bridge fronting the real radio.

use std::{path::Path, time::Duration};

use colibri_async::{
    commander::{arm, prepare_low_level_mode, reset_estimator, UdpVehicleCommander},
    config::FlightConfig,
    files, launch_flight_thread,
    net::udp_receiver::UdpReceiver,
    pump_telemetry_forever,
    telemetry::{ChannelConfig, TelemetryMerger},
    trajectory::Trajectory,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match FlightConfig::load_or_default(Path::new("flight.json")) {
        Ok(config) => config,
        Err(e) => {
            error!("invalid flight configuration: {e}");
            return;
        }
    };

    let traj_path = Path::new(&config.trajectory_path);
    let trajectory = if traj_path.exists() {
        let rows = match files::read_trajectory_csv(traj_path) {
            Ok(rows) => rows,
            Err(e) => {
                error!("couldn't load trajectory `{}`: {e}", config.trajectory_path);
                return;
            }
        };
        match Trajectory::load(rows, config.vy_policy) {
            Ok(trajectory) => trajectory,
            Err(e) => {
                error!("invalid trajectory `{}`: {e}", config.trajectory_path);
                return;
            }
        }
    } else {
        info!(
            "no `{}`, flying the built-in demo trajectory",
            config.trajectory_path
        );
        Trajectory::demo(config.vy_policy)
    };

    let mut commander =
        match UdpVehicleCommander::new(config.vehicle_ip, config.vehicle_port).await {
            Ok(commander) => commander,
            Err(e) => {
                error!("couldn't open the command socket: {:?}", e);
                return;
            }
        };
    if let Err(e) = prepare_low_level_mode(&mut commander).await {
        error!("pre-flight mode setup failed: {:?}", e);
        return;
    }
    if let Err(e) = reset_estimator(&mut commander, config.estimator_settle_s).await {
        error!("estimator reset failed: {:?}", e);
        return;
    }
    if let Err(e) = arm(&mut commander).await {
        error!("arming failed: {:?}", e);
        return;
    }

    let merger = TelemetryMerger::new();
    let channels = [
        ChannelConfig::new(
            "stateEstimate",
            &[
                "stateEstimate.x",
                "stateEstimate.y",
                "stateEstimate.z",
                "stateEstimate.vx",
                "stateEstimate.vy",
                "stateEstimate.vz",
            ],
            Duration::from_secs_f64(1. / config.rate_hz),
        ),
        ChannelConfig::new("acc", &["acc.x", "acc.y", "acc.z"], Duration::from_millis(10)),
    ];
    let mut handles = Vec::new();
    for channel in channels {
        match merger.register(&channel) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!("telemetry registration failed: {e}");
                return;
            }
        }
    }
    let receiver = match UdpReceiver::bind(config.telemetry_port).await {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("couldn't bind the telemetry port: {e}");
            return;
        }
    };
    let pump = tokio::spawn(pump_telemetry_forever(receiver, handles));

    let (cancel, mut flight) = launch_flight_thread(commander, config.streamer(), trajectory);
    let report = tokio::select! {
        report = &mut flight => report.expect("flight task panicked"),
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c, cancelling the flight");
            cancel.cancel();
            (&mut flight).await.expect("flight task panicked")
        }
    };
    pump.abort();

    let rows = merger.take_rows();
    if let Err(e) = files::write_flight_log(Path::new(&config.log_path), &rows) {
        error!("couldn't write flight log `{}`: {e}", config.log_path);
        return;
    }
    info!(
        "flight {}: {} setpoints sent, {} telemetry rows -> {}",
        if report.cancelled { "cancelled" } else { "complete" },
        report.setpoints_sent,
        rows.len(),
        config.log_path
    );
}
