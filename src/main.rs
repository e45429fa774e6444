use std::{path::Path, time::Duration};

use colibri_async::{
    commander::{arm, prepare_low_level_mode, reset_estimator},
    config::FlightConfig,
    files, launch_flight_thread,
    telemetry::{ChannelConfig, TelemetryLink, TelemetryMerger},
    testing::SimVehicle,
    trajectory::Trajectory,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Simulated end-to-end flight: the in-process vehicle stands in for the
/// radio link, everything else runs exactly as it would against hardware.
/// For the wire version of the same flow, see `bin/udp_flight.rs`.
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

    let vehicle = SimVehicle::new(0.005);
    let mut commander = vehicle.commander();
    prepare_low_level_mode(&mut commander)
        .await
        .expect("sim commands are infallible");
    reset_estimator(&mut commander, config.estimator_settle_s)
        .await
        .expect("sim commands are infallible");
    arm(&mut commander)
        .await
        .expect("sim commands are infallible");

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
    let mut link = vehicle.clone();
    for channel in channels {
        let handle = match merger.register(&channel) {
            Ok(handle) => handle,
            Err(e) => {
                // firmware/configuration mismatch, not worth taking off with
                error!("telemetry registration failed: {e}");
                return;
            }
        };
        link.subscribe(channel, handle)
            .await
            .expect("sim subscriptions are infallible");
    }

    let (cancel, mut flight) = launch_flight_thread(commander, config.streamer(), trajectory);
    let report = tokio::select! {
        report = &mut flight => report.expect("flight task panicked"),
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c, cancelling the flight");
            cancel.cancel();
            (&mut flight).await.expect("flight task panicked")
        }
    };
    vehicle.shutdown();

    let rows = merger.take_rows();
    if let Err(e) = files::write_flight_log(Path::new(&config.log_path), &rows) {
        error!("couldn't write flight log `{}`: {e}", config.log_path);
        return;
    }
    let pos = vehicle.position();
    info!(
        "flight {}: {} setpoints sent, {} telemetry rows -> {}, vehicle ended at ({:.2}, {:.2}, {:.2})",
        if report.cancelled { "cancelled" } else { "complete" },
        report.setpoints_sent,
        rows.len(),
        config.log_path,
        pos[0],
        pos[1],
        pos[2]
    );
}
