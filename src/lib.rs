#![deny(clippy::unwrap_used)]
#![allow(async_fn_in_trait)]
pub mod commander;
pub mod config;
pub mod files;
pub mod math;
pub mod net;
pub mod protocol;
pub mod ramp;
pub mod streamer;
pub mod telemetry;
pub mod testing;
pub mod trajectory;

use std::{fmt::Debug, sync::LockResult};

use commander::VehicleCommander;
use net::udp_receiver::UdpReceiver;
use protocol::TelemetryPacket;
use streamer::{CancelToken, FlightReport, SetpointStreamer, StreamerConfig};
use telemetry::ChannelHandle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use trajectory::Trajectory;

pub trait IgnoreMutexErr<T> {
    fn unwrap_ignore_poison(self) -> T;
}

impl<T> IgnoreMutexErr<T> for LockResult<T> {
    fn unwrap_ignore_poison(self) -> T {
        match self {
            Ok(r) => r,
            Err(poisoned) => {
                // Handle mutex poisoning
                let guard = poisoned.into_inner();
                warn!("mutex was poisoned, recovering from mutex poisoning");
                guard
            }
        }
    }
}

/// Spawns the setpoint streaming task for one flight and hands back the
/// cancellation token plus the task handle.
///
/// The streamer polls the token once per tick; cancelling produces one hard
/// stop setpoint and a terminal `Stopped` phase, never a forced abort. The
/// commander is closed when the flight ends either way.
pub fn launch_flight_thread<E, C>(
    commander: C,
    config: StreamerConfig,
    trajectory: Trajectory,
) -> (CancelToken, JoinHandle<FlightReport>)
where
    E: Debug + Send + 'static,
    C: VehicleCommander<E> + Send + 'static,
{
    let cancel = CancelToken::new();
    let loop_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let mut streamer = SetpointStreamer::new(commander, config);
        let report = streamer.fly(&trajectory, &loop_cancel).await;
        if let Err(e) = streamer.into_commander().close().await {
            warn!("couldn't close the vehicle commander: {:?}", e);
        }
        report
    });
    (cancel, handle)
}

/// Receive loop for UDP-served telemetry: decodes each datagram and routes
/// it to the matching registered channel.
///
/// Decode failures and unknown channels are reported and dropped; one bad
/// packet must never stall the pump or leak into the control loop.
pub async fn pump_telemetry_forever(mut receiver: UdpReceiver, channels: Vec<ChannelHandle>) {
    loop {
        match receiver.receive::<TelemetryPacket>().await {
            Ok(packet) => {
                match channels.iter().find(|c| c.channel() == packet.channel) {
                    Some(handle) => handle.deliver(packet.timestamp, &packet.values),
                    None => debug!("telemetry for unregistered channel `{}`", packet.channel),
                }
            }
            Err(e) => {
                warn!("couldn't decode telemetry packet: {:?}", e);
            }
        }
    }
}
