//! The outbound vehicle-command seam.
//!
//! [`VehicleCommander`] is the only way the rest of the crate talks to the
//! vehicle: world-frame position setpoints, the hard stop, firmware
//! parameter writes and arming. Setpoints are fire-and-forget; no
//! acknowledgement is modeled, and a lost datagram is the caller's problem
//! to log, not to retry.

use std::{fmt::Debug, future::Future, time::Duration};

use tokio::time::sleep;
use tracing::info;

pub mod udp_commander;

pub use udp_commander::UdpVehicleCommander;

/// estimator selector value for the Kalman filter
const KALMAN_ESTIMATOR: f64 = 2.;
/// reset pulse width before the estimator starts re-converging
const ESTIMATOR_RESET_PULSE: Duration = Duration::from_millis(100);
/// time the firmware needs to acknowledge an arming request
const ARM_SETTLE: Duration = Duration::from_millis(400);

pub trait VehicleCommander<E>
where
    E: Debug,
{
    fn send_position_setpoint(
        &mut self,
        x: f64,
        y: f64,
        z: f64,
        yaw_deg: f64,
    ) -> impl Future<Output = Result<(), E>> + Send;

    fn send_stop_setpoint(&mut self) -> impl Future<Output = Result<(), E>> + Send;

    fn set_param(&mut self, name: &str, value: f64) -> impl Future<Output = Result<(), E>> + Send;

    fn send_arming_request(&mut self, armed: bool) -> impl Future<Output = Result<(), E>> + Send;

    // workaround for async Drop, to be replaced when std::future::AsyncDrop is stabilized
    fn close(self) -> impl Future<Output = Result<(), E>> + Send;
}

/// World-frame position setpoints require the high-level commander off and
/// low-level position mode on.
///
/// Failures are returned, never swallowed; the orchestrating binary decides
/// whether a redundant parameter write is worth aborting over.
pub async fn prepare_low_level_mode<E: Debug>(
    commander: &mut impl VehicleCommander<E>,
) -> Result<(), E> {
    commander.set_param("commander.enHighLevel", 0.).await?;
    commander.set_param("flightmode.posSet", 1.).await?;
    Ok(())
}

/// Selects the Kalman estimator and pulses its reset, then waits `settle_s`
/// for the estimate to re-converge before flight.
pub async fn reset_estimator<E: Debug>(
    commander: &mut impl VehicleCommander<E>,
    settle_s: f64,
) -> Result<(), E> {
    commander
        .set_param("stabilizer.estimator", KALMAN_ESTIMATOR)
        .await?;
    commander.set_param("kalman.resetEstimation", 1.).await?;
    sleep(ESTIMATOR_RESET_PULSE).await;
    commander.set_param("kalman.resetEstimation", 0.).await?;
    sleep(Duration::from_secs_f64(settle_s.max(0.))).await;
    info!("estimator reset, settled for {}s", settle_s);
    Ok(())
}

/// Arming request plus the settle delay the firmware needs (harmless if the
/// vehicle was already armed).
pub async fn arm<E: Debug>(commander: &mut impl VehicleCommander<E>) -> Result<(), E> {
    commander.send_arming_request(true).await?;
    sleep(ARM_SETTLE).await;
    Ok(())
}
