//! Flight configuration.
//!
//! Loaded from an optional JSON file; every knob has a default matching the
//! flight scripts this client replaces. A missing file falls back to the
//! defaults, but a present-and-broken file is a fatal configuration error:
//! it is returned, never silently absorbed.

use std::{net::Ipv4Addr, path::Path};

use serde::Deserialize;

use crate::{streamer::StreamerConfig, trajectory::VyPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlightConfig {
    /// vehicle command endpoint (the sim_vehicle binary by default)
    pub vehicle_ip: Ipv4Addr,
    pub vehicle_port: u16,
    /// local port UDP telemetry arrives on
    pub telemetry_port: u16,
    /// setpoint streaming rate
    pub rate_hz: f64,
    pub takeoff_z: f64,
    pub takeoff_s: f64,
    pub land_s: f64,
    /// y-velocity feed-forward lookahead in seconds, 0 disables
    pub lookahead_s: f64,
    pub vy_policy: VyPolicy,
    /// settle time after the estimator reset pulse
    pub estimator_settle_s: f64,
    pub trajectory_path: String,
    pub log_path: String,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            vehicle_ip: Ipv4Addr::LOCALHOST,
            vehicle_port: 8500,
            telemetry_port: 8600,
            rate_hz: 25.,
            takeoff_z: 1.,
            takeoff_s: 1.5,
            land_s: 1.5,
            lookahead_s: 0.,
            vy_policy: VyPolicy::StepHold,
            estimator_settle_s: 1.,
            trajectory_path: "Traj.csv".to_string(),
            log_path: "flight_log.csv".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rate_hz must be positive, got {0}")]
    InvalidRate(f64),
}

impl FlightConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        // a nonsensical rate must not silently fly at the period clamp's
        // fastest allowed rate
        if config.rate_hz <= 0. || !config.rate_hz.is_finite() {
            return Err(ConfigError::InvalidRate(config.rate_hz));
        }
        Ok(config)
    }

    /// Defaults when `path` doesn't exist, parse result otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn streamer(&self) -> StreamerConfig {
        StreamerConfig {
            rate_hz: self.rate_hz,
            takeoff_z: self.takeoff_z,
            takeoff_s: self.takeoff_s,
            land_s: self.land_s,
            lookahead_s: self.lookahead_s,
        }
    }
}
