//! Telemetry merge buffer.
//!
//! The vehicle streams several independently-clocked channels (state
//! estimate, inertial sensors). Each channel owns a disjoint set of fields
//! of one shared [`TelemetryRecord`]; every delivery writes its owned fields
//! and appends a full snapshot to the output row sequence under a single
//! lock. The output row rate is therefore the *sum* of the channel rates,
//! and a row may carry stale values in the fields its triggering channel
//! does not own: this is merge-by-union, not resampling, and consumers of
//! the flight log must tolerate it.
//!
//! Variable names are resolved against a closed catalog exactly once, at
//! registration. An unknown name is a firmware/configuration mismatch and
//! fails registration immediately; it is never retried.

use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::IgnoreMutexErr;

/// Closed tag union of the fields a telemetry channel can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    X,
    Y,
    Z,
    Vx,
    Vy,
    Vz,
    Ax,
    Ay,
    Az,
}

/// Every variable the vehicle can serve, by firmware name.
const CATALOG: &[(&str, Field)] = &[
    ("stateEstimate.x", Field::X),
    ("stateEstimate.y", Field::Y),
    ("stateEstimate.z", Field::Z),
    ("stateEstimate.vx", Field::Vx),
    ("stateEstimate.vy", Field::Vy),
    ("stateEstimate.vz", Field::Vz),
    ("acc.x", Field::Ax),
    ("acc.y", Field::Ay),
    ("acc.z", Field::Az),
];

fn resolve(variable: &str) -> Result<Field, TelemetryError> {
    CATALOG
        .iter()
        .find(|(name, _)| *name == variable)
        .map(|(_, field)| *field)
        .ok_or_else(|| TelemetryError::UnknownVariable(variable.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown telemetry variable `{0}`, not in the vehicle catalog")]
    UnknownVariable(String),
    #[error("telemetry field {0:?} is already owned by another channel")]
    FieldAlreadyOwned(Field),
    #[error("channel `{0}` requests no variables")]
    EmptyChannel(String),
}

/// One merged telemetry state. Fields hold [`f64::NAN`] until the owning
/// channel's first delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self {
            t: f64::NAN,
            x: f64::NAN,
            y: f64::NAN,
            z: f64::NAN,
            vx: f64::NAN,
            vy: f64::NAN,
            vz: f64::NAN,
            ax: f64::NAN,
            ay: f64::NAN,
            az: f64::NAN,
        }
    }
}

impl TelemetryRecord {
    fn set(&mut self, field: Field, value: f64) {
        match field {
            Field::X => self.x = value,
            Field::Y => self.y = value,
            Field::Z => self.z = value,
            Field::Vx => self.vx = value,
            Field::Vy => self.vy = value,
            Field::Vz => self.vz = value,
            Field::Ax => self.ax = value,
            Field::Ay => self.ay = value,
            Field::Az => self.az = value,
        }
    }
}

/// Requested subscription for one channel: which firmware variables it
/// carries and how often the vehicle should serve it.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub name: String,
    pub variables: Vec<String>,
    pub period: Duration,
}

impl ChannelConfig {
    pub fn new(name: &str, variables: &[&str], period: Duration) -> Self {
        Self {
            name: name.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            period,
        }
    }
}

#[derive(Default)]
struct MergerInner {
    record: TelemetryRecord,
    rows: Vec<TelemetryRecord>,
    owned: Vec<Field>,
}

/// Owner of the shared record and the output row sequence.
///
/// Created at flight start, handed to the log writer at flight end; never a
/// process-wide global.
#[derive(Clone, Default)]
pub struct TelemetryMerger {
    inner: Arc<Mutex<MergerInner>>,
}

impl TelemetryMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a channel's variables against the catalog and claims its
    /// fields. Fails fast on unknown variables and on fields another channel
    /// already owns; a registration failure means a firmware/configuration
    /// mismatch and must block flight start.
    pub fn register(&self, channel: &ChannelConfig) -> Result<ChannelHandle, TelemetryError> {
        if channel.variables.is_empty() {
            return Err(TelemetryError::EmptyChannel(channel.name.clone()));
        }
        let fields = channel
            .variables
            .iter()
            .map(|variable| Ok((resolve(variable)?, variable.clone())))
            .collect::<Result<Vec<_>, TelemetryError>>()?;

        let mut inner = self.inner.lock().unwrap_ignore_poison();
        for (field, _) in &fields {
            if inner.owned.contains(field) {
                return Err(TelemetryError::FieldAlreadyOwned(*field));
            }
        }
        inner.owned.extend(fields.iter().map(|(field, _)| *field));
        debug!(
            "registered telemetry channel `{}` owning {:?}",
            channel.name,
            fields.iter().map(|(f, _)| *f).collect::<Vec<_>>()
        );

        Ok(ChannelHandle {
            channel: channel.name.clone(),
            fields,
            inner: self.inner.clone(),
        })
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap_ignore_poison().rows.len()
    }

    /// Current merged state (mostly for status logging).
    pub fn current(&self) -> TelemetryRecord {
        self.inner.lock().unwrap_ignore_poison().record
    }

    /// Hands the accumulated rows to the caller and leaves the buffer empty.
    pub fn take_rows(&self) -> Vec<TelemetryRecord> {
        std::mem::take(&mut self.inner.lock().unwrap_ignore_poison().rows)
    }
}

/// A registered channel's write capability: its variable names resolved to
/// fields, plus access to the shared record.
#[derive(Clone)]
pub struct ChannelHandle {
    channel: String,
    fields: Vec<(Field, String)>,
    inner: Arc<Mutex<MergerInner>>,
}

impl ChannelHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// One delivery from the vehicle: writes the owned fields present in
    /// `values`, tags the record with `timestamp` and appends a snapshot.
    ///
    /// The whole update happens in one critical section so row order in the
    /// output equals arrival order. A variable missing from a delivery is a
    /// per-channel decode error: the field keeps its previous value and the
    /// other channels are unaffected.
    pub fn deliver(&self, timestamp: f64, values: &[(String, f64)]) {
        let mut inner = self.inner.lock().unwrap_ignore_poison();
        for (field, variable) in &self.fields {
            match values.iter().find(|(name, _)| name == variable) {
                Some((_, value)) => inner.record.set(*field, *value),
                None => warn!(
                    "channel `{}` delivery at t={} is missing `{}`, keeping previous value",
                    self.channel, timestamp, variable
                ),
            }
        }
        inner.record.t = timestamp;
        let snapshot = inner.record;
        inner.rows.push(snapshot);
    }
}

/// Subscription seam to whatever serves telemetry (the simulated vehicle
/// in-process, or a receive loop fed by the radio bridge).
pub trait TelemetryLink<E>
where
    E: Debug,
{
    fn subscribe(
        &mut self,
        config: ChannelConfig,
        handle: ChannelHandle,
    ) -> impl Future<Output = Result<(), E>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_channel() -> ChannelConfig {
        ChannelConfig::new(
            "stateEstimate",
            &["stateEstimate.x", "stateEstimate.y", "stateEstimate.z"],
            Duration::from_millis(40),
        )
    }

    fn acc_channel() -> ChannelConfig {
        ChannelConfig::new(
            "acc",
            &["acc.x", "acc.y", "acc.z"],
            Duration::from_millis(10),
        )
    }

    fn values(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn unknown_variable_fails_registration() {
        let merger = TelemetryMerger::new();
        let channel = ChannelConfig::new(
            "bogus",
            &["stateEstimate.x", "position.q"],
            Duration::from_millis(10),
        );
        assert!(matches!(
            merger.register(&channel),
            Err(TelemetryError::UnknownVariable(name)) if name == "position.q"
        ));
        // nothing was claimed by the failed registration
        assert!(merger.register(&state_channel()).is_ok());
    }

    #[test]
    fn channels_cannot_share_fields() {
        let merger = TelemetryMerger::new();
        merger.register(&state_channel()).expect("first claim");
        let overlapping = ChannelConfig::new(
            "flow",
            &["stateEstimate.y"],
            Duration::from_millis(10),
        );
        assert!(matches!(
            merger.register(&overlapping),
            Err(TelemetryError::FieldAlreadyOwned(Field::Y))
        ));
    }

    #[test]
    fn fields_start_unknown() {
        let merger = TelemetryMerger::new();
        let record = merger.current();
        assert!(record.t.is_nan());
        assert!(record.x.is_nan());
        assert!(record.az.is_nan());
    }

    #[test]
    fn union_merge_keeps_companion_fields() {
        let merger = TelemetryMerger::new();
        let state = merger.register(&state_channel()).expect("state channel");
        let acc = merger.register(&acc_channel()).expect("acc channel");

        state.deliver(
            0.10,
            &values(&[
                ("stateEstimate.x", 1.),
                ("stateEstimate.y", 2.),
                ("stateEstimate.z", 3.),
            ]),
        );
        acc.deliver(
            0.12,
            &values(&[("acc.x", 0.1), ("acc.y", 0.2), ("acc.z", 9.8)]),
        );

        let rows = merger.take_rows();
        assert_eq!(rows.len(), 2);
        // the acc-triggered row still carries the last state estimate
        let row = rows[1];
        assert_eq!(row.t, 0.12);
        assert_eq!((row.x, row.y, row.z), (1., 2., 3.));
        assert_eq!((row.ax, row.ay, row.az), (0.1, 0.2, 9.8));
        // and the state-triggered row predates any acc data
        assert!(rows[0].ax.is_nan());
    }

    #[test]
    fn one_row_per_delivery_in_arrival_order() {
        let merger = TelemetryMerger::new();
        let state = merger.register(&state_channel()).expect("state channel");
        for i in 0..5 {
            state.deliver(
                i as f64 * 0.04,
                &values(&[
                    ("stateEstimate.x", i as f64),
                    ("stateEstimate.y", 0.),
                    ("stateEstimate.z", 0.),
                ]),
            );
        }
        let rows = merger.take_rows();
        assert_eq!(rows.len(), 5);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.x, i as f64);
        }
        // rows were handed off, the buffer is flushed
        assert_eq!(merger.row_count(), 0);
    }

    #[test]
    fn missing_variable_keeps_previous_value() {
        let merger = TelemetryMerger::new();
        let state = merger.register(&state_channel()).expect("state channel");
        state.deliver(
            0.,
            &values(&[
                ("stateEstimate.x", 7.),
                ("stateEstimate.y", 8.),
                ("stateEstimate.z", 9.),
            ]),
        );
        // y dropped out of this delivery, e.g. a truncated packet
        state.deliver(
            0.04,
            &values(&[("stateEstimate.x", 7.5), ("stateEstimate.z", 9.5)]),
        );

        let rows = merger.take_rows();
        assert_eq!(rows[1].x, 7.5);
        assert_eq!(rows[1].y, 8.);
        assert_eq!(rows[1].z, 9.5);
    }

    #[test]
    fn concurrent_deliveries_never_tear_a_row() {
        let merger = TelemetryMerger::new();
        let state = merger.register(&state_channel()).expect("state channel");
        let acc = merger.register(&acc_channel()).expect("acc channel");

        let writer = std::thread::spawn(move || {
            for i in 0..200 {
                state.deliver(
                    i as f64,
                    &values(&[
                        ("stateEstimate.x", i as f64),
                        ("stateEstimate.y", i as f64),
                        ("stateEstimate.z", i as f64),
                    ]),
                );
            }
        });
        for i in 0..200 {
            acc.deliver(
                i as f64,
                &values(&[("acc.x", i as f64), ("acc.y", i as f64), ("acc.z", i as f64)]),
            );
        }
        writer.join().expect("writer thread");

        let rows = merger.take_rows();
        assert_eq!(rows.len(), 400);
        for row in rows {
            // each channel writes equal values across its fields, so a torn
            // row would show a mismatch within one channel's triple
            if !row.x.is_nan() {
                assert_eq!(row.x, row.y);
                assert_eq!(row.y, row.z);
            }
            if !row.ax.is_nan() {
                assert_eq!(row.ax, row.ay);
                assert_eq!(row.ay, row.az);
            }
        }
    }
}
