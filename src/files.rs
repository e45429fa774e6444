//! Delimited-text interfaces: the trajectory input file and the flight log
//! output file.
//!
//! Input format (header required): `time_s, x, y, z, yaw_deg[, vy]`. A
//! missing `vy` column defaults to 0; a missing required column is a fatal
//! configuration error raised before flight. Some spreadsheet exports stick
//! a UTF-8 BOM on the first header, so headers are cleaned before matching.

use std::path::Path;

use crate::{telemetry::TelemetryRecord, trajectory::Waypoint};

const REQUIRED_COLUMNS: [&str; 5] = ["time_s", "x", "y", "z", "yaw_deg"];

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("trajectory file is missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("couldn't access file: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't read delimited row: {0}")]
    Csv(#[from] csv::Error),
}

/// Reads raw waypoint rows; sorting/validation happens in
/// [`crate::trajectory::Trajectory::load`].
pub fn read_trajectory_csv(path: &Path) -> Result<Vec<Waypoint>, FileError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let cleaned: csv::StringRecord = headers
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}'))
        .collect();
    for required in REQUIRED_COLUMNS {
        if !cleaned.iter().any(|h| h == required) {
            return Err(FileError::MissingColumn(required));
        }
    }
    reader.set_headers(cleaned);

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Writes the merged telemetry rows, header first, one line per output-
/// sequence entry.
pub fn write_flight_log(path: &Path, rows: &[TelemetryRecord]) -> Result<(), FileError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("colibri_{}_{}", std::process::id(), name))
    }

    #[test]
    fn reads_rows_with_bom_and_optional_vy() {
        let path = temp_path("traj_bom.csv");
        std::fs::write(
            &path,
            "\u{feff}time_s,x,y,z,yaw_deg\n0.0,0.0,0.0,1.0,0.0\n1.0,0.5,0.0,1.0,90.0\n",
        )
        .expect("write temp file");

        let rows = read_trajectory_csv(&path).expect("rows parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].t, 0.);
        assert_eq!(rows[1].yaw, 90.);
        // vy column absent -> hint defaults to zero
        assert_eq!(rows[0].vy_hint, 0.);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reads_the_vy_column_when_present() {
        let path = temp_path("traj_vy.csv");
        std::fs::write(
            &path,
            "time_s,x,y,z,yaw_deg,vy\n0.0,0.0,0.0,1.0,0.0,0.1\n1.0,0.5,0.0,1.0,0.0,-0.2\n",
        )
        .expect("write temp file");

        let rows = read_trajectory_csv(&path).expect("rows parse");
        assert_eq!(rows[0].vy_hint, 0.1);
        assert_eq!(rows[1].vy_hint, -0.2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let path = temp_path("traj_missing.csv");
        std::fs::write(&path, "time_s,x,y,yaw_deg\n0.0,0.0,0.0,0.0\n").expect("write temp file");

        assert!(matches!(
            read_trajectory_csv(&path),
            Err(FileError::MissingColumn("z"))
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn flight_log_round_trips_header_and_rows() {
        let path = temp_path("log.csv");
        let rows = vec![
            TelemetryRecord {
                t: 0.1,
                x: 1.,
                ..Default::default()
            },
            TelemetryRecord {
                t: 0.2,
                x: 2.,
                ..Default::default()
            },
        ];
        write_flight_log(&path, &rows).expect("log writes");

        let raw = std::fs::read_to_string(&path).expect("log reads back");
        let mut lines = raw.lines();
        assert_eq!(lines.next(), Some("t,x,y,z,vx,vy,vz,ax,ay,az"));
        assert_eq!(lines.count(), 2);
        let _ = std::fs::remove_file(&path);
    }
}
