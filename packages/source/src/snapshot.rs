//! Snapshot file naming.
//!
//! Snapshots are stored one file per fetch as `<timestamp><suffix>`, e.g.
//! `2025-01-15T132642123456-scl-events.json`. The timestamp is UTC in the
//! form `YYYY-MM-DDTHHMMSS` followed by up to nine fractional-second
//! digits.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// Length of the `YYYY-MM-DDTHHMMSS` prefix.
const TIMESTAMP_LEN: usize = 17;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S";

const MAX_FRACTION_DIGITS: usize = 9;

/// Errors from interpreting a snapshot file name.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotNameError {
    /// The name does not end with the expected suffix.
    #[error("{file_name} does not end with {suffix}")]
    MissingSuffix {
        /// Offending file name.
        file_name: String,
        /// Expected suffix.
        suffix: String,
    },

    /// The part before the suffix is not a snapshot timestamp.
    #[error("{file_name} does not start with a YYYY-MM-DDTHHMMSS timestamp")]
    InvalidTimestamp {
        /// Offending file name.
        file_name: String,
    },
}

/// A snapshot file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    /// Time encoded in the file name.
    pub snapshot_time: DateTime<Utc>,
    /// Full path to the file.
    pub path: PathBuf,
}

/// Reads the UTC snapshot time encoded in `file_name`.
///
/// # Errors
///
/// Returns [`SnapshotNameError`] if the name does not end with `suffix` or
/// the remaining stem is not a valid timestamp.
pub fn snapshot_time_from_filename(
    file_name: &str,
    suffix: &str,
) -> Result<DateTime<Utc>, SnapshotNameError> {
    let stem = file_name
        .strip_suffix(suffix)
        .ok_or_else(|| SnapshotNameError::MissingSuffix {
            file_name: file_name.to_string(),
            suffix: suffix.to_string(),
        })?;
    let invalid = || SnapshotNameError::InvalidTimestamp {
        file_name: file_name.to_string(),
    };

    let (Some(head), Some(fraction)) = (stem.get(..TIMESTAMP_LEN), stem.get(TIMESTAMP_LEN..))
    else {
        return Err(invalid());
    };
    if fraction.len() > MAX_FRACTION_DIGITS || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let naive = NaiveDateTime::parse_from_str(head, TIMESTAMP_FORMAT).map_err(|_| invalid())?;
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<width$}", width = MAX_FRACTION_DIGITS)
            .parse::<i64>()
            .map_err(|_| invalid())?
    };

    Ok(naive.and_utc() + TimeDelta::nanoseconds(nanos))
}

/// Lists the snapshot files in `dir` whose names end with `suffix`, sorted
/// ascending by file name.
///
/// Matching files whose timestamp cannot be parsed are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an I/O error if `dir` cannot be read.
pub fn list_snapshots(dir: &Path, suffix: &str) -> std::io::Result<Vec<SnapshotFile>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(suffix) {
            names.push(name);
        }
    }
    names.sort();

    let mut snapshots = Vec::with_capacity(names.len());
    for name in names {
        match snapshot_time_from_filename(&name, suffix) {
            Ok(snapshot_time) => snapshots.push(SnapshotFile {
                snapshot_time,
                path: dir.join(&name),
            }),
            Err(e) => log::warn!("Skipping snapshot file: {e}"),
        }
    }

    log::debug!(
        "Found {} snapshots matching *{suffix} in {}",
        snapshots.len(),
        dir.display()
    );
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_timestamp_with_microseconds() {
        let t = snapshot_time_from_filename(
            "2025-01-15T132642123456-scl-events.json",
            "-scl-events.json",
        )
        .unwrap();
        let base = Utc.with_ymd_and_hms(2025, 1, 15, 13, 26, 42).unwrap();
        assert_eq!(t, base + TimeDelta::microseconds(123_456));
    }

    #[test]
    fn parses_timestamp_without_fraction() {
        let t = snapshot_time_from_filename(
            "2025-01-15T132642-KMLOutageAreas.xml",
            "-KMLOutageAreas.xml",
        )
        .unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2025, 1, 15, 13, 26, 42).unwrap());
    }

    #[test]
    fn short_fraction_is_scaled() {
        let t =
            snapshot_time_from_filename("2025-01-15T1326425-pse-events.json", "-pse-events.json")
                .unwrap();
        let base = Utc.with_ymd_and_hms(2025, 1, 15, 13, 26, 42).unwrap();
        assert_eq!(t, base + TimeDelta::milliseconds(500));
    }

    #[test]
    fn rejects_wrong_suffix() {
        let err =
            snapshot_time_from_filename("2025-01-15T132642-pse-events.json", "-scl-events.json")
                .unwrap_err();
        assert!(matches!(err, SnapshotNameError::MissingSuffix { .. }));
    }

    #[test]
    fn rejects_bad_timestamps() {
        for name in [
            "latest-pse-events.json",
            "2025-13-15T132642-pse-events.json",
            "2025-01-15T13264x-pse-events.json",
            "2025-01-15T1326421234567890-pse-events.json",
            "2025-01-15T132642.12-pse-events.json",
        ] {
            assert!(
                matches!(
                    snapshot_time_from_filename(name, "-pse-events.json"),
                    Err(SnapshotNameError::InvalidTimestamp { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn lists_matching_snapshots_in_order() {
        let tmp = std::env::temp_dir().join("outage_map_snapshot_list_test");
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        for name in [
            "2025-01-15T140000-scl-events.json",
            "2025-01-15T130000-scl-events.json",
            "garbage-scl-events.json",
            "2025-01-15T120000-pse-events.json",
        ] {
            std::fs::write(tmp.join(name), "[]").unwrap();
        }

        let snapshots = list_snapshots(&tmp, "-scl-events.json").unwrap();
        let names: Vec<String> = snapshots
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "2025-01-15T130000-scl-events.json",
                "2025-01-15T140000-scl-events.json"
            ]
        );
        assert!(snapshots[0].snapshot_time < snapshots[1].snapshot_time);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
