//! Snapshot directory pipelines behind the `notify`, `summarize` and
//! `dump` subcommands.
//!
//! Each walks a directory of timestamped snapshot files for one utility in
//! filename order, parse each through the utility's adapter and annotate
//! the derived durations relative to the snapshot time.

use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use outage_map_notify::history::{OutageSummary, summarize_history};
use outage_map_notify::{compare_snapshots, notifications};
use outage_map_outage_models::{OutageRecord, Thresholds, Utility};
use outage_map_source::parse_snapshot;
use outage_map_source::registry::utility_definition;
use outage_map_source::snapshot::{SnapshotFile, list_snapshots};
use outage_map_spatial::{ZipIndex, ZipWhitelist, assign_zipcodes, retain_whitelisted};
use serde::Serialize;

/// Errors that can occur while running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// I/O error (directory listing, file read or write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV output error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error (polygon column).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Zip code attribution applied to every snapshot before comparison.
pub struct ZipFilter {
    /// Boundaries used to tag each outage center with a zip code.
    pub index: ZipIndex,
    /// When set, outages outside these zip codes are dropped.
    pub whitelist: Option<ZipWhitelist>,
}

impl ZipFilter {
    /// Assigns zip codes and applies the whitelist, if any.
    #[must_use]
    pub fn apply(&self, records: &[OutageRecord]) -> Vec<OutageRecord> {
        let zoned = assign_zipcodes(records, &self.index);
        match &self.whitelist {
            Some(whitelist) => retain_whitelisted(&zoned, whitelist),
            None => zoned,
        }
    }
}

/// Outcome of [`run_notify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Fewer than two snapshots were found, so nothing was compared.
    NotEnoughSnapshots {
        /// Number of matching snapshot files.
        found: usize,
    },
    /// Every consecutive pair was compared.
    Compared {
        /// Number of snapshot pairs compared.
        comparisons: usize,
        /// Notification files written, in write order.
        written: Vec<PathBuf>,
    },
}

/// Reads and annotates one snapshot file.
///
/// Invalid UTF-8 is replaced rather than rejected, so a corrupt payload
/// goes through the adapter's empty-snapshot path instead of stopping the
/// run.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the file cannot be read.
pub fn load_snapshot(
    utility: Utility,
    snapshot: &SnapshotFile,
) -> Result<Vec<OutageRecord>, PipelineError> {
    let bytes = std::fs::read(&snapshot.path)?;
    let raw = String::from_utf8_lossy(&bytes);
    if matches!(raw, Cow::Owned(_)) {
        log::warn!(
            "{} is not valid UTF-8, invalid bytes replaced",
            snapshot.path.display()
        );
    }
    let records = parse_snapshot(utility, &raw, snapshot.snapshot_time);
    log::debug!(
        "{}: {} outages at {}",
        snapshot.path.display(),
        records.len(),
        snapshot.snapshot_time
    );
    Ok(records)
}

/// Compares every consecutive pair of snapshots in `directory` and writes
/// one text file per notification into `output_dir`.
///
/// Notification files are stamped with the snapshot time of the pair's
/// current side.
///
/// # Errors
///
/// Returns [`PipelineError`] if a snapshot cannot be read or a
/// notification cannot be written.
pub fn run_notify(
    utility: Utility,
    directory: &Path,
    thresholds: &Thresholds,
    zip_filter: Option<&ZipFilter>,
    output_dir: &Path,
) -> Result<NotifyOutcome, PipelineError> {
    let suffix = utility_definition(utility).snapshot_suffix;
    let snapshots = list_snapshots(directory, &suffix)?;
    log::info!(
        "Found {} {utility} snapshots matching *{suffix} in {}",
        snapshots.len(),
        directory.display()
    );

    if snapshots.len() < 2 {
        return Ok(NotifyOutcome::NotEnoughSnapshots {
            found: snapshots.len(),
        });
    }

    std::fs::create_dir_all(output_dir)?;

    let mut previous: Option<Vec<OutageRecord>> = None;
    let mut comparisons = 0;
    let mut written = Vec::new();

    for snapshot in &snapshots {
        let mut current = load_snapshot(utility, snapshot)?;
        if let Some(filter) = zip_filter {
            current = filter.apply(&current);
        }

        if let Some(prev) = &previous {
            let comparison = compare_snapshots(&current, prev, thresholds);
            comparisons += 1;

            for notification in notifications(&comparison) {
                let path = output_dir.join(notification.file_name(snapshot.snapshot_time));
                std::fs::File::create(&path)?.write_all(notification.text.as_bytes())?;
                log::info!(
                    "{} notification for {} saved to {}",
                    notification.kind,
                    notification.outage_id,
                    path.display()
                );
                written.push(path);
            }
        } else {
            log::info!("First snapshot {}, skipping comparison", snapshot.path.display());
        }

        previous = Some(current);
    }

    Ok(NotifyOutcome::Compared {
        comparisons,
        written,
    })
}

/// Parses every snapshot in `directory` and summarizes each outage's
/// lifetime.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory or a snapshot cannot be
/// read.
pub fn run_summarize(
    utility: Utility,
    directory: &Path,
    exclude_edges: bool,
) -> Result<Vec<OutageSummary>, PipelineError> {
    let suffix = utility_definition(utility).snapshot_suffix;
    let mut records = Vec::new();
    for snapshot in list_snapshots(directory, &suffix)? {
        records.extend(load_snapshot(utility, &snapshot)?);
    }
    Ok(summarize_history(&records, exclude_edges))
}

/// Writes summaries as CSV with a header row.
///
/// # Errors
///
/// Returns [`PipelineError::Csv`] if serialization or the write fails.
pub fn write_summary_csv<W: Write>(
    summaries: &[OutageSummary],
    writer: W,
) -> Result<(), PipelineError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for summary in summaries {
        csv_writer.serialize(summary)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// One CSV row per outage per snapshot.
#[derive(Debug, Serialize)]
struct OutageRow<'a> {
    utility: Utility,
    outage_id: &'a str,
    snapshot_time: DateTime<Utc>,
    start_time: DateTime<Utc>,
    customers_impacted: u64,
    status: &'a str,
    cause: &'a str,
    est_restoration_time: Option<DateTime<Utc>>,
    elapsed_time_minutes: Option<i64>,
    expected_length_minutes: Option<i64>,
    center_lon: f64,
    center_lat: f64,
    radius: f64,
    /// Rings encoded as a JSON array.
    polygon_json: String,
}

impl<'a> OutageRow<'a> {
    fn new(record: &'a OutageRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            utility: record.utility,
            outage_id: &record.outage_id,
            snapshot_time: record.snapshot_time,
            start_time: record.start_time,
            customers_impacted: record.customers_impacted,
            status: &record.status,
            cause: &record.cause,
            est_restoration_time: record.est_restoration_time,
            elapsed_time_minutes: record.elapsed_time_minutes,
            expected_length_minutes: record.expected_length_minutes,
            center_lon: record.center_lon,
            center_lat: record.center_lat,
            radius: record.radius,
            polygon_json: serde_json::to_string(&record.polygon)?,
        })
    }
}

/// Parses snapshots in `directory`, newest first, and returns every
/// record. With `latest_only`, only the two most recent snapshots are
/// read.
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the directory or a snapshot cannot be
/// read.
pub fn run_dump(
    utility: Utility,
    directory: &Path,
    latest_only: bool,
) -> Result<Vec<OutageRecord>, PipelineError> {
    let suffix = utility_definition(utility).snapshot_suffix;
    let mut snapshots = list_snapshots(directory, &suffix)?;
    snapshots.reverse();
    if latest_only {
        snapshots.truncate(2);
    }

    let mut records = Vec::new();
    for snapshot in &snapshots {
        log::info!("Processing {}", snapshot.path.display());
        records.extend(load_snapshot(utility, snapshot)?);
    }
    log::info!(
        "Collected {} outage updates from {} snapshots",
        records.len(),
        snapshots.len()
    );
    Ok(records)
}

/// Writes records as CSV with a header row, one row per record.
///
/// # Errors
///
/// Returns [`PipelineError`] if a row cannot be encoded or the write
/// fails.
pub fn write_records_csv<W: Write>(
    records: &[OutageRecord],
    writer: W,
) -> Result<(), PipelineError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(OutageRow::new(record)?)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use outage_map_spatial::DEFAULT_ZIP_PROPERTY;

    use super::*;

    fn scl_entry(id: u64, customers: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            // 2025-01-15T16:00:00Z
            "startTime": 1_736_956_800_000_i64,
            "numPeople": customers,
            "status": "Crew dispatched",
            "cause": "Tree",
            "etrTime": null,
            "polygons": {"rings": [[[-122.35, 47.65], [-122.34, 47.66]]]}
        })
    }

    fn write_snapshot(dir: &Path, stamp: &str, entries: &[serde_json::Value]) {
        std::fs::write(
            dir.join(format!("{stamp}-scl-events.json")),
            serde_json::Value::Array(entries.to_vec()).to_string(),
        )
        .unwrap();
    }

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn large_only() -> Thresholds {
        Thresholds {
            customer_threshold: 100,
            large_outage_customer_threshold: 1000,
            elapsed_time_threshold_minutes: 0,
            expected_length_threshold_minutes: 0,
        }
    }

    #[test]
    fn single_snapshot_is_not_enough() {
        let dir = fresh_dir("outage_map_cli_notify_single_test");
        write_snapshot(&dir, "2025-01-15T180000", &[scl_entry(1, 5000)]);

        let outcome =
            run_notify(Utility::Scl, &dir, &large_only(), None, &dir.join("out")).unwrap();
        assert_eq!(outcome, NotifyOutcome::NotEnoughSnapshots { found: 1 });

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn writes_notifications_for_each_pair() {
        let dir = fresh_dir("outage_map_cli_notify_pairs_test");
        write_snapshot(&dir, "2025-01-15T180000", &[scl_entry(1, 10)]);
        write_snapshot(&dir, "2025-01-15T181500", &[scl_entry(1, 1500)]);
        write_snapshot(&dir, "2025-01-15T183000", &[]);
        let out = dir.join("out");

        let outcome = run_notify(Utility::Scl, &dir, &large_only(), None, &out).unwrap();
        let NotifyOutcome::Compared {
            comparisons,
            written,
        } = outcome
        else {
            panic!("expected comparisons");
        };
        assert_eq!(comparisons, 2);

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "notification_escalated_1_20250115_181500.txt",
                "notification_resolved_1_20250115_183000.txt",
            ]
        );

        let escalated = std::fs::read_to_string(&written[0]).unwrap();
        assert!(escalated.contains("Reason: customers (10=>1500)"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zip_whitelist_drops_outages_elsewhere() {
        let dir = fresh_dir("outage_map_cli_notify_zip_test");
        write_snapshot(&dir, "2025-01-15T180000", &[]);
        write_snapshot(&dir, "2025-01-15T181500", &[scl_entry(7, 5000)]);

        let boundaries = r#"{"type": "FeatureCollection", "features": [{
            "type": "Feature",
            "properties": {"ZCTA5CE10": "98101"},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-122.40, 47.60], [-122.30, 47.60], [-122.30, 47.70],
                [-122.40, 47.70], [-122.40, 47.60]
            ]]}
        }]}"#;
        let filter = |zip: &str| ZipFilter {
            index: ZipIndex::from_geojson_str(boundaries, DEFAULT_ZIP_PROPERTY).unwrap(),
            whitelist: Some(ZipWhitelist::from_lines([zip])),
        };

        let out = dir.join("kept");
        let kept = run_notify(Utility::Scl, &dir, &large_only(), Some(&filter("98101")), &out)
            .unwrap();
        let NotifyOutcome::Compared { written, .. } = kept else {
            panic!("expected comparisons");
        };
        assert_eq!(written.len(), 1);
        assert!(
            std::fs::read_to_string(&written[0])
                .unwrap()
                .contains("Zip: 98101")
        );

        let out = dir.join("dropped");
        let dropped = run_notify(Utility::Scl, &dir, &large_only(), Some(&filter("98004")), &out)
            .unwrap();
        assert_eq!(
            dropped,
            NotifyOutcome::Compared {
                comparisons: 1,
                written: Vec::new(),
            }
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn summarizes_directory_to_csv() {
        let dir = fresh_dir("outage_map_cli_summarize_test");
        write_snapshot(&dir, "2025-01-15T180000", &[scl_entry(1, 10)]);
        write_snapshot(&dir, "2025-01-15T181500", &[scl_entry(1, 40), scl_entry(2, 5)]);
        write_snapshot(&dir, "2025-01-15T183000", &[scl_entry(2, 5)]);

        let all = run_summarize(Utility::Scl, &dir, false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].max_customers_impacted, 40);
        assert_eq!(all[0].total_outage_minutes, 135);

        // "1" starts in the first snapshot and "2" survives to the last
        assert!(run_summarize(Utility::Scl, &dir, true).unwrap().is_empty());

        let mut buffer = Vec::new();
        write_summary_csv(&all, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("utility,outage_id,first_start_time"));
        assert!(lines.next().unwrap().starts_with("scl,1,"));
        assert_eq!(lines.count(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_utf8_snapshot_does_not_stop_later_pairs() {
        let dir = fresh_dir("outage_map_cli_notify_utf8_test");
        write_snapshot(&dir, "2025-01-15T180000", &[]);
        std::fs::write(dir.join("2025-01-15T181500-scl-events.json"), b"[\xff\xfe]").unwrap();
        write_snapshot(&dir, "2025-01-15T183000", &[scl_entry(1, 5000)]);
        let out = dir.join("out");

        let outcome = run_notify(Utility::Scl, &dir, &large_only(), None, &out).unwrap();
        let NotifyOutcome::Compared {
            comparisons,
            written,
        } = outcome
        else {
            panic!("expected comparisons");
        };
        assert_eq!(comparisons, 2);
        assert_eq!(written.len(), 1);
        assert!(
            written[0]
                .to_string_lossy()
                .ends_with("notification_new_1_20250115_183000.txt")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn fixture(utility: Utility) -> String {
        match utility {
            Utility::Pse => serde_json::json!({"PseMap": [{
                "DataProvider": {"Attributes": [
                    {"RefName": "OutageEventId", "Name": "Outage ID", "Value": "INC100"},
                    {"RefName": "StartDate", "Name": "Start time", "Value": "01/15 8:00 AM"},
                    {"RefName": "Est. Restoration time", "Name": "Est. restoration time", "Value": "01/15 6:00 PM"},
                    {"RefName": "Customers impacted", "Name": "Customers impacted", "Value": "1200"}
                ]},
                "Polygon": [
                    {"Longitude": -122.0, "Latitude": 47.0},
                    {"Longitude": -122.2, "Latitude": 47.1}
                ]
            }]})
            .to_string(),
            Utility::Scl => {
                serde_json::Value::Array(vec![scl_entry(1, 1200), scl_entry(2, 150)]).to_string()
            }
            Utility::Snopud => r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document><Placemark>
  <ExtendedData>
    <Data name="StartUTC"><value>2025-01-15T13:26:42.0000000+00:00</value></Data>
    <Data name="EstCustomersOut"><value>1200</value></Data>
    <Data name="EstimatedRestorationUTC"><value>2025-01-16T02:00:00.0000000+00:00</value></Data>
  </ExtendedData>
  <Polygon><outerBoundaryIs><LinearRing>
    <coordinates>-121.9,48.0,0 -121.8,48.1,0</coordinates>
  </LinearRing></outerBoundaryIs></Polygon>
</Placemark></Document></kml>"#
                .to_string(),
            Utility::Pge => serde_json::json!({"features": [{
                "attributes": {
                    "OUTAGE_ID": 55_123,
                    "OUTAGE_START": 1_736_956_800_000_i64,
                    "EST_CUSTOMERS": 1200,
                    "CURRENT_ETOR": 1_736_992_800_000_i64
                },
                "geometry": {"x": -13_627_361.0, "y": 4_548_155.0}
            }]})
            .to_string(),
        }
    }

    #[test]
    fn parsed_snapshot_compared_with_itself_is_quiet() {
        let t = Utc.with_ymd_and_hms(2025, 1, 15, 18, 0, 0).unwrap();
        for utility in Utility::all() {
            let records = parse_snapshot(*utility, &fixture(*utility), t);
            assert!(!records.is_empty(), "{utility} fixture should parse");

            let comparison = compare_snapshots(&records, &records, &large_only());
            assert!(comparison.is_quiet(), "{utility}: {comparison:?}");
            assert_eq!(comparison.active.len(), records.len());

            let appeared = compare_snapshots(&records, &[], &large_only());
            assert!(!appeared.new.is_empty(), "{utility} fixture should be notifiable");
        }
    }

    #[test]
    fn dumps_latest_snapshots_newest_first() {
        let dir = fresh_dir("outage_map_cli_dump_test");
        write_snapshot(&dir, "2025-01-15T180000", &[scl_entry(1, 10)]);
        write_snapshot(&dir, "2025-01-15T181500", &[scl_entry(1, 20)]);
        write_snapshot(&dir, "2025-01-15T183000", &[scl_entry(1, 30), scl_entry(2, 5)]);

        let all = run_dump(Utility::Scl, &dir, false).unwrap();
        assert_eq!(all.len(), 4);

        let latest = run_dump(Utility::Scl, &dir, true).unwrap();
        let customers: Vec<u64> = latest.iter().map(|r| r.customers_impacted).collect();
        assert_eq!(customers, vec![30, 5, 20]);

        let mut buffer = Vec::new();
        write_records_csv(&latest, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(
            lines
                .next()
                .unwrap()
                .starts_with("utility,outage_id,snapshot_time,start_time")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("scl,1,2025-01-15T18:30:00Z,"), "{first}");
        assert!(first.ends_with(r#""[[[-122.35,47.65],[-122.34,47.66]]]""#), "{first}");
        assert_eq!(lines.count(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
