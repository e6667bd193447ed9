//! Seattle City Light outage feed.
//!
//! The payload is a JSON array of outage objects with direct fields. Times
//! are epoch milliseconds (UTC) and `polygons.rings` is already a list of
//! `[lon, lat]` rings.

use chrono::{DateTime, Utc};
use outage_map_geometry::smallest_enclosing_circle;
use outage_map_outage_models::{OutageRecord, Ring, Utility};
use serde::Deserialize;

use crate::parsing::{
    epoch_ms_to_utc, ring_from_value, value_as_count, value_as_i64, value_as_string,
};
use crate::{OutageSource, SourceError};

/// SCL outage data source.
pub struct SclSource;

impl SclSource {
    /// Creates a new SCL data source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for SclSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    start_time: serde_json::Value,
    #[serde(default)]
    num_people: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    etr_time: serde_json::Value,
    #[serde(default)]
    polygons: Option<Polygons>,
}

#[derive(Debug, Deserialize)]
struct Polygons {
    #[serde(default)]
    rings: Vec<serde_json::Value>,
}

impl OutageSource for SclSource {
    fn utility(&self) -> Utility {
        Utility::Scl
    }

    fn name(&self) -> &'static str {
        "Seattle City Light"
    }

    fn normalize(
        &self,
        raw: &str,
        snapshot_time: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, SourceError> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(raw)?;
        let raw_count = entries.len();
        let mut records = Vec::with_capacity(raw_count);

        for value in &entries {
            let record = match Record::deserialize(value) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("SCL: skipping malformed outage entry: {e}");
                    continue;
                }
            };

            let Some(outage_id) = value_as_string(&record.id).filter(|id| !id.is_empty()) else {
                log::warn!("SCL: skipping outage without id");
                continue;
            };

            let Some(start_time) = value_as_i64(&record.start_time).and_then(epoch_ms_to_utc) else {
                log::warn!("SCL: outage {outage_id} has no valid start time, skipping");
                continue;
            };

            let Some(customers_impacted) = value_as_count(&record.num_people) else {
                log::warn!("SCL: outage {outage_id} has no customer count, skipping");
                continue;
            };

            let est_restoration_time = value_as_i64(&record.etr_time).and_then(epoch_ms_to_utc);

            let polygon: Vec<Ring> = record
                .polygons
                .map(|p| p.rings.iter().map(ring_from_value).collect())
                .unwrap_or_default();
            let circle = smallest_enclosing_circle(&polygon);

            records.push(OutageRecord {
                utility: Utility::Scl,
                outage_id,
                snapshot_time,
                start_time,
                customers_impacted,
                status: record.status.unwrap_or_default(),
                cause: record.cause.unwrap_or_default(),
                est_restoration_time,
                center_lon: circle.center_lon,
                center_lat: circle.center_lat,
                radius: circle.radius,
                polygon,
                elapsed_time_minutes: None,
                expected_length_minutes: None,
                zipcode: None,
                notification_reason: None,
            });
        }

        log::info!(
            "SCL: parsed {} outages from {} raw entries",
            records.len(),
            raw_count
        );
        Ok(records)
    }
}
