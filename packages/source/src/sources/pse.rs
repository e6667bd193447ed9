//! Puget Sound Energy outage feed.
//!
//! The payload is a JSON object whose `PseMap` array holds one entry per
//! outage. Each entry carries a flat list of `{RefName, Name, Value}`
//! attributes and a single polygon of `{Longitude, Latitude}` points.
//! Attribute names have changed over time, so every field is looked up
//! through an ordered alias list.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use outage_map_geometry::smallest_enclosing_circle;
use outage_map_outage_models::{OutageRecord, Ring, Utility};
use serde::Deserialize;

use crate::parsing::{parse_pse_local_time, value_as_count, value_as_f64, value_as_string};
use crate::{OutageSource, SourceError};

const OUTAGE_ID_ALIASES: &[&str] = &["OutageEventId", "Outage ID", "Outage ID:", ""];
const START_TIME_ALIASES: &[&str] = &["StartDate", "Start time"];
const EST_RESTORATION_ALIASES: &[&str] = &["Est. Restoration time", "Est. restoration time"];
const CUSTOMERS_ALIASES: &[&str] = &["Customers impacted"];
const STATUS_ALIASES: &[&str] = &["Status"];
const CAUSE_ALIASES: &[&str] = &["Cause"];

/// Real PSE incidents carry ids with this prefix; anything else is a
/// synthetic or test entry.
const INCIDENT_ID_PREFIX: &str = "INC";

/// PSE outage data source.
pub struct PseSource;

impl PseSource {
    /// Creates a new PSE data source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PseSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct PseResponse {
    #[serde(rename = "PseMap", default)]
    outages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "DataProvider", default)]
    data_provider: Option<DataProvider>,
    #[serde(rename = "Polygon", default)]
    polygon: Option<Vec<PolygonPoint>>,
}

#[derive(Debug, Deserialize)]
struct DataProvider {
    #[serde(rename = "Attributes", default)]
    attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct Attribute {
    #[serde(rename = "RefName", default)]
    ref_name: Option<String>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Value", default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PolygonPoint {
    #[serde(rename = "Longitude", default)]
    longitude: serde_json::Value,
    #[serde(rename = "Latitude", default)]
    latitude: serde_json::Value,
}

/// Attribute values keyed by both `RefName` and `Name`. The first attribute
/// matching a key wins, checking `RefName` before `Name`.
struct AttributeLookup<'a>(BTreeMap<&'a str, &'a serde_json::Value>);

impl<'a> AttributeLookup<'a> {
    fn new(attributes: &'a [Attribute]) -> Self {
        let mut map = BTreeMap::new();
        for attr in attributes {
            for key in [attr.ref_name.as_deref(), attr.name.as_deref()]
                .into_iter()
                .flatten()
            {
                map.entry(key).or_insert(&attr.value);
            }
        }
        Self(map)
    }

    /// Returns the first non-empty value across `aliases`.
    fn value(&self, aliases: &[&str]) -> Option<&'a serde_json::Value> {
        aliases.iter().find_map(|alias| {
            self.0
                .get(alias)
                .copied()
                .filter(|v| value_as_string(v).is_some_and(|s| !s.is_empty()))
        })
    }

    fn string(&self, aliases: &[&str]) -> Option<String> {
        self.value(aliases).and_then(value_as_string)
    }
}

impl OutageSource for PseSource {
    fn utility(&self) -> Utility {
        Utility::Pse
    }

    fn name(&self) -> &'static str {
        "Puget Sound Energy"
    }

    fn normalize(
        &self,
        raw: &str,
        snapshot_time: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, SourceError> {
        let response: PseResponse = serde_json::from_str(raw)?;
        let raw_count = response.outages.len();
        let mut records = Vec::with_capacity(raw_count);

        for value in &response.outages {
            let entry = match Entry::deserialize(value) {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("PSE: skipping malformed outage entry: {e}");
                    continue;
                }
            };
            if let Some(record) = normalize_entry(&entry, snapshot_time) {
                records.push(record);
            }
        }

        log::info!(
            "PSE: parsed {} outages from {} raw entries",
            records.len(),
            raw_count
        );
        Ok(records)
    }
}

fn normalize_entry(entry: &Entry, snapshot_time: DateTime<Utc>) -> Option<OutageRecord> {
    let attributes = entry
        .data_provider
        .as_ref()
        .map_or(&[][..], |p| p.attributes.as_slice());
    let lookup = AttributeLookup::new(attributes);

    let outage_id = match lookup.string(OUTAGE_ID_ALIASES) {
        Some(id) if id.starts_with(INCIDENT_ID_PREFIX) => id,
        other => {
            log::debug!("PSE: outage id {other:?} missing or does not start with {INCIDENT_ID_PREFIX}, skipping");
            return None;
        }
    };

    let year = snapshot_time.year();
    let Some(start_time) = lookup
        .string(START_TIME_ALIASES)
        .and_then(|s| parse_pse_local_time(&s, year))
    else {
        log::warn!("PSE: outage {outage_id} has no parsable start time, skipping");
        return None;
    };

    let est_restoration_time = match lookup.string(EST_RESTORATION_ALIASES) {
        Some(s) => {
            let parsed = parse_pse_local_time(&s, year);
            if parsed.is_none() {
                log::debug!("PSE: outage {outage_id} has unparsable restoration time {s:?}");
            }
            parsed
        }
        None => None,
    };

    let Some(customers_impacted) = lookup.value(CUSTOMERS_ALIASES).and_then(value_as_count) else {
        log::warn!("PSE: outage {outage_id} has no customer count, skipping");
        return None;
    };

    let ring: Ring = entry
        .polygon
        .iter()
        .flatten()
        .filter_map(|p| Some([value_as_f64(&p.longitude)?, value_as_f64(&p.latitude)?]))
        .collect();
    let polygon = vec![ring];
    let circle = smallest_enclosing_circle(&polygon);

    Some(OutageRecord {
        utility: Utility::Pse,
        outage_id,
        snapshot_time,
        start_time,
        customers_impacted,
        status: lookup.string(STATUS_ALIASES).unwrap_or_default(),
        cause: lookup.string(CAUSE_ALIASES).unwrap_or_default(),
        est_restoration_time,
        center_lon: circle.center_lon,
        center_lat: circle.center_lat,
        radius: circle.radius,
        polygon,
        elapsed_time_minutes: None,
        expected_length_minutes: None,
        zipcode: None,
        notification_reason: None,
    })
}
