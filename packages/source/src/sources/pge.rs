//! Pacific Gas & Electric outage feed.
//!
//! The payload is an `ArcGIS` feature query response. Each feature is a
//! single Web Mercator (EPSG:3857) point, so records carry a fixed radius
//! and a small synthetic octagon in place of a real outage polygon.

use chrono::{DateTime, Utc};
use outage_map_geometry::{octagon, web_mercator_to_wgs84};
use outage_map_outage_models::{OutageRecord, Utility};

use crate::arcgis::{GEOMETRY_X_FIELD, GEOMETRY_Y_FIELD, feature_records};
use crate::parsing::{
    epoch_ms_to_utc, value_as_count, value_as_f64, value_as_i64, value_as_string,
};
use crate::{OutageSource, SourceError};

/// Radius of the synthetic polygon, in degrees.
const OCTAGON_RADIUS_DEGREES: f64 = 0.001;

/// Radius reported for every PG&E outage.
const POINT_OUTAGE_RADIUS: f64 = 0.05;

/// PG&E outage data source.
pub struct PgeSource;

impl PgeSource {
    /// Creates a new PG&E data source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PgeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OutageSource for PgeSource {
    fn utility(&self) -> Utility {
        Utility::Pge
    }

    fn name(&self) -> &'static str {
        "Pacific Gas & Electric"
    }

    fn normalize(
        &self,
        raw: &str,
        snapshot_time: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, SourceError> {
        let body: serde_json::Value = serde_json::from_str(raw)?;
        let features = feature_records(&body);
        let raw_count = features.len();

        let records: Vec<OutageRecord> = features
            .iter()
            .filter_map(|attrs| {
                let record = normalize_feature(attrs, snapshot_time);
                if record.is_none() {
                    log::warn!("PG&E: skipping outage missing essential data: {attrs}");
                }
                record
            })
            .collect();

        log::info!(
            "PG&E: parsed {} outages from {} raw features",
            records.len(),
            raw_count
        );
        Ok(records)
    }
}

fn normalize_feature(
    attrs: &serde_json::Value,
    snapshot_time: DateTime<Utc>,
) -> Option<OutageRecord> {
    let field = |name: &str| attrs.get(name).unwrap_or(&serde_json::Value::Null);

    let outage_id = value_as_string(field("OUTAGE_ID")).filter(|id| !id.is_empty())?;
    let start_time = value_as_i64(field("OUTAGE_START"))
        .filter(|ms| *ms != 0)
        .and_then(epoch_ms_to_utc)?;
    let (center_lon, center_lat) = reprojected_point(
        value_as_f64(field(GEOMETRY_X_FIELD))?,
        value_as_f64(field(GEOMETRY_Y_FIELD))?,
    )?;

    let est_restoration_time = value_as_i64(field("CURRENT_ETOR"))
        .filter(|ms| *ms != 0)
        .and_then(epoch_ms_to_utc);

    Some(OutageRecord {
        utility: Utility::Pge,
        outage_id,
        snapshot_time,
        start_time,
        customers_impacted: value_as_count(field("EST_CUSTOMERS")).unwrap_or(0),
        status: value_as_string(field("CREW_CURRENT_STATUS")).unwrap_or_default(),
        cause: value_as_string(field("OUTAGE_CAUSE")).unwrap_or_default(),
        est_restoration_time,
        center_lon,
        center_lat,
        radius: POINT_OUTAGE_RADIUS,
        polygon: vec![octagon(center_lon, center_lat, OCTAGON_RADIUS_DEGREES)],
        elapsed_time_minutes: None,
        expected_length_minutes: None,
        zipcode: None,
        notification_reason: None,
    })
}

/// Converts a Web Mercator point to WGS84, rejecting results outside the
/// valid longitude/latitude range.
fn reprojected_point(x: f64, y: f64) -> Option<(f64, f64)> {
    let (lon, lat) = web_mercator_to_wgs84(x, y);
    let valid = lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat);
    valid.then_some((lon, lat))
}
