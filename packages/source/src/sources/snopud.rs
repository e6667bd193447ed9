//! Snohomish County PUD outage feed.
//!
//! The payload is a KML document with one `<Placemark>` per outage area.
//! Outage fields live in `<ExtendedData><Data name="..."><value>` blocks and
//! the area itself in the placemark's outer boundary ring.
//!
//! The feed has no stable outage identifier, so placemarks sharing a start
//! time (to the second) are merged into one outage whose id is the start
//! time with separators stripped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use outage_map_geometry::smallest_enclosing_circle;
use outage_map_outage_models::{OutageRecord, Ring, Utility};
use roxmltree::{Document, Node};

use crate::parsing::{parse_kml_coordinates, parse_utc_timestamp, start_time_key};
use crate::{OutageSource, SourceError};

const START_FIELD: &str = "StartUTC";
const CUSTOMERS_FIELD: &str = "EstCustomersOut";
const STATUS_FIELD: &str = "OutageStatus";
const CAUSE_FIELD: &str = "Cause";
const EST_RESTORATION_FIELD: &str = "EstimatedRestorationUTC";

/// SnoPUD outage data source.
pub struct SnopudSource;

impl SnopudSource {
    /// Creates a new SnoPUD data source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for SnopudSource {
    fn default() -> Self {
        Self::new()
    }
}

/// One usable placemark before grouping.
#[derive(Debug)]
struct Placemark {
    start_time: DateTime<Utc>,
    customers_impacted: u64,
    status: String,
    cause: String,
    est_restoration: String,
    ring: Ring,
}

/// Placemarks sharing one start time.
#[derive(Debug)]
struct Group {
    start_time: DateTime<Utc>,
    customers_impacted: u64,
    status: String,
    cause: String,
    est_restoration: String,
    polygon: Vec<Ring>,
}

impl OutageSource for SnopudSource {
    fn utility(&self) -> Utility {
        Utility::Snopud
    }

    fn name(&self) -> &'static str {
        "Snohomish County PUD"
    }

    fn normalize(
        &self,
        raw: &str,
        snapshot_time: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, SourceError> {
        let doc = Document::parse(raw)?;

        let placemark_nodes: Vec<Node<'_, '_>> = doc
            .descendants()
            .filter(|n| n.has_tag_name("Placemark"))
            .collect();
        let raw_count = placemark_nodes.len();

        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        for node in placemark_nodes {
            let Some(placemark) = read_placemark(node) else {
                continue;
            };

            let key = start_time_key(&placemark.start_time);
            match groups.get_mut(&key) {
                Some(group) => {
                    group.customers_impacted = group
                        .customers_impacted
                        .saturating_add(placemark.customers_impacted);
                    group.polygon.push(placemark.ring);
                }
                None => {
                    groups.insert(
                        key,
                        Group {
                            start_time: placemark.start_time,
                            customers_impacted: placemark.customers_impacted,
                            status: placemark.status,
                            cause: placemark.cause,
                            est_restoration: placemark.est_restoration,
                            polygon: vec![placemark.ring],
                        },
                    );
                }
            }
        }

        let records: Vec<OutageRecord> = groups
            .into_iter()
            .map(|(outage_id, group)| {
                if group.polygon.len() > 1 {
                    log::debug!(
                        "SnoPUD: combining {} placemarks with start time {outage_id}",
                        group.polygon.len()
                    );
                }

                let est_restoration_time = parse_utc_timestamp(&group.est_restoration);
                if est_restoration_time.is_none() {
                    log::debug!(
                        "SnoPUD: outage {outage_id} has unparsable restoration time {:?}",
                        group.est_restoration
                    );
                }

                let circle = smallest_enclosing_circle(&group.polygon);
                OutageRecord {
                    utility: Utility::Snopud,
                    outage_id,
                    snapshot_time,
                    start_time: group.start_time,
                    customers_impacted: group.customers_impacted,
                    status: group.status,
                    cause: group.cause,
                    est_restoration_time,
                    center_lon: circle.center_lon,
                    center_lat: circle.center_lat,
                    radius: circle.radius,
                    polygon: group.polygon,
                    elapsed_time_minutes: None,
                    expected_length_minutes: None,
                    zipcode: None,
                    notification_reason: None,
                }
            })
            .collect();

        log::info!(
            "SnoPUD: parsed {} outages from {} placemarks",
            records.len(),
            raw_count
        );
        Ok(records)
    }
}

fn read_placemark(node: Node<'_, '_>) -> Option<Placemark> {
    let data = extended_data(node);
    let field = |name: &str| data.get(name).cloned().unwrap_or_default();
    let label = node
        .children()
        .find(|n| n.has_tag_name("name"))
        .and_then(|n| n.text())
        .unwrap_or_default();

    let customers_raw = field(CUSTOMERS_FIELD);
    let Ok(customers) = customers_raw.trim().parse::<i64>() else {
        log::warn!("SnoPUD: placemark {label:?} has invalid customer count {customers_raw:?}, skipping");
        return None;
    };
    // -1 marks placemarks the utility has not estimated yet
    let Ok(customers_impacted) = u64::try_from(customers) else {
        log::debug!("SnoPUD: skipping placemark {label:?} with {customers} customers impacted");
        return None;
    };

    let start_raw = field(START_FIELD);
    let Some(start_time) = parse_utc_timestamp(&start_raw) else {
        log::warn!("SnoPUD: placemark {label:?} has invalid start time {start_raw:?}, skipping");
        return None;
    };

    let ring = node
        .descendants()
        .find(|n| n.has_tag_name("outerBoundaryIs"))
        .and_then(|b| b.descendants().find(|n| n.has_tag_name("coordinates")))
        .and_then(|c| c.text())
        .map(parse_kml_coordinates)
        .unwrap_or_default();

    Some(Placemark {
        start_time,
        customers_impacted,
        status: field(STATUS_FIELD),
        cause: field(CAUSE_FIELD),
        est_restoration: field(EST_RESTORATION_FIELD),
        ring,
    })
}

/// Collects `<Data name="..."><value>...</value></Data>` pairs. The first
/// occurrence of a name wins.
fn extended_data(placemark: Node<'_, '_>) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let Some(extended) = placemark
        .children()
        .find(|n| n.has_tag_name("ExtendedData"))
    else {
        return fields;
    };

    for data in extended.children().filter(|n| n.has_tag_name("Data")) {
        let Some(name) = data.attribute("name") else {
            continue;
        };
        let value = data
            .children()
            .find(|n| n.has_tag_name("value"))
            .and_then(|v| v.text())
            .unwrap_or_default()
            .trim()
            .to_string();
        fields.entry(name.to_string()).or_insert(value);
    }
    fields
}
