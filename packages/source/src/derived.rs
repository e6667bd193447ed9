//! Derived duration fields.
//!
//! Both calculators floor to whole minutes and may return negative values:
//! a negative expected length means the restoration estimate has already
//! passed, a negative elapsed time means the feed reported a start in the
//! future. Neither is filtered here.

use chrono::{DateTime, Utc};
use outage_map_outage_models::{OutageRecord, floor_minutes};

/// Minutes from `reference` until `est_restoration`, or `None` when either
/// is unknown.
#[must_use]
pub fn expected_length_minutes(
    reference: Option<DateTime<Utc>>,
    est_restoration: Option<DateTime<Utc>>,
) -> Option<i64> {
    Some(floor_minutes(est_restoration? - reference?))
}

/// Minutes from `start` until `reference`, or `None` when either is
/// unknown.
#[must_use]
pub fn elapsed_minutes(
    start: Option<DateTime<Utc>>,
    reference: Option<DateTime<Utc>>,
) -> Option<i64> {
    Some(floor_minutes(reference? - start?))
}

/// Returns copies of `records` with both duration fields computed against
/// `reference`.
#[must_use]
pub fn annotate(records: &[OutageRecord], reference: DateTime<Utc>) -> Vec<OutageRecord> {
    records
        .iter()
        .map(|record| OutageRecord {
            elapsed_time_minutes: elapsed_minutes(Some(record.start_time), Some(reference)),
            expected_length_minutes: expected_length_minutes(
                Some(reference),
                record.est_restoration_time,
            ),
            ..record.clone()
        })
        .collect()
}
