//! One-row-per-outage summaries over many snapshots.
//!
//! Used for after-the-fact analysis of how long outages actually lasted
//! compared to the utility's first restoration estimate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use outage_map_outage_models::{OutageRecord, Utility, floor_minutes};
use serde::Serialize;

/// Lifetime summary of one outage across every snapshot it appeared in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutageSummary {
    /// Feed the outage came from.
    pub utility: Utility,
    /// Utility-assigned identifier.
    pub outage_id: String,
    /// Start time reported in the first snapshot.
    pub first_start_time: DateTime<Utc>,
    /// Start time reported in the last snapshot.
    pub last_start_time: DateTime<Utc>,
    /// First restoration estimate the utility published.
    pub first_est_restoration_time: Option<DateTime<Utc>>,
    /// Last restoration estimate the utility published.
    pub last_est_restoration_time: Option<DateTime<Utc>>,
    /// Largest `est_restoration_time - snapshot_time` over all snapshots.
    pub largest_estimated_remaining_minutes: Option<i64>,
    /// First snapshot the outage appeared in.
    pub first_snapshot_time: DateTime<Utc>,
    /// Last snapshot the outage appeared in.
    pub last_snapshot_time: DateTime<Utc>,
    /// Number of snapshots the outage appeared in.
    pub snapshot_count: usize,
    /// Largest customer count over all snapshots.
    pub max_customers_impacted: u64,
    /// Circle center longitude from the last snapshot.
    pub center_lon: f64,
    /// Circle center latitude from the last snapshot.
    pub center_lat: f64,
    /// Last snapshot the outage was seen in, minus its first start time.
    pub total_outage_minutes: i64,
    /// First estimate minus first start time.
    pub length_from_first_estimate_minutes: Option<i64>,
    /// Actual length minus the length implied by the first estimate.
    /// Positive means the outage ran longer than first promised.
    pub actual_vs_first_estimate_minutes: Option<i64>,
}

/// Selection criteria for [`filter_high_impact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighImpactFilter {
    /// Minimum `max_customers_impacted`.
    pub min_customers: u64,
    /// Minimum `largest_estimated_remaining_minutes`.
    pub min_estimated_remaining_minutes: i64,
    /// Minimum `total_outage_minutes`.
    pub min_total_minutes: i64,
    /// Earliest accepted `first_start_time`, inclusive.
    pub start: Option<DateTime<Utc>>,
    /// Latest accepted `first_start_time`, inclusive.
    pub end: Option<DateTime<Utc>>,
}

impl Default for HighImpactFilter {
    fn default() -> Self {
        Self {
            min_customers: 100,
            min_estimated_remaining_minutes: 6 * 60,
            min_total_minutes: 60,
            start: None,
            end: None,
        }
    }
}

/// Groups `records` by `(utility, outage_id)` and summarizes each group.
///
/// With `exclude_edges`, outages already present in the earliest snapshot
/// or still present in the latest snapshot of the whole data set are
/// dropped, since their true start or end is not observed.
///
/// Summaries are ordered by utility, then outage id.
#[must_use]
pub fn summarize_history(records: &[OutageRecord], exclude_edges: bool) -> Vec<OutageSummary> {
    let (Some(min_snapshot), Some(max_snapshot)) = (
        records.iter().map(|r| r.snapshot_time).min(),
        records.iter().map(|r| r.snapshot_time).max(),
    ) else {
        return Vec::new();
    };

    let mut groups: BTreeMap<(Utility, &str), Vec<&OutageRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.utility, record.outage_id.as_str()))
            .or_default()
            .push(record);
    }

    let total = groups.len();
    let summaries: Vec<OutageSummary> = groups
        .into_values()
        .filter_map(|mut group| {
            group.sort_by_key(|r| r.snapshot_time);
            let summary = summarize_group(&group)?;
            let on_edge = summary.first_snapshot_time == min_snapshot
                || summary.last_snapshot_time == max_snapshot;
            (!exclude_edges || !on_edge).then_some(summary)
        })
        .collect();

    log::info!(
        "Summarized {} of {} outages from {} records",
        summaries.len(),
        total,
        records.len()
    );
    summaries
}

fn summarize_group(group: &[&OutageRecord]) -> Option<OutageSummary> {
    let first = group.first()?;
    let last = group.last()?;

    let first_est_restoration_time = group.iter().find_map(|r| r.est_restoration_time);
    let last_est_restoration_time = group.iter().rev().find_map(|r| r.est_restoration_time);
    let largest_estimated_remaining_minutes = group
        .iter()
        .filter_map(|r| r.est_restoration_time.map(|est| floor_minutes(est - r.snapshot_time)))
        .max();

    let total_outage_minutes = floor_minutes(last.snapshot_time - first.start_time);
    let length_from_first_estimate_minutes =
        first_est_restoration_time.map(|est| floor_minutes(est - first.start_time));

    Some(OutageSummary {
        utility: first.utility,
        outage_id: first.outage_id.clone(),
        first_start_time: first.start_time,
        last_start_time: last.start_time,
        first_est_restoration_time,
        last_est_restoration_time,
        largest_estimated_remaining_minutes,
        first_snapshot_time: first.snapshot_time,
        last_snapshot_time: last.snapshot_time,
        snapshot_count: group.len(),
        max_customers_impacted: group
            .iter()
            .map(|r| r.customers_impacted)
            .max()
            .unwrap_or_default(),
        center_lon: last.center_lon,
        center_lat: last.center_lat,
        total_outage_minutes,
        length_from_first_estimate_minutes,
        actual_vs_first_estimate_minutes: length_from_first_estimate_minutes
            .map(|estimated| total_outage_minutes - estimated),
    })
}

/// Keeps summaries that were large, were expected to last long, and did
/// last at least the minimum, within the optional start-time window.
#[must_use]
pub fn filter_high_impact(
    summaries: &[OutageSummary],
    filter: &HighImpactFilter,
) -> Vec<OutageSummary> {
    summaries
        .iter()
        .filter(|s| filter.start.is_none_or(|start| s.first_start_time >= start))
        .filter(|s| filter.end.is_none_or(|end| s.first_start_time <= end))
        .filter(|s| s.max_customers_impacted >= filter.min_customers)
        .filter(|s| {
            s.largest_estimated_remaining_minutes
                .is_some_and(|m| m >= filter.min_estimated_remaining_minutes)
        })
        .filter(|s| s.total_outage_minutes >= filter.min_total_minutes)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::test_support::record;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0).unwrap()
    }

    fn observed(
        id: &str,
        snapshot: DateTime<Utc>,
        customers: u64,
        est: Option<DateTime<Utc>>,
    ) -> OutageRecord {
        OutageRecord {
            snapshot_time: snapshot,
            start_time: at(10, 0),
            est_restoration_time: est,
            ..record(id, customers, None, None)
        }
    }

    #[test]
    fn summarizes_one_outage() {
        let records = vec![
            observed("a", at(12, 0), 50, None),
            observed("a", at(11, 0), 20, Some(at(13, 0))),
            observed("a", at(13, 0), 40, Some(at(18, 0))),
        ];

        let summaries = summarize_history(&records, false);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.first_snapshot_time, at(11, 0));
        assert_eq!(s.last_snapshot_time, at(13, 0));
        assert_eq!(s.snapshot_count, 3);
        assert_eq!(s.first_est_restoration_time, Some(at(13, 0)));
        assert_eq!(s.last_est_restoration_time, Some(at(18, 0)));
        assert_eq!(s.largest_estimated_remaining_minutes, Some(300));
        assert_eq!(s.max_customers_impacted, 50);
        assert_eq!(s.total_outage_minutes, 180);
        assert_eq!(s.length_from_first_estimate_minutes, Some(180));
        assert_eq!(s.actual_vs_first_estimate_minutes, Some(0));
    }

    #[test]
    fn excludes_edge_outages() {
        let records = vec![
            observed("early", at(11, 0), 1, None),
            observed("early", at(12, 0), 1, None),
            observed("middle", at(12, 0), 1, None),
            observed("late", at(12, 0), 1, None),
            observed("late", at(13, 0), 1, None),
        ];

        let all = summarize_history(&records, false);
        assert_eq!(all.len(), 3);

        let inner = summarize_history(&records, true);
        let ids: Vec<&str> = inner.iter().map(|s| s.outage_id.as_str()).collect();
        assert_eq!(ids, vec!["middle"]);
    }

    #[test]
    fn same_id_from_different_utilities_stays_separate() {
        let mut other = observed("a", at(11, 0), 1, None);
        other.utility = Utility::Pse;
        let records = vec![observed("a", at(11, 0), 1, None), other];

        assert_eq!(summarize_history(&records, false).len(), 2);
    }

    #[test]
    fn empty_history_is_empty() {
        assert!(summarize_history(&[], true).is_empty());
    }

    #[test]
    fn filters_high_impact_outages() {
        let records = vec![
            observed("big", at(11, 0), 500, Some(at(19, 0))),
            observed("big", at(12, 0), 500, None),
            observed("small", at(11, 0), 10, Some(at(19, 0))),
            observed("short_estimate", at(11, 0), 500, Some(at(12, 0))),
        ];
        let summaries = summarize_history(&records, false);

        let kept = filter_high_impact(&summaries, &HighImpactFilter::default());
        let ids: Vec<&str> = kept.iter().map(|s| s.outage_id.as_str()).collect();
        assert_eq!(ids, vec!["big"]);

        let windowed = filter_high_impact(
            &summaries,
            &HighImpactFilter {
                start: Some(at(10, 30)),
                ..HighImpactFilter::default()
            },
        );
        assert!(windowed.is_empty());
    }
}
