//! Snapshot comparator.
//!
//! Outages are matched across the previous and current snapshot by
//! `outage_id`:
//!
//! * present only in current: **new**, kept if [`meets_thresholds`]
//! * present only in previous: **resolved**, kept if [`meets_thresholds`]
//! * present in both: **active**, and **escalated** when it has just become
//!   notification-worthy
//!
//! A null duration never satisfies a threshold. The large-outage rule looks
//! at the customer count alone.

use std::collections::{BTreeMap, BTreeSet};

use outage_map_outage_models::{OutageRecord, Thresholds};

/// Reason attached when an escalation produced no specific fragment.
const UNKNOWN_REASON: &str = "unknown reason";

/// Result of comparing two snapshots of the same utility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotComparison {
    /// Notification-worthy outages that appeared in the current snapshot,
    /// in current-snapshot order.
    pub new: Vec<OutageRecord>,
    /// Notification-worthy outages that disappeared, as last seen in the
    /// previous snapshot.
    pub resolved: Vec<OutageRecord>,
    /// Active outages that just crossed a threshold. Each is a copy of the
    /// current record carrying a `notification_reason`.
    pub escalated: Vec<OutageRecord>,
    /// Every current record whose id was also in the previous snapshot.
    pub active: Vec<OutageRecord>,
}

impl SnapshotComparison {
    /// Returns `true` if nothing is worth notifying about.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.new.is_empty() && self.resolved.is_empty() && self.escalated.is_empty()
    }
}

fn expected_length_met(record: &OutageRecord, thresholds: &Thresholds) -> bool {
    record
        .expected_length_minutes
        .is_some_and(|m| m >= thresholds.expected_length_threshold_minutes)
}

const fn customers_met(record: &OutageRecord, thresholds: &Thresholds) -> bool {
    record.customers_impacted >= thresholds.customer_threshold
}

fn elapsed_time_met(record: &OutageRecord, thresholds: &Thresholds) -> bool {
    record
        .elapsed_time_minutes
        .is_some_and(|m| m >= thresholds.elapsed_time_threshold_minutes)
}

const fn is_large(record: &OutageRecord, thresholds: &Thresholds) -> bool {
    record.customers_impacted >= thresholds.large_outage_customer_threshold
}

/// The three-condition rule: expected length, customers and elapsed time
/// all at or above their thresholds.
#[must_use]
pub fn meets_primary(record: &OutageRecord, thresholds: &Thresholds) -> bool {
    expected_length_met(record, thresholds)
        && customers_met(record, thresholds)
        && elapsed_time_met(record, thresholds)
}

/// Whether a new or resolved outage is worth a notification: the primary
/// rule, or a customer count at or above the large-outage threshold.
#[must_use]
pub fn meets_thresholds(record: &OutageRecord, thresholds: &Thresholds) -> bool {
    meets_primary(record, thresholds) || is_large(record, thresholds)
}

#[allow(clippy::cast_precision_loss)]
fn format_hours(minutes: Option<i64>) -> String {
    minutes.map_or_else(|| "na".to_string(), |m| format!("{:.1}h", m as f64 / 60.0))
}

/// Describes why `current` escalated relative to `previous`, or returns
/// `None` if it did not.
///
/// Fragments appear in a fixed order: expected length, customers and
/// elapsed time for a primary-rule escalation (only the conditions that
/// were unmet before), then customers again for a large-outage
/// escalation.
#[must_use]
pub fn escalation_reason(
    previous: &OutageRecord,
    current: &OutageRecord,
    thresholds: &Thresholds,
) -> Option<String> {
    let primary_escalation =
        meets_primary(current, thresholds) && !meets_primary(previous, thresholds);
    let large_escalation = is_large(current, thresholds) && !is_large(previous, thresholds);

    if !primary_escalation && !large_escalation {
        return None;
    }

    let customers_change = || {
        format!(
            "customers ({}=>{})",
            previous.customers_impacted, current.customers_impacted
        )
    };

    let mut fragments = Vec::new();
    if primary_escalation {
        if !expected_length_met(previous, thresholds) {
            fragments.push(format!(
                "expected_length ({}=>{})",
                format_hours(previous.expected_length_minutes),
                format_hours(current.expected_length_minutes)
            ));
        }
        if !customers_met(previous, thresholds) {
            fragments.push(customers_change());
        }
        if !elapsed_time_met(previous, thresholds) {
            fragments.push(format!(
                "elapsed_time ({}=>{})",
                format_hours(previous.elapsed_time_minutes),
                format_hours(current.elapsed_time_minutes)
            ));
        }
    }
    if large_escalation {
        fragments.push(customers_change());
    }

    if fragments.is_empty() {
        return Some(UNKNOWN_REASON.to_string());
    }
    Some(fragments.join(", "))
}

/// Classifies the outages of two consecutive snapshots.
///
/// Inputs are not modified; escalated records are fresh copies. If an id
/// repeats within one snapshot, its first occurrence is used for matching.
#[must_use]
pub fn compare_snapshots(
    current: &[OutageRecord],
    previous: &[OutageRecord],
    thresholds: &Thresholds,
) -> SnapshotComparison {
    let mut previous_by_id: BTreeMap<&str, &OutageRecord> = BTreeMap::new();
    for record in previous {
        previous_by_id.entry(record.outage_id.as_str()).or_insert(record);
    }
    let current_ids: BTreeSet<&str> = current.iter().map(|r| r.outage_id.as_str()).collect();

    let mut comparison = SnapshotComparison::default();

    for record in current {
        let Some(prev) = previous_by_id.get(record.outage_id.as_str()) else {
            if meets_thresholds(record, thresholds) {
                comparison.new.push(record.clone());
            }
            continue;
        };

        comparison.active.push(record.clone());
        if let Some(reason) = escalation_reason(prev, record, thresholds) {
            log::debug!("Outage {} escalated: {reason}", record.outage_id);
            comparison
                .escalated
                .push(record.with_notification_reason(reason));
        }
    }

    comparison.resolved = previous
        .iter()
        .filter(|r| !current_ids.contains(r.outage_id.as_str()))
        .filter(|r| meets_thresholds(r, thresholds))
        .cloned()
        .collect();

    log::info!(
        "Compared {} current / {} previous outages: {} new, {} resolved, {} escalated, {} active",
        current.len(),
        previous.len(),
        comparison.new.len(),
        comparison.resolved.len(),
        comparison.escalated.len(),
        comparison.active.len()
    );

    comparison
}
