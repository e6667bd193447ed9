//! Plain-text outage alerts.

use chrono::{DateTime, Utc};
use outage_map_outage_models::OutageRecord;
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::comparator::SnapshotComparison;

/// Which comparator bucket a notification came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// Outage first seen in the current snapshot.
    New,
    /// Active outage that just crossed a threshold.
    Escalated,
    /// Outage no longer present in the current snapshot.
    Resolved,
}

impl NotificationKind {
    const fn header(self) -> &'static str {
        match self {
            Self::New => "🚨 NEW OUTAGE ALERT 🚨",
            Self::Escalated => "🚨 ESCALATED OUTAGE ALERT 🚨",
            Self::Resolved => "😌 RESOLVED OUTAGE ALERT 😌",
        }
    }
}

/// A rendered alert for one outage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Bucket the outage was classified into.
    pub kind: NotificationKind,
    /// Outage the alert is about.
    pub outage_id: String,
    /// Message body.
    pub text: String,
}

impl Notification {
    /// File name used when saving this notification, e.g.
    /// `notification_new_INC123_20250115_180000.txt`.
    ///
    /// ASCII letters, digits, `-` and `_` are kept; every other byte of the
    /// id is written as `%XX`, so distinct ids never share a file name.
    #[must_use]
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        let mut id = String::with_capacity(self.outage_id.len());
        for byte in self.outage_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                id.push(char::from(byte));
            } else {
                id.push_str(&format!("%{byte:02X}"));
            }
        }
        format!(
            "notification_{}_{id}_{}.txt",
            self.kind,
            at.format("%Y%m%d_%H%M%S")
        )
    }
}

/// Formats an integer with `,` thousands separators.
fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn hours(minutes: i64) -> String {
    format!("{:.1}h", minutes as f64 / 60.0)
}

/// Renders the alert text for `record`.
#[must_use]
pub fn render_notification(kind: NotificationKind, record: &OutageRecord) -> String {
    let mut lines = vec![
        kind.header().to_string(),
        String::new(),
        format!("Utility: {}", record.utility.as_ref().to_uppercase()),
        format!("ID: {}", record.outage_id),
        format!("Customers: {}", with_thousands(record.customers_impacted)),
    ];

    if kind == NotificationKind::Resolved {
        if let Some(elapsed) = record.elapsed_time_minutes {
            lines.push(format!("Actual Duration: {}", hours(elapsed)));
        }
    } else {
        if let Some(elapsed) = record.elapsed_time_minutes {
            lines.push(format!("Current Duration: {}", hours(elapsed)));
        }
        if let Some(expected) = record.expected_length_minutes {
            lines.push(format!("Expected Duration: {}", hours(expected)));
        }
        lines.push(format!("Status: {}", record.status));
        lines.push(format!("Cause: {}", record.cause));
    }

    if kind == NotificationKind::Escalated
        && let Some(reason) = &record.notification_reason
    {
        lines.push(format!("Reason: {reason}"));
    }
    if let Some(zipcode) = &record.zipcode {
        lines.push(format!("Zip: {zipcode}"));
    }
    lines.push(format!(
        "Location: https://maps.google.com/maps?q={:.6},{:.6}",
        record.center_lat, record.center_lon
    ));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Renders every notification in a comparison, ordered new, escalated,
/// resolved.
#[must_use]
pub fn notifications(comparison: &SnapshotComparison) -> Vec<Notification> {
    let buckets = [
        (NotificationKind::New, &comparison.new),
        (NotificationKind::Escalated, &comparison.escalated),
        (NotificationKind::Resolved, &comparison.resolved),
    ];

    buckets
        .into_iter()
        .flat_map(|(kind, records)| {
            records.iter().map(move |record| Notification {
                kind,
                outage_id: record.outage_id.clone(),
                text: render_notification(kind, record),
            })
        })
        .collect()
}
