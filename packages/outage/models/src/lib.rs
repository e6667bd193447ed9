#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical outage record shape shared by every utility feed.
//!
//! Each utility adapter produces [`OutageRecord`]s that conform to this
//! shape, regardless of whether the raw feed was attribute-list JSON,
//! `ArcGIS` feature JSON or KML. The snapshot comparator consumes the same
//! records together with caller-supplied [`Thresholds`].

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A single polygon ring as `[longitude, latitude]` pairs.
pub type Ring = Vec<[f64; 2]>;

/// The utility whose feed an outage record came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Utility {
    /// Puget Sound Energy
    Pse,
    /// Seattle City Light
    Scl,
    /// Snohomish County Public Utility District
    Snopud,
    /// Pacific Gas & Electric
    Pge,
}

impl Utility {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Pse, Self::Scl, Self::Snopud, Self::Pge]
    }
}

/// One outage as observed in one snapshot of one utility's feed.
///
/// Records are produced fresh per snapshot and never mutated in place by
/// the comparator. Derived fields (`elapsed_time_minutes`,
/// `expected_length_minutes`) and `zipcode` start out empty and are filled
/// in on copies by later pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutageRecord {
    /// Feed the record came from.
    pub utility: Utility,
    /// Utility-assigned identifier, unique within one snapshot. Synthesized
    /// from the start time for feeds without stable identifiers.
    pub outage_id: String,
    /// When the snapshot containing this record was observed.
    pub snapshot_time: DateTime<Utc>,
    /// When the outage began (UTC).
    pub start_time: DateTime<Utc>,
    /// Number of customers without power.
    pub customers_impacted: u64,
    /// Free-text crew/outage status. May be empty.
    pub status: String,
    /// Free-text cause. May be empty.
    pub cause: String,
    /// Estimated restoration time. `None` means unknown.
    pub est_restoration_time: Option<DateTime<Utc>>,
    /// Longitude of the enclosing circle center.
    pub center_lon: f64,
    /// Latitude of the enclosing circle center.
    pub center_lat: f64,
    /// Radius of the enclosing circle, in the input coordinate unit.
    pub radius: f64,
    /// Rings the circle was computed from, retained for serialization.
    pub polygon: Vec<Ring>,
    /// Minutes since `start_time`, relative to the snapshot time.
    pub elapsed_time_minutes: Option<i64>,
    /// Minutes until `est_restoration_time`, relative to the snapshot time.
    /// Negative once the estimate has passed.
    pub expected_length_minutes: Option<i64>,
    /// Zip code of the circle center, assigned by the zip lookup.
    pub zipcode: Option<String>,
    /// Why an active outage was escalated. Only set on escalated copies.
    pub notification_reason: Option<String>,
}

impl OutageRecord {
    /// Returns a copy of this record carrying the given notification
    /// reason.
    #[must_use]
    pub fn with_notification_reason(&self, reason: impl Into<String>) -> Self {
        Self {
            notification_reason: Some(reason.into()),
            ..self.clone()
        }
    }

    /// Returns a copy of this record with the given zip code.
    #[must_use]
    pub fn with_zipcode(&self, zipcode: Option<String>) -> Self {
        Self {
            zipcode,
            ..self.clone()
        }
    }
}

/// Notification thresholds. Durations are whole minutes; callers holding
/// hour values should go through [`Thresholds::from_hours`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// Minimum customers for the primary (three-condition) rule.
    pub customer_threshold: u64,
    /// Customer count at which an outage is notable on its own.
    pub large_outage_customer_threshold: u64,
    /// Minimum minutes the outage must already have lasted.
    pub elapsed_time_threshold_minutes: i64,
    /// Minimum minutes remaining until the restoration estimate.
    pub expected_length_threshold_minutes: i64,
}

impl Thresholds {
    /// Builds thresholds from hour-based durations.
    ///
    /// Minute values are rounded up: for integer minute counts `m`,
    /// `m >= x` holds exactly when `m >= ceil(x)`.
    #[must_use]
    pub fn from_hours(
        expected_length_hours: f64,
        customer_threshold: u64,
        large_outage_customer_threshold: u64,
        elapsed_time_hours: f64,
    ) -> Self {
        Self {
            customer_threshold,
            large_outage_customer_threshold,
            elapsed_time_threshold_minutes: hours_to_minutes(elapsed_time_hours),
            expected_length_threshold_minutes: hours_to_minutes(expected_length_hours),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn hours_to_minutes(hours: f64) -> i64 {
    if hours.is_finite() {
        (hours * 60.0).ceil() as i64
    } else if hours > 0.0 {
        i64::MAX
    } else {
        i64::MIN
    }
}

/// Floors a duration to whole minutes. Negative durations round towards
/// negative infinity.
#[must_use]
pub fn floor_minutes(delta: TimeDelta) -> i64 {
    delta.num_milliseconds().div_euclid(60_000)
}
