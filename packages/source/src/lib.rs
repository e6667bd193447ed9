#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Utility outage feed adapters and normalization logic.
//!
//! Each utility implements the [`OutageSource`] trait to define how its raw
//! snapshot payload is parsed and mapped to the canonical
//! [`OutageRecord`] shape. Adapters are pure: the caller fetches the
//! payload and supplies the snapshot time.

pub mod arcgis;
pub mod derived;
pub mod parsing;
pub mod registry;
pub mod snapshot;
pub mod sources;

use chrono::{DateTime, Utc};
use outage_map_outage_models::{OutageRecord, Utility};

pub use sources::source_for;

/// Errors that can occur while normalizing a snapshot payload.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// KML/XML parsing failed.
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data normalization error.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Trait that all utility outage feeds must implement.
///
/// Each source knows how to turn one raw snapshot payload into canonical
/// [`OutageRecord`]s. Malformed individual entries are skipped inside
/// [`OutageSource::normalize`]; only payload-level failures surface as
/// errors.
pub trait OutageSource: Send + Sync {
    /// Returns the utility this source parses.
    fn utility(&self) -> Utility;

    /// Returns the human-readable name of this source.
    fn name(&self) -> &str;

    /// Parses a raw snapshot payload into canonical records.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the payload as a whole cannot be parsed.
    fn normalize(
        &self,
        raw: &str,
        snapshot_time: DateTime<Utc>,
    ) -> Result<Vec<OutageRecord>, SourceError>;

    /// Parses a raw snapshot payload, treating a payload-level failure as
    /// an empty snapshot so that one bad fetch never stops a monitoring
    /// loop.
    fn parse(&self, raw: &str, snapshot_time: DateTime<Utc>) -> Vec<OutageRecord> {
        match self.normalize(raw, snapshot_time) {
            Ok(records) => records,
            Err(e) => {
                log::warn!(
                    "{}: could not parse snapshot from {snapshot_time}, defaulting to empty: {e}",
                    self.name()
                );
                Vec::new()
            }
        }
    }
}

/// Parses a raw snapshot for `utility` and fills in the derived duration
/// fields relative to `snapshot_time`.
#[must_use]
pub fn parse_snapshot(
    utility: Utility,
    raw: &str,
    snapshot_time: DateTime<Utc>,
) -> Vec<OutageRecord> {
    let records = source_for(utility).parse(raw, snapshot_time);
    derived::annotate(&records, snapshot_time)
}
