//! Utility registry. Loads all utility definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/utilities/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a utility means
//! creating a new TOML file, adding it to the list below, and writing an
//! adapter in [`crate::sources`].

use outage_map_outage_models::Utility;
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// TOML configs embedded at compile time.
const UTILITY_TOMLS: &[(&str, &str)] = &[
    ("pse", include_str!("../utilities/pse.toml")),
    ("scl", include_str!("../utilities/scl.toml")),
    ("snopud", include_str!("../utilities/snopud.toml")),
    ("pge", include_str!("../utilities/pge.toml")),
];

/// Wire format of a utility's snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedFormat {
    /// JSON outage list with per-entry name/value attribute lists.
    AttributeJson,
    /// JSON outage list with direct fields and `polygons.rings`.
    EventJson,
    /// KML document with one `<Placemark>` per outage area.
    Kml,
    /// `ArcGIS` feature JSON with Web Mercator point geometry.
    ArcgisFeatures,
}

/// Static description of one utility feed.
#[derive(Debug, Clone, Deserialize)]
pub struct UtilityDefinition {
    /// Which adapter handles this feed.
    pub utility: Utility,
    /// Human-readable name (e.g., `"Seattle City Light"`).
    pub name: String,
    /// Service area description.
    pub region: String,
    /// Snapshot file name suffix following the timestamp
    /// (e.g., `"-scl-events.json"`).
    pub snapshot_suffix: String,
    /// Payload format.
    pub feed_format: FeedFormat,
}

/// Parses a utility definition from a TOML string.
///
/// # Errors
///
/// Returns an error string if the TOML is malformed or does not match the
/// expected schema.
pub fn parse_utility_toml(toml_str: &str) -> Result<UtilityDefinition, String> {
    toml::from_str(toml_str).map_err(|e| e.to_string())
}

/// Returns all configured utility definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_utilities() -> Vec<UtilityDefinition> {
    UTILITY_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_utility_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Returns the definition for `utility`.
///
/// # Panics
///
/// Panics if no embedded config describes `utility`.
#[must_use]
pub fn utility_definition(utility: Utility) -> UtilityDefinition {
    all_utilities()
        .into_iter()
        .find(|def| def.utility == utility)
        .unwrap_or_else(|| panic!("No registry entry for utility {utility}"))
}
