#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for zip code attribution.
//!
//! Loads zip code (ZCTA) polygons from a `GeoJSON` `FeatureCollection`,
//! builds an R-tree over their bounding boxes, and provides fast
//! point-in-polygon lookups for outage centers. The index is an explicit
//! value owned by the caller; nothing is cached process-wide.

use std::collections::BTreeSet;
use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon};
use geojson::GeoJson;
use outage_map_outage_models::OutageRecord;
use rstar::{AABB, RTree, RTreeObject};

/// Feature property holding the zip code in census ZCTA files.
pub const DEFAULT_ZIP_PROPERTY: &str = "ZCTA5CE10";

/// Errors that can occur while loading zip boundaries or whitelists.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The `GeoJSON` document is not a `FeatureCollection`.
    #[error("expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// A boundary feature has no usable zip code property.
    #[error("feature {index} has no string or numeric '{property}' property")]
    MissingProperty {
        /// Property that was looked up.
        property: String,
        /// Position of the feature in the collection.
        index: usize,
    },
}

/// A zip boundary stored in the R-tree.
struct ZipEntry {
    zipcode: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZipEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Zip code boundaries indexed for point lookups.
pub struct ZipIndex {
    tree: RTree<ZipEntry>,
}

impl std::fmt::Debug for ZipIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipIndex")
            .field("boundaries", &self.len())
            .finish()
    }
}

impl ZipIndex {
    /// Builds an index from a `GeoJSON` `FeatureCollection` string, reading
    /// each feature's zip code from `property`.
    ///
    /// Features without a polygon geometry are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the text is not a `FeatureCollection` or
    /// a polygon feature lacks the zip property.
    pub fn from_geojson_str(geojson: &str, property: &str) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = geojson.parse::<GeoJson>()? else {
            return Err(SpatialError::NotFeatureCollection);
        };

        let mut entries = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            let Some(polygon) = feature.geometry.clone().and_then(to_multipolygon) else {
                log::debug!("Skipping zip feature {index} without polygon geometry");
                continue;
            };

            let zipcode = match feature.property(property) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(SpatialError::MissingProperty {
                        property: property.to_string(),
                        index,
                    });
                }
            };

            entries.push(ZipEntry {
                zipcode,
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        log::info!("Loaded {} zip code boundaries into spatial index", entries.len());
        Ok(Self {
            tree: RTree::bulk_load(entries),
        })
    }

    /// Reads a `GeoJSON` file and builds an index from it.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the file cannot be read or parsed.
    pub fn load(path: &Path, property: &str) -> Result<Self, SpatialError> {
        log::info!("Loading zip code boundaries from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text, property)
    }

    /// Number of indexed boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no boundaries are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Looks up the zip code containing a point.
    ///
    /// ZCTAs do not overlap, so the first match wins. Non-finite
    /// coordinates never match.
    #[must_use]
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<&str> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.polygon.contains(&point))
            .map(|entry| entry.zipcode.as_str())
    }
}

/// Set of zip codes an operator cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipWhitelist {
    zipcodes: BTreeSet<String>,
}

impl ZipWhitelist {
    /// Builds a whitelist from lines of text, one zip per line. Blank lines
    /// and lines starting with `#` are ignored.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let zipcodes = lines
            .into_iter()
            .filter_map(|line| {
                let line = line.as_ref().trim();
                (!line.is_empty() && !line.starts_with('#')).then(|| line.to_string())
            })
            .collect();
        Self { zipcodes }
    }

    /// Reads a whitelist file.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Io`] if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let text = std::fs::read_to_string(path)?;
        let whitelist = Self::from_lines(text.lines());
        log::info!(
            "Loaded {} whitelisted zip codes from {}",
            whitelist.len(),
            path.display()
        );
        Ok(whitelist)
    }

    /// Whether `zipcode` is whitelisted.
    #[must_use]
    pub fn contains(&self, zipcode: &str) -> bool {
        self.zipcodes.contains(zipcode)
    }

    /// Number of whitelisted zip codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zipcodes.len()
    }

    /// Returns `true` if the whitelist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zipcodes.is_empty()
    }
}

/// Returns copies of `records` with `zipcode` set from each record's
/// circle center. Records outside every boundary get `None`.
#[must_use]
pub fn assign_zipcodes(records: &[OutageRecord], index: &ZipIndex) -> Vec<OutageRecord> {
    records
        .iter()
        .map(|r| r.with_zipcode(index.lookup(r.center_lon, r.center_lat).map(str::to_string)))
        .collect()
}

/// Keeps only records whose zip code is whitelisted.
#[must_use]
pub fn retain_whitelisted(records: &[OutageRecord], whitelist: &ZipWhitelist) -> Vec<OutageRecord> {
    records
        .iter()
        .filter(|r| r.zipcode.as_deref().is_some_and(|z| whitelist.contains(z)))
        .cloned()
        .collect()
}

/// Converts a `GeoJSON` geometry to a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
