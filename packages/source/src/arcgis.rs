//! Shared `ArcGIS` feature JSON helpers.
//!
//! `ArcGIS` `FeatureServer`/`MapServer` query responses wrap each record as
//! `{ "attributes": {...}, "geometry": {...} }`. Adapters work on the
//! flattened attribute object instead, with the point geometry merged in
//! under [`GEOMETRY_X_FIELD`] / [`GEOMETRY_Y_FIELD`].

/// Attribute key the geometry `x` coordinate is copied to.
pub const GEOMETRY_X_FIELD: &str = "_geometry_x";

/// Attribute key the geometry `y` coordinate is copied to.
pub const GEOMETRY_Y_FIELD: &str = "_geometry_y";

/// Flattens one feature to its attribute object, merging geometry `x`/`y`
/// so that records without explicit coordinate attributes can reference
/// the geometry directly.
///
/// Returns `None` when the feature has no attribute object.
#[must_use]
pub fn flatten_feature(feature: &serde_json::Value) -> Option<serde_json::Value> {
    let mut record = feature.get("attributes")?.clone();
    let obj = record.as_object_mut()?;

    if let Some(geom) = feature.get("geometry") {
        if let Some(x) = geom.get("x") {
            obj.insert(GEOMETRY_X_FIELD.to_string(), x.clone());
        }
        if let Some(y) = geom.get("y") {
            obj.insert(GEOMETRY_Y_FIELD.to_string(), y.clone());
        }
    }

    Some(record)
}

/// Returns the flattened records of every feature in a query response.
///
/// Features without attributes are dropped with a debug log; a body
/// without a `features` array yields an empty list.
#[must_use]
pub fn feature_records(body: &serde_json::Value) -> Vec<serde_json::Value> {
    let Some(features) = body.get("features").and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };

    features
        .iter()
        .filter_map(|feature| {
            let record = flatten_feature(feature);
            if record.is_none() {
                log::debug!("Dropping ArcGIS feature without attributes: {feature}");
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_geometry_into_attributes() {
        let feature = serde_json::json!({
            "attributes": {"OUTAGE_ID": 7},
            "geometry": {"x": -13_627_361.0, "y": 4_548_155.0}
        });
        let record = flatten_feature(&feature).unwrap();
        assert_eq!(record["OUTAGE_ID"], 7);
        assert_eq!(record[GEOMETRY_X_FIELD], -13_627_361.0);
        assert_eq!(record[GEOMETRY_Y_FIELD], 4_548_155.0);
    }

    #[test]
    fn keeps_attributes_without_geometry() {
        let feature = serde_json::json!({"attributes": {"OUTAGE_ID": 7}});
        let record = flatten_feature(&feature).unwrap();
        assert!(record.get(GEOMETRY_X_FIELD).is_none());
    }

    #[test]
    fn drops_features_without_attributes() {
        let body = serde_json::json!({
            "features": [
                {"geometry": {"x": 1.0, "y": 2.0}},
                {"attributes": {"OUTAGE_ID": 1}},
                {"attributes": "not an object"}
            ]
        });
        assert_eq!(feature_records(&body).len(), 1);
    }

    #[test]
    fn missing_features_array_is_empty() {
        assert!(feature_records(&serde_json::json!({"error": "x"})).is_empty());
        assert!(feature_records(&serde_json::json!([])).is_empty());
    }
}
