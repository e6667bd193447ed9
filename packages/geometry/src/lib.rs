#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry helpers for summarizing an outage's affected area.
//!
//! The main entry point is [`smallest_enclosing_circle`], which reduces any
//! number of polygon rings to a single center + radius. Coordinates are
//! treated as planar `[lon, lat]` pairs; the radius is in the same unit as
//! the input.

use std::collections::BTreeSet;

use outage_map_outage_models::Ring;

/// Tolerance used by the point-in-circle test.
const CONTAINMENT_EPSILON: f64 = 1e-12;

/// Below this determinant magnitude three points are treated as collinear.
const COLLINEAR_EPSILON: f64 = 1e-18;

/// Half the circumference of the Web Mercator sphere, in meters.
pub const WEB_MERCATOR_HALF_EXTENT: f64 = 20_037_508.34;

/// A circle in planar `[lon, lat]` space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center longitude.
    pub center_lon: f64,
    /// Center latitude.
    pub center_lat: f64,
    /// Radius, in input coordinate units.
    pub radius: f64,
}

impl Circle {
    /// The degenerate circle returned for an empty point set.
    pub const ZERO: Self = Self {
        center_lon: 0.0,
        center_lat: 0.0,
        radius: 0.0,
    };

    const fn point(p: [f64; 2]) -> Self {
        Self {
            center_lon: p[0],
            center_lat: p[1],
            radius: 0.0,
        }
    }

    /// Whether `p` lies inside the circle, allowing a `1e-12` tolerance on
    /// the boundary.
    #[must_use]
    pub fn contains(&self, p: [f64; 2]) -> bool {
        distance(p, [self.center_lon, self.center_lat]) <= self.radius + CONTAINMENT_EPSILON
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Circle with segment `ab` as its diameter.
#[allow(clippy::manual_midpoint)]
fn circle_from_two_points(a: [f64; 2], b: [f64; 2]) -> Circle {
    Circle {
        center_lon: (a[0] + b[0]) / 2.0,
        center_lat: (a[1] + b[1]) / 2.0,
        radius: distance(a, b) / 2.0,
    }
}

/// Circumcircle of triangle `abc`, or `None` when the points are collinear.
#[allow(clippy::suboptimal_flops)]
fn circle_from_three_points(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Option<Circle> {
    let [ax, ay] = a;
    let [bx, by] = b;
    let [cx, cy] = c;

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < COLLINEAR_EPSILON {
        return None;
    }

    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
    let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;

    Some(Circle {
        center_lon: ux,
        center_lat: uy,
        radius: distance([ux, uy], a),
    })
}

/// Flattens rings into a single point list, dropping non-finite points and
/// exact duplicates while keeping first-occurrence order.
fn unique_points(rings: &[Ring]) -> Vec<[f64; 2]> {
    let mut seen = BTreeSet::new();
    let mut points = Vec::new();

    for p in rings.iter().flatten() {
        if !p[0].is_finite() || !p[1].is_finite() {
            continue;
        }
        if seen.insert((p[0].to_bits(), p[1].to_bits())) {
            points.push(*p);
        }
    }

    points
}

/// Computes the smallest circle enclosing every point of every ring.
///
/// Never fails: an empty (or entirely non-finite) input yields
/// [`Circle::ZERO`] and a single distinct point yields a zero-radius circle
/// at that point.
///
/// This is the incremental construction without random shuffling, so
/// points are visited in input order. When several circles are equally
/// valid at the tolerance boundary, the one returned depends on that order.
#[must_use]
pub fn smallest_enclosing_circle(rings: &[Ring]) -> Circle {
    let points = unique_points(rings);

    let Some(&first) = points.first() else {
        return Circle::ZERO;
    };
    if points.len() == 1 {
        return Circle::point(first);
    }

    let mut circle = Circle::point(first);
    for (i, &p) in points.iter().enumerate() {
        if i > 0 && circle.contains(p) {
            continue;
        }
        circle = Circle::point(p);
        for (j, &q) in points[..i].iter().enumerate() {
            if circle.contains(q) {
                continue;
            }
            circle = circle_from_two_points(p, q);
            for &r in &points[..j] {
                if !circle.contains(r)
                    && let Some(c) = circle_from_three_points(p, q, r)
                {
                    circle = c;
                }
            }
        }
    }

    circle
}

/// Converts spherical Web Mercator (EPSG:3857) meters to WGS84 (EPSG:4326)
/// `(longitude, latitude)` degrees.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / WEB_MERCATOR_HALF_EXTENT;
    let lat = (y * std::f64::consts::PI / WEB_MERCATOR_HALF_EXTENT)
        .exp()
        .atan()
        * 360.0
        / std::f64::consts::PI
        - 90.0;
    (lon, lat)
}

/// Builds a closed regular octagon (8 vertices plus the repeated first
/// vertex) of the given radius around a point.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn octagon(center_lon: f64, center_lat: f64, radius: f64) -> Ring {
    const SIDES: u32 = 8;

    let mut ring: Ring = (0..SIDES)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * f64::from(i) / f64::from(SIDES);
            [
                center_lon + radius * angle.cos(),
                center_lat + radius * angle.sin(),
            ]
        })
        .collect();
    ring.push(ring[0]);
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_encloses(circle: &Circle, points: &[[f64; 2]]) {
        for p in points {
            let d = distance(*p, [circle.center_lon, circle.center_lat]);
            assert!(
                d <= circle.radius + 1e-9,
                "point {p:?} lies outside {circle:?} (distance {d})"
            );
        }
    }

    /// Small deterministic generator so the enclosure checks cover many
    /// shapes without pulling in a randomness crate.
    fn pseudo_random_points(seed: u64, count: usize) -> Vec<[f64; 2]> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            #[allow(clippy::cast_precision_loss)]
            let unit = (state >> 11) as f64 / (1_u64 << 53) as f64;
            unit
        };
        (0..count)
            .map(|_| [-122.5 + next() * 0.5, 47.0 + next() * 0.5])
            .collect()
    }

    #[test]
    fn empty_input_is_zero_circle() {
        assert_eq!(smallest_enclosing_circle(&[]), Circle::ZERO);
        assert_eq!(smallest_enclosing_circle(&[vec![], vec![]]), Circle::ZERO);
    }

    #[test]
    fn single_point_has_zero_radius() {
        let circle = smallest_enclosing_circle(&[vec![[-122.4, 47.5]]]);
        assert_eq!(
            circle,
            Circle {
                center_lon: -122.4,
                center_lat: 47.5,
                radius: 0.0
            }
        );
    }

    #[test]
    fn repeated_single_point_collapses_to_one() {
        let circle = smallest_enclosing_circle(&[vec![[1.0, 2.0], [1.0, 2.0]], vec![[1.0, 2.0]]]);
        assert_eq!(circle.radius, 0.0);
        assert_eq!((circle.center_lon, circle.center_lat), (1.0, 2.0));
    }

    #[test]
    fn non_finite_points_are_ignored() {
        let circle = smallest_enclosing_circle(&[vec![
            [f64::NAN, 1.0],
            [0.0, 0.0],
            [f64::INFINITY, 0.0],
            [2.0, 0.0],
        ]]);
        assert!((circle.center_lon - 1.0).abs() < 1e-12);
        assert!(circle.center_lat.abs() < 1e-12);
        assert!((circle.radius - 1.0).abs() < 1e-12);
    }

    #[test]
    fn two_points_use_diameter_circle() {
        let circle = smallest_enclosing_circle(&[vec![[0.0, 0.0], [4.0, 0.0]]]);
        assert!((circle.center_lon - 2.0).abs() < 1e-12);
        assert!(circle.center_lat.abs() < 1e-12);
        assert!((circle.radius - 2.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_points_keep_two_point_circle() {
        let points = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let circle = smallest_enclosing_circle(&[points.clone()]);
        assert!((circle.center_lon - 1.5).abs() < 1e-12);
        assert!((circle.center_lat - 1.5).abs() < 1e-12);
        assert!((circle.radius - (18.0_f64).sqrt() / 2.0).abs() < 1e-12);
        assert_encloses(&circle, &points);
    }

    #[test]
    fn right_triangle_uses_hypotenuse() {
        let points = vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0]];
        let circle = smallest_enclosing_circle(&[points.clone()]);
        assert!((circle.center_lon - 1.0).abs() < 1e-12);
        assert!((circle.center_lat - 1.0).abs() < 1e-12);
        assert!((circle.radius - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_encloses(&circle, &points);
    }

    #[test]
    fn acute_triangle_uses_circumcircle() {
        let h = 3.0_f64.sqrt();
        let points = vec![[-1.0, 0.0], [1.0, 0.0], [0.0, h]];
        let circle = smallest_enclosing_circle(&[points.clone()]);
        assert!(circle.center_lon.abs() < 1e-12);
        assert!((circle.center_lat - h / 3.0).abs() < 1e-12);
        assert!((circle.radius - 2.0 * h / 3.0).abs() < 1e-12);
        assert_encloses(&circle, &points);
    }

    #[test]
    fn multiple_rings_are_enclosed_together() {
        let a = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]];
        let b = vec![[10.0, 0.0], [11.0, 0.0], [11.0, 1.0], [10.0, 1.0], [10.0, 0.0]];
        let circle = smallest_enclosing_circle(&[a.clone(), b.clone()]);
        assert_encloses(&circle, &a);
        assert_encloses(&circle, &b);
        assert!((circle.center_lon - 5.5).abs() < 1e-9);
        assert!((circle.center_lat - 0.5).abs() < 1e-9);
    }

    #[test]
    fn encloses_pseudo_random_point_sets() {
        for seed in 0..50 {
            let points = pseudo_random_points(seed, 5 + usize::try_from(seed).unwrap() % 40);
            let circle = smallest_enclosing_circle(&[points.clone()]);
            assert_encloses(&circle, &points);
        }
    }

    #[test]
    fn duplicating_input_does_not_change_circle() {
        for seed in 100..120 {
            let points = pseudo_random_points(seed, 25);
            let once = smallest_enclosing_circle(&[points.clone()]);
            let doubled: Ring = points.iter().chain(points.iter()).copied().collect();
            assert_eq!(once, smallest_enclosing_circle(&[doubled]));
            assert_eq!(
                once,
                smallest_enclosing_circle(&[points.clone(), points.clone()])
            );
        }
    }

    #[test]
    fn converts_web_mercator_origin() {
        let (lon, lat) = web_mercator_to_wgs84(0.0, 0.0);
        assert!(lon.abs() < 1e-12);
        assert!(lat.abs() < 1e-9);
    }

    #[test]
    fn converts_web_mercator_bay_area_point() {
        let (lon, lat) = web_mercator_to_wgs84(-13_627_361.0, 4_548_155.0);
        assert!((lon - -122.416_666_702_183_39).abs() < 1e-9);
        assert!((lat - 37.778_305_647_440_89).abs() < 1e-9);
    }

    #[test]
    fn converts_web_mercator_extent_to_antimeridian() {
        let (lon, _) = web_mercator_to_wgs84(WEB_MERCATOR_HALF_EXTENT, 0.0);
        assert!((lon - 180.0).abs() < 1e-12);
    }

    #[test]
    fn octagon_is_closed_and_regular() {
        let ring = octagon(-122.0, 37.0, 0.001);
        assert_eq!(ring.len(), 9);
        assert_eq!(ring[0], ring[8]);
        for p in &ring {
            assert!((distance(*p, [-122.0, 37.0]) - 0.001).abs() < 1e-12);
        }
        assert!((ring[0][0] - -121.999).abs() < 1e-12);
        assert!((ring[0][1] - 37.0).abs() < 1e-12);
    }
}
