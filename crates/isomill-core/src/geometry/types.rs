//! Planar geometry types shared across the pipeline.

use serde::Serialize;

/// 2D point in board coordinate space (millimeters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point from its coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy).sqrt()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Minimum X coordinate.
    pub min_x: f64,
    /// Minimum Y coordinate.
    pub min_y: f64,
    /// Maximum X coordinate.
    pub max_x: f64,
    /// Maximum Y coordinate.
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates an empty bounding box that will expand with the first `update` call.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Expands the bounding box to include the given point.
    pub fn update(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// True when two boxes overlap, with `margin` of slack on every side.
    #[must_use]
    pub fn overlaps(&self, other: &Self, margin: f64) -> bool {
        self.min_x <= other.max_x + margin
            && other.min_x <= self.max_x + margin
            && self.min_y <= other.max_y + margin
            && other.min_y <= self.max_y + margin
    }

    /// True when at least one point has been recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed boundary polyline. The edge from the last vertex back to the
/// first is implicit; the first vertex is never duplicated at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ring {
    /// Boundary vertices in order.
    pub points: Vec<Point>,
}

impl Ring {
    /// Creates a ring from its boundary vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Signed shoelace area: positive for counter-clockwise rings.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        let Some(mut prev) = self.points.last().copied() else {
            return 0.0;
        };
        let mut doubled = 0.0;
        for point in self.points.iter().copied() {
            doubled += prev.x.mul_add(point.y, -(point.x * prev.y));
            prev = point;
        }
        doubled / 2.0
    }

    /// Absolute enclosed area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// True when the ring winds counter-clockwise.
    #[must_use]
    pub fn is_ccw(&self) -> bool {
        self.signed_area() > 0.0
    }

    /// Returns the ring with counter-clockwise winding, reversing if needed.
    #[must_use]
    pub fn into_ccw(mut self) -> Self {
        if self.signed_area() < 0.0 {
            self.points.reverse();
        }
        self
    }

    /// Bounding box of all vertices.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::new();
        for point in &self.points {
            bounds.update(point.x, point.y);
        }
        bounds
    }

    /// Even-odd containment test for a point against the closed boundary.
    #[must_use]
    pub fn contains_point(&self, target: Point) -> bool {
        let Some(mut prev) = self.points.last().copied() else {
            return false;
        };
        let mut inside = false;
        for point in self.points.iter().copied() {
            if (point.y > target.y) != (prev.y > target.y) {
                let t = (target.y - point.y) / (prev.y - point.y);
                let crossing_x = (prev.x - point.x).mul_add(t, point.x);
                if target.x < crossing_x {
                    inside = !inside;
                }
            }
            prev = point;
        }
        inside
    }

    /// Minimum distance from a point to the ring's boundary edges.
    #[must_use]
    pub fn boundary_distance(&self, target: Point) -> f64 {
        let Some(mut prev) = self.points.last().copied() else {
            return f64::INFINITY;
        };
        let mut best = f64::INFINITY;
        for point in self.points.iter().copied() {
            best = best.min(segment_distance(target, prev, point));
            prev = point;
        }
        best
    }
}

/// Distance from `target` to the segment `a`..`b`.
fn segment_distance(target: Point, a: Point, b: Point) -> f64 {
    let edge_x = b.x - a.x;
    let edge_y = b.y - a.y;
    let length_sq = edge_x.mul_add(edge_x, edge_y * edge_y);
    if length_sq <= f64::EPSILON {
        return target.distance(a);
    }
    let t = (edge_x.mul_add(target.x - a.x, edge_y * (target.y - a.y)) / length_sq).clamp(0.0, 1.0);
    let closest = Point::new(edge_x.mul_add(t, a.x), edge_y.mul_add(t, a.y));
    target.distance(closest)
}

/// One connected copper island: an outer boundary plus enclosed holes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Island {
    /// Outer boundary, counter-clockwise.
    pub outer: Ring,
    /// Enclosed holes.
    pub holes: Vec<Ring>,
}

/// A closed planar area as a set of disjoint islands.
///
/// Built once by the geometry stage and consumed read-only by the toolpath
/// generator and the preview collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Region {
    /// Disjoint islands in discovery order.
    pub islands: Vec<Island>,
}

impl Region {
    /// True when the region has no islands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    /// All boundary rings: each island's outer ring, then its holes.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.islands
            .iter()
            .flat_map(|island| std::iter::once(&island.outer).chain(island.holes.iter()))
    }

    /// Enclosed area: island areas minus their holes.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.islands
            .iter()
            .map(|island| {
                let holes: f64 = island.holes.iter().map(Ring::area).sum();
                island.outer.area() - holes
            })
            .sum()
    }

    /// Bounding box over all islands.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::new();
        for ring in self.rings() {
            for point in &ring.points {
                bounds.update(point.x, point.y);
            }
        }
        bounds
    }
}

/// Board edge as one or more closed loops.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outline {
    /// Closed edge loops in input order.
    pub loops: Vec<Ring>,
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn unit_square() -> Ring {
        Ring::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ])
    }

    #[test]
    fn ut_geo_001_signed_area_is_positive_for_ccw_square() {
        assert!((unit_square().signed_area() - 1.0).abs() < EPSILON);
        assert!(unit_square().is_ccw());
    }

    #[test]
    fn ut_geo_002_reversed_square_has_negative_area_and_normalizes() {
        let mut reversed = unit_square();
        reversed.points.reverse();
        assert!((reversed.signed_area() + 1.0).abs() < EPSILON);
        let normalized = reversed.into_ccw();
        assert!(normalized.is_ccw());
    }

    #[test]
    fn ut_geo_003_contains_point_inside_and_outside() {
        let square = unit_square();
        assert!(square.contains_point(Point::new(0.5, 0.5)));
        assert!(!square.contains_point(Point::new(1.5, 0.5)));
        assert!(!square.contains_point(Point::new(-0.5, 0.5)));
    }

    #[test]
    fn ut_geo_004_boundary_distance_from_center_of_unit_square() {
        let square = unit_square();
        let distance = square.boundary_distance(Point::new(0.5, 0.5));
        assert!((distance - 0.5).abs() < EPSILON);
    }

    #[test]
    fn ut_geo_005_region_total_area_subtracts_holes() {
        let outer = Ring::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        let hole = Ring::new(vec![
            Point::new(4.0, 4.0),
            Point::new(6.0, 4.0),
            Point::new(6.0, 6.0),
            Point::new(4.0, 6.0),
        ]);
        let region = Region {
            islands: vec![Island {
                outer,
                holes: vec![hole],
            }],
        };
        assert!((region.total_area() - 96.0).abs() < EPSILON);
    }

    #[test]
    fn ut_geo_006_bounding_box_overlap_honors_margin() {
        let mut a = BoundingBox::new();
        a.update(0.0, 0.0);
        a.update(1.0, 1.0);
        let mut b = BoundingBox::new();
        b.update(1.5, 0.0);
        b.update(2.5, 1.0);
        assert!(!a.overlaps(&b, 0.0));
        assert!(a.overlaps(&b, 0.6));
    }

    #[test]
    fn bc_geo_001_empty_ring_has_no_area_and_contains_nothing() {
        let empty = Ring::default();
        assert!(empty.signed_area().abs() < EPSILON);
        assert!(!empty.contains_point(Point::new(0.0, 0.0)));
        assert!(empty.boundary_distance(Point::new(0.0, 0.0)).is_infinite());
    }
}
