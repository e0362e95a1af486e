//! Canvas geometry primitives
//!
//! Points, sizes and rectangles in canvas coordinates, plus the segment tests
//! used by cable cutting.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Parallel segments below this cross-product magnitude are treated as degenerate
const PARALLEL_EPSILON: f32 = 1e-6;

/// Largest |sin θ| between two segments that still counts as parallel
const PARALLEL_SIN_TOLERANCE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

fn cross(a: Point, b: Point) -> f32 {
    a.x * b.y - a.y * b.x
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Bounding box of a set of points; `None` when empty
    pub fn bounding(points: &[Point]) -> Option<Rect> {
        let first = points.first()?;
        let mut rect = Rect {
            min: *first,
            max: *first,
        };
        for p in &points[1..] {
            rect.min.x = rect.min.x.min(p.x);
            rect.min.y = rect.min.y.min(p.y);
            rect.max.x = rect.max.x.max(p.x);
            rect.max.y = rect.max.y.max(p.y);
        }
        Some(rect)
    }

    pub fn padded(self, pad: f32) -> Rect {
        Rect {
            min: Point::new(self.min.x - pad, self.min.y - pad),
            max: Point::new(self.max.x + pad, self.max.y + pad),
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

/// Straight line segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn midpoint(&self) -> Point {
        self.start.midpoint(self.end)
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    pub fn bounds(&self) -> Rect {
        Rect {
            min: Point::new(self.start.x.min(self.end.x), self.start.y.min(self.end.y)),
            max: Point::new(self.start.x.max(self.end.x), self.start.y.max(self.end.y)),
        }
    }

    /// Closest point on the segment to `p`
    pub fn closest_point(&self, p: Point) -> Point {
        let ab = self.end - self.start;
        let len_sq = ab.x * ab.x + ab.y * ab.y;
        if len_sq <= f32::EPSILON {
            return self.start;
        }
        let ap = p - self.start;
        let t = ((ap.x * ab.x + ap.y * ab.y) / len_sq).clamp(0.0, 1.0);
        self.start.lerp(self.end, t)
    }

    pub fn distance_to_point(&self, p: Point) -> f32 {
        self.closest_point(p).distance(p)
    }

    /// Exact intersection point of two segments.
    ///
    /// Returns `None` for disjoint segments and for (near-)parallel pairs; the
    /// caller decides how to treat the parallel case.
    pub fn intersection(&self, other: &Segment) -> Option<Point> {
        let r = self.end - self.start;
        let s = other.end - other.start;
        let denom = cross(r, s);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }

        let qp = other.start - self.start;
        let t = cross(qp, s) / denom;
        let u = cross(qp, r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(self.start.lerp(self.end, t))
        } else {
            None
        }
    }

    /// Whether the two segments run within a few degrees of each other.
    ///
    /// Degenerate segments count as parallel to everything.
    pub fn is_parallel_to(&self, other: &Segment) -> bool {
        let r = self.end - self.start;
        let s = other.end - other.start;
        let lengths = r.x.hypot(r.y) * s.x.hypot(s.y);
        lengths <= f32::EPSILON || cross(r, s).abs() <= PARALLEL_SIN_TOLERANCE * lengths
    }
}

/// Sample a horizontal-tangent cubic cable between two pins into a polyline
pub fn cable_polyline(from: Point, to: Point, samples: usize) -> Vec<Point> {
    let samples = samples.max(1);
    let reach = ((to.x - from.x).abs() * 0.5).max(20.0);
    let c1 = Point::new(from.x + reach, from.y);
    let c2 = Point::new(to.x - reach, to.y);

    (0..=samples)
        .map(|i| {
            let t = i as f32 / samples as f32;
            let mt = 1.0 - t;
            let a = mt * mt * mt;
            let b = 3.0 * mt * mt * t;
            let c = 3.0 * mt * t * t;
            let d = t * t * t;
            Point::new(
                a * from.x + b * c1.x + c * c2.x + d * to.x,
                a * from.y + b * c1.y + c * c2.y + d * to.y,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_crossing_segments_intersect() {
        let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = Segment::new(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        let p = a.intersection(&b).unwrap();
        assert_relative_eq!(p.x, 5.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_disjoint_segments() {
        let a = Segment::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let b = Segment::new(Point::new(5.0, 0.0), Point::new(6.0, -1.0));
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_parallel_segments_have_no_exact_intersection() {
        let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let b = Segment::new(Point::new(0.0, 1.0), Point::new(10.0, 1.0));
        assert!(a.intersection(&b).is_none());
        assert!(a.is_parallel_to(&b));
        assert_relative_eq!(a.distance_to_point(Point::new(5.0, 1.0)), 1.0);
    }

    #[test]
    fn test_parallel_tolerance_is_angular() {
        let cable = Segment::new(Point::new(87.38, 100.00001), Point::new(93.73, 99.99999));
        let stroke = Segment::new(Point::new(90.0, 102.0), Point::new(110.0, 102.0));
        assert!(cable.is_parallel_to(&stroke));

        let shallow = Segment::new(Point::new(90.0, 101.5), Point::new(110.0, 102.3));
        assert!(cable.is_parallel_to(&shallow));

        let steep = Segment::new(Point::new(90.0, 95.0), Point::new(110.0, 105.0));
        assert!(!cable.is_parallel_to(&steep));
    }

    #[test]
    fn test_degenerate_segment_distance() {
        let dot = Segment::new(Point::new(2.0, 2.0), Point::new(2.0, 2.0));
        assert_relative_eq!(dot.distance_to_point(Point::new(5.0, 6.0)), 5.0);
    }

    #[test]
    fn test_bounds_overlap() {
        let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0)).bounds();
        let b = Segment::new(Point::new(5.0, -5.0), Point::new(5.0, 5.0)).bounds();
        let c = Segment::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0)).bounds();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        let near = Segment::new(Point::new(12.0, 12.0), Point::new(12.0, 14.0)).bounds();
        assert!(a.padded(15.0).overlaps(&near));
    }

    #[test]
    fn test_horizontal_cable_is_straight() {
        let points = cable_polyline(Point::new(0.0, 50.0), Point::new(200.0, 50.0), 8);
        assert_eq!(points.len(), 9);
        for p in &points {
            assert_relative_eq!(p.y, 50.0, epsilon = 1e-4);
        }
        assert_relative_eq!(points[8].x, 200.0, epsilon = 1e-3);
    }
}
