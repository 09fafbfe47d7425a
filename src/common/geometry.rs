//! 2D geometry kernel
//!
//! All coordinates live in the field frame: origin at the center spot,
//! x towards one goal, angles in degrees counter-clockwise from +x.

use super::angle::full_circle_deg;
use super::types::Degrees;
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// An immutable (x, y) pair, used both for positions and for vectors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Coordinate { x, y }
    }

    /// Point at `distance` along `direction` from the origin
    pub fn from_polar(distance: f64, direction: Degrees) -> Self {
        let rad = direction.to_radians();
        Coordinate::new(distance * rad.cos(), distance * rad.sin())
    }

    pub fn magnitude(&self) -> f64 {
        self.vector().norm()
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        (*other - *self).magnitude()
    }

    /// Direction of this vector, full circle
    pub fn direction(&self) -> Degrees {
        full_circle_deg(self.y.atan2(self.x).to_degrees())
    }

    pub fn rotated(&self, angle: Degrees) -> Coordinate {
        let rotated = Rotation2::new(angle.to_radians()) * self.vector();
        rotated.into()
    }

    pub fn vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Vector2<f64>> for Coordinate {
    fn from(v: Vector2<f64>) -> Self {
        Coordinate::new(v.x, v.y)
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        (self.vector() + rhs.vector()).into()
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        (self.vector() - rhs.vector()).into()
    }
}

impl Mul<f64> for Coordinate {
    type Output = Coordinate;

    fn mul(self, rhs: f64) -> Coordinate {
        (self.vector() * rhs).into()
    }
}

impl Neg for Coordinate {
    type Output = Coordinate;

    fn neg(self) -> Coordinate {
        Coordinate::new(-self.x, -self.y)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Euclidean distance between two points
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    a.distance_to(&b)
}

/// Direction of the ray from `a` to `b`, in `[0, 360)`
pub fn bearing_from_origin_to(a: Coordinate, b: Coordinate) -> Degrees {
    (b - a).direction()
}

/// Rotate `point` about the origin
pub fn rotate(point: Coordinate, angle: Degrees) -> Coordinate {
    point.rotated(angle)
}

/// Result of intersecting two circles
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intersections {
    None,
    Tangent(Coordinate),
    Pair(Coordinate, Coordinate),
}

impl Intersections {
    pub fn points(&self) -> Vec<Coordinate> {
        match *self {
            Intersections::None => Vec::new(),
            Intersections::Tangent(p) => vec![p],
            Intersections::Pair(a, b) => vec![a, b],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Intersections::None => 0,
            Intersections::Tangent(_) => 1,
            Intersections::Pair(_, _) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Intersections::None)
    }
}

/// Intersect the circles (c1, r1) and (c2, r2).
///
/// The pair is first solved as if `c2` lay on the +x axis of `c1`, then the
/// offsets are rotated by the true bearing from `c1` to `c2`. Circles that
/// miss each other by no more than `tolerance` (noisy range readings) are
/// treated as touching and produce a single point.
pub fn circle_intersections(
    c1: Coordinate,
    r1: f64,
    c2: Coordinate,
    r2: f64,
    tolerance: f64,
) -> Intersections {
    let separation = c1.distance_to(&c2);
    if separation <= f64::EPSILON || r1 < 0.0 || r2 < 0.0 {
        return Intersections::None;
    }

    let gap = (separation - (r1 + r2)).max((r1 - r2).abs() - separation);
    if gap > tolerance {
        return Intersections::None;
    }

    let along = (r1 * r1 - r2 * r2 + separation * separation) / (2.0 * separation);
    let across_sq = r1 * r1 - along * along;
    let bearing = bearing_from_origin_to(c1, c2);

    if across_sq <= 0.0 {
        let offset = Coordinate::new(along.clamp(-r1, r1), 0.0);
        return Intersections::Tangent(c1 + rotate(offset, bearing));
    }

    let across = across_sq.sqrt();
    let upper = c1 + rotate(Coordinate::new(along, across), bearing);
    let lower = c1 + rotate(Coordinate::new(along, -across), bearing);
    Intersections::Pair(upper, lower)
}

/// Arithmetic mean of a non-empty set of points
pub fn centroid(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Coordinate::ORIGIN, |acc, point| acc + *point);
    Some(sum * (1.0 / points.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Coordinate, b: Coordinate, eps: f64) -> bool {
        a.distance_to(&b) <= eps
    }

    #[test]
    fn bearing_is_full_circle() {
        let origin = Coordinate::ORIGIN;
        assert!((bearing_from_origin_to(origin, Coordinate::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_from_origin_to(origin, Coordinate::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
        assert!((bearing_from_origin_to(origin, Coordinate::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let rotated = rotate(Coordinate::new(1.0, 0.0), 90.0);
        assert!(close(rotated, Coordinate::new(0.0, 1.0), 1e-9));
    }

    #[test]
    fn coincident_centers_have_no_intersection() {
        let c = Coordinate::new(3.0, 3.0);
        assert!(circle_intersections(c, 2.0, c, 2.0, 0.5).is_empty());
    }

    #[test]
    fn distant_circles_have_no_intersection() {
        let result = circle_intersections(
            Coordinate::ORIGIN,
            1.0,
            Coordinate::new(10.0, 0.0),
            1.0,
            0.5,
        );
        assert_eq!(result, Intersections::None);
    }

    #[test]
    fn near_miss_counts_as_tangent() {
        let result = circle_intersections(
            Coordinate::ORIGIN,
            4.9,
            Coordinate::new(10.0, 0.0),
            4.9,
            0.5,
        );
        match result {
            Intersections::Tangent(p) => assert!(close(p, Coordinate::new(4.9, 0.0), 1e-9)),
            other => panic!("expected tangent, got {:?}", other),
        }
    }

    #[test]
    fn centroid_of_square() {
        let points = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(2.0, 0.0),
            Coordinate::new(2.0, 2.0),
            Coordinate::new(0.0, 2.0),
        ];
        assert_eq!(centroid(&points), Some(Coordinate::new(1.0, 1.0)));
        assert_eq!(centroid(&[]), None);
    }
}
