//! Line and point primitives used by the constraint resolvers.
//!
//! Every function here is pure. Degenerate inputs (a probe parallel to the line,
//! parallel lines, zero-length lines) yield `None` instead of `NaN`.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Below this magnitude a coordinate difference is treated as zero.
const PARALLEL_EPSILON: f64 = 1.0e-12;

/// Position in the plane of the frame measured in metres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Distance along the global X axis.
    pub x: f64,
    /// Distance along the global Y axis.
    pub y: f64,
}

impl Point {
    /// Create a [`Point`] with explicit coordinates.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert the point into an algebraic vector.
    #[must_use]
    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Point {
    fn from(value: Vector2<f64>) -> Self {
        Self::new(value.x, value.y)
    }
}

impl From<Point> for Vector2<f64> {
    fn from(value: Point) -> Self {
        value.to_vector()
    }
}

/// Straight segment between two points. Most kernel functions treat it as the
/// infinite line through both points unless stated otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// First end of the segment.
    pub point1: Point,
    /// Second end of the segment.
    pub point2: Point,
}

impl Line {
    /// Create a [`Line`] through two points.
    #[must_use]
    pub const fn new(point1: Point, point2: Point) -> Self {
        Self { point1, point2 }
    }

    /// Vector from `point1` to `point2`.
    #[must_use]
    pub fn direction(&self) -> Vector2<f64> {
        self.point2.to_vector() - self.point1.to_vector()
    }

    /// Euclidean length of the segment.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.direction().norm()
    }

    /// Whether the line runs parallel to the Y axis.
    #[must_use]
    pub fn is_vertical(&self) -> bool {
        (self.point2.x - self.point1.x).abs() < PARALLEL_EPSILON
    }

    /// Whether the line runs parallel to the X axis.
    #[must_use]
    pub fn is_horizontal(&self) -> bool {
        (self.point2.y - self.point1.y).abs() < PARALLEL_EPSILON
    }
}

/// Convenience helper for creating [`Point`] instances.
///
/// # Examples
/// ```
/// use framex::point;
///
/// let origin = point(0.0, 0.0);
/// assert_eq!(origin.x, 0.0);
/// ```
#[must_use]
pub const fn point(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

/// Convenience helper for creating [`Line`] instances from raw coordinates.
#[must_use]
pub const fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Line {
    Line::new(Point::new(x1, y1), Point::new(x2, y2))
}

/// The Y coordinate where `line` crosses the vertical probe `x = value`.
///
/// Returns `None` for a vertical line, which never crosses a vertical probe at a
/// single point.
///
/// # Examples
/// ```
/// use framex::geometry::{intersection_with_x, line};
///
/// let rafter = line(0.0, 0.0, 10.0, 5.0);
/// assert_eq!(intersection_with_x(&rafter, 4.0), Some(2.0));
/// ```
#[must_use]
pub fn intersection_with_x(line: &Line, x: f64) -> Option<f64> {
    if line.is_vertical() {
        return None;
    }
    let slope = slope(line);
    Some(line.point1.y + slope * (x - line.point1.x))
}

/// The X coordinate where `line` crosses the horizontal probe `y = value`.
///
/// Returns `None` for a horizontal line.
#[must_use]
pub fn intersection_with_y(line: &Line, y: f64) -> Option<f64> {
    if line.is_horizontal() {
        return None;
    }
    let inverse_slope = (line.point2.x - line.point1.x) / (line.point2.y - line.point1.y);
    Some(line.point1.x + inverse_slope * (y - line.point1.y))
}

/// Unique intersection of two infinite lines, or `None` when they are parallel.
#[must_use]
pub fn intersection_between_lines(first: &Line, second: &Line) -> Option<Point> {
    match (first.is_vertical(), second.is_vertical()) {
        (true, true) => None,
        (true, false) => {
            let x = first.point1.x;
            intersection_with_x(second, x).map(|y| Point::new(x, y))
        }
        (false, true) => {
            let x = second.point1.x;
            intersection_with_x(first, x).map(|y| Point::new(x, y))
        }
        (false, false) => {
            let m1 = slope(first);
            let m2 = slope(second);
            if (m1 - m2).abs() < PARALLEL_EPSILON {
                return None;
            }
            let b1 = first.point1.y - m1 * first.point1.x;
            let b2 = second.point1.y - m2 * second.point1.x;
            let x = (b2 - b1) / (m1 - m2);
            Some(Point::new(x, m1 * x + b1))
        }
    }
}

/// Euclidean distance between two points.
#[must_use]
pub fn distance_between(a: Point, b: Point) -> f64 {
    (b.to_vector() - a.to_vector()).norm()
}

/// Signed value of the implicit line equation `a·x + b·y + c` at `point`.
///
/// The sign tells which side of the line the point lies on; zero means on the line.
#[must_use]
pub fn above_or_below_line(line: &Line, point: Point) -> f64 {
    let a = line.point2.y - line.point1.y;
    let b = line.point1.x - line.point2.x;
    let c = line.point2.x * line.point1.y - line.point1.x * line.point2.y;
    a * point.x + b * point.y + c
}

/// Unit vector perpendicular to `line`.
///
/// The vector points toward the side where [`above_or_below_line`] has the same
/// sign as `direction` (zero picks the positive side). Returns `None` for a
/// zero-length line.
#[must_use]
pub fn normalized_orthogonal_vector(line: &Line, direction: f64) -> Option<Vector2<f64>> {
    let along = line.direction();
    let length = along.norm();
    if length < PARALLEL_EPSILON {
        return None;
    }
    let orthogonal = Vector2::new(along.y, -along.x) / length;
    if direction < 0.0 {
        Some(-orthogonal)
    } else {
        Some(orthogonal)
    }
}

/// Rise over run. Vertical lines give an infinite slope.
#[must_use]
pub fn slope(line: &Line) -> f64 {
    let dx = line.point2.x - line.point1.x;
    let dy = line.point2.y - line.point1.y;
    if dx.abs() < PARALLEL_EPSILON {
        return if dy < 0.0 {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    dy / dx
}

/// Inclination of the line in radians, in `(-π/2, π/2]`.
#[must_use]
pub fn slope_radians(line: &Line) -> f64 {
    slope(line).atan()
}

/// Direction of `point1 → point2` in degrees, measured counter-clockwise from +X.
#[must_use]
pub fn line_angle(line: &Line) -> f64 {
    let along = line.direction();
    along.y.atan2(along.x).to_degrees()
}

/// Affine interpolation along the line. `t` outside `[0, 1]` extrapolates.
#[must_use]
pub fn point_on_line(line: &Line, t: f64) -> Point {
    Point::from(line.point1.to_vector() + line.direction() * t)
}

/// Parametric position of the projection of `point` onto the infinite line.
///
/// Zero-length lines report position `0`.
#[must_use]
pub fn unclamped_position_on_line(line: &Line, point: Point) -> f64 {
    let along = line.direction();
    let length_squared = along.norm_squared();
    if length_squared < PARALLEL_EPSILON {
        return 0.0;
    }
    (point.to_vector() - line.point1.to_vector()).dot(&along) / length_squared
}

/// Parametric position of the closest point on the segment, clamped to `[0, 1]`.
#[must_use]
pub fn position_on_line(line: &Line, point: Point) -> f64 {
    unclamped_position_on_line(line, point).clamp(0.0, 1.0)
}

/// Orthogonal projection of `point` onto the infinite line.
#[must_use]
pub fn project_point_on_line(line: &Line, point: Point) -> Point {
    point_on_line(line, unclamped_position_on_line(line, point))
}

/// Move `point` by `distance` along the line's unit normal.
///
/// Positive distances move toward the positive side of [`above_or_below_line`].
/// A zero-length line leaves the point where it is.
#[must_use]
pub fn offset_point_from_line(point: Point, line: &Line, distance: f64) -> Point {
    match normalized_orthogonal_vector(line, 1.0) {
        Some(normal) => Point::from(point.to_vector() + normal * distance),
        None => point,
    }
}
