//! Screen-space points and vectors.
//!
//! Coordinates are `f64` pixels in the target (mirrored window) coordinate
//! space, with `y` growing downwards as on every desktop.

use serde::{Deserialize, Serialize};

/// Vectors shorter than this are treated as zero.
const EPSILON: f64 = 1e-9;

/// An absolute position on screen.
///
/// Serialized as a two-element array (`[x, y]`) so config files stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this point displaced by `v`.
    pub fn offset(self, v: Vector) -> Point {
        Point::new(self.x + v.dx, self.y + v.dy)
    }

    /// Returns the vector pointing from `self` to `other`.
    pub fn vector_to(self, other: Point) -> Vector {
        Vector::new(other.x - self.x, other.y - self.y)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        self.vector_to(other).length()
    }

    /// Linear interpolation: `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// A relative displacement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub dx: f64,
    pub dy: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn length(self) -> f64 {
        self.dx.hypot(self.dy)
    }

    pub fn is_zero(self) -> bool {
        self.length() <= EPSILON
    }

    /// Returns the unit vector with the same direction, or [`Vector::ZERO`]
    /// for a zero-length input.
    pub fn normalized(self) -> Vector {
        let len = self.length();
        if len <= EPSILON {
            return Vector::ZERO;
        }
        Vector::new(self.dx / len, self.dy / len)
    }

    pub fn scaled(self, factor: f64) -> Vector {
        Vector::new(self.dx * factor, self.dy * factor)
    }

    /// Shortens the vector to `max` if it is longer, keeping its direction.
    pub fn clamp_length(self, max: f64) -> Vector {
        let len = self.length();
        if len <= max || len <= EPSILON {
            return self;
        }
        self.scaled(max / len)
    }

    pub fn dot(self, other: Vector) -> f64 {
        self.dx * other.dx + self.dy * other.dy
    }
}

impl std::ops::Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl std::ops::AddAssign for Vector {
    fn add_assign(&mut self, rhs: Vector) {
        self.dx += rhs.dx;
        self.dy += rhs.dy;
    }
}

/// Splits the straight line from `start` to `end` into points no more than
/// `max_step` apart.
///
/// `start` itself is not included; the last element is always `end`.  A
/// non-positive `max_step` or a segment already shorter than `max_step`
/// yields just `end`.
pub fn segment_points(start: Point, end: Point, max_step: f64) -> Vec<Point> {
    let dist = start.distance_to(end);
    if max_step <= 0.0 || dist <= max_step {
        return vec![end];
    }
    let steps = (dist / max_step).ceil().max(1.0) as usize;
    let mut points: Vec<Point> = (1..steps)
        .map(|i| start.lerp(end, i as f64 / steps as f64))
        .collect();
    // The final point is pushed verbatim so callers can compare it exactly.
    points.push(end);
    points
}
