//! Logical points and live deltas to absolute screen coordinates.
//!
//! The mapper is pure: given the same configuration it always returns the
//! same coordinates.  Point lookups by name happen only while resolving a
//! configuration, so a missing point is a load-time error and never a
//! scheduling-time one.

use std::collections::BTreeMap;

use thiserror::Error;

use super::geometry::{segment_points, Point, Vector};
use super::intent::MoveIntent;

/// Point name of the joystick center.
pub const JOYSTICK_CENTER: &str = "joystick_center";
/// Point name of the view drag anchor.
pub const VIEW_ANCHOR: &str = "view_anchor";

/// A point name that is not in the configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("point `{0}` is not configured")]
pub struct UnknownPoint(pub String);

/// Tunables for the joystick and aim geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapperSettings {
    pub joystick_radius: f64,
    pub aim_radius: f64,
    pub aim_sensitivity: f64,
    pub aim_invert_y: bool,
    /// Longest single step of a drag path.
    pub max_step_px: f64,
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            joystick_radius: 120.0,
            aim_radius: 80.0,
            aim_sensitivity: 1.0,
            aim_invert_y: false,
            max_step_px: 6.0,
        }
    }
}

/// One incremental aim position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimStep {
    pub target: Point,
    /// The drag hit the aim radius; the finger must lift and re-anchor.
    pub reached_edge: bool,
}

/// Maps logical points and deltas into the target coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMapper {
    points: BTreeMap<String, Point>,
    joystick_center: Point,
    view_anchor: Point,
    settings: MapperSettings,
}

impl CoordinateMapper {
    /// Builds a mapper from a complete point table.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPoint`] if the joystick center or view anchor is
    /// missing.
    pub fn new(
        points: BTreeMap<String, Point>,
        settings: MapperSettings,
    ) -> Result<Self, UnknownPoint> {
        let lookup = |name: &str| {
            points
                .get(name)
                .copied()
                .ok_or_else(|| UnknownPoint(name.to_string()))
        };
        let joystick_center = lookup(JOYSTICK_CENTER)?;
        let view_anchor = lookup(VIEW_ANCHOR)?;
        Ok(Self {
            points,
            joystick_center,
            view_anchor,
            settings,
        })
    }

    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    /// Looks up a named point.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownPoint`] if `name` is not configured.
    pub fn point(&self, name: &str) -> Result<Point, UnknownPoint> {
        self.points
            .get(name)
            .copied()
            .ok_or_else(|| UnknownPoint(name.to_string()))
    }

    pub fn joystick_center(&self) -> Point {
        self.joystick_center
    }

    pub fn view_anchor(&self) -> Point {
        self.view_anchor
    }

    /// Joystick position for `movement`, never further than the radius from
    /// the center.
    pub fn joystick_target(&self, movement: &MoveIntent) -> Point {
        let radius = self.settings.joystick_radius;
        let offset = movement.vector().scaled(radius).clamp_length(radius);
        self.joystick_center.offset(offset)
    }

    /// Advances an aim drag from `from` by the raw mouse `delta`.
    ///
    /// The delta is scaled by the sensitivity and optionally Y-inverted.  If
    /// the result would leave the aim circle around the view anchor, the step
    /// stops on the circle and reports `reached_edge`.
    pub fn aim_step(&self, from: Point, delta: Vector) -> AimStep {
        let invert = if self.settings.aim_invert_y { -1.0 } else { 1.0 };
        let step = Vector::new(
            delta.dx * self.settings.aim_sensitivity,
            delta.dy * self.settings.aim_sensitivity * invert,
        );
        let radius = self.settings.aim_radius;
        let desired = from.offset(step);
        if self.view_anchor.distance_to(desired) <= radius {
            return AimStep {
                target: desired,
                reached_edge: false,
            };
        }

        // Solve |from + t·step - anchor| = radius for the exit root t in [0, 1].
        let f = self.view_anchor.vector_to(from);
        let a = step.dot(step);
        let b = 2.0 * f.dot(step);
        let c = f.dot(f) - radius * radius;
        let discriminant = (b * b - 4.0 * a * c).max(0.0);
        let t = if a > 0.0 {
            ((-b + discriminant.sqrt()) / (2.0 * a)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        AimStep {
            target: from.offset(step.scaled(t)),
            reached_edge: true,
        }
    }

    /// Intermediate points for a drag from `from` to `to`, ending at `to`.
    pub fn drag_path(&self, from: Point, to: Point) -> Vec<Point> {
        segment_points(from, to, self.settings.max_step_px)
    }
}
