//! What a bound input does.

use super::geometry::Vector;
use super::intent::TapId;

/// One of the four joystick directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit vector in screen space (up is negative `y`).
    pub fn unit(self) -> Vector {
        match self {
            Direction::Up => Vector::new(0.0, -1.0),
            Direction::Down => Vector::new(0.0, 1.0),
            Direction::Left => Vector::new(-1.0, 0.0),
            Direction::Right => Vector::new(1.0, 0.0),
        }
    }
}

/// The logical action behind a key or mouse button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Contributes a direction to the combined Move intent while held.
    Move(Direction),
    /// Requests a tap on the named point.
    Tap(TapId),
    /// Toggles Combat ⇄ FreeMouse.
    ViewLock,
    /// Opens or closes the backpack.
    Backpack,
    /// Suspends or resumes all mapping.
    ToggleEnabled,
    /// Releases everything and latches until reset.
    EmergencyStop,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Move(Direction::Up) => f.write_str("move up"),
            Action::Move(Direction::Down) => f.write_str("move down"),
            Action::Move(Direction::Left) => f.write_str("move left"),
            Action::Move(Direction::Right) => f.write_str("move right"),
            Action::Tap(id) => write!(f, "tap `{id}`"),
            Action::ViewLock => f.write_str("view lock"),
            Action::Backpack => f.write_str("backpack"),
            Action::ToggleEnabled => f.write_str("enable toggle"),
            Action::EmergencyStop => f.write_str("emergency stop"),
        }
    }
}
