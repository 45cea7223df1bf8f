//! The single touch channel.

use super::geometry::Point;
use super::intent::IntentKind;

/// What the injection layer believes is physically touched.
///
/// Exactly one exists per session and only the scheduler writes it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TouchState {
    #[default]
    Idle,
    Pressed { at: Point, owner: IntentKind },
}

impl TouchState {
    pub fn is_idle(&self) -> bool {
        matches!(self, TouchState::Idle)
    }

    pub fn owner(&self) -> Option<&IntentKind> {
        match self {
            TouchState::Idle => None,
            TouchState::Pressed { owner, .. } => Some(owner),
        }
    }

    pub fn position(&self) -> Option<Point> {
        match self {
            TouchState::Idle => None,
            TouchState::Pressed { at, .. } => Some(*at),
        }
    }
}

/// One call to the injection collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchPrimitive {
    Press(Point),
    Move(Point),
    Release,
}

impl TouchPrimitive {
    pub fn name(&self) -> &'static str {
        match self {
            TouchPrimitive::Press(_) => "press",
            TouchPrimitive::Move(_) => "move",
            TouchPrimitive::Release => "release",
        }
    }

    pub fn point(&self) -> Option<Point> {
        match self {
            TouchPrimitive::Press(p) | TouchPrimitive::Move(p) => Some(*p),
            TouchPrimitive::Release => None,
        }
    }
}

impl std::fmt::Display for TouchPrimitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TouchPrimitive::Press(p) => write!(f, "press {p}"),
            TouchPrimitive::Move(p) => write!(f, "move {p}"),
            TouchPrimitive::Release => f.write_str("release"),
        }
    }
}
