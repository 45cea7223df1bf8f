//! Raw input events as delivered by the capture collaborator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Monotonic time since the session started.
///
/// Capture stamps every event with it and the scheduler uses the same clock
/// for dwell and refresh timing, so tests can drive time explicitly.
pub type Timestamp = Duration;

/// Platform key code (macOS virtual key code space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

/// Mouse button identifier used in [`RawInputEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Any physical input that can be bound to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InputCode {
    Key(KeyCode),
    Mouse(MouseButton),
}

/// A raw input event produced by the input capture infrastructure.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInputEvent {
    /// A key was pressed (or auto-repeated).
    KeyDown { code: KeyCode, at: Timestamp },
    /// A key was released.
    KeyUp { code: KeyCode, at: Timestamp },
    /// Relative pointer motion in desktop pixels.
    MouseMove { dx: f64, dy: f64, at: Timestamp },
    MouseDown { button: MouseButton, at: Timestamp },
    MouseUp { button: MouseButton, at: Timestamp },
}

impl RawInputEvent {
    /// Returns the capture timestamp.
    pub fn at(&self) -> Timestamp {
        match self {
            RawInputEvent::KeyDown { at, .. }
            | RawInputEvent::KeyUp { at, .. }
            | RawInputEvent::MouseMove { at, .. }
            | RawInputEvent::MouseDown { at, .. }
            | RawInputEvent::MouseUp { at, .. } => *at,
        }
    }

    /// Returns the bindable input and whether it went down, or `None` for
    /// pointer motion.
    pub fn button_edge(&self) -> Option<(InputCode, bool)> {
        match *self {
            RawInputEvent::KeyDown { code, .. } => Some((InputCode::Key(code), true)),
            RawInputEvent::KeyUp { code, .. } => Some((InputCode::Key(code), false)),
            RawInputEvent::MouseDown { button, .. } => Some((InputCode::Mouse(button), true)),
            RawInputEvent::MouseUp { button, .. } => Some((InputCode::Mouse(button), false)),
            RawInputEvent::MouseMove { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_edge_reports_key_down() {
        let ev = RawInputEvent::KeyDown {
            code: KeyCode(13),
            at: Duration::from_millis(5),
        };
        assert_eq!(ev.button_edge(), Some((InputCode::Key(KeyCode(13)), true)));
        assert_eq!(ev.at(), Duration::from_millis(5));
    }

    #[test]
    fn test_button_edge_reports_mouse_up() {
        let ev = RawInputEvent::MouseUp {
            button: MouseButton::Right,
            at: Duration::ZERO,
        };
        assert_eq!(ev.button_edge(), Some((InputCode::Mouse(MouseButton::Right), false)));
    }

    #[test]
    fn test_button_edge_is_none_for_motion() {
        let ev = RawInputEvent::MouseMove {
            dx: 1.0,
            dy: 2.0,
            at: Duration::ZERO,
        };
        assert!(ev.button_edge().is_none());
    }
}
