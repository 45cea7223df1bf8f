//! Structured session events for logging and debugging overlays.

use crate::domain::geometry::Point;
use crate::domain::input::Timestamp;
use crate::domain::intent::{IntentKind, TapId};
use crate::domain::mode::ModeTransition;
use crate::domain::touch::TouchPrimitive;

/// Something observable happened in a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A primitive was delivered to the injector.
    Primitive {
        primitive: TouchPrimitive,
        owner: IntentKind,
        at: Timestamp,
    },
    /// The injector refused a primitive; the owner's claim was dropped.
    InjectionFailed {
        primitive: TouchPrimitive,
        owner: IntentKind,
        reason: String,
        at: Timestamp,
    },
    TapCompleted { id: TapId, at: Timestamp },
    ModeChanged(ModeTransition),
    EnabledChanged { enabled: bool },
    EmergencyStop {
        /// `false` for a repeated trigger.
        first: bool,
        released: bool,
        cursor_restored: Option<Point>,
    },
    EmergencyReset,
    CursorRestored { to: Point },
    /// A reload was applied.
    ConfigApplied,
    /// A reload arrived mid-gesture and waits for a quiescent point.
    ConfigDeferred,
}

/// Receives [`SessionEvent`]s.
///
/// Called synchronously on the decision path, so implementations must be
/// quick and must not block.
pub trait SessionObserver: Send + Sync {
    fn observe(&self, event: &SessionEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn observe(&self, _event: &SessionEvent) {}
}
