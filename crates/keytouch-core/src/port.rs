//! Traits for the OS-facing collaborators.
//!
//! Infrastructure implementations drive the real pointer; test
//! implementations record calls.  Every call is synchronous and is expected
//! to return quickly: the scheduler treats a failure as final for the
//! primitive and never retries it.

use thiserror::Error;

use crate::domain::geometry::Point;
use crate::domain::touch::TouchPrimitive;

/// Errors reported by a [`TouchInjector`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectionError {
    /// The platform rejected the synthetic event.
    #[error("platform rejected event: {0}")]
    Platform(String),
    /// The target surface is gone (window closed, permission revoked).
    #[error("injection target unavailable: {0}")]
    Unavailable(String),
}

/// Delivers touch primitives to the mirrored screen.
#[cfg_attr(test, mockall::automock)]
pub trait TouchInjector: Send + Sync {
    /// Puts the finger down at `at`.
    fn press(&self, at: Point) -> Result<(), InjectionError>;

    /// Drags the finger to `at`.
    fn move_to(&self, at: Point) -> Result<(), InjectionError>;

    /// Lifts the finger.
    fn release(&self) -> Result<(), InjectionError>;
}

impl TouchPrimitive {
    /// Sends this primitive to `injector`.
    ///
    /// # Errors
    ///
    /// Propagates the injector's [`InjectionError`].
    pub fn deliver(self, injector: &dyn TouchInjector) -> Result<(), InjectionError> {
        match self {
            TouchPrimitive::Press(p) => injector.press(p),
            TouchPrimitive::Move(p) => injector.move_to(p),
            TouchPrimitive::Release => injector.release(),
        }
    }
}

/// Reads and moves the real desktop cursor.
pub trait CursorControl: Send + Sync {
    fn cursor_position(&self) -> Point;
    fn warp_cursor(&self, to: Point);
}
