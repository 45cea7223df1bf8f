//! Recording injector and cursor for tests.
//!
//! # Why recording doubles?
//!
//! A real injector drives a device that test code cannot observe.  These
//! doubles push every call into a `Mutex<Vec<...>>` so assertions can check
//! exactly what was emitted and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail` to make every injector call return
//! [`InjectionError::Platform`].  It is atomic so a test can flip it while
//! the injector is shared with a session through an `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use keytouch_core::{CursorControl, InjectionError, Point, TouchInjector, TouchPrimitive};

/// Records every primitive it is asked to inject.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    pub calls: Mutex<Vec<TouchPrimitive>>,
    pub should_fail: AtomicBool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything delivered so far.
    pub fn primitives(&self) -> Vec<TouchPrimitive> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns and forgets everything delivered so far.
    pub fn take(&self) -> Vec<TouchPrimitive> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    fn record(&self, primitive: TouchPrimitive) -> Result<(), InjectionError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(InjectionError::Platform(format!("{primitive} refused")));
        }
        self.calls.lock().unwrap().push(primitive);
        Ok(())
    }
}

impl TouchInjector for RecordingInjector {
    fn press(&self, at: Point) -> Result<(), InjectionError> {
        self.record(TouchPrimitive::Press(at))
    }

    fn move_to(&self, at: Point) -> Result<(), InjectionError> {
        self.record(TouchPrimitive::Move(at))
    }

    fn release(&self) -> Result<(), InjectionError> {
        self.record(TouchPrimitive::Release)
    }
}

/// A cursor that records every warp.
#[derive(Debug, Default)]
pub struct RecordingCursor {
    position: Mutex<Point>,
    warps: Mutex<Vec<Point>>,
}

impl RecordingCursor {
    pub fn at(position: Point) -> Self {
        Self {
            position: Mutex::new(position),
            warps: Mutex::new(Vec::new()),
        }
    }

    /// Moves the cursor without recording a warp, as the user would.
    pub fn set(&self, position: Point) {
        *self.position.lock().unwrap() = position;
    }

    pub fn warps(&self) -> Vec<Point> {
        self.warps.lock().unwrap().clone()
    }
}

impl CursorControl for RecordingCursor {
    fn cursor_position(&self) -> Point {
        *self.position.lock().unwrap()
    }

    fn warp_cursor(&self, to: Point) {
        *self.position.lock().unwrap() = to;
        self.warps.lock().unwrap().push(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_injector_records_in_order() {
        let injector = RecordingInjector::new();
        injector.press(Point::new(1.0, 2.0)).unwrap();
        injector.release().unwrap();
        assert_eq!(
            injector.take(),
            vec![TouchPrimitive::Press(Point::new(1.0, 2.0)), TouchPrimitive::Release]
        );
        assert!(injector.primitives().is_empty());
    }

    #[test]
    fn test_recording_injector_should_fail() {
        let injector = RecordingInjector::new();
        injector.set_failing(true);
        assert!(injector.release().is_err());
        assert!(injector.primitives().is_empty());
    }

    #[test]
    fn test_recording_cursor_set_is_not_a_warp() {
        let cursor = RecordingCursor::default();
        cursor.set(Point::new(5.0, 5.0));
        cursor.warp_cursor(Point::new(1.0, 1.0));
        assert_eq!(cursor.warps(), vec![Point::new(1.0, 1.0)]);
        assert_eq!(cursor.cursor_position(), Point::new(1.0, 1.0));
    }
}
