//! Touch output and cursor adapters.
//!
//! [`JsonLinesInjector`] writes every primitive as one JSON line, which a
//! device-side forwarder (an adb or scrcpy bridge, a mirroring app's control
//! socket) turns into real touches:
//!
//! ```text
//! {"op":"press","x":200.0,"y":80.0}
//! {"op":"move","x":206.0,"y":80.0}
//! {"op":"release"}
//! ```
//!
//! [`VirtualCursor`] stands in for the desktop cursor when the host has no
//! platform cursor API to call.

pub mod mock;

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use keytouch_core::{CursorControl, InjectionError, Point, TouchInjector, TouchPrimitive};
use serde::Serialize;
use tracing::trace;

/// Wire form of one primitive.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
enum WirePrimitive {
    Press { x: f64, y: f64 },
    Move { x: f64, y: f64 },
    Release,
}

impl From<TouchPrimitive> for WirePrimitive {
    fn from(primitive: TouchPrimitive) -> Self {
        match primitive {
            TouchPrimitive::Press(p) => WirePrimitive::Press { x: p.x, y: p.y },
            TouchPrimitive::Move(p) => WirePrimitive::Move { x: p.x, y: p.y },
            TouchPrimitive::Release => WirePrimitive::Release,
        }
    }
}

/// Writes primitives as JSON lines to any writer.
pub struct JsonLinesInjector<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesInjector<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesInjector<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the injector and returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, primitive: TouchPrimitive) -> Result<(), InjectionError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| InjectionError::Unavailable("output lock poisoned".to_string()))?;
        let line = serde_json::to_string(&WirePrimitive::from(primitive))
            .map_err(|e| InjectionError::Platform(e.to_string()))?;
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| InjectionError::Unavailable(e.to_string()))?;
        trace!("{line}");
        Ok(())
    }
}

impl<W: Write + Send> TouchInjector for JsonLinesInjector<W> {
    fn press(&self, at: Point) -> Result<(), InjectionError> {
        self.write(TouchPrimitive::Press(at))
    }

    fn move_to(&self, at: Point) -> Result<(), InjectionError> {
        self.write(TouchPrimitive::Move(at))
    }

    fn release(&self) -> Result<(), InjectionError> {
        self.write(TouchPrimitive::Release)
    }
}

/// An in-memory cursor position.
#[derive(Debug)]
pub struct VirtualCursor {
    position: Mutex<Point>,
}

impl VirtualCursor {
    pub fn new(at: Point) -> Self {
        Self {
            position: Mutex::new(at),
        }
    }
}

impl Default for VirtualCursor {
    fn default() -> Self {
        Self::new(Point::new(0.0, 0.0))
    }
}

impl CursorControl for VirtualCursor {
    fn cursor_position(&self) -> Point {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn warp_cursor(&self, to: Point) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A writer that always fails, to exercise the error path.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_injector_writes_one_line_per_primitive() {
        // Arrange
        let injector = JsonLinesInjector::new(Vec::new());

        // Act
        injector.press(Point::new(200.0, 80.0)).unwrap();
        injector.move_to(Point::new(206.5, 80.0)).unwrap();
        injector.release().unwrap();

        // Assert
        let text = String::from_utf8(injector.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"op":"press","x":200.0,"y":80.0}"#,
                r#"{"op":"move","x":206.5,"y":80.0}"#,
                r#"{"op":"release"}"#,
            ]
        );
    }

    #[test]
    fn test_json_lines_injector_reports_write_failure() {
        let injector = JsonLinesInjector::new(BrokenPipe);
        assert!(matches!(
            injector.release(),
            Err(InjectionError::Unavailable(_))
        ));
    }

    #[test]
    fn test_virtual_cursor_warps() {
        let cursor = VirtualCursor::default();
        cursor.warp_cursor(Point::new(3.0, 4.0));
        assert_eq!(cursor.cursor_position(), Point::new(3.0, 4.0));
    }
}
