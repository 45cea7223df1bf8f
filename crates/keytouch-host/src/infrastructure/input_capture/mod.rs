//! Input capture infrastructure.
//!
//! A capture source runs on its own thread and hands timestamped
//! [`RawInputEvent`]s to the session through a std `mpsc` channel; the
//! capture bridge in `application::session_loop` forwards them into the
//! async session task.
//!
//! Two sources ship with the host:
//!
//! - [`script::ScriptSource`] reads JSON lines (from stdin or a file) and
//!   replays them on the session clock.  This is what the `keytouch` binary
//!   uses, and what an OS-level hook process can pipe into.
//! - [`mock::MockInputSource`] lets tests inject events directly.
//!
//! # Testability
//!
//! The `InputSource` trait allows unit tests to inject synthetic events without
//! requiring OS hooks.

use std::sync::mpsc;

use keytouch_core::RawInputEvent;

pub mod mock;
pub mod script;

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The source cannot deliver events (missing permission, device gone).
    #[error("input capture unavailable: {0}")]
    Unavailable(String),
    #[error("capture source has already been started or stopped")]
    AlreadyStopped,
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait abstracting input event production.
pub trait InputSource: Send {
    /// Starts the source and returns a receiver for captured events.
    ///
    /// The channel closes when the source is exhausted or stopped.
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError>;
    /// Stops the source and releases its resources.
    fn stop(&self);
}
