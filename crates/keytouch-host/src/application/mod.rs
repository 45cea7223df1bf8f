//! Application layer: the touch session and the task that drives it.
//!
//! - [`drive_touch`]: [`TouchSession`](drive_touch::TouchSession), which owns
//!   every piece of arbitration state and turns inputs, ticks and reloads
//!   into touch primitives.
//! - [`session_loop`]: the single tokio task that feeds the session one
//!   command at a time, plus the bridge from the capture thread.
//!
//! This layer depends on `keytouch_core` and on the core's port traits only.
//! Concrete adapters are injected by `main.rs` or by tests.

pub mod drive_touch;
pub mod session_loop;
