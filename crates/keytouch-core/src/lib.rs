//! # keytouch-core
//!
//! Turns keyboard and mouse input into a single stream of touch primitives
//! (press, move, release) for a mirrored phone screen that exposes exactly one
//! touch point.
//!
//! The crate has zero dependencies on OS APIs.  Event capture, touch injection
//! and cursor control are reached through the traits in [`port`].
//!
//! # Architecture overview (for beginners)
//!
//! A player wants several things at once: walk with WASD, look around with the
//! mouse, and fire or open the backpack with a key.  The phone only sees one
//! finger.  This crate decides, moment by moment, which of those wishes owns
//! the finger.
//!
//! - **`domain`** – Plain data and pure rules: geometry, raw input events,
//!   intents, the Combat/FreeMouse mode machine and the coordinate mapper.
//!
//! - **`keymap`** – Key name to key code tables used when reading bindings
//!   from configuration.
//!
//! - **`config`** – The TOML-facing schema and its validation into a
//!   [`config::SessionConfig`].  Every point and binding is checked here, so
//!   nothing is looked up by name once a session runs.
//!
//! - **`arbitration`** – The moving parts: [`IntentTracker`] turns raw events
//!   into active intents, [`TouchScheduler`] time-slices the touch channel and
//!   [`EmergencyStopController`] releases everything on panic.
//!
//! Data flows one way:
//!
//! ```text
//! RawInputEvent ─► IntentTracker ─► (Gate from ModeStateMachine)
//!                                        │
//!                                        ▼
//!                 TouchInjector ◄─ TouchScheduler ◄─ CoordinateMapper
//! ```

pub mod arbitration;
pub mod config;
pub mod domain;
pub mod keymap;
pub mod observe;
pub mod port;

// Re-export the most-used types at the crate root so callers can write
// `keytouch_core::TouchScheduler` instead of the full module path.
pub use arbitration::emergency::{
    CursorKeeper, EmergencyLatch, EmergencyStopController, StopContext, StopReport,
};
pub use arbitration::scheduler::{Decision, Emission, InjectionFailure, SchedulerTiming, TouchScheduler};
pub use arbitration::tracker::{ControlSignal, IntentTracker, TrackerSettings, TrackerUpdate};
pub use config::{resolve, ConfigError, KeymapConfig, SessionConfig};
pub use domain::geometry::{Point, Vector};
pub use domain::input::{InputCode, KeyCode, MouseButton, RawInputEvent, Timestamp};
pub use domain::intent::{ActiveIntentSet, IntentKind, TapId, TapSpec, TapStyle};
pub use domain::mapper::CoordinateMapper;
pub use domain::mode::{Gate, Mode, ModeStateMachine, ModeTransition};
pub use domain::touch::{TouchPrimitive, TouchState};
pub use observe::{SessionEvent, SessionObserver};
pub use port::{CursorControl, InjectionError, TouchInjector};
