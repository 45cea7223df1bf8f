//! Infrastructure layer for the host.
//!
//! Contains the adapters around the session: input capture sources, touch
//! output and cursor adapters, file-system storage, the config watcher and
//! the observability sinks.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `keytouch_core`, but MUST NOT be imported by the core crate.

pub mod config_watch;
pub mod injection;
pub mod input_capture;
pub mod observability;
pub mod storage;
