//! Keymap configuration: the on-disk schema and its validation.
//!
//! [`KeymapConfig`] mirrors the TOML file one-to-one and is lenient: every
//! field has a default.  [`resolve`] turns it into a [`SessionConfig`],
//! rejecting anything a running session could trip over later (unknown key
//! names, duplicate bindings, missing points, nonsensical numbers).  A
//! session is only ever started or reloaded with a resolved config.
//!
//! Reading and writing the file is the host's concern; this crate does not
//! depend on a TOML parser.

pub mod resolve;
pub mod schema;

pub use resolve::{resolve, SessionConfig, BACKPACK_TAP};
pub use schema::KeymapConfig;

use thiserror::Error;

/// Error type for configuration validation.  Every variant is fatal at load
/// time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A binding names a key that is not in the key table.
    #[error("unknown key {name:?} bound to {action}")]
    UnknownKey { action: String, name: String },

    /// Two actions share one physical input.
    #[error("{key} is bound to both {first} and {second}")]
    DuplicateBinding {
        key: String,
        first: String,
        second: String,
    },

    /// A required or referenced point is not in `[points]`.
    #[error("point `{name}` is not defined (needed by {needed_by})")]
    MissingPoint { name: String, needed_by: String },

    /// `taps.priority` names a tap that does not exist.
    #[error("tap `{0}` in the priority list is not defined")]
    UnknownTap(String),

    /// Two taps share a name.
    #[error("tap `{0}` is defined more than once")]
    DuplicateTap(String),

    /// A numeric setting is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
