//! Storage infrastructure: keymap file persistence.
//!
//! The `config` sub-module handles:
//!
//! - Locating the keymap file in the platform config directory.
//! - Reading and validating it, falling back to the built-in profile when
//!   the file does not exist yet (first run).
//! - Writing the default profile for `--write-default`.

pub mod config;
