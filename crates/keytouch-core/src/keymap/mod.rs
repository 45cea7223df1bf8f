//! Key name parsing for configuration files.
//!
//! Bindings are written with human names (`"W"`, `"CapsLock"`, `"MouseLeft"`)
//! and translated to [`InputCode`]s once, at load time.  Key codes follow the
//! macOS virtual key code space; see [`macos`].

pub mod macos;

use thiserror::Error;

use crate::domain::input::{InputCode, KeyCode, MouseButton};

/// Errors produced while parsing a key name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeymapError {
    #[error("unknown key name {0:?}")]
    UnknownKey(String),
}

/// Parses a key or mouse button name.
///
/// Single-character names are case-insensitive (`"w"` == `"W"`).  Mouse
/// buttons accept the common aliases (`MouseLeft`, `LMB`, `Mouse1`, ...).
///
/// # Errors
///
/// Returns [`KeymapError::UnknownKey`] if the name is not in the table.
pub fn parse_input(name: &str) -> Result<InputCode, KeymapError> {
    let trimmed = name.trim();
    if let Some(button) = mouse_button_for(trimmed) {
        return Ok(InputCode::Mouse(button));
    }
    macos::keycode_for(trimmed)
        .map(|code| InputCode::Key(KeyCode(code)))
        .ok_or_else(|| KeymapError::UnknownKey(name.to_string()))
}

/// Returns the canonical name for an input, falling back to the raw code.
pub fn describe(code: InputCode) -> String {
    match code {
        InputCode::Mouse(MouseButton::Left) => "MouseLeft".to_string(),
        InputCode::Mouse(MouseButton::Right) => "MouseRight".to_string(),
        InputCode::Mouse(MouseButton::Middle) => "MouseMiddle".to_string(),
        InputCode::Key(KeyCode(raw)) => macos::name_for(raw)
            .map(str::to_string)
            .unwrap_or_else(|| format!("keycode {raw}")),
    }
}

fn mouse_button_for(name: &str) -> Option<MouseButton> {
    let lowered = name.to_ascii_lowercase().replace([' ', '_', '-'], "");
    match lowered.as_str() {
        "mouseleft" | "leftmouse" | "mouse1" | "lmb" | "left" => Some(MouseButton::Left),
        "mouseright" | "rightmouse" | "mouse2" | "rmb" | "right" => Some(MouseButton::Right),
        "mousemiddle" | "middlemouse" | "mouse3" | "mmb" | "middle" => Some(MouseButton::Middle),
        _ => None,
    }
}
