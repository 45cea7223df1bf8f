//! Configuration schema as stored on disk.
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent.  A missing or empty file therefore
//! yields a complete, working profile, and older files keep loading when new
//! fields are added.
//!
//! Example (abridged):
//!
//! ```toml
//! [session]
//! start_enabled = false
//! initial_mode = "free_mouse"
//!
//! [hotkeys]
//! view_lock = "CapsLock"
//! fire = "MouseLeft"
//!
//! [points]
//! joystick_center = [200.0, 200.0]
//! view_anchor = [800.0, 400.0]
//!
//! [taps]
//! priority = ["fire", "scope", "backpack"]
//!
//! [[custom]]
//! name = "interact"
//! key = "E"
//! point = "interact"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::geometry::Point;
use crate::domain::intent::TapStyle;
use crate::domain::mode::{BackpackStyle, Mode};

/// Top-level keymap configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeymapConfig {
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub hotkeys: HotkeySection,
    /// Named screen points in the mirrored window's coordinate space.
    #[serde(default = "default_points")]
    pub points: BTreeMap<String, Point>,
    #[serde(default)]
    pub joystick: JoystickSection,
    #[serde(default)]
    pub aim: AimSection,
    #[serde(default = "default_fire")]
    pub fire: TapSection,
    #[serde(default = "default_scope")]
    pub scope: TapSection,
    #[serde(default)]
    pub backpack: BackpackSection,
    #[serde(default)]
    pub taps: TapsSection,
    #[serde(default = "default_custom")]
    pub custom: Vec<CustomTap>,
}

/// Session start-up behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Whether mapping is active immediately (otherwise press the enable key).
    #[serde(default)]
    pub start_enabled: bool,
    #[serde(default = "default_initial_mode")]
    pub initial_mode: Mode,
    /// Scheduler ticks per second.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Key names for every bindable action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotkeySection {
    #[serde(default = "default_toggle_enabled")]
    pub toggle_enabled: String,
    #[serde(default = "default_emergency_stop")]
    pub emergency_stop: String,
    #[serde(default = "default_view_lock")]
    pub view_lock: String,
    #[serde(default = "default_backpack_key")]
    pub backpack: String,
    #[serde(default = "default_move_up")]
    pub move_up: String,
    #[serde(default = "default_move_down")]
    pub move_down: String,
    #[serde(default = "default_move_left")]
    pub move_left: String,
    #[serde(default = "default_move_right")]
    pub move_right: String,
    #[serde(default = "default_fire_key")]
    pub fire: String,
    #[serde(default = "default_scope_key")]
    pub scope: String,
}

/// Virtual joystick geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoystickSection {
    #[serde(default = "default_joystick_radius")]
    pub radius_px: f64,
    /// Fraction of the radius a held key pushes the stick, in `(0, 1]`.
    #[serde(default = "default_magnitude")]
    pub magnitude: f64,
    /// Re-affirm a held joystick at least this often.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// While aim is active, the joystick gets the channel back at least this
    /// many times per second.
    #[serde(default = "default_joystick_min_hz")]
    pub min_hz: u32,
    /// Once the joystick takes the channel back from aim it keeps it this
    /// long, 40 to 200 ms.
    #[serde(default = "default_joystick_hold_ms")]
    pub hold_ms: u64,
}

/// View drag settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AimSection {
    /// How far from the view anchor a drag may go before re-anchoring.
    #[serde(default = "default_aim_radius")]
    pub radius_px: f64,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    #[serde(default)]
    pub invert_y: bool,
    /// Lift the finger after this long without mouse motion.
    #[serde(default = "default_idle_release_ms")]
    pub idle_release_ms: u64,
    #[serde(default = "default_max_step_px")]
    pub max_step_px: f64,
    /// Motion required before aim takes the channel from the joystick.
    #[serde(default = "default_dead_zone_px")]
    pub dead_zone_px: f64,
    /// Aim kept off the channel for longer than `1 / min_hz` is overdue and
    /// weighed against an overdue joystick by how long each has waited.
    #[serde(default = "default_aim_min_hz")]
    pub min_hz: u32,
}

/// Settings for the fire and scope taps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapSection {
    /// `"hold"` or `"toggle"`; when absent fire holds and scope toggles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TapStyle>,
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
}

/// Backpack open/close behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackpackSection {
    #[serde(default)]
    pub style: BackpackStyle,
    /// How long the open/close tap holds the backpack point.
    #[serde(default = "default_backpack_dwell_ms")]
    pub dwell_ms: u64,
}

/// Tap arbitration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapsSection {
    /// Service order for taps requested together.  Unlisted taps follow in
    /// declaration order.
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    /// No tap holds the channel longer than this.
    #[serde(default = "default_max_hold_ms")]
    pub max_hold_ms: u64,
}

/// A user-defined key → tap mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomTap {
    pub name: String,
    pub key: String,
    /// Name of an entry in `[points]`.
    pub point: String,
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,
    #[serde(default = "default_custom_style")]
    pub style: TapStyle,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_points() -> BTreeMap<String, Point> {
    [
        ("joystick_center", [200.0, 200.0]),
        ("view_anchor", [800.0, 400.0]),
        ("fire", [950.0, 260.0]),
        ("scope", [1010.0, 260.0]),
        ("backpack", [980.0, 680.0]),
        ("interact", [820.0, 300.0]),
    ]
    .into_iter()
    .map(|(name, xy)| (name.to_string(), Point::from(xy)))
    .collect()
}
fn default_initial_mode() -> Mode {
    Mode::FreeMouse
}
fn default_tick_hz() -> u32 {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_toggle_enabled() -> String {
    "F8".to_string()
}
fn default_emergency_stop() -> String {
    "F12".to_string()
}
fn default_view_lock() -> String {
    "CapsLock".to_string()
}
fn default_backpack_key() -> String {
    "Tab".to_string()
}
fn default_move_up() -> String {
    "W".to_string()
}
fn default_move_down() -> String {
    "S".to_string()
}
fn default_move_left() -> String {
    "A".to_string()
}
fn default_move_right() -> String {
    "D".to_string()
}
fn default_fire_key() -> String {
    "MouseLeft".to_string()
}
fn default_scope_key() -> String {
    "MouseRight".to_string()
}
fn default_joystick_radius() -> f64 {
    120.0
}
fn default_magnitude() -> f64 {
    1.0
}
fn default_refresh_ms() -> u64 {
    50
}
fn default_joystick_min_hz() -> u32 {
    20
}
fn default_joystick_hold_ms() -> u64 {
    60
}
fn default_aim_radius() -> f64 {
    80.0
}
fn default_sensitivity() -> f64 {
    1.0
}
fn default_idle_release_ms() -> u64 {
    120
}
fn default_max_step_px() -> f64 {
    6.0
}
fn default_dead_zone_px() -> f64 {
    3.0
}
fn default_aim_min_hz() -> u32 {
    50
}
fn default_dwell_ms() -> u64 {
    30
}
fn default_backpack_dwell_ms() -> u64 {
    60
}
fn default_priority() -> Vec<String> {
    vec!["fire".to_string(), "scope".to_string(), "backpack".to_string()]
}
fn default_max_hold_ms() -> u64 {
    10_000
}
fn default_custom_style() -> TapStyle {
    TapStyle::Toggle
}
fn default_fire() -> TapSection {
    TapSection {
        style: Some(TapStyle::Hold),
        dwell_ms: default_dwell_ms(),
    }
}
fn default_scope() -> TapSection {
    TapSection {
        style: Some(TapStyle::Toggle),
        dwell_ms: default_dwell_ms(),
    }
}
fn default_custom() -> Vec<CustomTap> {
    vec![CustomTap {
        name: "interact".to_string(),
        key: "E".to_string(),
        point: "interact".to_string(),
        dwell_ms: default_dwell_ms(),
        style: default_custom_style(),
    }]
}

impl Default for KeymapConfig {
    fn default() -> Self {
        Self {
            session: SessionSection::default(),
            hotkeys: HotkeySection::default(),
            points: default_points(),
            joystick: JoystickSection::default(),
            aim: AimSection::default(),
            fire: default_fire(),
            scope: default_scope(),
            backpack: BackpackSection::default(),
            taps: TapsSection::default(),
            custom: default_custom(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            start_enabled: false,
            initial_mode: default_initial_mode(),
            tick_hz: default_tick_hz(),
            log_level: default_log_level(),
        }
    }
}

impl Default for HotkeySection {
    fn default() -> Self {
        Self {
            toggle_enabled: default_toggle_enabled(),
            emergency_stop: default_emergency_stop(),
            view_lock: default_view_lock(),
            backpack: default_backpack_key(),
            move_up: default_move_up(),
            move_down: default_move_down(),
            move_left: default_move_left(),
            move_right: default_move_right(),
            fire: default_fire_key(),
            scope: default_scope_key(),
        }
    }
}

impl Default for JoystickSection {
    fn default() -> Self {
        Self {
            radius_px: default_joystick_radius(),
            magnitude: default_magnitude(),
            refresh_ms: default_refresh_ms(),
            min_hz: default_joystick_min_hz(),
            hold_ms: default_joystick_hold_ms(),
        }
    }
}

impl Default for AimSection {
    fn default() -> Self {
        Self {
            radius_px: default_aim_radius(),
            sensitivity: default_sensitivity(),
            invert_y: false,
            idle_release_ms: default_idle_release_ms(),
            max_step_px: default_max_step_px(),
            dead_zone_px: default_dead_zone_px(),
            min_hz: default_aim_min_hz(),
        }
    }
}

impl Default for BackpackSection {
    fn default() -> Self {
        Self {
            style: BackpackStyle::default(),
            dwell_ms: default_backpack_dwell_ms(),
        }
    }
}

impl Default for TapsSection {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            max_hold_ms: default_max_hold_ms(),
        }
    }
}
