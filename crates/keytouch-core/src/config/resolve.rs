//! Validation: [`KeymapConfig`] → [`SessionConfig`].

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::debug;

use super::schema::KeymapConfig;
use super::ConfigError;
use crate::arbitration::scheduler::SchedulerTiming;
use crate::arbitration::tracker::TrackerSettings;
use crate::domain::binding::{Action, Direction};
use crate::domain::geometry::Point;
use crate::domain::input::InputCode;
use crate::domain::intent::{TapId, TapScope, TapSpec, TapStyle};
use crate::domain::mapper::{CoordinateMapper, MapperSettings, JOYSTICK_CENTER, VIEW_ANCHOR};
use crate::domain::mode::{BackpackStyle, Mode};
use crate::keymap::{describe, parse_input};

/// Name of the built-in tap that opens and closes the backpack.
pub const BACKPACK_TAP: &str = "backpack";
const FIRE_TAP: &str = "fire";
const SCOPE_TAP: &str = "scope";

/// A validated configuration, ready to build or reload a session from.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub start_enabled: bool,
    pub initial_mode: Mode,
    pub tick_interval: Duration,
    pub log_level: String,
    pub backpack_style: BackpackStyle,
    pub bindings: HashMap<InputCode, Action>,
    /// Every tap, sorted by rank.
    pub taps: Vec<TapSpec>,
    pub mapper: CoordinateMapper,
    pub tracker: TrackerSettings,
    pub timing: SchedulerTiming,
}

impl SessionConfig {
    pub fn backpack_tap(&self) -> TapId {
        TapId::new(BACKPACK_TAP)
    }
}

/// Validates `config` and builds the runtime settings.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.  Numbers are checked first, then
/// points, taps, and finally key bindings.
pub fn resolve(config: &KeymapConfig) -> Result<SessionConfig, ConfigError> {
    check_numbers(config)?;
    check_points(&config.points)?;

    let taps = build_taps(config)?;
    let bindings = build_bindings(config)?;

    let mapper = CoordinateMapper::new(
        config.points.clone(),
        MapperSettings {
            joystick_radius: config.joystick.radius_px,
            aim_radius: config.aim.radius_px,
            aim_sensitivity: config.aim.sensitivity,
            aim_invert_y: config.aim.invert_y,
            max_step_px: config.aim.max_step_px,
        },
    )
    .map_err(|e| ConfigError::MissingPoint {
        name: e.0,
        needed_by: "mapper".to_string(),
    })?;

    debug!(
        bindings = bindings.len(),
        taps = taps.len(),
        "keymap configuration resolved"
    );

    Ok(SessionConfig {
        start_enabled: config.session.start_enabled,
        initial_mode: config.session.initial_mode,
        tick_interval: interval_of(config.session.tick_hz),
        log_level: config.session.log_level.clone(),
        backpack_style: config.backpack.style,
        bindings,
        taps,
        mapper,
        tracker: TrackerSettings {
            move_magnitude: config.joystick.magnitude,
            aim_idle_release: Duration::from_millis(config.aim.idle_release_ms),
        },
        timing: SchedulerTiming {
            move_refresh: Duration::from_millis(config.joystick.refresh_ms),
            max_tap_hold: Duration::from_millis(config.taps.max_hold_ms),
            aim_dead_zone_px: config.aim.dead_zone_px,
            move_min_interval: interval_of(config.joystick.min_hz),
            move_hold: Duration::from_millis(config.joystick.hold_ms),
            aim_min_interval: interval_of(config.aim.min_hz),
        },
    })
}

fn interval_of(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)))
}

// ── Checks ────────────────────────────────────────────────────────────────────

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a positive number, got {value}")))
    }
}

fn nonzero_ms(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(invalid(field, "must be at least 1 ms"))
    } else {
        Ok(())
    }
}

fn rate(field: &str, hz: u32) -> Result<(), ConfigError> {
    if (1..=1000).contains(&hz) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be 1..=1000, got {hz}")))
    }
}

fn check_numbers(config: &KeymapConfig) -> Result<(), ConfigError> {
    rate("session.tick_hz", config.session.tick_hz)?;

    positive("joystick.radius_px", config.joystick.radius_px)?;
    let magnitude = config.joystick.magnitude;
    if !(magnitude > 0.0 && magnitude <= 1.0) {
        return Err(invalid(
            "joystick.magnitude",
            format!("must be in (0, 1], got {magnitude}"),
        ));
    }
    nonzero_ms("joystick.refresh_ms", config.joystick.refresh_ms)?;
    rate("joystick.min_hz", config.joystick.min_hz)?;
    let hold = config.joystick.hold_ms;
    if !(40..=200).contains(&hold) {
        return Err(invalid("joystick.hold_ms", format!("must be 40..=200, got {hold}")));
    }

    positive("aim.radius_px", config.aim.radius_px)?;
    positive("aim.sensitivity", config.aim.sensitivity)?;
    positive("aim.max_step_px", config.aim.max_step_px)?;
    nonzero_ms("aim.idle_release_ms", config.aim.idle_release_ms)?;
    rate("aim.min_hz", config.aim.min_hz)?;
    let dead_zone = config.aim.dead_zone_px;
    if !(dead_zone.is_finite() && dead_zone >= 0.0) {
        return Err(invalid(
            "aim.dead_zone_px",
            format!("must be zero or positive, got {dead_zone}"),
        ));
    }

    nonzero_ms("fire.dwell_ms", config.fire.dwell_ms)?;
    nonzero_ms("scope.dwell_ms", config.scope.dwell_ms)?;
    nonzero_ms("backpack.dwell_ms", config.backpack.dwell_ms)?;
    for custom in &config.custom {
        nonzero_ms(&format!("custom `{}` dwell_ms", custom.name), custom.dwell_ms)?;
    }

    let longest_dwell = config
        .custom
        .iter()
        .map(|c| c.dwell_ms)
        .chain([
            config.fire.dwell_ms,
            config.scope.dwell_ms,
            config.backpack.dwell_ms,
        ])
        .max()
        .unwrap_or(0);
    if config.taps.max_hold_ms < longest_dwell {
        return Err(invalid(
            "taps.max_hold_ms",
            format!(
                "must be at least the longest dwell ({longest_dwell} ms), got {}",
                config.taps.max_hold_ms
            ),
        ));
    }
    Ok(())
}

fn check_points(points: &BTreeMap<String, Point>) -> Result<(), ConfigError> {
    for (name, p) in points {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(invalid(&format!("points.{name}"), "coordinates must be finite"));
        }
    }
    for (name, needed_by) in [(JOYSTICK_CENTER, "the joystick"), (VIEW_ANCHOR, "aim")] {
        if !points.contains_key(name) {
            return Err(ConfigError::MissingPoint {
                name: name.to_string(),
                needed_by: needed_by.to_string(),
            });
        }
    }
    Ok(())
}

// ── Builders ──────────────────────────────────────────────────────────────────

/// Tap declarations before ranking, in declaration order.
struct Declared {
    id: String,
    point: String,
    style: TapStyle,
    dwell_ms: u64,
    scope: TapScope,
}

fn declared_taps(config: &KeymapConfig) -> Vec<Declared> {
    let mut declared = vec![
        Declared {
            id: FIRE_TAP.to_string(),
            point: FIRE_TAP.to_string(),
            style: config.fire.style.unwrap_or(TapStyle::Hold),
            dwell_ms: config.fire.dwell_ms,
            scope: TapScope::Combat,
        },
        Declared {
            id: SCOPE_TAP.to_string(),
            point: SCOPE_TAP.to_string(),
            style: config.scope.style.unwrap_or(TapStyle::Toggle),
            dwell_ms: config.scope.dwell_ms,
            scope: TapScope::Combat,
        },
        Declared {
            id: BACKPACK_TAP.to_string(),
            point: BACKPACK_TAP.to_string(),
            style: TapStyle::Toggle,
            dwell_ms: config.backpack.dwell_ms,
            scope: TapScope::AnyMode,
        },
    ];
    declared.extend(config.custom.iter().map(|c| Declared {
        id: c.name.clone(),
        point: c.point.clone(),
        style: c.style,
        dwell_ms: c.dwell_ms,
        scope: TapScope::Combat,
    }));
    declared
}

fn build_taps(config: &KeymapConfig) -> Result<Vec<TapSpec>, ConfigError> {
    let declared = declared_taps(config);

    for (i, tap) in declared.iter().enumerate() {
        if declared[..i].iter().any(|earlier| earlier.id == tap.id) {
            return Err(ConfigError::DuplicateTap(tap.id.clone()));
        }
    }

    let priority = &config.taps.priority;
    for (i, name) in priority.iter().enumerate() {
        if !declared.iter().any(|tap| &tap.id == name) {
            return Err(ConfigError::UnknownTap(name.clone()));
        }
        if priority[..i].contains(name) {
            return Err(invalid(
                "taps.priority",
                format!("`{name}` is listed more than once"),
            ));
        }
    }

    let mut specs = Vec::with_capacity(declared.len());
    for (index, tap) in declared.into_iter().enumerate() {
        let point = config
            .points
            .get(&tap.point)
            .copied()
            .ok_or_else(|| ConfigError::MissingPoint {
                name: tap.point.clone(),
                needed_by: format!("tap `{}`", tap.id),
            })?;
        let rank = priority
            .iter()
            .position(|name| name == &tap.id)
            .unwrap_or(priority.len() + index);
        specs.push(TapSpec {
            id: TapId::new(tap.id),
            point,
            style: tap.style,
            dwell: Duration::from_millis(tap.dwell_ms),
            rank,
            scope: tap.scope,
        });
    }
    specs.sort_by_key(|spec| spec.rank);
    Ok(specs)
}

fn build_bindings(config: &KeymapConfig) -> Result<HashMap<InputCode, Action>, ConfigError> {
    let h = &config.hotkeys;
    let mut wanted: Vec<(&str, Action)> = vec![
        (h.toggle_enabled.as_str(), Action::ToggleEnabled),
        (h.emergency_stop.as_str(), Action::EmergencyStop),
        (h.view_lock.as_str(), Action::ViewLock),
        (h.backpack.as_str(), Action::Backpack),
        (h.move_up.as_str(), Action::Move(Direction::Up)),
        (h.move_down.as_str(), Action::Move(Direction::Down)),
        (h.move_left.as_str(), Action::Move(Direction::Left)),
        (h.move_right.as_str(), Action::Move(Direction::Right)),
        (h.fire.as_str(), Action::Tap(TapId::new(FIRE_TAP))),
        (h.scope.as_str(), Action::Tap(TapId::new(SCOPE_TAP))),
    ];
    wanted.extend(
        config
            .custom
            .iter()
            .map(|c| (c.key.as_str(), Action::Tap(TapId::new(c.name.clone())))),
    );

    let mut bindings: HashMap<InputCode, Action> = HashMap::with_capacity(wanted.len());
    for (name, action) in wanted {
        let code = parse_input(name).map_err(|_| ConfigError::UnknownKey {
            action: action.to_string(),
            name: name.to_string(),
        })?;
        if let Some(first) = bindings.get(&code) {
            return Err(ConfigError::DuplicateBinding {
                key: describe(code),
                first: first.to_string(),
                second: action.to_string(),
            });
        }
        bindings.insert(code, action);
    }
    Ok(bindings)
}
