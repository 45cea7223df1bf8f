//! IntentTracker: raw key/mouse state to active intents.
//!
//! The tracker owns the [`ActiveIntentSet`].  It knows which physical inputs
//! are held, combines movement keys into one joystick vector, accumulates
//! mouse motion for aiming and records tap requests.  Hotkeys that steer the
//! session (view lock, backpack, enable, emergency stop) are reported back as
//! [`ControlSignal`]s instead of becoming intents.
//!
//! The tracker performs no injection.  It also never decides eligibility on
//! its own: the session hands it the current [`Gate`] from the mode machine
//! and the tracker drops or refuses whatever the gate does not admit.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, trace};

use crate::domain::binding::Action;
use crate::domain::geometry::Vector;
use crate::domain::input::{InputCode, RawInputEvent, Timestamp};
use crate::domain::intent::{ActiveIntentSet, MoveIntent, TapId, TapIntent, TapSpec};
use crate::domain::mode::Gate;

/// Tunables for intent derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    /// Fraction of the joystick radius used for every Move intent.
    pub move_magnitude: f64,
    /// Aim ends after this long without mouse motion.
    pub aim_idle_release: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            move_magnitude: 1.0,
            aim_idle_release: Duration::from_millis(120),
        }
    }
}

/// Session-level hotkey edges reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    ViewLock,
    BackpackDown,
    BackpackUp,
    ToggleEnabled,
    EmergencyStop,
}

/// Result of feeding one event to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerUpdate {
    /// The active intent set changed.
    pub changed: bool,
    pub control: Option<ControlSignal>,
}

impl TrackerUpdate {
    fn changed(changed: bool) -> Self {
        Self {
            changed,
            control: None,
        }
    }

    fn control(signal: ControlSignal) -> Self {
        Self {
            changed: false,
            control: Some(signal),
        }
    }
}

/// Maintains the active intents from raw input.
#[derive(Debug, Clone)]
pub struct IntentTracker {
    bindings: HashMap<InputCode, Action>,
    taps: HashMap<TapId, TapSpec>,
    settings: TrackerSettings,
    held: HashSet<InputCode>,
    gate: Gate,
    intents: ActiveIntentSet,
}

impl IntentTracker {
    /// Creates a tracker with a closed gate.
    pub fn new(
        bindings: HashMap<InputCode, Action>,
        taps: impl IntoIterator<Item = TapSpec>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            bindings,
            taps: index_taps(taps),
            settings,
            held: HashSet::new(),
            gate: Gate::CLOSED,
            intents: ActiveIntentSet::new(),
        }
    }

    pub fn intents(&self) -> &ActiveIntentSet {
        &self.intents
    }

    /// Mutable access for the scheduler, which retires served taps and
    /// drains aim motion.
    pub fn intents_mut(&mut self) -> &mut ActiveIntentSet {
        &mut self.intents
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    pub fn is_held(&self, code: InputCode) -> bool {
        self.held.contains(&code)
    }

    /// Feeds one raw event.
    pub fn handle(&mut self, event: &RawInputEvent) -> TrackerUpdate {
        match *event {
            RawInputEvent::MouseMove { dx, dy, at } => self.handle_motion(Vector::new(dx, dy), at),
            _ => match event.button_edge() {
                Some((code, true)) => self.handle_down(code, event.at()),
                Some((code, false)) => self.handle_up(code),
                None => TrackerUpdate::default(),
            },
        }
    }

    /// Applies a new gate, dropping intents it no longer admits.
    ///
    /// Movement is re-derived from the held keys, so keys held across a
    /// FreeMouse → Combat switch take effect immediately.  Returns `true` if
    /// the intent set changed.
    pub fn set_gate(&mut self, gate: Gate) -> bool {
        self.gate = gate;
        let before = self.intents.clone();
        self.recompute_movement();
        if !gate.aim {
            self.intents.set_aim(None);
        }
        self.intents.retain_taps(|t| gate.admits_tap(t.spec.scope));
        before != self.intents
    }

    /// Ends Aim after the configured idle time without motion.
    pub fn expire(&mut self, now: Timestamp) -> bool {
        let idle = self.settings.aim_idle_release;
        match self.intents.aim() {
            Some(aim) if now.saturating_sub(aim.last_motion) >= idle => {
                trace!("aim idle for {:?}, ending", now.saturating_sub(aim.last_motion));
                self.intents.set_aim(None);
                true
            }
            _ => false,
        }
    }

    /// Requests a tap not tied to a held key (the backpack open/close tap).
    ///
    /// The tap is release-eligible immediately and is held for its dwell.
    pub fn request_tap(&mut self, id: &TapId, at: Timestamp) -> bool {
        let Some(spec) = self.taps.get(id) else {
            debug!("tap {id} requested but not configured");
            return false;
        };
        if !self.gate.admits_tap(spec.scope) {
            return false;
        }
        self.intents.upsert_tap(TapIntent {
            spec: spec.clone(),
            requested_at: at,
            key_released: true,
        });
        true
    }

    /// Forgets every intent and held input.
    pub fn clear(&mut self) {
        self.intents.clear();
        self.held.clear();
    }

    /// Swaps in a reloaded configuration.
    pub fn reconfigure(
        &mut self,
        bindings: HashMap<InputCode, Action>,
        taps: impl IntoIterator<Item = TapSpec>,
        settings: TrackerSettings,
    ) {
        self.bindings = bindings;
        self.taps = index_taps(taps);
        self.settings = settings;
        self.recompute_movement();
    }

    // ── Private event handlers ────────────────────────────────────────────────

    fn handle_down(&mut self, code: InputCode, at: Timestamp) -> TrackerUpdate {
        // Auto-repeat delivers further key-downs for a held key.
        if !self.held.insert(code) {
            return TrackerUpdate::default();
        }
        let Some(action) = self.bindings.get(&code).cloned() else {
            return TrackerUpdate::default();
        };
        match action {
            Action::Move(_) => TrackerUpdate::changed(self.recompute_movement()),
            Action::Tap(id) => TrackerUpdate::changed(self.press_tap(&id, at)),
            Action::ViewLock => TrackerUpdate::control(ControlSignal::ViewLock),
            Action::Backpack => TrackerUpdate::control(ControlSignal::BackpackDown),
            Action::ToggleEnabled => TrackerUpdate::control(ControlSignal::ToggleEnabled),
            Action::EmergencyStop => TrackerUpdate::control(ControlSignal::EmergencyStop),
        }
    }

    fn handle_up(&mut self, code: InputCode) -> TrackerUpdate {
        self.held.remove(&code);
        match self.bindings.get(&code).cloned() {
            Some(Action::Move(_)) => TrackerUpdate::changed(self.recompute_movement()),
            Some(Action::Tap(id)) => match self.intents.tap_mut(&id) {
                Some(tap) if !tap.key_released => {
                    tap.key_released = true;
                    TrackerUpdate::changed(true)
                }
                _ => TrackerUpdate::default(),
            },
            Some(Action::Backpack) => TrackerUpdate::control(ControlSignal::BackpackUp),
            _ => TrackerUpdate::default(),
        }
    }

    fn handle_motion(&mut self, delta: Vector, at: Timestamp) -> TrackerUpdate {
        if !self.gate.aim || delta.is_zero() {
            return TrackerUpdate::default();
        }
        self.intents.push_aim(delta, at);
        TrackerUpdate::changed(true)
    }

    fn press_tap(&mut self, id: &TapId, at: Timestamp) -> bool {
        let Some(spec) = self.taps.get(id) else {
            return false;
        };
        if !self.gate.admits_tap(spec.scope) {
            return false;
        }
        match self.intents.tap_mut(id) {
            // Pressing again before the tap was served renews the sustain.
            Some(pending) => pending.key_released = false,
            None => self.intents.upsert_tap(TapIntent {
                spec: spec.clone(),
                requested_at: at,
                key_released: false,
            }),
        }
        true
    }

    /// Rebuilds the Move intent from held movement keys.  Returns `true` if
    /// it changed.
    fn recompute_movement(&mut self) -> bool {
        let combined = if self.gate.movement {
            self.held
                .iter()
                .filter_map(|code| match self.bindings.get(code) {
                    Some(Action::Move(dir)) => Some(dir.unit()),
                    _ => None,
                })
                .fold(Vector::ZERO, |acc, v| acc + v)
        } else {
            Vector::ZERO
        };
        let next = (!combined.is_zero()).then(|| MoveIntent {
            direction: combined.normalized(),
            magnitude: self.settings.move_magnitude,
        });
        let changed = self.intents.movement() != next.as_ref();
        self.intents.set_movement(next);
        changed
    }
}

fn index_taps(taps: impl IntoIterator<Item = TapSpec>) -> HashMap<TapId, TapSpec> {
    taps.into_iter().map(|spec| (spec.id.clone(), spec)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::binding::Direction;
    use crate::domain::geometry::Point;
    use crate::domain::input::{KeyCode, MouseButton};
    use crate::domain::intent::{TapScope, TapStyle};

    const W: KeyCode = KeyCode(13);
    const A: KeyCode = KeyCode(0);
    const S: KeyCode = KeyCode(1);
    const D: KeyCode = KeyCode(2);
    const CAPS: KeyCode = KeyCode(57);
    const TAB: KeyCode = KeyCode(48);

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn combat_gate() -> Gate {
        Gate {
            movement: true,
            aim: true,
            combat_taps: true,
            mode_taps: true,
        }
    }

    fn tap_spec(id: &str, rank: usize, style: TapStyle, scope: TapScope) -> TapSpec {
        TapSpec {
            id: TapId::from(id),
            point: Point::new(950.0, 260.0),
            style,
            dwell: ms(30),
            rank,
            scope,
        }
    }

    fn tracker() -> IntentTracker {
        let mut bindings = HashMap::new();
        bindings.insert(InputCode::Key(W), Action::Move(Direction::Up));
        bindings.insert(InputCode::Key(A), Action::Move(Direction::Left));
        bindings.insert(InputCode::Key(S), Action::Move(Direction::Down));
        bindings.insert(InputCode::Key(D), Action::Move(Direction::Right));
        bindings.insert(InputCode::Key(CAPS), Action::ViewLock);
        bindings.insert(InputCode::Key(TAB), Action::Backpack);
        bindings.insert(
            InputCode::Mouse(MouseButton::Left),
            Action::Tap(TapId::from("fire")),
        );
        let taps = vec![
            tap_spec("fire", 0, TapStyle::Hold, TapScope::Combat),
            tap_spec("backpack", 2, TapStyle::Toggle, TapScope::AnyMode),
        ];
        let mut t = IntentTracker::new(bindings, taps, TrackerSettings::default());
        t.set_gate(combat_gate());
        t
    }

    fn down(code: KeyCode, at: u64) -> RawInputEvent {
        RawInputEvent::KeyDown { code, at: ms(at) }
    }

    fn up(code: KeyCode, at: u64) -> RawInputEvent {
        RawInputEvent::KeyUp { code, at: ms(at) }
    }

    // ── Movement ──────────────────────────────────────────────────────────────

    #[test]
    fn test_single_key_moves_north() {
        let mut t = tracker();
        let update = t.handle(&down(W, 0));
        assert!(update.changed);
        let m = t.intents().movement().expect("move active");
        assert_eq!(m.direction, Vector::new(0.0, -1.0));
        assert_eq!(m.magnitude, 1.0);
    }

    #[test]
    fn test_two_keys_combine_into_normalized_diagonal() {
        // Arrange
        let mut t = tracker();

        // Act
        t.handle(&down(W, 0));
        t.handle(&down(D, 1));

        // Assert
        let dir = t.intents().movement().expect("move active").direction;
        assert!((dir.length() - 1.0).abs() < 1e-9);
        assert!(dir.dx > 0.0 && dir.dy < 0.0);
        assert!((dir.dx + dir.dy).abs() < 1e-9);
    }

    #[test]
    fn test_releasing_one_key_recomputes_from_remaining() {
        let mut t = tracker();
        t.handle(&down(W, 0));
        t.handle(&down(D, 1));
        t.handle(&up(W, 2));
        assert_eq!(
            t.intents().movement().map(|m| m.direction),
            Some(Vector::new(1.0, 0.0))
        );
    }

    #[test]
    fn test_releasing_all_keys_ends_move() {
        let mut t = tracker();
        t.handle(&down(W, 0));
        let update = t.handle(&up(W, 5));
        assert!(update.changed);
        assert!(t.intents().movement().is_none());
    }

    #[test]
    fn test_opposite_keys_cancel_out() {
        let mut t = tracker();
        t.handle(&down(A, 0));
        t.handle(&down(D, 1));
        assert!(t.intents().movement().is_none());
    }

    #[test]
    fn test_auto_repeat_key_down_is_ignored() {
        let mut t = tracker();
        t.handle(&down(W, 0));
        let repeat = t.handle(&down(W, 30));
        assert_eq!(repeat, TrackerUpdate::default());
    }

    // ── Aim ───────────────────────────────────────────────────────────────────

    #[test]
    fn test_mouse_motion_accumulates_aim() {
        let mut t = tracker();
        t.handle(&RawInputEvent::MouseMove { dx: 3.0, dy: 0.0, at: ms(1) });
        t.handle(&RawInputEvent::MouseMove { dx: 2.0, dy: -1.0, at: ms(2) });
        let aim = t.intents().aim().expect("aim active");
        assert_eq!(aim.pending, Vector::new(5.0, -1.0));
        assert_eq!(aim.started_at, ms(1));
    }

    #[test]
    fn test_aim_expires_after_idle() {
        let mut t = tracker();
        t.handle(&RawInputEvent::MouseMove { dx: 3.0, dy: 0.0, at: ms(10) });
        assert!(!t.expire(ms(100)));
        assert!(t.expire(ms(130)));
        assert!(t.intents().aim().is_none());
    }

    #[test]
    fn test_motion_ignored_when_gate_closes_aim() {
        let mut t = tracker();
        t.set_gate(Gate {
            aim: false,
            ..combat_gate()
        });
        let update = t.handle(&RawInputEvent::MouseMove { dx: 3.0, dy: 0.0, at: ms(1) });
        assert!(!update.changed);
        assert!(t.intents().aim().is_none());
    }

    // ── Taps ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_tap_key_down_then_up_marks_release() {
        // Arrange
        let mut t = tracker();
        let fire = TapId::from("fire");

        // Act
        t.handle(&RawInputEvent::MouseDown { button: MouseButton::Left, at: ms(5) });
        let pending = t.intents().tap(&fire).cloned().expect("tap pending");
        t.handle(&RawInputEvent::MouseUp { button: MouseButton::Left, at: ms(9) });

        // Assert
        assert!(!pending.key_released);
        assert_eq!(pending.requested_at, ms(5));
        assert!(t.intents().tap(&fire).expect("still pending").key_released);
    }

    #[test]
    fn test_tap_repress_renews_sustain() {
        let mut t = tracker();
        let fire = TapId::from("fire");
        t.handle(&RawInputEvent::MouseDown { button: MouseButton::Left, at: ms(0) });
        t.handle(&RawInputEvent::MouseUp { button: MouseButton::Left, at: ms(5) });
        t.handle(&RawInputEvent::MouseDown { button: MouseButton::Left, at: ms(10) });
        assert!(!t.intents().tap(&fire).expect("pending").key_released);
        assert_eq!(t.intents().taps().len(), 1);
    }

    #[test]
    fn test_combat_tap_refused_in_free_mouse() {
        let mut t = tracker();
        t.set_gate(Gate {
            mode_taps: true,
            ..Gate::CLOSED
        });
        t.handle(&RawInputEvent::MouseDown { button: MouseButton::Left, at: ms(0) });
        assert!(t.intents().is_empty());
    }

    #[test]
    fn test_request_tap_is_release_eligible() {
        let mut t = tracker();
        let backpack = TapId::from("backpack");
        assert!(t.request_tap(&backpack, ms(3)));
        assert!(t.intents().tap(&backpack).expect("pending").key_released);
    }

    #[test]
    fn test_request_tap_unknown_id_is_refused() {
        let mut t = tracker();
        assert!(!t.request_tap(&TapId::from("grenade"), ms(0)));
    }

    // ── Control signals and gating ────────────────────────────────────────────

    #[test]
    fn test_hotkeys_report_control_signals() {
        let mut t = tracker();
        assert_eq!(t.handle(&down(CAPS, 0)).control, Some(ControlSignal::ViewLock));
        assert_eq!(t.handle(&down(TAB, 1)).control, Some(ControlSignal::BackpackDown));
        assert_eq!(t.handle(&up(TAB, 2)).control, Some(ControlSignal::BackpackUp));
    }

    #[test]
    fn test_hotkeys_still_reported_with_closed_gate() {
        let mut t = tracker();
        t.set_gate(Gate::CLOSED);
        assert_eq!(t.handle(&down(CAPS, 0)).control, Some(ControlSignal::ViewLock));
    }

    #[test]
    fn test_closing_gate_drops_move_and_aim_and_reopening_restores_move() {
        // Arrange
        let mut t = tracker();
        t.handle(&down(W, 0));
        t.handle(&RawInputEvent::MouseMove { dx: 5.0, dy: 0.0, at: ms(1) });

        // Act
        let closed = t.set_gate(Gate::CLOSED);

        // Assert
        assert!(closed);
        assert!(t.intents().is_empty());
        assert!(t.is_held(InputCode::Key(W)));

        // Act – W is still physically held
        t.set_gate(combat_gate());

        // Assert
        assert!(t.intents().movement().is_some());
        assert!(t.intents().aim().is_none());
    }

    #[test]
    fn test_clear_forgets_held_keys() {
        let mut t = tracker();
        t.handle(&down(W, 0));
        t.clear();
        assert!(t.intents().is_empty());
        assert!(!t.is_held(InputCode::Key(W)));
    }
}
