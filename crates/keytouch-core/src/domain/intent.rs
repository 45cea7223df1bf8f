//! Intents: what the player currently wants the touch channel for.
//!
//! Intents are transient.  They are derived from held keys and mouse motion
//! by the tracker, consumed by the scheduler, and never persisted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Vector};
use super::input::Timestamp;

/// Name of a tap target (`fire`, `scope`, `backpack` or a custom entry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TapId(String);

impl TapId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TapId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for TapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of the [`ActiveIntentSet`]; also identifies the touch owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Move,
    Aim,
    Tap(TapId),
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentKind::Move => f.write_str("move"),
            IntentKind::Aim => f.write_str("aim"),
            IntentKind::Tap(id) => write!(f, "tap:{id}"),
        }
    }
}

/// How a tap's release is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapStyle {
    /// Held for as long as the key is held, and at least the dwell.
    Hold,
    /// Held for exactly the dwell regardless of the key.
    Toggle,
}

/// Which modes a tap is eligible in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapScope {
    /// Only while mapping is in Combat mode.
    Combat,
    /// In any mode while mapping is enabled (backpack open/close).
    AnyMode,
}

/// Resolved description of one tap target.
#[derive(Debug, Clone, PartialEq)]
pub struct TapSpec {
    pub id: TapId,
    pub point: Point,
    pub style: TapStyle,
    /// Minimum press duration before a release is honoured.
    pub dwell: Duration,
    /// Position in the tap priority order; lower is served first.
    pub rank: usize,
    pub scope: TapScope,
}

/// The combined joystick wish from all held movement keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveIntent {
    /// Unit direction.
    pub direction: Vector,
    /// Fraction of the joystick radius, in `(0, 1]`.
    pub magnitude: f64,
}

impl MoveIntent {
    /// Displacement as a fraction of the joystick radius.
    pub fn vector(&self) -> Vector {
        self.direction.scaled(self.magnitude)
    }
}

/// Accumulated mouse motion waiting to be expressed as a view drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimIntent {
    /// Motion not yet turned into drag primitives.
    pub pending: Vector,
    pub started_at: Timestamp,
    pub last_motion: Timestamp,
}

/// A requested tap.
#[derive(Debug, Clone, PartialEq)]
pub struct TapIntent {
    pub spec: TapSpec,
    pub requested_at: Timestamp,
    /// Set once the bound key has gone up (always set for synthetic taps).
    pub key_released: bool,
}

impl TapIntent {
    /// `true` once the tap has been held long enough to be released.
    pub fn is_complete(&self, held: Duration) -> bool {
        held >= self.spec.dwell && (self.spec.style == TapStyle::Toggle || self.key_released)
    }
}

/// The intents currently wanting the touch channel, keyed by kind.
///
/// Holds at most one Move, at most one Aim and at most one Tap per tap id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveIntentSet {
    movement: Option<MoveIntent>,
    aim: Option<AimIntent>,
    taps: Vec<TapIntent>,
}

impl ActiveIntentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movement(&self) -> Option<&MoveIntent> {
        self.movement.as_ref()
    }

    pub fn set_movement(&mut self, movement: Option<MoveIntent>) {
        self.movement = movement;
    }

    pub fn aim(&self) -> Option<&AimIntent> {
        self.aim.as_ref()
    }

    pub fn set_aim(&mut self, aim: Option<AimIntent>) {
        self.aim = aim;
    }

    /// Adds motion to the current Aim intent, starting one if none exists.
    pub fn push_aim(&mut self, delta: Vector, at: Timestamp) {
        match self.aim.as_mut() {
            Some(aim) => {
                aim.pending += delta;
                aim.last_motion = at;
            }
            None => {
                self.aim = Some(AimIntent {
                    pending: delta,
                    started_at: at,
                    last_motion: at,
                })
            }
        }
    }

    /// Drains the motion accumulated since the last drag.
    pub fn take_aim_delta(&mut self) -> Vector {
        match self.aim.as_mut() {
            Some(aim) => std::mem::take(&mut aim.pending),
            None => Vector::ZERO,
        }
    }

    pub fn taps(&self) -> &[TapIntent] {
        &self.taps
    }

    pub fn tap(&self, id: &TapId) -> Option<&TapIntent> {
        self.taps.iter().find(|t| &t.spec.id == id)
    }

    pub fn tap_mut(&mut self, id: &TapId) -> Option<&mut TapIntent> {
        self.taps.iter_mut().find(|t| &t.spec.id == id)
    }

    /// Inserts a tap, replacing any pending tap with the same id.
    pub fn upsert_tap(&mut self, tap: TapIntent) {
        match self.tap_mut(&tap.spec.id) {
            Some(existing) => *existing = tap,
            None => self.taps.push(tap),
        }
    }

    /// Removes and returns the tap with `id`.
    pub fn retire_tap(&mut self, id: &TapId) -> Option<TapIntent> {
        let index = self.taps.iter().position(|t| &t.spec.id == id)?;
        Some(self.taps.remove(index))
    }

    pub fn retain_taps(&mut self, keep: impl FnMut(&TapIntent) -> bool) {
        self.taps.retain(keep);
    }

    /// Returns the pending tap with the best (lowest) rank.
    ///
    /// Ranks are unique per tap id; among equal ranks the earliest request
    /// wins.
    pub fn highest_tap(&self) -> Option<&TapIntent> {
        self.taps.iter().fold(None, |best: Option<&TapIntent>, t| match best {
            Some(b) if b.spec.rank <= t.spec.rank => Some(b),
            _ => Some(t),
        })
    }

    pub fn contains(&self, kind: &IntentKind) -> bool {
        match kind {
            IntentKind::Move => self.movement.is_some(),
            IntentKind::Aim => self.aim.is_some(),
            IntentKind::Tap(id) => self.tap(id).is_some(),
        }
    }

    /// Lists the active intent kinds, taps in priority order.
    pub fn kinds(&self) -> Vec<IntentKind> {
        let mut taps: Vec<&TapIntent> = self.taps.iter().collect();
        taps.sort_by_key(|t| t.spec.rank);
        let mut kinds: Vec<IntentKind> = taps
            .into_iter()
            .map(|t| IntentKind::Tap(t.spec.id.clone()))
            .collect();
        if self.aim.is_some() {
            kinds.push(IntentKind::Aim);
        }
        if self.movement.is_some() {
            kinds.push(IntentKind::Move);
        }
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.movement.is_none() && self.aim.is_none() && self.taps.is_empty()
    }

    pub fn clear(&mut self) {
        self.movement = None;
        self.aim = None;
        self.taps.clear();
    }
}
