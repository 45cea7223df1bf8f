//! TouchScheduler: time-slices the single touch channel.
//!
//! Every call to [`TouchScheduler::decide`] looks at the active intents and
//! the current [`TouchState`] and emits whatever primitives bring the channel
//! in line with the highest-priority wish.
//!
//! # Priority
//!
//! ```text
//! emergency latch  >  Tap (by configured rank)  >  Aim  >  Move
//! ```
//!
//! # Decision procedure
//!
//! 1. Latch tripped → release if pressed, nothing else.
//! 2. Settle the current owner: a tap that finished its dwell (and, for hold
//!    taps, saw its key go up) or hit the maximum hold is released and
//!    retired; an Aim or Move whose intent ended is released.
//! 3. The best pending tap takes the channel unless it already has it.
//!    Whoever held it is released first.
//! 4. Otherwise Aim, if it already owns the channel or has enough motion to
//!    show: press at the view anchor on (re)start, then drag.  Hitting the
//!    aim radius lifts the finger; the next motion re-anchors.
//! 5. Otherwise Move: press at the joystick target, drag on direction
//!    changes, re-affirm the held position every refresh period.
//! 6. Otherwise release.
//!
//! # Sharing between Aim and Move
//!
//! Aim outranks Move, but not forever.  Each of the two records when it
//! started waiting for a channel the other holds.  Once Move has waited
//! `move_min_interval` it is overdue: Aim is released and Move keeps the
//! channel for `move_hold`.  After that Aim takes it back, re-anchoring at
//! the view anchor with whatever motion piled up.  When both are overdue the
//! longer wait wins and Aim keeps ties.
//!
//! Lower intents are always resumed from their *current* state because
//! targets are computed fresh on every decision.
//!
//! # Failures
//!
//! A primitive the injector refuses ends the decision.  The touch state is
//! forced to Idle and the claim of the owner whose primitive failed is
//! dropped: its tap is retired, its aim motion discarded, or its current
//! move vector suppressed until the keys change.  Nothing is retried, since
//! a repeated press could register twice on the far side.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::emergency::EmergencyLatch;
use crate::domain::geometry::{Point, Vector};
use crate::domain::input::Timestamp;
use crate::domain::intent::{ActiveIntentSet, IntentKind, MoveIntent, TapId, TapIntent};
use crate::domain::mapper::CoordinateMapper;
use crate::domain::touch::{TouchPrimitive, TouchState};
use crate::port::{InjectionError, TouchInjector};

/// Timing rules for arbitration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerTiming {
    /// Longest gap between primitives while Move holds the channel.
    pub move_refresh: Duration,
    /// Upper bound on how long any tap keeps the channel.
    pub max_tap_hold: Duration,
    /// Motion needed before Aim claims a channel it does not own.
    pub aim_dead_zone_px: f64,
    /// Longest Move waits behind Aim.
    pub move_min_interval: Duration,
    /// How long Move keeps a channel it won back from Aim.
    pub move_hold: Duration,
    /// Aim waiting longer than this is overdue too.
    pub aim_min_interval: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            move_refresh: Duration::from_millis(50),
            max_tap_hold: Duration::from_secs(10),
            aim_dead_zone_px: 3.0,
            move_min_interval: Duration::from_millis(50),
            move_hold: Duration::from_millis(60),
            aim_min_interval: Duration::from_millis(20),
        }
    }
}

/// A primitive that was delivered, and on whose behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub primitive: TouchPrimitive,
    pub owner: IntentKind,
}

/// A primitive the injector refused.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionFailure {
    pub primitive: TouchPrimitive,
    pub owner: IntentKind,
    pub error: InjectionError,
}

/// Everything one decision did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decision {
    /// Delivered primitives in order.
    pub emitted: Vec<Emission>,
    /// Taps released after completing their dwell.
    pub completed_taps: Vec<TapId>,
    pub failure: Option<InjectionFailure>,
}

impl Decision {
    pub fn is_noop(&self) -> bool {
        self.emitted.is_empty() && self.completed_taps.is_empty() && self.failure.is_none()
    }
}

/// Marker for "the injector refused; stop this decision".
struct Refused;

type Step = Result<(), Refused>;

/// Owns the [`TouchState`] and decides who holds the touch channel.
#[derive(Debug)]
pub struct TouchScheduler {
    state: TouchState,
    pressed_at: Timestamp,
    last_emit_at: Timestamp,
    timing: SchedulerTiming,
    /// Move vector whose press failed; ignored until the keys change.
    suppressed_move: Option<Vector>,
    /// When Move and Aim started waiting for the channel, if they are.
    move_waiting_since: Option<Timestamp>,
    aim_waiting_since: Option<Timestamp>,
    /// Move keeps a channel it took back from Aim until then.
    move_hold_until: Timestamp,
    latch: EmergencyLatch,
}

impl TouchScheduler {
    pub fn new(timing: SchedulerTiming, latch: EmergencyLatch) -> Self {
        Self {
            state: TouchState::Idle,
            pressed_at: Duration::ZERO,
            last_emit_at: Duration::ZERO,
            timing,
            suppressed_move: None,
            move_waiting_since: None,
            aim_waiting_since: None,
            move_hold_until: Duration::ZERO,
            latch,
        }
    }

    pub fn state(&self) -> &TouchState {
        &self.state
    }

    pub fn timing(&self) -> &SchedulerTiming {
        &self.timing
    }

    pub fn latch(&self) -> &EmergencyLatch {
        &self.latch
    }

    pub fn reconfigure(&mut self, timing: SchedulerTiming) {
        self.timing = timing;
    }

    /// Runs one arbitration step.
    pub fn decide(
        &mut self,
        intents: &mut ActiveIntentSet,
        mapper: &CoordinateMapper,
        now: Timestamp,
        injector: &dyn TouchInjector,
    ) -> Decision {
        let mut decision = Decision::default();
        if self.latch.is_tripped() {
            let _ = self.release_current(now, injector, &mut decision);
            return decision;
        }
        self.refresh_suppression(intents);

        if self.step(intents, mapper, now, injector, &mut decision).is_err() {
            self.drop_claim(intents, &decision);
        }
        self.track_waits(intents, now);
        decision
    }

    /// Releases the channel if pressed.  Used on shutdown and emergency stop.
    pub fn halt(&mut self, now: Timestamp, injector: &dyn TouchInjector) -> Decision {
        let mut decision = Decision::default();
        let _ = self.release_current(now, injector, &mut decision);
        decision
    }

    // ── Decision steps ────────────────────────────────────────────────────────

    fn step(
        &mut self,
        intents: &mut ActiveIntentSet,
        mapper: &CoordinateMapper,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        self.settle_owner(intents, now, injector, decision)?;
        self.arbitrate(intents, mapper, now, injector, decision)
    }

    fn settle_owner(
        &mut self,
        intents: &mut ActiveIntentSet,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        let Some(owner) = self.state.owner().cloned() else {
            return Ok(());
        };
        match owner {
            IntentKind::Tap(id) => {
                let held = now.saturating_sub(self.pressed_at);
                let finished = match intents.tap(&id) {
                    None => true,
                    Some(tap) if tap.is_complete(held) => {
                        decision.completed_taps.push(id.clone());
                        true
                    }
                    Some(_) if held >= self.timing.max_tap_hold => {
                        warn!("tap {id} held for {held:?}, forcing release");
                        true
                    }
                    Some(_) => false,
                };
                if finished {
                    intents.retire_tap(&id);
                    self.release_current(now, injector, decision)?;
                }
            }
            IntentKind::Aim if intents.aim().is_none() => {
                self.release_current(now, injector, decision)?;
            }
            IntentKind::Move if intents.movement().is_none() => {
                self.release_current(now, injector, decision)?;
            }
            IntentKind::Aim | IntentKind::Move => {}
        }
        Ok(())
    }

    fn arbitrate(
        &mut self,
        intents: &mut ActiveIntentSet,
        mapper: &CoordinateMapper,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        if let Some(tap) = intents.highest_tap().cloned() {
            return self.serve_tap(&tap, now, injector, decision);
        }
        let movement = self.wanted_movement(intents);
        let aim = self.aim_contends(intents);
        match movement {
            Some(movement) if !aim || self.move_turn(now) => {
                let target = mapper.joystick_target(&movement);
                if aim && self.state.owner() != Some(&IntentKind::Move) {
                    debug!("move overdue, holding the channel for {:?}", self.timing.move_hold);
                    self.move_hold_until = now + self.timing.move_hold;
                }
                self.serve_move(target, mapper, now, injector, decision)
            }
            _ if aim => self.serve_aim(intents, mapper, now, injector, decision),
            _ => self.release_current(now, injector, decision),
        }
    }

    fn wanted_movement(&self, intents: &ActiveIntentSet) -> Option<MoveIntent> {
        intents
            .movement()
            .copied()
            .filter(|m| self.suppressed_move != Some(m.vector()))
    }

    /// Whether Move gets the channel while Aim also wants it.
    fn move_turn(&self, now: Timestamp) -> bool {
        if self.state.owner() == Some(&IntentKind::Move) && now < self.move_hold_until {
            return true;
        }
        let waited =
            |since: Option<Timestamp>| since.map_or(Duration::ZERO, |t| now.saturating_sub(t));
        let move_wait = waited(self.move_waiting_since);
        let aim_wait = waited(self.aim_waiting_since);
        let move_due = move_wait >= self.timing.move_min_interval;
        let aim_due = aim_wait >= self.timing.aim_min_interval;
        move_due && (!aim_due || move_wait > aim_wait)
    }

    /// Starts or clears the wait clocks after a decision.
    fn track_waits(&mut self, intents: &ActiveIntentSet, now: Timestamp) {
        let owner = self.state.owner().cloned();
        let move_waits =
            self.wanted_movement(intents).is_some() && owner != Some(IntentKind::Move);
        let aim_waits = self.aim_contends(intents) && owner != Some(IntentKind::Aim);
        self.move_waiting_since = move_waits.then(|| self.move_waiting_since.unwrap_or(now));
        self.aim_waiting_since = aim_waits.then(|| self.aim_waiting_since.unwrap_or(now));
    }

    fn serve_tap(
        &mut self,
        tap: &TapIntent,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        let kind = IntentKind::Tap(tap.spec.id.clone());
        match self.state.owner() {
            Some(owner) if *owner == kind => return Ok(()),
            // Settling already released a finished tap, so the preempted one
            // stays pending and is pressed again once the channel frees up.
            Some(IntentKind::Tap(current)) => debug!("tap {} preempts tap {current}", tap.spec.id),
            _ => {}
        }
        self.release_current(now, injector, decision)?;
        self.emit(TouchPrimitive::Press(tap.spec.point), kind, now, injector, decision)
    }

    fn aim_contends(&self, intents: &ActiveIntentSet) -> bool {
        let Some(aim) = intents.aim() else {
            return false;
        };
        if self.state.owner() == Some(&IntentKind::Aim) {
            return true;
        }
        !aim.pending.is_zero() && aim.pending.length() >= self.timing.aim_dead_zone_px
    }

    fn serve_aim(
        &mut self,
        intents: &mut ActiveIntentSet,
        mapper: &CoordinateMapper,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        let delta = intents.take_aim_delta();
        let from = match self.position_owned_by(&IntentKind::Aim) {
            Some(at) => at,
            None => {
                self.release_current(now, injector, decision)?;
                let anchor = mapper.view_anchor();
                self.emit(TouchPrimitive::Press(anchor), IntentKind::Aim, now, injector, decision)?;
                anchor
            }
        };
        if delta.is_zero() {
            return Ok(());
        }
        let step = mapper.aim_step(from, delta);
        self.drag(from, step.target, IntentKind::Aim, mapper, now, injector, decision)?;
        if step.reached_edge {
            trace!("aim reached radius at {}, lifting", step.target);
            self.release_current(now, injector, decision)?;
        }
        Ok(())
    }

    fn serve_move(
        &mut self,
        target: Point,
        mapper: &CoordinateMapper,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        match self.position_owned_by(&IntentKind::Move) {
            Some(at) if at != target => {
                self.drag(at, target, IntentKind::Move, mapper, now, injector, decision)
            }
            Some(_) if now.saturating_sub(self.last_emit_at) >= self.timing.move_refresh => {
                self.emit(TouchPrimitive::Move(target), IntentKind::Move, now, injector, decision)
            }
            Some(_) => Ok(()),
            None => {
                self.release_current(now, injector, decision)?;
                self.emit(TouchPrimitive::Press(target), IntentKind::Move, now, injector, decision)
            }
        }
    }

    /// The pressed position if `kind` currently owns the channel.
    fn position_owned_by(&self, kind: &IntentKind) -> Option<Point> {
        match &self.state {
            TouchState::Pressed { at, owner } if owner == kind => Some(*at),
            _ => None,
        }
    }

    // ── Emission helpers ──────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn drag(
        &mut self,
        from: Point,
        to: Point,
        owner: IntentKind,
        mapper: &CoordinateMapper,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        for point in mapper.drag_path(from, to) {
            self.emit(TouchPrimitive::Move(point), owner.clone(), now, injector, decision)?;
        }
        Ok(())
    }

    fn release_current(
        &mut self,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        match self.state.owner().cloned() {
            Some(owner) => self.emit(TouchPrimitive::Release, owner, now, injector, decision),
            None => Ok(()),
        }
    }

    fn emit(
        &mut self,
        primitive: TouchPrimitive,
        owner: IntentKind,
        now: Timestamp,
        injector: &dyn TouchInjector,
        decision: &mut Decision,
    ) -> Step {
        if let Err(error) = primitive.deliver(injector) {
            warn!("injection of {primitive} for {owner} failed: {error}; forcing idle");
            self.state = TouchState::Idle;
            decision.failure = Some(InjectionFailure {
                primitive,
                owner,
                error,
            });
            return Err(Refused);
        }
        trace!("{primitive} for {owner}");
        match primitive {
            TouchPrimitive::Press(at) => {
                self.state = TouchState::Pressed {
                    at,
                    owner: owner.clone(),
                };
                self.pressed_at = now;
            }
            TouchPrimitive::Move(at) => {
                if let TouchState::Pressed { at: current, .. } = &mut self.state {
                    *current = at;
                }
            }
            TouchPrimitive::Release => self.state = TouchState::Idle,
        }
        self.last_emit_at = now;
        decision.emitted.push(Emission { primitive, owner });
        Ok(())
    }

    // ── Failure handling ──────────────────────────────────────────────────────

    fn drop_claim(&mut self, intents: &mut ActiveIntentSet, decision: &Decision) {
        let Some(failure) = &decision.failure else {
            return;
        };
        match &failure.owner {
            IntentKind::Tap(id) => {
                intents.retire_tap(id);
            }
            IntentKind::Aim => {
                intents.take_aim_delta();
            }
            IntentKind::Move => {
                self.suppressed_move = intents.movement().map(|m| m.vector());
            }
        }
        debug!("dropped claim of {} after injection failure", failure.owner);
    }

    fn refresh_suppression(&mut self, intents: &ActiveIntentSet) {
        if let Some(suppressed) = self.suppressed_move {
            if intents.movement().map(|m| m.vector()) != Some(suppressed) {
                self.suppressed_move = None;
            }
        }
    }
}
