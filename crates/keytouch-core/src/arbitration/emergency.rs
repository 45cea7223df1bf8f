//! Emergency stop: release everything, restore the cursor, stay stopped.
//!
//! The [`EmergencyLatch`] is the only piece of arbitration state that may be
//! written from outside the decision path.  A capture thread or signal
//! handler can trip it at any time; the scheduler checks it before every
//! decision and refuses to press while it is set.
//!
//! [`EmergencyStopController::trigger`] does the rest on the decision path:
//! one release if pressed, intents and held keys cleared, mapping disabled
//! and the real cursor put back where it was before the session moved it.
//! Triggering again is harmless.  Resetting is always an explicit call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::scheduler::{Decision, TouchScheduler};
use super::tracker::IntentTracker;
use crate::domain::geometry::Point;
use crate::domain::input::Timestamp;
use crate::domain::mode::ModeStateMachine;
use crate::port::{CursorControl, TouchInjector};

/// Process-wide stop flag, cheap to clone and share across threads.
#[derive(Debug, Clone, Default)]
pub struct EmergencyLatch(Arc<AtomicBool>);

impl EmergencyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the latch.  Returns `true` if it was not already set.
    pub fn trip(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Remembers where the real cursor was before the session moved it.
#[derive(Debug, Clone, Default)]
pub struct CursorKeeper {
    saved: Option<Point>,
}

impl CursorKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the cursor unless a snapshot is already held.
    pub fn remember(&mut self, cursor: &dyn CursorControl) {
        if self.saved.is_none() {
            self.saved = Some(cursor.cursor_position());
        }
    }

    /// Warps the cursor back to the snapshot and forgets it.
    pub fn restore(&mut self, cursor: &dyn CursorControl) -> Option<Point> {
        let saved = self.saved.take()?;
        cursor.warp_cursor(saved);
        Some(saved)
    }

    pub fn saved(&self) -> Option<Point> {
        self.saved
    }
}

/// Everything a stop needs to touch, borrowed for the duration of one call.
pub struct StopContext<'a> {
    pub scheduler: &'a mut TouchScheduler,
    pub tracker: &'a mut IntentTracker,
    pub modes: &'a mut ModeStateMachine,
    pub cursor_keeper: &'a mut CursorKeeper,
    pub cursor: &'a dyn CursorControl,
    pub injector: &'a dyn TouchInjector,
}

/// What a trigger did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StopReport {
    /// `false` when the controller was already stopped.
    pub first: bool,
    /// The release, if one was needed.
    pub decision: Decision,
    /// Mapping was enabled and has now been disabled.
    pub disabled: bool,
    pub cursor_restored: Option<Point>,
}

/// Owns the stop procedure and whether it has run.
#[derive(Debug, Clone)]
pub struct EmergencyStopController {
    latch: EmergencyLatch,
    engaged: bool,
}

impl EmergencyStopController {
    pub fn new(latch: EmergencyLatch) -> Self {
        Self {
            latch,
            engaged: false,
        }
    }

    pub fn latch(&self) -> &EmergencyLatch {
        &self.latch
    }

    /// `true` once [`trigger`](Self::trigger) has run and until
    /// [`reset`](Self::reset).
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// `true` if the latch was tripped elsewhere and the stop procedure has
    /// not run yet.
    pub fn is_pending(&self) -> bool {
        self.latch.is_tripped() && !self.engaged
    }

    /// Stops everything.  Idempotent.
    pub fn trigger(&mut self, ctx: StopContext<'_>, now: Timestamp) -> StopReport {
        self.latch.trip();
        let first = !self.engaged;
        self.engaged = true;

        let decision = ctx.scheduler.halt(now, ctx.injector);
        if let Some(failure) = &decision.failure {
            warn!("release during emergency stop failed: {}", failure.error);
        }
        ctx.tracker.clear();
        let disabled = ctx.modes.set_enabled(false);
        let cursor_restored = ctx.cursor_keeper.restore(ctx.cursor);

        if first {
            info!(
                released = !decision.emitted.is_empty(),
                "emergency stop engaged"
            );
        }
        StopReport {
            first,
            decision,
            disabled,
            cursor_restored,
        }
    }

    /// Clears the latch.  Does not re-enable mapping.
    pub fn reset(&mut self) -> bool {
        let was_engaged = self.engaged || self.latch.is_tripped();
        self.latch.reset();
        self.engaged = false;
        was_engaged
    }
}
