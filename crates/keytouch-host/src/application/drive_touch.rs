//! TouchSession: one running keyboard/mouse → touch mapping session.
//!
//! The session owns the tracker, the mode machine, the scheduler and the
//! emergency controller, and is the only writer of any of them.  Callers
//! feed it raw input, ticks and reload requests one at a time; every call
//! ends with a scheduler decision whose primitives go straight to the
//! injector and whose outcome is reported to the observer.
//!
//! # Call sequence for one input event
//!
//! ```text
//! handle_input(event)
//!  ├─ latch tripped elsewhere?  → emergency_stop()
//!  ├─ tracker.handle(event)     → intent change and/or control signal
//!  ├─ control signal            → mode machine / enable / stop
//!  └─ step(now)
//!       ├─ tracker.expire()     → idle aim ends
//!       ├─ scheduler.decide()   → primitives → injector
//!       ├─ restore cursor when the session lets go of it
//!       └─ apply a deferred reload once quiescent
//! ```
//!
//! # Cursor handling
//!
//! The real cursor is snapshotted when an intent first takes an idle
//! channel, and put back when the channel is idle again outside Combat mode,
//! when mapping is disabled, on emergency stop and on shutdown.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use keytouch_core::domain::binding::Action;
use keytouch_core::{
    ActiveIntentSet, ControlSignal, CursorControl, CursorKeeper, Decision, EmergencyLatch,
    EmergencyStopController, InputCode, IntentTracker, Mode, ModeStateMachine, RawInputEvent,
    SessionConfig, SessionEvent, SessionObserver, StopContext, StopReport, Timestamp,
    TouchInjector, TouchScheduler, TouchState,
};
use tracing::{debug, info};

/// The input bound to the emergency stop, if any.
pub fn emergency_input(config: &SessionConfig) -> Option<InputCode> {
    config
        .bindings
        .iter()
        .find(|(_, action)| **action == Action::EmergencyStop)
        .map(|(code, _)| *code)
}

/// The emergency stop input as the session currently has it configured.
///
/// Clones share one slot.  The session writes it whenever a configuration is
/// applied; the capture bridge reads it for every event.
#[derive(Debug, Clone, Default)]
pub struct EmergencyHotkey(Arc<RwLock<Option<InputCode>>>);

impl EmergencyHotkey {
    pub fn new(code: Option<InputCode>) -> Self {
        Self(Arc::new(RwLock::new(code)))
    }

    pub fn get(&self) -> Option<InputCode> {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, code: Option<InputCode>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = code;
    }

    /// `true` if `event` is a press of the emergency input.
    pub fn is_pressed_by(&self, event: &RawInputEvent) -> bool {
        match (self.get(), event.button_edge()) {
            (Some(code), Some((edge, true))) => edge == code,
            _ => false,
        }
    }
}

/// A running mapping session.
pub struct TouchSession {
    config: SessionConfig,
    tracker: IntentTracker,
    modes: ModeStateMachine,
    scheduler: TouchScheduler,
    stop: EmergencyStopController,
    keeper: CursorKeeper,
    hotkey: EmergencyHotkey,
    pending_reload: Option<Box<SessionConfig>>,
    injector: Arc<dyn TouchInjector>,
    cursor: Arc<dyn CursorControl>,
    observer: Arc<dyn SessionObserver>,
}

impl TouchSession {
    /// Creates a session in the configured initial mode and enable state.
    ///
    /// `latch` may be shared with other threads (the capture bridge trips it
    /// on the emergency hotkey before the event reaches the session).
    pub fn new(
        config: SessionConfig,
        latch: EmergencyLatch,
        injector: Arc<dyn TouchInjector>,
        cursor: Arc<dyn CursorControl>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let modes = ModeStateMachine::new(
            config.initial_mode,
            config.start_enabled,
            config.backpack_style,
        );
        let mut tracker =
            IntentTracker::new(config.bindings.clone(), config.taps.clone(), config.tracker);
        tracker.set_gate(modes.gate());
        info!(
            mode = %modes.mode(),
            enabled = modes.is_enabled(),
            "touch session created"
        );
        Self {
            scheduler: TouchScheduler::new(config.timing, latch.clone()),
            stop: EmergencyStopController::new(latch),
            keeper: CursorKeeper::new(),
            hotkey: EmergencyHotkey::new(emergency_input(&config)),
            pending_reload: None,
            config,
            tracker,
            modes,
            injector,
            cursor,
            observer,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn touch_state(&self) -> &TouchState {
        self.scheduler.state()
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn is_enabled(&self) -> bool {
        self.modes.is_enabled()
    }

    /// `true` while an emergency stop is in effect.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_engaged()
    }

    pub fn intents(&self) -> &ActiveIntentSet {
        self.tracker.intents()
    }

    pub fn latch(&self) -> &EmergencyLatch {
        self.stop.latch()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A handle that follows the emergency binding across reloads.
    pub fn emergency_hotkey(&self) -> EmergencyHotkey {
        self.hotkey.clone()
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }

    pub fn has_pending_reload(&self) -> bool {
        self.pending_reload.is_some()
    }

    /// No intent is active and the channel is idle.
    pub fn is_quiescent(&self) -> bool {
        self.tracker.intents().is_empty() && self.scheduler.state().is_idle()
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Feeds one captured event and runs a decision at its timestamp.
    pub fn handle_input(&mut self, event: &RawInputEvent) {
        let now = event.at();
        if self.stop.is_pending() {
            self.emergency_stop(now);
        }
        let update = self.tracker.handle(event);
        if let Some(signal) = update.control {
            self.apply_control(signal, now);
        }
        self.step(now);
    }

    /// Runs a decision without new input (refreshes, dwell expiry, idle aim).
    pub fn tick(&mut self, now: Timestamp) {
        if self.stop.is_pending() {
            self.emergency_stop(now);
        }
        self.step(now);
    }

    /// Releases everything, disables mapping and restores the cursor.
    ///
    /// Safe to call repeatedly; later calls only re-confirm the idle state.
    pub fn emergency_stop(&mut self, now: Timestamp) -> StopReport {
        let report = self.stop.trigger(
            StopContext {
                scheduler: &mut self.scheduler,
                tracker: &mut self.tracker,
                modes: &mut self.modes,
                cursor_keeper: &mut self.keeper,
                cursor: self.cursor.as_ref(),
                injector: self.injector.as_ref(),
            },
            now,
        );
        self.report(&report.decision, now);
        if report.disabled {
            self.observer
                .observe(&SessionEvent::EnabledChanged { enabled: false });
        }
        self.observer.observe(&SessionEvent::EmergencyStop {
            first: report.first,
            released: !report.decision.emitted.is_empty(),
            cursor_restored: report.cursor_restored,
        });
        self.tracker.set_gate(self.modes.gate());
        self.apply_pending_reload();
        report
    }

    /// Clears a stop without re-enabling mapping.  Returns `false` if no stop
    /// was in effect.
    pub fn reset_emergency(&mut self) -> bool {
        let was_stopped = self.stop.reset();
        if was_stopped {
            info!("emergency stop reset");
            self.observer.observe(&SessionEvent::EmergencyReset);
        }
        was_stopped
    }

    /// Swaps in a new configuration, now if the session is quiescent,
    /// otherwise at the next quiescent point.  Returns `true` if applied now.
    ///
    /// A later request replaces an earlier deferred one.
    pub fn request_reload(&mut self, config: SessionConfig) -> bool {
        if self.is_quiescent() {
            self.apply_config(config);
            return true;
        }
        debug!("reload deferred until the channel is idle");
        self.pending_reload = Some(Box::new(config));
        self.observer.observe(&SessionEvent::ConfigDeferred);
        false
    }

    /// Releases the channel and restores the cursor before the process exits.
    pub fn shutdown(&mut self, now: Timestamp) {
        let decision = self.scheduler.halt(now, self.injector.as_ref());
        self.report(&decision, now);
        self.tracker.clear();
        self.restore_cursor();
        info!("touch session shut down");
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn apply_control(&mut self, signal: ControlSignal, now: Timestamp) {
        match signal {
            ControlSignal::ViewLock => {
                if let Some(transition) = self.modes.toggle_view_lock() {
                    self.observer.observe(&SessionEvent::ModeChanged(transition));
                    self.sync_gate();
                }
            }
            ControlSignal::BackpackDown => self.backpack_edge(true, now),
            ControlSignal::BackpackUp => self.backpack_edge(false, now),
            ControlSignal::ToggleEnabled => self.toggle_enabled(),
            ControlSignal::EmergencyStop => {
                self.emergency_stop(now);
            }
        }
    }

    fn backpack_edge(&mut self, down: bool, now: Timestamp) {
        let outcome = self.modes.backpack_key(down);
        if let Some(transition) = outcome.transition {
            self.observer.observe(&SessionEvent::ModeChanged(transition));
            self.sync_gate();
        }
        if outcome.toggled {
            let tap = self.config.backpack_tap();
            self.tracker.request_tap(&tap, now);
        }
    }

    /// The enable hotkey also serves as the reset for an emergency stop, in
    /// which case it always enables.
    fn toggle_enabled(&mut self) {
        let enabled = if self.reset_emergency() {
            self.modes.set_enabled(true);
            true
        } else {
            self.modes.toggle_enabled()
        };
        info!(enabled, "mapping {}", if enabled { "enabled" } else { "disabled" });
        self.observer
            .observe(&SessionEvent::EnabledChanged { enabled });
        self.sync_gate();
    }

    fn sync_gate(&mut self) {
        self.tracker.set_gate(self.modes.gate());
    }

    fn step(&mut self, now: Timestamp) {
        self.tracker.expire(now);
        if !self.stop.is_engaged() {
            if !self.tracker.intents().is_empty() && self.scheduler.state().is_idle() {
                self.keeper.remember(self.cursor.as_ref());
            }
            let decision = self.scheduler.decide(
                self.tracker.intents_mut(),
                &self.config.mapper,
                now,
                self.injector.as_ref(),
            );
            self.report(&decision, now);
            let lets_go = self.modes.mode() != Mode::Combat || !self.modes.is_enabled();
            if lets_go && self.is_quiescent() {
                self.restore_cursor();
            }
        }
        self.apply_pending_reload();
    }

    fn restore_cursor(&mut self) {
        if let Some(to) = self.keeper.restore(self.cursor.as_ref()) {
            self.observer.observe(&SessionEvent::CursorRestored { to });
        }
    }

    fn apply_pending_reload(&mut self) {
        if !self.is_quiescent() {
            return;
        }
        if let Some(config) = self.pending_reload.take() {
            self.apply_config(*config);
        }
    }

    fn apply_config(&mut self, config: SessionConfig) {
        self.tracker
            .reconfigure(config.bindings.clone(), config.taps.clone(), config.tracker);
        self.scheduler.reconfigure(config.timing);
        self.modes.set_backpack_style(config.backpack_style);
        self.hotkey.set(emergency_input(&config));
        self.config = config;
        self.sync_gate();
        info!(taps = self.config.taps.len(), "configuration applied");
        self.observer.observe(&SessionEvent::ConfigApplied);
    }

    fn report(&self, decision: &Decision, now: Timestamp) {
        for emission in &decision.emitted {
            self.observer.observe(&SessionEvent::Primitive {
                primitive: emission.primitive,
                owner: emission.owner.clone(),
                at: now,
            });
        }
        for id in &decision.completed_taps {
            self.observer.observe(&SessionEvent::TapCompleted {
                id: id.clone(),
                at: now,
            });
        }
        if let Some(failure) = &decision.failure {
            self.observer.observe(&SessionEvent::InjectionFailed {
                primitive: failure.primitive,
                owner: failure.owner.clone(),
                reason: failure.error.to_string(),
                at: now,
            });
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
