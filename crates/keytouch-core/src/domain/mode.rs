//! Combat / FreeMouse mode machine.
//!
//! The mode decides which intents may reach the scheduler:
//!
//! | state               | Move/Aim | combat taps | backpack tap |
//! |---------------------|----------|-------------|--------------|
//! | enabled, Combat     | yes      | yes         | yes          |
//! | enabled, FreeMouse  | no       | no          | yes          |
//! | disabled (any mode) | no       | no          | no           |
//!
//! Transitions never emit touch primitives.  They only change the [`Gate`];
//! the scheduler notices the withdrawn intents on its next decision.
//!
//! The backpack is a push/pop with a single saved slot rather than a second
//! toggle: opening remembers the current mode and forces FreeMouse, closing
//! restores the remembered mode.  A repeated open while already open cannot
//! overwrite the slot, so the pre-backpack mode is never lost.

use serde::{Deserialize, Serialize};

use super::intent::TapScope;

/// High-level input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Mouse drives the view, WASD drives the joystick.
    Combat,
    /// Mouse is a normal desktop pointer.
    FreeMouse,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Combat => f.write_str("combat"),
            Mode::FreeMouse => f.write_str("free_mouse"),
        }
    }
}

/// When the backpack closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpackStyle {
    /// Each press alternates open / close.
    #[default]
    Toggle,
    /// Open while the key is held, close on release.
    Hold,
}

/// Why a mode change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCause {
    ViewLock,
    BackpackOpened,
    BackpackClosed,
}

/// A change of [`Mode`], reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
    pub cause: ModeCause,
}

/// Result of a backpack key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackpackOutcome {
    /// The backpack actually opened or closed (a tap on its point is due).
    pub toggled: bool,
    /// The mode changed as a consequence.
    pub transition: Option<ModeTransition>,
}

/// Which intent kinds are currently admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Gate {
    pub movement: bool,
    pub aim: bool,
    pub combat_taps: bool,
    pub mode_taps: bool,
}

impl Gate {
    /// A gate that admits nothing.
    pub const CLOSED: Gate = Gate {
        movement: false,
        aim: false,
        combat_taps: false,
        mode_taps: false,
    };

    pub fn admits_tap(&self, scope: TapScope) -> bool {
        match scope {
            TapScope::Combat => self.combat_taps,
            TapScope::AnyMode => self.mode_taps,
        }
    }
}

/// Tracks mode, the backpack's saved mode and the global enable flag.
#[derive(Debug, Clone)]
pub struct ModeStateMachine {
    mode: Mode,
    saved: Option<Mode>,
    enabled: bool,
    style: BackpackStyle,
}

impl ModeStateMachine {
    pub fn new(initial: Mode, enabled: bool, style: BackpackStyle) -> Self {
        Self {
            mode: initial,
            saved: None,
            enabled,
            style,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_backpack_open(&self) -> bool {
        self.saved.is_some()
    }

    pub fn backpack_style(&self) -> BackpackStyle {
        self.style
    }

    pub fn set_backpack_style(&mut self, style: BackpackStyle) {
        self.style = style;
    }

    /// Toggles Combat ⇄ FreeMouse.
    ///
    /// An explicit view-lock choice ends any backpack push: the saved slot is
    /// discarded so a later close cannot override it.  Ignored while disabled.
    pub fn toggle_view_lock(&mut self) -> Option<ModeTransition> {
        if !self.enabled {
            return None;
        }
        self.saved = None;
        let to = match self.mode {
            Mode::Combat => Mode::FreeMouse,
            Mode::FreeMouse => Mode::Combat,
        };
        Some(self.switch(to, ModeCause::ViewLock))
    }

    /// Applies a backpack key edge (`down = true` for press).
    pub fn backpack_key(&mut self, down: bool) -> BackpackOutcome {
        if !self.enabled {
            return BackpackOutcome::default();
        }
        match (self.style, down, self.saved.is_some()) {
            (BackpackStyle::Toggle, true, false) | (BackpackStyle::Hold, true, false) => {
                self.open_backpack()
            }
            (BackpackStyle::Toggle, true, true) | (BackpackStyle::Hold, false, true) => {
                self.close_backpack()
            }
            _ => BackpackOutcome::default(),
        }
    }

    /// Sets the global enable flag.  Returns `true` if it changed.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.enabled != enabled;
        self.enabled = enabled;
        changed
    }

    /// Flips the global enable flag and returns the new value.
    pub fn toggle_enabled(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// The intents admitted in the current state.
    pub fn gate(&self) -> Gate {
        if !self.enabled {
            return Gate::CLOSED;
        }
        let combat = self.mode == Mode::Combat;
        Gate {
            movement: combat,
            aim: combat,
            combat_taps: combat,
            mode_taps: true,
        }
    }

    fn open_backpack(&mut self) -> BackpackOutcome {
        self.saved = Some(self.mode);
        let transition = (self.mode != Mode::FreeMouse)
            .then(|| self.switch(Mode::FreeMouse, ModeCause::BackpackOpened));
        BackpackOutcome {
            toggled: true,
            transition,
        }
    }

    fn close_backpack(&mut self) -> BackpackOutcome {
        let restored = self.saved.take().unwrap_or(self.mode);
        let transition =
            (restored != self.mode).then(|| self.switch(restored, ModeCause::BackpackClosed));
        BackpackOutcome {
            toggled: true,
            transition,
        }
    }

    fn switch(&mut self, to: Mode, cause: ModeCause) -> ModeTransition {
        let from = self.mode;
        self.mode = to;
        ModeTransition { from, to, cause }
    }
}
