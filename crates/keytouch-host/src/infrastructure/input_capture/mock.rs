//! In-memory capture source.
//!
//! Stands in for an OS hook in tests: events pushed with
//! [`MockInputSource::inject`] come out of the receiver returned by
//! [`InputSource::start`] exactly like captured ones, and a source built with
//! [`MockInputSource::unavailable`] refuses to start the way a hook without
//! input-monitoring permission does.

use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};

use keytouch_core::{InputCode, RawInputEvent, Timestamp};

use super::{CaptureError, InputSource};

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Running(Sender<RawInputEvent>),
    Stopped,
}

/// Capture source fed by the caller.
#[derive(Debug, Default)]
pub struct MockInputSource {
    phase: Mutex<Phase>,
    refusal: Option<String>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose `start` fails with [`CaptureError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            phase: Mutex::new(Phase::Idle),
            refusal: Some(reason.into()),
        }
    }

    /// Delivers `event` as if it had been captured.  Returns `false` when the
    /// source is not running or nobody is listening any more.
    pub fn inject(&self, event: RawInputEvent) -> bool {
        match &*self.phase.lock().unwrap_or_else(PoisonError::into_inner) {
            Phase::Running(tx) => tx.send(event).is_ok(),
            Phase::Idle | Phase::Stopped => false,
        }
    }

    /// Delivers a press (`down`) or release of `input`.
    pub fn input(&self, input: InputCode, down: bool, at: Timestamp) -> bool {
        let event = match (input, down) {
            (InputCode::Key(code), true) => RawInputEvent::KeyDown { code, at },
            (InputCode::Key(code), false) => RawInputEvent::KeyUp { code, at },
            (InputCode::Mouse(button), true) => RawInputEvent::MouseDown { button, at },
            (InputCode::Mouse(button), false) => RawInputEvent::MouseUp { button, at },
        };
        self.inject(event)
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.phase.lock().unwrap_or_else(PoisonError::into_inner),
            Phase::Running(_)
        )
    }
}

impl InputSource for MockInputSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        if let Some(reason) = &self.refusal {
            return Err(CaptureError::Unavailable(reason.clone()));
        }
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*phase, Phase::Idle) {
            return Err(CaptureError::AlreadyStopped);
        }
        let (tx, rx) = mpsc::channel();
        *phase = Phase::Running(tx);
        Ok(rx)
    }

    /// Drops the sender, which ends the receiver's stream.
    fn stop(&self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = Phase::Stopped;
    }
}
