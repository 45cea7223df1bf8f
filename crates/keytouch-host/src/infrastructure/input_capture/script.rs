//! JSON-lines input source.
//!
//! Each line is one event, named by key rather than code:
//!
//! ```text
//! {"type": "down", "input": "W", "t_ms": 0}
//! {"type": "move", "dx": 6.0, "dy": -2.5, "t_ms": 40}
//! {"type": "up", "input": "MouseLeft"}
//! ```
//!
//! With `t_ms` the event is held back until the session clock reaches it and
//! stamped with that time, so a recorded script replays the same way every
//! run.  If replay has fallen behind, the event gets the current clock
//! instead and timestamps never run backwards.  Without `t_ms` the event is
//! stamped on arrival, which is what a live hook process piping into stdin
//! wants.  Blank lines and lines
//! starting with `#` are skipped; malformed lines are logged and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use keytouch_core::keymap::{parse_input, KeymapError};
use keytouch_core::{InputCode, RawInputEvent, Timestamp};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{CaptureError, InputSource};
use crate::application::session_loop::SessionClock;

/// A problem with one script line.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("malformed event: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Key(#[from] KeymapError),
}

/// One line of a script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptedEvent {
    Down {
        input: String,
        #[serde(default)]
        t_ms: Option<u64>,
    },
    Up {
        input: String,
        #[serde(default)]
        t_ms: Option<u64>,
    },
    Move {
        dx: f64,
        dy: f64,
        #[serde(default)]
        t_ms: Option<u64>,
    },
}

impl ScriptedEvent {
    /// Parses a line; `Ok(None)` for blank and comment lines.
    pub fn parse_line(line: &str) -> Result<Option<Self>, ScriptError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(trimmed)?))
    }

    pub fn t_ms(&self) -> Option<u64> {
        match self {
            ScriptedEvent::Down { t_ms, .. }
            | ScriptedEvent::Up { t_ms, .. }
            | ScriptedEvent::Move { t_ms, .. } => *t_ms,
        }
    }

    /// Converts to a raw event stamped `at`.
    pub fn into_raw(self, at: Timestamp) -> Result<RawInputEvent, ScriptError> {
        let event = match self {
            ScriptedEvent::Move { dx, dy, .. } => RawInputEvent::MouseMove { dx, dy, at },
            ScriptedEvent::Down { input, .. } => match parse_input(&input)? {
                InputCode::Key(code) => RawInputEvent::KeyDown { code, at },
                InputCode::Mouse(button) => RawInputEvent::MouseDown { button, at },
            },
            ScriptedEvent::Up { input, .. } => match parse_input(&input)? {
                InputCode::Key(code) => RawInputEvent::KeyUp { code, at },
                InputCode::Mouse(button) => RawInputEvent::MouseUp { button, at },
            },
        };
        Ok(event)
    }
}

type Reader = Box<dyn BufRead + Send>;

/// Replays JSON-lines events from a reader on a background thread.
pub struct ScriptSource {
    reader: Mutex<Option<Reader>>,
    clock: SessionClock,
    running: Arc<AtomicBool>,
}

impl ScriptSource {
    pub fn new(reader: impl BufRead + Send + 'static, clock: SessionClock) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
            clock,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Reads events from standard input.
    pub fn stdin(clock: SessionClock) -> Self {
        Self::new(BufReader::new(std::io::stdin()), clock)
    }

    /// Reads events from a file.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Io`] if the file cannot be opened.
    pub fn open(path: &Path, clock: SessionClock) -> Result<Self, CaptureError> {
        Ok(Self::new(BufReader::new(File::open(path)?), clock))
    }
}

impl InputSource for ScriptSource {
    fn start(&self) -> Result<mpsc::Receiver<RawInputEvent>, CaptureError> {
        let reader = self
            .reader
            .lock()
            .map_err(|_| CaptureError::Unavailable("script reader lock poisoned".to_string()))?
            .take()
            .ok_or(CaptureError::AlreadyStopped)?;
        let (tx, rx) = mpsc::channel();
        let clock = self.clock;
        let running = Arc::clone(&self.running);
        std::thread::Builder::new()
            .name("keytouch-script".to_string())
            .spawn(move || replay(reader, &tx, clock, &running))?;
        Ok(rx)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn replay(
    reader: Reader,
    tx: &mpsc::Sender<RawInputEvent>,
    clock: SessionClock,
    running: &AtomicBool,
) {
    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("script read failed: {e}");
                break;
            }
        };
        let scripted = match ScriptedEvent::parse_line(&line) {
            Ok(Some(scripted)) => scripted,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = index + 1, "skipping script line: {e}");
                continue;
            }
        };
        let at = match scripted.t_ms() {
            Some(ms) => {
                let due = Duration::from_millis(ms);
                let now = clock.now();
                if due > now {
                    std::thread::sleep(due - now);
                }
                due.max(clock.now())
            }
            None => clock.now(),
        };
        match scripted.into_raw(at) {
            Ok(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) => warn!(line = index + 1, "skipping script line: {e}"),
        }
    }
    debug!("script source exhausted");
}
