//! Last-touch markers for a debugging overlay.
//!
//! Each intent kind that has owned the touch channel leaves one marker at the
//! last point it pressed or moved to.  A marker is highlighted for
//! [`HIGHLIGHT`] after it moves, which makes taps and joystick re-presses
//! visible at a glance.  A failed injection removes the owner's marker since
//! its touch state is no longer known.
//!
//! [`watch_markers`] hands the board to a sink while the session runs,
//! whenever it changed since the last look.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use keytouch_core::{IntentKind, Point, SessionEvent, SessionObserver, Timestamp, TouchPrimitive};
use tokio::time::MissedTickBehavior;

use crate::application::session_loop::SessionClock;

/// How long a marker stays highlighted after it moves.
pub const HIGHLIGHT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Marker {
    owner: IntentKind,
    point: Point,
    at: Timestamp,
}

/// One marker as an overlay draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerView {
    pub owner: IntentKind,
    pub point: Point,
    pub highlighted: bool,
}

/// Collects markers from session events.
#[derive(Debug, Default)]
pub struct MarkerBoard {
    markers: Mutex<Vec<Marker>>,
    /// Bumped on every change.
    revision: AtomicU64,
}

impl MarkerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Current markers, ordered by owner name.
    pub fn snapshot(&self, now: Timestamp) -> Vec<MarkerView> {
        let markers = self.markers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut views: Vec<MarkerView> = markers
            .iter()
            .map(|m| MarkerView {
                owner: m.owner.clone(),
                point: m.point,
                highlighted: now.saturating_sub(m.at) < HIGHLIGHT,
            })
            .collect();
        views.sort_by_key(|v| v.owner.to_string());
        views
    }

    fn place(&self, owner: &IntentKind, point: Point, at: Timestamp) {
        let mut markers = self.markers.lock().unwrap_or_else(PoisonError::into_inner);
        match markers.iter_mut().find(|m| &m.owner == owner) {
            Some(marker) => {
                marker.point = point;
                marker.at = at;
            }
            None => markers.push(Marker {
                owner: owner.clone(),
                point,
                at,
            }),
        }
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    fn remove(&self, owner: &IntentKind) {
        let mut markers = self.markers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = markers.len();
        markers.retain(|m| &m.owner != owner);
        if markers.len() != before {
            self.revision.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// Looks at `board` every `period` and passes its snapshot to `sink` when it
/// changed.  Runs until the task is aborted.
pub async fn watch_markers<F>(
    board: Arc<MarkerBoard>,
    clock: SessionClock,
    period: Duration,
    mut sink: F,
) where
    F: FnMut(&[MarkerView]) + Send,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seen = 0;
    loop {
        ticker.tick().await;
        let revision = board.revision();
        if revision != seen {
            seen = revision;
            sink(&board.snapshot(clock.now()));
        }
    }
}

impl SessionObserver for MarkerBoard {
    fn observe(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Primitive {
                primitive: TouchPrimitive::Press(p) | TouchPrimitive::Move(p),
                owner,
                at,
            } => self.place(owner, *p, *at),
            SessionEvent::InjectionFailed { owner, .. } => self.remove(owner),
            _ => {}
        }
    }
}
