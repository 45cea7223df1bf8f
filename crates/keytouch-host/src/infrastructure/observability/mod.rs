//! Session observers.
//!
//! The session reports [`SessionEvent`]s synchronously on its decision path.
//! [`TracingObserver`] turns them into log lines, [`markers::MarkerBoard`]
//! keeps the last touch point per owner for an overlay, and
//! [`FanoutObserver`] lets the binary attach both.
//!
//! # Log levels
//!
//! | Event                         | Level   |
//! |-------------------------------|---------|
//! | primitive delivered           | `debug` |
//! | tap completed, cursor restore | `debug` |
//! | mode / enable / config change | `info`  |
//! | first emergency stop, failure | `warn`  |
//! | repeated emergency stop       | `debug` |

pub mod markers;

use std::sync::Arc;

use keytouch_core::{SessionEvent, SessionObserver};
use tracing::{debug, info, warn};

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn observe(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Primitive {
                primitive,
                owner,
                at,
            } => debug!(owner = %owner, at_ms = at.as_millis() as u64, "{primitive}"),
            SessionEvent::InjectionFailed {
                primitive,
                owner,
                reason,
                ..
            } => warn!(owner = %owner, "injector refused {primitive}: {reason}"),
            SessionEvent::TapCompleted { id, at } => {
                debug!(at_ms = at.as_millis() as u64, "tap {id} completed")
            }
            SessionEvent::ModeChanged(t) => {
                info!(cause = ?t.cause, "mode {} -> {}", t.from, t.to)
            }
            SessionEvent::EnabledChanged { enabled } => {
                info!("mapping {}", if *enabled { "enabled" } else { "disabled" })
            }
            SessionEvent::EmergencyStop {
                first: true,
                released,
                cursor_restored,
            } => warn!(
                released = *released,
                cursor_restored = cursor_restored.is_some(),
                "emergency stop"
            ),
            SessionEvent::EmergencyStop { first: false, .. } => {
                debug!("emergency stop already engaged")
            }
            SessionEvent::EmergencyReset => info!("emergency stop reset"),
            SessionEvent::CursorRestored { to } => debug!("cursor restored to {to}"),
            SessionEvent::ConfigApplied => info!("keymap reloaded"),
            SessionEvent::ConfigDeferred => {
                info!("keymap reload deferred until the touch channel is idle")
            }
        }
    }
}

/// Forwards every event to each inner observer in order.
#[derive(Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl FanoutObserver {
    pub fn new(observers: Vec<Arc<dyn SessionObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl SessionObserver for FanoutObserver {
    fn observe(&self, event: &SessionEvent) {
        for observer in &self.observers {
            observer.observe(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counter {
        seen: Mutex<Vec<SessionEvent>>,
    }

    impl SessionObserver for Counter {
        fn observe(&self, event: &SessionEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_fanout_delivers_to_every_observer_in_order() {
        // Arrange
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let mut fanout = FanoutObserver::new(vec![a.clone() as Arc<dyn SessionObserver>]);
        fanout.push(b.clone());

        // Act
        fanout.observe(&SessionEvent::ConfigApplied);
        fanout.observe(&SessionEvent::EnabledChanged { enabled: true });

        // Assert
        assert_eq!(fanout.len(), 2);
        for counter in [&a, &b] {
            assert_eq!(
                *counter.seen.lock().unwrap(),
                vec![
                    SessionEvent::ConfigApplied,
                    SessionEvent::EnabledChanged { enabled: true }
                ]
            );
        }
    }

    #[test]
    fn test_empty_fanout_accepts_events() {
        let fanout = FanoutObserver::default();
        assert!(fanout.is_empty());
        fanout.observe(&SessionEvent::EmergencyReset);
    }

    #[test]
    fn test_tracing_observer_handles_every_event_without_subscriber() {
        let observer = TracingObserver;
        observer.observe(&SessionEvent::EmergencyStop {
            first: true,
            released: true,
            cursor_restored: None,
        });
        observer.observe(&SessionEvent::EmergencyStop {
            first: false,
            released: false,
            cursor_restored: None,
        });
        observer.observe(&SessionEvent::ConfigDeferred);
    }
}
