//! The session task: one ordered command stream into one [`TouchSession`].
//!
//! # Why a single task? (for beginners)
//!
//! Input events, ticks, reload requests and stop requests all change the
//! same arbitration state.  Instead of guarding that state with a mutex, the
//! session is *moved into* one tokio task and everything else talks to it by
//! sending a [`SessionCommand`] over a channel.  Commands are handled one at
//! a time, in arrival order, so the touch channel only ever has one writer.
//!
//! ```text
//! capture thread ──(std mpsc)──► bridge thread ──┐
//! config watcher ────────────────────────────────┼──(tokio mpsc)──► run_session()
//! Ctrl-C handler ────────────────────────────────┘                      │
//!                                          tick interval ───────────────┘
//! ```
//!
//! The bridge thread is also where the emergency hotkey trips the shared
//! latch, so a stop takes effect even if the session is busy.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use keytouch_core::{EmergencyLatch, RawInputEvent, SessionConfig, Timestamp};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::drive_touch::{EmergencyHotkey, TouchSession};

/// Everything the session task can be asked to do.
#[derive(Debug)]
pub enum SessionCommand {
    Input(RawInputEvent),
    /// A validated configuration from the watcher.
    Reload(Box<SessionConfig>),
    EmergencyStop,
    ResetEmergency,
    Shutdown,
}

/// Monotonic session clock.  Cheap to copy into capture threads so every
/// timestamp shares one origin.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Time since [`start`](Self::start).
    pub fn now(&self) -> Timestamp {
        self.origin.elapsed()
    }
}

/// Runs `session` until [`SessionCommand::Shutdown`] arrives or every sender
/// is dropped, then releases the channel and hands the session back.
pub async fn run_session(
    mut session: TouchSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    clock: SessionClock,
) -> TouchSession {
    let mut period = session.tick_interval();
    let mut ticker = new_ticker(period);
    info!(tick = ?period, "session loop started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::Input(event)) => session.handle_input(&event),
                Some(SessionCommand::Reload(config)) => {
                    session.request_reload(*config);
                }
                Some(SessionCommand::EmergencyStop) => {
                    session.emergency_stop(clock.now());
                }
                Some(SessionCommand::ResetEmergency) => {
                    session.reset_emergency();
                }
                Some(SessionCommand::Shutdown) | None => break,
            },
            _ = ticker.tick() => session.tick(clock.now()),
        }

        // A reload may have changed the tick rate.
        if session.tick_interval() != period {
            period = session.tick_interval();
            debug!(tick = ?period, "tick interval changed");
            ticker = new_ticker(period);
        }
    }

    session.shutdown(clock.now());
    info!("session loop stopped");
    session
}

fn new_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Forwards captured events into the session channel on a dedicated thread.
///
/// A press of the current `hotkey` trips `latch` before the event is
/// forwarded.  When capture ends the bridge asks the session to shut down.
pub fn spawn_capture_bridge(
    events: std_mpsc::Receiver<RawInputEvent>,
    commands: mpsc::Sender<SessionCommand>,
    hotkey: EmergencyHotkey,
    latch: EmergencyLatch,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("keytouch-capture-bridge".to_string())
        .spawn(move || {
            while let Ok(event) = events.recv() {
                if hotkey.is_pressed_by(&event) && latch.trip() {
                    warn!("emergency hotkey pressed");
                }
                if commands.blocking_send(SessionCommand::Input(event)).is_err() {
                    debug!("session gone; capture bridge exiting");
                    return;
                }
            }
            info!("capture ended");
            let _ = commands.blocking_send(SessionCommand::Shutdown);
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::drive_touch::emergency_input;
    use crate::infrastructure::injection::mock::{RecordingCursor, RecordingInjector};
    use crate::infrastructure::input_capture::mock::MockInputSource;
    use crate::infrastructure::input_capture::InputSource;
    use keytouch_core::observe::NullObserver;
    use keytouch_core::{
        resolve, InputCode, KeyCode, KeymapConfig, Mode, MouseButton, TouchPrimitive,
    };

    const W: KeyCode = KeyCode(13);
    const F11: KeyCode = KeyCode(0x67);
    const F12: KeyCode = KeyCode(0x6F);

    fn session(injector: Arc<RecordingInjector>, latch: EmergencyLatch) -> TouchSession {
        let mut cfg = KeymapConfig::default();
        cfg.session.initial_mode = Mode::Combat;
        cfg.session.start_enabled = true;
        TouchSession::new(
            resolve(&cfg).expect("default config"),
            latch,
            injector,
            Arc::new(RecordingCursor::default()),
            Arc::new(NullObserver),
        )
    }

    #[test]
    fn test_session_clock_is_monotonic() {
        let clock = SessionClock::start();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_emergency_input_finds_binding() {
        let cfg = resolve(&KeymapConfig::default()).unwrap();
        assert_eq!(emergency_input(&cfg), Some(InputCode::Key(F12)));
    }

    #[tokio::test]
    async fn test_run_session_processes_input_and_releases_on_shutdown() {
        // Arrange
        let injector = Arc::new(RecordingInjector::new());
        let (tx, rx) = mpsc::channel(16);
        let at = Duration::ZERO;
        tx.send(SessionCommand::Input(RawInputEvent::KeyDown { code: W, at }))
            .await
            .unwrap();
        tx.send(SessionCommand::Shutdown).await.unwrap();

        // Act
        let session = run_session(
            session(injector.clone(), EmergencyLatch::new()),
            rx,
            SessionClock::start(),
        )
        .await;

        // Assert
        let calls = injector.primitives();
        assert!(matches!(calls.first(), Some(TouchPrimitive::Press(_))));
        assert_eq!(calls.last(), Some(&TouchPrimitive::Release));
        assert!(session.touch_state().is_idle());
    }

    #[tokio::test]
    async fn test_run_session_stops_when_all_senders_drop() {
        let injector = Arc::new(RecordingInjector::new());
        let (tx, rx) = mpsc::channel::<SessionCommand>(4);
        drop(tx);

        let handle = tokio::spawn(run_session(
            session(injector.clone(), EmergencyLatch::new()),
            rx,
            SessionClock::start(),
        ));

        let session = tokio_test::assert_ok!(handle.await);
        assert!(session.touch_state().is_idle());
        assert!(injector.primitives().is_empty());
    }

    #[tokio::test]
    async fn test_emergency_command_stops_session() {
        let injector = Arc::new(RecordingInjector::new());
        let (tx, rx) = mpsc::channel(16);
        let at = Duration::ZERO;
        tx.send(SessionCommand::Input(RawInputEvent::MouseDown {
            button: MouseButton::Left,
            at,
        }))
        .await
        .unwrap();
        tx.send(SessionCommand::EmergencyStop).await.unwrap();
        tx.send(SessionCommand::Shutdown).await.unwrap();

        let session = run_session(
            session(injector.clone(), EmergencyLatch::new()),
            rx,
            SessionClock::start(),
        )
        .await;

        assert!(session.is_stopped());
        assert!(!session.is_enabled());
        let releases = injector
            .primitives()
            .iter()
            .filter(|p| **p == TouchPrimitive::Release)
            .count();
        assert_eq!(releases, 1);
    }

    // ── Capture bridge ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_emergency_key_trips_latch_before_session_sees_it() {
        // Arrange – W held in combat, capture bridged into the session channel
        let injector = Arc::new(RecordingInjector::new());
        let latch = EmergencyLatch::new();
        let mut session = session(injector.clone(), latch.clone());
        let source = MockInputSource::new();
        let (tx, mut rx) = mpsc::channel(16);
        let bridge = spawn_capture_bridge(
            source.start().expect("start capture"),
            tx,
            session.emergency_hotkey(),
            latch.clone(),
        )
        .expect("spawn bridge");
        source.input(InputCode::Key(W), true, Duration::ZERO);
        let Some(SessionCommand::Input(held)) = rx.recv().await else {
            panic!("expected the W press");
        };
        session.handle_input(&held);

        // Act
        source.input(InputCode::Key(F12), true, Duration::from_millis(10));
        let Some(SessionCommand::Input(stop)) = rx.recv().await else {
            panic!("expected the F12 press");
        };

        // Assert – tripped on the bridge thread, before the session handles it
        assert!(latch.is_tripped());
        assert!(!session.is_stopped());
        session.handle_input(&stop);
        assert!(session.is_stopped());
        assert_eq!(injector.primitives().last(), Some(&TouchPrimitive::Release));

        source.stop();
        assert!(matches!(rx.recv().await, Some(SessionCommand::Shutdown)));
        bridge.join().expect("bridge thread");
    }

    #[tokio::test]
    async fn test_bridge_follows_reloaded_emergency_key() {
        // Arrange – emergency stop moved from F12 to F11 by a reload
        let latch = EmergencyLatch::new();
        let mut session = session(Arc::new(RecordingInjector::new()), latch.clone());
        let mut cfg = KeymapConfig::default();
        cfg.hotkeys.emergency_stop = "F11".into();
        assert!(session.request_reload(resolve(&cfg).unwrap()));
        let source = MockInputSource::new();
        let (tx, mut rx) = mpsc::channel(16);
        let bridge = spawn_capture_bridge(
            source.start().expect("start capture"),
            tx,
            session.emergency_hotkey(),
            latch.clone(),
        )
        .expect("spawn bridge");

        // Act
        source.input(InputCode::Key(F12), true, Duration::ZERO);
        assert!(matches!(rx.recv().await, Some(SessionCommand::Input(_))));
        let after_old_key = latch.is_tripped();
        source.input(InputCode::Key(F11), true, Duration::from_millis(5));
        assert!(matches!(rx.recv().await, Some(SessionCommand::Input(_))));

        // Assert
        assert!(!after_old_key, "old emergency key still trips the latch");
        assert!(latch.is_tripped());
        source.stop();
        bridge.join().expect("bridge thread");
    }

    #[tokio::test]
    async fn test_bridge_shuts_session_down_when_capture_ends() {
        let source = MockInputSource::new();
        let (tx, mut rx) = mpsc::channel(4);
        let bridge = spawn_capture_bridge(
            source.start().expect("start capture"),
            tx,
            EmergencyHotkey::new(Some(InputCode::Key(F12))),
            EmergencyLatch::new(),
        )
        .expect("spawn bridge");

        source.stop();

        assert!(matches!(rx.recv().await, Some(SessionCommand::Shutdown)));
        bridge.join().expect("bridge thread");
    }
}
