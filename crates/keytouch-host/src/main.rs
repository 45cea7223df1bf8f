//! KeyTouch host: entry point.
//!
//! Reads keyboard and mouse events, arbitrates them onto the single touch
//! point of a mirrored phone screen, and writes the resulting touch
//! primitives as JSON lines for a device-side forwarder.
//!
//! # Usage
//!
//! ```text
//! keytouch [OPTIONS]
//!
//! Options:
//!   --config <PATH>       Keymap file [env: KEYTOUCH_CONFIG]
//!   --log-level <LEVEL>   Overrides `session.log_level` from the keymap
//!   --script <PATH>       Replay input events from a file instead of stdin
//!   --dry-run             Validate the keymap, print the resolved bindings, exit
//!   --write-default       Write the built-in keymap to the config path, exit
//! ```
//!
//! # Streams
//!
//! - **stdin**: input events, one JSON object per line (unless `--script`).
//! - **stdout**: touch primitives, one JSON object per line.
//! - **stderr**: logs.  `RUST_LOG` takes precedence over `--log-level`.
//!
//! # Architecture overview
//!
//! ```text
//! ScriptSource ─► capture bridge ─┐
//! ConfigWatcher ──────────────────┼─► run_session(TouchSession) ─► JsonLinesInjector
//! Ctrl+C ─────────────────────────┘          │
//!                                            └─► TracingObserver + MarkerBoard
//!                                                                   │
//!                                   watch_markers (debug log, 1 s) ◄┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use keytouch_core::keymap::describe;
use keytouch_core::{EmergencyLatch, KeymapConfig, SessionConfig, SessionObserver};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use keytouch_host::application::drive_touch::{EmergencyHotkey, TouchSession};
use keytouch_host::application::session_loop::{
    run_session, spawn_capture_bridge, SessionClock, SessionCommand,
};
use keytouch_host::infrastructure::config_watch::ConfigWatcher;
use keytouch_host::infrastructure::injection::{JsonLinesInjector, VirtualCursor};
use keytouch_host::infrastructure::input_capture::script::ScriptSource;
use keytouch_host::infrastructure::input_capture::InputSource;
use keytouch_host::infrastructure::observability::markers::{watch_markers, MarkerBoard};
use keytouch_host::infrastructure::observability::{FanoutObserver, TracingObserver};
use keytouch_host::infrastructure::storage::config::{
    config_file_path, load_session_config, save_config_to,
};

/// How often the keymap file is checked for changes.
const WATCH_PERIOD: Duration = Duration::from_secs(1);

/// Capacity of the session command channel.
const COMMAND_QUEUE: usize = 256;

/// How often a changed marker board is logged.
const MARKER_PERIOD: Duration = Duration::from_secs(1);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Keyboard and mouse to single-touch mapper.
#[derive(Debug, Parser)]
#[command(
    name = "keytouch",
    about = "Maps keyboard and mouse input onto one touch point",
    version
)]
struct Cli {
    /// Keymap file.  Defaults to `keymap.toml` in the platform config
    /// directory.
    #[arg(long, env = "KEYTOUCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (e.g. `debug`, `keytouch_core=trace`).
    #[arg(long)]
    log_level: Option<String>,

    /// Replay input events from this JSON-lines file instead of stdin.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Validate the keymap, print the resolved bindings as JSON and exit.
    #[arg(long, conflicts_with = "write_default")]
    dry_run: bool,

    /// Write the built-in keymap to the config path and exit.
    #[arg(long)]
    write_default: bool,
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no --config given"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed with `clap`.
/// 2. The keymap is loaded and validated.  An invalid keymap stops here with
///    a message naming the offending entry.
/// 3. `tracing_subscriber` is initialised, writing to stderr so stdout only
///    carries touch output.
/// 4. The session, the capture bridge, the config watcher and a Ctrl+C
///    handler are wired to one command channel.
/// 5. [`run_session`] runs until input ends or Ctrl+C is pressed, then
///    releases any held touch.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.config_path()?;

    if cli.write_default {
        init_logging(cli.log_level.as_deref().unwrap_or("info"));
        return write_default(&path);
    }

    let (keymap, config) = load_session_config(&path)
        .with_context(|| format!("failed to load keymap {}", path.display()))?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    if cli.dry_run {
        let report = resolved_report(&keymap, &config);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    info!("KeyTouch starting, keymap={}", path.display());
    run(cli, path, config).await
}

/// `tracing_subscriber` with an [`EnvFilter`]: `RUST_LOG` if set, otherwise
/// `fallback`.
fn init_logging(fallback: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

fn write_default(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists; not overwriting", path.display());
    }
    save_config_to(path, &KeymapConfig::default())
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default keymap to {}", path.display());
    Ok(())
}

async fn run(cli: Cli, path: PathBuf, config: SessionConfig) -> anyhow::Result<()> {
    let clock = SessionClock::start();
    let latch = EmergencyLatch::new();

    let markers = Arc::new(MarkerBoard::new());
    let observer = FanoutObserver::new(vec![
        Arc::new(TracingObserver) as Arc<dyn SessionObserver>,
        markers.clone() as Arc<dyn SessionObserver>,
    ]);
    let session = TouchSession::new(
        config,
        latch.clone(),
        Arc::new(JsonLinesInjector::stdout()),
        Arc::new(VirtualCursor::default()),
        Arc::new(observer),
    );

    let (commands, receiver) = mpsc::channel(COMMAND_QUEUE);

    // ── Input ─────────────────────────────────────────────────────────────────
    let source = match &cli.script {
        Some(script) => ScriptSource::open(script, clock)
            .with_context(|| format!("failed to open script {}", script.display()))?,
        None => ScriptSource::stdin(clock),
    };
    start_capture(&source, commands.clone(), session.emergency_hotkey(), latch)?;

    // ── Markers ───────────────────────────────────────────────────────────────
    let reporter = tokio::spawn(watch_markers(
        markers.clone(),
        clock,
        MARKER_PERIOD,
        |views| {
            for view in views {
                debug!(
                    owner = %view.owner,
                    highlighted = view.highlighted,
                    "marker at {}",
                    view.point
                );
            }
        },
    ));

    // ── Hot reload ────────────────────────────────────────────────────────────
    tokio::spawn(ConfigWatcher::new(path, WATCH_PERIOD).run(commands.clone()));

    // ── Ctrl+C ────────────────────────────────────────────────────────────────
    let shutdown = commands;
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                let _ = shutdown.send(SessionCommand::Shutdown).await;
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let span = info_span!("session", id = %Uuid::new_v4());
    let session = run_session(session, receiver, clock).instrument(span).await;
    source.stop();
    reporter.abort();

    for marker in markers.snapshot(clock.now()) {
        info!(owner = %marker.owner, "last touch at {}", marker.point);
    }
    info!(
        mode = %session.mode(),
        stopped = session.is_stopped(),
        "KeyTouch stopped"
    );
    Ok(())
}

/// Starts `source` and bridges its events into the session channel.
///
/// # Errors
///
/// Fails when the source cannot start, e.g. [`CaptureError::Unavailable`],
/// in which case no session runs.
///
/// [`CaptureError::Unavailable`]: keytouch_host::infrastructure::input_capture::CaptureError::Unavailable
fn start_capture(
    source: &dyn InputSource,
    commands: mpsc::Sender<SessionCommand>,
    hotkey: EmergencyHotkey,
    latch: EmergencyLatch,
) -> anyhow::Result<JoinHandle<()>> {
    let events = source.start().context("failed to start input capture")?;
    spawn_capture_bridge(events, commands, hotkey, latch).context("failed to spawn capture bridge")
}

/// The resolved keymap as JSON for `--dry-run`.
fn resolved_report(keymap: &KeymapConfig, config: &SessionConfig) -> serde_json::Value {
    let mut bindings: Vec<(String, String)> = config
        .bindings
        .iter()
        .map(|(code, action)| (describe(*code), action.to_string()))
        .collect();
    bindings.sort();

    let taps: Vec<serde_json::Value> = config
        .taps
        .iter()
        .map(|tap| {
            json!({
                "name": tap.id.to_string(),
                "point": tap.point,
                "style": tap.style,
                "dwell_ms": tap.dwell.as_millis() as u64,
                "rank": tap.rank,
            })
        })
        .collect();

    json!({
        "keymap": keymap,
        "tick_us": config.tick_interval.as_micros() as u64,
        "bindings": bindings
            .into_iter()
            .map(|(input, action)| json!({ "input": input, "action": action }))
            .collect::<Vec<_>>(),
        "taps": taps,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use keytouch_core::{resolve, InputCode, KeyCode};
    use keytouch_host::infrastructure::input_capture::mock::MockInputSource;
    use keytouch_host::infrastructure::input_capture::CaptureError;

    #[test]
    fn test_cli_defaults() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["keytouch"]);

        // Assert
        assert!(cli.log_level.is_none());
        assert!(cli.script.is_none());
        assert!(!cli.dry_run);
        assert!(!cli.write_default);
    }

    #[test]
    fn test_cli_config_override() {
        let cli = Cli::parse_from(["keytouch", "--config", "/tmp/k.toml"]);
        assert_eq!(cli.config_path().unwrap(), PathBuf::from("/tmp/k.toml"));
    }

    #[test]
    fn test_cli_log_level_and_script() {
        let cli = Cli::parse_from([
            "keytouch",
            "--log-level",
            "debug",
            "--script",
            "moves.jsonl",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.script, Some(PathBuf::from("moves.jsonl")));
    }

    #[test]
    fn test_cli_dry_run_conflicts_with_write_default() {
        let result = Cli::try_parse_from(["keytouch", "--dry-run", "--write-default"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolved_report_lists_bindings_and_ranked_taps() {
        // Arrange
        let keymap = KeymapConfig::default();
        let config = resolve(&keymap).unwrap();

        // Act
        let report = resolved_report(&keymap, &config);

        // Assert
        let bindings = report["bindings"].as_array().unwrap();
        assert_eq!(bindings.len(), config.bindings.len());
        let names: Vec<&str> = report["taps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["fire", "scope", "backpack", "interact"]);
        assert_eq!(report["taps"][0]["point"], json!([950.0, 260.0]));
    }

    #[test]
    fn test_unavailable_capture_aborts_start() {
        // Arrange
        let source = MockInputSource::unavailable("input monitoring not granted");
        let (commands, mut receiver) = mpsc::channel(4);

        // Act
        let result = start_capture(
            &source,
            commands,
            EmergencyHotkey::default(),
            EmergencyLatch::new(),
        );

        // Assert – nothing reaches the session, not even a shutdown
        let err = result.expect_err("capture must not start");
        assert!(matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::Unavailable(_))
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_started_capture_feeds_session_channel() {
        // Arrange
        let source = MockInputSource::new();
        let (commands, mut receiver) = mpsc::channel(4);
        let latch = EmergencyLatch::new();
        let hotkey = EmergencyHotkey::new(Some(InputCode::Key(KeyCode(0x6F))));
        let bridge = start_capture(&source, commands, hotkey, latch.clone()).unwrap();

        // Act
        source.input(InputCode::Key(KeyCode(0x6F)), true, Duration::ZERO);
        source.stop();
        bridge.join().expect("bridge thread");

        // Assert
        assert!(latch.is_tripped());
        assert!(matches!(receiver.try_recv(), Ok(SessionCommand::Input(_))));
        assert!(matches!(receiver.try_recv(), Ok(SessionCommand::Shutdown)));
    }

    #[test]
    fn test_write_default_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("keytouch_main_{}", Uuid::new_v4()));
        let path = dir.join("keymap.toml");

        assert!(write_default(&path).is_ok());
        assert!(write_default(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
