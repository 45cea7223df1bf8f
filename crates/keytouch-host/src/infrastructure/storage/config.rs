//! TOML-based keymap persistence.
//!
//! Reads and writes [`KeymapConfig`] at the platform-appropriate path:
//! - Windows:  `%APPDATA%\KeyTouch\keymap.toml`
//! - Linux:    `~/.config/keytouch/keymap.toml`
//! - macOS:    `~/Library/Application Support/KeyTouch/keymap.toml`
//!
//! # What is TOML? (for beginners)
//!
//! TOML (Tom's Obvious Minimal Language) is a configuration file format designed
//! to be easy to read and write.  It looks similar to INI files but with more
//! data types.  Example:
//!
//! ```toml
//! [hotkeys]
//! view_lock = "CapsLock"
//!
//! [points]
//! fire = [950.0, 260.0]
//! ```
//!
//! The `serde` library provides automatic serialisation/deserialisation between
//! Rust structs and TOML text.  The schema itself, with its per-field
//! defaults, lives in `keytouch_core::config::schema`; this module only moves
//! it to and from disk.
//!
//! # Load vs. resolve
//!
//! Loading only checks that the file is well-formed TOML of the right shape.
//! [`load_session_config`] additionally runs [`resolve`] so that unknown key
//! names, missing points and out-of-range values are reported before a
//! session starts.

use std::path::{Path, PathBuf};

use keytouch_core::{resolve, KeymapConfig, SessionConfig};
use thiserror::Error;
use tracing::{debug, info};

/// Error type for keymap file operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file parsed but does not describe a usable keymap.
    #[error("invalid keymap: {0}")]
    Invalid(#[from] keytouch_core::ConfigError),
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the keymap file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, StorageError> {
    platform_config_dir().ok_or(StorageError::NoPlatformConfigDir)
}

/// Resolves the full path to the keymap file.
///
/// # Errors
///
/// Returns [`StorageError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("keymap.toml"))
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads a [`KeymapConfig`] from `path`, returning the default profile if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system errors other than "not found",
/// and [`StorageError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<KeymapConfig, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: KeymapConfig = toml::from_str(&content)?;
            debug!("loaded keymap from {}", path.display());
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no keymap at {}, using the built-in profile", path.display());
            Ok(KeymapConfig::default())
        }
        Err(e) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Loads and validates the keymap at `path`.
///
/// # Errors
///
/// Any [`load_config_from`] error, or [`StorageError::Invalid`] if the keymap
/// does not resolve.
pub fn load_session_config(path: &Path) -> Result<(KeymapConfig, SessionConfig), StorageError> {
    let keymap = load_config_from(path)?;
    let session = resolve(&keymap)?;
    Ok((keymap, session))
}

/// Persists `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`StorageError::Io`] for file-system failures or
/// [`StorageError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &KeymapConfig) -> Result<(), StorageError> {
    // Ensure directory exists before writing.
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `KeyTouch`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("KeyTouch"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keytouch"))
    }

    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/KeyTouch
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("KeyTouch")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use keytouch_core::{Mode, Point, TapStyle};
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("keytouch_test_{}", Uuid::new_v4()))
    }

    // ── TOML round-trip ───────────────────────────────────────────────────────

    #[test]
    fn test_default_config_round_trips_through_toml() {
        // Arrange
        let mut cfg = KeymapConfig::default();
        cfg.session.initial_mode = Mode::Combat;
        cfg.points.insert("reload".into(), Point::new(1.5, 2.5));

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: KeymapConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_empty_file_yields_default_profile() {
        let cfg: KeymapConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, KeymapConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[joystick]
radius_px = 90.0

[scope]
dwell_ms = 45
"#;

        // Act
        let cfg: KeymapConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.joystick.radius_px, 90.0);
        assert_eq!(cfg.joystick.refresh_ms, 50);
        assert_eq!(cfg.scope.dwell_ms, 45);
        // A section written without a style leaves the per-tap default to resolve.
        assert_eq!(cfg.scope.style, None);
    }

    #[test]
    fn test_custom_taps_and_points_parse() {
        let toml_str = r#"
[points]
joystick_center = [200.0, 200.0]
view_anchor = [800.0, 400.0]
fire = [950.0, 260.0]
scope = [1010.0, 260.0]
backpack = [980.0, 680.0]
reload = [900.0, 600.0]

[[custom]]
name = "reload"
key = "R"
point = "reload"
style = "hold"
"#;
        let cfg: KeymapConfig = toml::from_str(toml_str).expect("deserialize");
        assert_eq!(cfg.custom.len(), 1);
        assert_eq!(cfg.custom[0].style, TapStyle::Hold);
        assert_eq!(cfg.custom[0].dwell_ms, 30);
        assert!(resolve(&cfg).is_ok());
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<KeymapConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = temp_dir().join("keymap.toml");
        let cfg = load_config_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, KeymapConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let dir = temp_dir();
        let path = dir.join("nested").join("keymap.toml");
        let mut cfg = KeymapConfig::default();
        cfg.aim.sensitivity = 1.75;
        cfg.hotkeys.fire = "Space".into();

        // Act
        save_config_to(&path, &cfg).expect("save");
        let (loaded, session) = load_session_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
        assert_eq!(session.mapper.settings().aim_sensitivity, 1.75);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_session_config_reports_invalid_keymap() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("keymap.toml");
        std::fs::write(&path, "[hotkeys]\nfire = \"NoSuchKey\"\n").unwrap();

        let result = load_session_config(&path);

        assert!(matches!(result, Err(StorageError::Invalid(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_keymap_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("keymap.toml"),
                "keymap file must be named keymap.toml, got {path:?}"
            );
        }
        // NoPlatformConfigDir in a stripped environment is also acceptable.
    }
}
