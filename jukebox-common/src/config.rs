//! Settings loading and config file resolution
//!
//! Settings are read once at controller construction; changing them
//! requires reconstructing the controller. No hot reload.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kiosk settings
///
/// Superset of what the session controller consumes; catalog filters are
/// applied once at scan time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Credits charged when a track does not carry its own cost
    pub default_credit_cost: u32,

    /// Quiet period before the controller announces idle mode
    pub idle_timeout_ms: u64,

    /// Consecutive engine failures tolerated before the controller stops
    /// auto-advancing and settles with the last error
    pub max_consecutive_engine_errors: u32,

    /// Capacity of the controller's single-writer command channel;
    /// senders block (await) when it is full
    pub command_channel_capacity: usize,

    /// Event bus buffer size before slow subscribers start lagging
    pub event_bus_capacity: usize,

    /// Starting balance (kiosk operators often float a few credits)
    pub initial_credits: u32,

    /// Root directory the catalog scans for video files
    pub library_dir: PathBuf,

    /// Artists excluded from the catalog (case-insensitive)
    pub blocked_artists: Vec<String>,

    /// Specific files excluded from the catalog
    pub blocked_tracks: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_credit_cost: 3,
            idle_timeout_ms: 60_000,
            max_consecutive_engine_errors: 3,
            command_channel_capacity: 64,
            event_bus_capacity: 256,
            initial_credits: 0,
            library_dir: PathBuf::new(),
            blocked_artists: Vec::new(),
            blocked_tracks: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Validate invariants the controller relies on
    pub fn validate(&self) -> Result<()> {
        if self.command_channel_capacity == 0 {
            return Err(Error::Config(
                "command_channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config(
                "event_bus_capacity must be at least 1".to_string(),
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(Error::Config("idle_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Resolve the settings file path, priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config dir (`<config>/jukebox/config.toml`)
///
/// Returns `None` when no file exists anywhere; callers fall back to
/// compiled defaults.
pub fn resolve_config_file(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config dir
    let candidate = dirs::config_dir().map(|d| d.join("jukebox").join("config.toml"))?;
    if candidate.exists() {
        Some(candidate)
    } else {
        None
    }
}

/// Load settings from the resolved file, or defaults when none exists
pub fn load_or_default(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Settings> {
    let settings = match resolve_config_file(cli_arg, env_var_name) {
        Some(path) => {
            tracing::info!("Loading settings from {}", path.display());
            Settings::load(&path)?
        }
        None => {
            tracing::info!("No config file found, using compiled defaults");
            Settings::default()
        }
    };
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.default_credit_cost, 3);
        assert_eq!(s.idle_timeout_ms, 60_000);
        assert_eq!(s.max_consecutive_engine_errors, 3);
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "default_credit_cost = 5\nidle_timeout_ms = 1000").unwrap();

        let s = Settings::load(f.path()).unwrap();
        assert_eq!(s.default_credit_cost, 5);
        assert_eq!(s.idle_timeout_ms, 1000);
        // Unspecified keys keep their defaults
        assert_eq!(s.command_channel_capacity, 64);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "default_credit_cost = \"lots\"").unwrap();

        match Settings::load(f.path()) {
            Err(Error::Config(_)) => {}
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn zero_capacity_rejected() {
        let s = Settings {
            command_channel_capacity: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn cli_arg_wins_resolution() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let resolved = resolve_config_file(Some(f.path()), "JUKEBOX_TEST_NO_SUCH_VAR");
        assert_eq!(resolved.unwrap(), f.path());
    }
}
