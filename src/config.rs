//! Configuration loading and management.
//!
//! Lookup order: an explicit `--config` path, then
//! `.habit-planner/config.yaml`, then `~/.habit-planner/config.yaml`, then
//! built-in defaults. Environment variables override whatever was loaded:
//!
//! - `HABIT_PLANNER_DB_PATH` - Database path
//! - `HABIT_PLANNER_HOST` - Listen address
//! - `HABIT_PLANNER_PORT` - Listen port
//! - `HABIT_PLANNER_UTC_OFFSET_MINUTES` - Offset used for calendar dates
//! - `HABIT_PLANNER_WEEKLY_WEEKDAY` - Weekday for weekly habits (e.g. `mon`)

use crate::planner::PlannerSettings;
use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CONFIG_DIR: &str = ".habit-planner";
const CONFIG_FILE: &str = "config.yaml";

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server binds to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".habit-planner/planner.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    31995
}

/// Recurrence and calendar configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Minutes east of UTC used to decide what "today" is and which date a
    /// habit was created on.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Weekday weekly habits occur on. Unset means each habit's own start weekday.
    #[serde(default)]
    pub weekly_weekday: Option<Weekday>,
}

impl PlannerConfig {
    pub fn settings(&self) -> PlannerSettings {
        PlannerSettings {
            weekly_weekday: self.weekly_weekday,
        }
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from the explicit path if given, else from the default
    /// locations, else defaults; then apply environment overrides.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::default_locations()
                .into_iter()
                .find(|path| path.is_file())
                .map(|path| {
                    debug!(path = %path.display(), "Loading config");
                    Self::load(&path)
                })
                .transpose()?
                .unwrap_or_default(),
        };

        config.apply_env();
        Ok(config)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_DIR).join(CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(CONFIG_DIR).join(CONFIG_FILE));
        }
        paths
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored with a warning.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("HABIT_PLANNER_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(host) = lookup("HABIT_PLANNER_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("HABIT_PLANNER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid HABIT_PLANNER_PORT"),
            }
        }

        if let Some(offset) = lookup("HABIT_PLANNER_UTC_OFFSET_MINUTES") {
            match offset.parse() {
                Ok(offset) => self.planner.utc_offset_minutes = offset,
                Err(_) => warn!(
                    value = %offset,
                    "Ignoring invalid HABIT_PLANNER_UTC_OFFSET_MINUTES"
                ),
            }
        }

        if let Some(weekday) = lookup("HABIT_PLANNER_WEEKLY_WEEKDAY") {
            match weekday.parse::<Weekday>() {
                Ok(weekday) => self.planner.weekly_weekday = Some(weekday),
                Err(_) => warn!(value = %weekday, "Ignoring invalid HABIT_PLANNER_WEEKLY_WEEKDAY"),
            }
        }
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.server.port, 31995);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.planner.utc_offset_minutes, 0);
        assert_eq!(config.planner.weekly_weekday, None);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let config: Config = serde_yaml::from_str(
            "server:\n  port: 8080\nplanner:\n  weekly_weekday: monday\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.db_path, default_db_path());
        assert_eq!(config.planner.weekly_weekday, Some(Weekday::Mon));
        assert_eq!(config.planner.settings().weekly_weekday, Some(Weekday::Mon));
    }

    #[test]
    fn load_reads_an_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "planner:\n  utc_offset_minutes: -300").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.planner.utc_offset_minutes, -300);
    }

    #[test]
    fn load_reports_missing_file() {
        assert!(Config::load("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn overrides_replace_loaded_values_and_skip_garbage() {
        let vars: HashMap<&str, &str> = [
            ("HABIT_PLANNER_DB_PATH", "/tmp/planner.db"),
            ("HABIT_PLANNER_PORT", "not-a-port"),
            ("HABIT_PLANNER_UTC_OFFSET_MINUTES", "120"),
            ("HABIT_PLANNER_WEEKLY_WEEKDAY", "fri"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.db_path, PathBuf::from("/tmp/planner.db"));
        assert_eq!(config.server.port, 31995);
        assert_eq!(config.planner.utc_offset_minutes, 120);
        assert_eq!(config.planner.weekly_weekday, Some(Weekday::Fri));
    }
}
