//! TOML-based application configuration.
//!
//! Stores deployment settings including:
//! - Geofence anchor and radius
//! - Daily eligibility window
//! - Named break windows shown as a countdown
//! - Date/time formats used for persisted redemption stamps
//! - Location history capacity
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::clock::DateFormats;
use crate::error::ConfigError;
use crate::geo::{Coordinate, Geofence};
use crate::window::{NamedWindow, TimeWindow};

/// Geofence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceConfig {
    /// Name of the place, used in status messages.
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_radius")]
    pub radius_meters: f64,
}

/// Eligibility window, `HH:MM` local time, inclusive at both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_start")]
    pub start: String,
    #[serde(default = "default_window_end")]
    pub end: String,
}

/// chrono format strings for persisted dates and times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_date_format")]
    pub date: String,
    #[serde(default = "default_time_format")]
    pub time: String,
}

/// One named `HH:MM` range in the break schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedWindowConfig {
    pub name: String,
    pub start: String,
    pub end: String,
}

/// Break windows for the countdown view. Redemption uses `[window]` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_windows")]
    pub windows: Vec<NamedWindowConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub geofence: GeofenceConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

// Default functions
fn default_label() -> String {
    "canteen".into()
}
fn default_latitude() -> f64 {
    -27.618306
}
fn default_longitude() -> f64 {
    -48.662846
}
fn default_radius() -> f64 {
    100.0
}
fn default_window_start() -> String {
    "14:55".into()
}
fn default_window_end() -> String {
    "15:15".into()
}
fn default_date_format() -> String {
    "%d/%m/%Y".into()
}
fn default_time_format() -> String {
    "%H:%M:%S".into()
}
fn default_history_capacity() -> usize {
    50
}
fn default_schedule_windows() -> Vec<NamedWindowConfig> {
    vec![
        NamedWindowConfig {
            name: "morning".into(),
            start: "09:25".into(),
            end: "09:45".into(),
        },
        NamedWindowConfig {
            name: "afternoon".into(),
            start: "15:25".into(),
            end: "15:45".into(),
        },
    ]
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            radius_meters: default_radius(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: default_window_start(),
            end: default_window_end(),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            date: default_date_format(),
            time: default_time_format(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            windows: default_schedule_windows(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(invalid("config key is empty".into()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| invalid("unknown config key".into()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| invalid("unknown config key".into()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| invalid("unknown config key".into()))?;
        }

        Err(invalid("unknown config key".into()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_err = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_err(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without persisting. The result must
    /// still validate, otherwise `self` is left unchanged.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and persist. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Check every section that has constraints beyond its type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geofence()?;
        self.window()?;
        self.formats()?;
        self.schedule()?;
        Ok(())
    }

    pub fn geofence(&self) -> Result<Geofence, ConfigError> {
        let g = &self.geofence;
        if !g.radius_meters.is_finite() || g.radius_meters <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "geofence.radius_meters".into(),
                message: format!("must be a positive number, got {}", g.radius_meters),
            });
        }
        if !(-90.0..=90.0).contains(&g.latitude) {
            return Err(ConfigError::InvalidValue {
                key: "geofence.latitude".into(),
                message: format!("out of range: {}", g.latitude),
            });
        }
        if !(-180.0..=180.0).contains(&g.longitude) {
            return Err(ConfigError::InvalidValue {
                key: "geofence.longitude".into(),
                message: format!("out of range: {}", g.longitude),
            });
        }
        Ok(Geofence::new(
            Coordinate::new(g.latitude, g.longitude),
            g.radius_meters,
        ))
    }

    pub fn window(&self) -> Result<TimeWindow, ConfigError> {
        TimeWindow::parse(&self.window.start, &self.window.end)
    }

    pub fn formats(&self) -> Result<DateFormats, ConfigError> {
        DateFormats::new(&self.format.date, &self.format.time)
    }

    pub fn schedule(&self) -> Result<Vec<NamedWindow>, ConfigError> {
        self.schedule
            .windows
            .iter()
            .map(|w| -> Result<NamedWindow, ConfigError> {
                let window = TimeWindow::parse(&w.start, &w.end).map_err(|e| match e {
                    ConfigError::InvalidValue { message, .. } => ConfigError::InvalidValue {
                        key: format!("schedule.windows.{}", w.name),
                        message,
                    },
                    other => other,
                })?;
                Ok(NamedWindow {
                    name: w.name.clone(),
                    window,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.geofence.label, "canteen");
        assert_eq!(parsed.window.start, "14:55");
        assert_eq!(parsed.history.capacity, 50);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[geofence]\nradius_meters = 50.0\n").unwrap();
        assert_eq!(parsed.geofence.radius_meters, 50.0);
        assert_eq!(parsed.geofence.latitude, -27.618306);
        assert_eq!(parsed.format.date, "%d/%m/%Y");
    }

    #[test]
    fn default_config_validates() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        let window = cfg.window().unwrap();
        assert_eq!(window.start_minute(), 14 * 60 + 55);
        assert_eq!(window.end_minute(), 15 * 60 + 15);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("window.start").as_deref(), Some("14:55"));
        assert_eq!(cfg.get("history.capacity").as_deref(), Some("50"));
        assert!(cfg.get("window.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.apply("geofence.radius_meters", "50").unwrap();
        assert_eq!(cfg.geofence.radius_meters, 50.0);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(cfg.apply("window.nonexistent", "x").is_err());
    }

    #[test]
    fn apply_rejects_invalid_window_and_keeps_old_value() {
        let mut cfg = Config::default();
        let err = cfg.apply("window.start", "25:99").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg.window.start, "14:55");
    }

    #[test]
    fn negative_radius_is_invalid() {
        let mut cfg = Config::default();
        cfg.geofence.radius_meters = -1.0;
        assert!(cfg.geofence().is_err());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.geofence.radius_meters, 100.0);
        assert!(path.exists());

        let mut edited = cfg.clone();
        edited.apply("window.end", "15:05").unwrap();
        edited.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().window.end, "15:05");
    }

    #[test]
    fn default_schedule_has_two_breaks() {
        let schedule = Config::default().schedule().unwrap();
        let names: Vec<&str> = schedule.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["morning", "afternoon"]);
        assert_eq!(schedule[0].window.start_minute(), 9 * 60 + 25);
    }

    #[test]
    fn schedule_roundtrips_through_toml() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        assert!(toml_str.contains("[[schedule.windows]]"));
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.schedule.windows.len(), 2);
    }

    #[test]
    fn invalid_schedule_entry_is_rejected() {
        let mut cfg = Config::default();
        cfg.schedule.windows[1].end = "noon".into();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "schedule.windows.afternoon"
        ));
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "geofence = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseFailed(_))
        ));
    }
}
