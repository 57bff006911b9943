use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::app_dirs::AppDirs;
use crate::engine::WorkPolicy;
use crate::geo::{Coordinate, GeofenceArea, GeofenceError};
use crate::location::RetryPolicy;

pub const DEFAULT_OFFICE: Coordinate = Coordinate {
    latitude: 37.42210,
    longitude: -122.08410,
};
pub const DEFAULT_RADIUS_M: f64 = 200.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid geofence: {0}")]
    Geofence(#[from] GeofenceError),
    #[error("minimum worked hours must be a non-negative number, got {0}")]
    MinimumHours(f64),
    #[error("location retries must be at least 1")]
    NoRetries,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub geofence: GeofenceArea,
    pub minimum_worked_hours: Option<f64>,
    pub location_retries: u32,
    pub location_retry_delay_ms: u64,
    pub display_utc_offset_minutes: i32,
    pub employee_name: String,
    pub employee_id: String,
    pub location_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geofence: GeofenceArea::circle(DEFAULT_OFFICE, DEFAULT_RADIUS_M),
            minimum_worked_hours: Some(8.0),
            location_retries: 3,
            location_retry_delay_ms: 1000,
            // Asia/Kolkata
            display_utc_offset_minutes: 330,
            employee_name: "User Name".to_string(),
            employee_id: "53739".to_string(),
            location_file: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geofence.validate()?;
        if let Some(h) = self.minimum_worked_hours {
            if !h.is_finite() || h < 0.0 {
                return Err(ConfigError::MinimumHours(h));
            }
        }
        if self.location_retries == 0 {
            return Err(ConfigError::NoRetries);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.location_retries,
            delay: Duration::from_millis(self.location_retry_delay_ms),
        }
    }

    pub fn work_policy(&self) -> WorkPolicy {
        WorkPolicy {
            minimum_worked_hours: self.minimum_worked_hours,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("geoattend_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable config"
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
