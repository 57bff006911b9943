use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::geo::Coordinate;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("location permission was not granted")]
    PermissionDenied,
    #[error("no location fix after {attempts} attempts")]
    LocationUnavailable { attempts: u32 },
    /// A single failed read; retried by [`RetryingLocationProvider`]
    #[error("position read failed: {0}")]
    ReadFailed(String),
}

/// What the attendance engine consumes: one best-effort coordinate
pub trait LocationProvider {
    fn request_current_location(&self) -> Result<Coordinate, LocationError>;
}

/// Device boundary: permission prompt plus a single raw position read
pub trait PositionSource {
    fn request_permission(&self) -> bool;
    fn read_position(&self) -> Result<Coordinate, LocationError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Wraps a [`PositionSource`] with the permission check and a capped retry loop
#[derive(Debug)]
pub struct RetryingLocationProvider<S: PositionSource> {
    source: S,
    policy: RetryPolicy,
}

impl<S: PositionSource> RetryingLocationProvider<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl<S: PositionSource> LocationProvider for RetryingLocationProvider<S> {
    fn request_current_location(&self) -> Result<Coordinate, LocationError> {
        if !self.source.request_permission() {
            warn!("location permission denied");
            return Err(LocationError::PermissionDenied);
        }

        for attempt in 1..=self.policy.attempts {
            match self.source.read_position() {
                Ok(coordinate) => {
                    debug!(attempt, %coordinate, "location fix obtained");
                    return Ok(coordinate);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "location read failed");
                    std::thread::sleep(self.policy.delay);
                }
            }
        }

        Err(LocationError::LocationUnavailable {
            attempts: self.policy.attempts,
        })
    }
}

/// Source that always reports the same coordinate, or is denied outright
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPositionSource {
    coordinate: Option<Coordinate>,
    permission_granted: bool,
}

impl FixedPositionSource {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate: Some(coordinate),
            permission_granted: true,
        }
    }

    pub fn denied() -> Self {
        Self {
            coordinate: None,
            permission_granted: false,
        }
    }

    /// Granted, but never produces a fix
    pub fn without_fix() -> Self {
        Self {
            coordinate: None,
            permission_granted: true,
        }
    }
}

impl PositionSource for FixedPositionSource {
    fn request_permission(&self) -> bool {
        self.permission_granted
    }

    fn read_position(&self) -> Result<Coordinate, LocationError> {
        self.coordinate
            .ok_or_else(|| LocationError::ReadFailed("no fix available".into()))
    }
}

/// Reads `{"latitude": .., "longitude": ..}` from a file on every request.
/// A missing or malformed file is a transient read failure.
#[derive(Debug, Clone)]
pub struct FilePositionSource {
    path: PathBuf,
}

impl FilePositionSource {
    pub fn new<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl PositionSource for FilePositionSource {
    fn request_permission(&self) -> bool {
        true
    }

    fn read_position(&self) -> Result<Coordinate, LocationError> {
        let bytes = fs::read(&self.path)
            .map_err(|e| LocationError::ReadFailed(format!("{}: {e}", self.path.display())))?;
        serde_json::from_slice::<Coordinate>(&bytes)
            .map_err(|e| LocationError::ReadFailed(format!("{}: {e}", self.path.display())))
    }
}
