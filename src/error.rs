use thiserror::Error;

use crate::geo::Coordinate;
use crate::location::LocationError;
use crate::store::StoreError;

/// Why an attendance action did not go through. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttendanceError {
    #[error("Cannot access location without permission.")]
    PermissionDenied,

    #[error("Unable to get your current location. Please try again.")]
    LocationUnavailable { attempts: u32 },

    #[error("You cannot check in or out from this location. Please request attendance.\nLocation: {coordinate}")]
    OutsideGeofence { coordinate: Coordinate },

    #[error("Your attendance could not be saved ({0}). Please try again.")]
    PersistenceFailure(String),

    #[error("Attendance changed since this was requested. Please try again.")]
    StaleConfirmation,
}

impl AttendanceError {
    /// Dialog title for the failure
    pub fn title(&self) -> &'static str {
        match self {
            AttendanceError::PermissionDenied => "Permission Denied",
            AttendanceError::LocationUnavailable { .. } => "Location Error",
            AttendanceError::OutsideGeofence { .. } => "Outside Allowed Area",
            AttendanceError::PersistenceFailure(_) => "Save Failed",
            AttendanceError::StaleConfirmation => "Try Again",
        }
    }
}

impl From<LocationError> for AttendanceError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::PermissionDenied => AttendanceError::PermissionDenied,
            LocationError::LocationUnavailable { attempts } => {
                AttendanceError::LocationUnavailable { attempts }
            }
            // Providers normally retry these away; a leaked one counts as one failed attempt
            LocationError::ReadFailed(_) => AttendanceError::LocationUnavailable { attempts: 1 },
        }
    }
}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        AttendanceError::PersistenceFailure(e.to_string())
    }
}
