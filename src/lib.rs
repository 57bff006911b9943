// Library surface for the binary, headless runs and integration tests.
// Rendering lives in the binary; everything here is terminal-agnostic apart from key events.
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod location;
pub mod logging;
pub mod runtime;
pub mod store;
pub mod util;

pub use engine::{Action, AttendanceEngine, AttendanceResult, PendingAction};
pub use error::AttendanceError;
pub use geo::{Coordinate, GeofenceArea};
pub use store::AttendanceState;
