//! Attendance decision logic.
//!
//! The engine holds only immutable configuration plus its two collaborators
//! (a location provider and a state store). Every call takes the current
//! state and the current time as input and returns an [`AttendanceResult`]
//! describing what to display; nothing is cached between calls.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{error, info, warn};

use crate::error::AttendanceError;
use crate::geo::{Coordinate, GeofenceArea};
use crate::location::LocationProvider;
use crate::store::{AttendanceState, StateStore};
use crate::util::{
    display_offset, format_clock, format_location, format_worked, worked_duration, worked_hours,
};

pub const REQUEST_ACKNOWLEDGMENT: &str =
    "You are outside the allowed area. Attendance request submitted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Action {
    #[strum(serialize = "check in")]
    CheckIn,
    #[strum(serialize = "check out")]
    CheckOut,
}

impl Action {
    /// The action the toggle performs from `state`
    pub fn for_state(state: &AttendanceState) -> Self {
        if state.checked_in {
            Action::CheckOut
        } else {
            Action::CheckIn
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::CheckIn => "Check In",
            Action::CheckOut => "Check Out",
        }
    }
}

/// Minimum-hours gate applied on check-out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkPolicy {
    /// `None` turns the warning off
    pub minimum_worked_hours: Option<f64>,
}

impl Default for WorkPolicy {
    fn default() -> Self {
        Self {
            minimum_worked_hours: Some(8.0),
        }
    }
}

/// An allowed action waiting on the caller's secondary confirmation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAction {
    pub action: Action,
    pub coordinate: Coordinate,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceResult {
    pub allowed: bool,
    pub new_state: AttendanceState,
    pub user_message: String,
    pub requires_confirmation: bool,
    pub warning: Option<String>,
    pub error: Option<AttendanceError>,
    /// The sample the decision was based on, if one was obtained
    pub coordinate: Option<Coordinate>,
    /// Present exactly when `requires_confirmation` is set
    pub pending: Option<PendingAction>,
}

impl AttendanceResult {
    fn rejected(
        current: &AttendanceState,
        error: AttendanceError,
        coordinate: Option<Coordinate>,
    ) -> Self {
        Self {
            allowed: false,
            new_state: current.clone(),
            user_message: error.to_string(),
            requires_confirmation: false,
            warning: None,
            error: Some(error),
            coordinate,
            pending: None,
        }
    }

    /// True once the new state has been persisted
    pub fn is_committed(&self) -> bool {
        self.allowed && !self.requires_confirmation && self.error.is_none()
    }

    /// The sample was outside the geofence; the caller may offer an attendance request
    pub fn outside_geofence(&self) -> bool {
        matches!(self.error, Some(AttendanceError::OutsideGeofence { .. }))
    }
}

#[derive(Debug)]
pub struct AttendanceEngine<L: LocationProvider, S: StateStore> {
    area: GeofenceArea,
    policy: WorkPolicy,
    offset: FixedOffset,
    confirm_every_action: bool,
    location: L,
    store: S,
}

impl<L: LocationProvider, S: StateStore> AttendanceEngine<L, S> {
    pub fn new(area: GeofenceArea, location: L, store: S) -> Self {
        Self {
            area,
            policy: WorkPolicy::default(),
            offset: display_offset(0),
            confirm_every_action: false,
            location,
            store,
        }
    }

    pub fn with_policy(mut self, policy: WorkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Offset used when rendering times into status messages
    /// Hold every allowed action for confirmation, not only short-shift
    /// check-outs. The prompt then carries the sampled location.
    pub fn confirm_every_action(mut self, on: bool) -> Self {
        self.confirm_every_action = on;
        self
    }

    pub fn with_display_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn area(&self) -> &GeofenceArea {
        &self.area
    }

    pub fn policy(&self) -> WorkPolicy {
        self.policy
    }

    pub fn display_offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Sample the location, apply the geofence and worked-hours gates, and
    /// persist the toggled state unless a confirmation is required first.
    pub fn evaluate_action(
        &self,
        current: &AttendanceState,
        now: DateTime<Utc>,
    ) -> AttendanceResult {
        let action = Action::for_state(current);

        let coordinate = match self.location.request_current_location() {
            Ok(c) => c,
            Err(e) => {
                warn!(%action, error = %e, "attendance aborted: no location");
                return AttendanceResult::rejected(current, e.into(), None);
            }
        };

        if !self.area.contains(coordinate) {
            info!(%action, %coordinate, "attendance rejected: outside geofence");
            return AttendanceResult::rejected(
                current,
                AttendanceError::OutsideGeofence { coordinate },
                Some(coordinate),
            );
        }

        let warning = match action {
            Action::CheckOut => self.short_shift_warning(current, now),
            Action::CheckIn => None,
        };
        if warning.is_some() || self.confirm_every_action {
            return self.awaiting_confirmation(action, current, coordinate, now, warning);
        }

        self.commit(action, current, coordinate, now)
    }

    fn awaiting_confirmation(
        &self,
        action: Action,
        current: &AttendanceState,
        coordinate: Coordinate,
        now: DateTime<Utc>,
        warning: Option<String>,
    ) -> AttendanceResult {
        let location = format_location(coordinate);
        let user_message = match warning.as_deref() {
            Some(w) => {
                info!(%coordinate, "check-out needs confirmation: {w}");
                format!("{w}\n\nDo you still want to check out?\n{location}")
            }
            None => format!("Are you sure you want to {action}?\n{location}"),
        };
        AttendanceResult {
            allowed: true,
            new_state: current.clone(),
            user_message,
            requires_confirmation: true,
            warning,
            error: None,
            coordinate: Some(coordinate),
            pending: Some(PendingAction {
                action,
                coordinate,
                requested_at: now,
            }),
        }
    }

    /// Second step for a result that required confirmation. Uses the coordinate
    /// sampled by `evaluate_action`; location is not requested again.
    pub fn confirm(
        &self,
        pending: &PendingAction,
        current: &AttendanceState,
        now: DateTime<Utc>,
    ) -> AttendanceResult {
        if Action::for_state(current) != pending.action {
            warn!(action = %pending.action, "confirmation does not match current state");
            return AttendanceResult::rejected(
                current,
                AttendanceError::StaleConfirmation,
                Some(pending.coordinate),
            );
        }
        self.commit(pending.action, current, pending.coordinate, now)
    }

    /// Acknowledge an attendance request made from outside the geofence.
    /// Nothing is recorded.
    pub fn request_attendance(&self, coordinate: Option<Coordinate>) -> String {
        match coordinate {
            Some(c) => info!(coordinate = %c, "attendance request acknowledged"),
            None => info!("attendance request acknowledged"),
        }
        REQUEST_ACKNOWLEDGMENT.to_string()
    }

    fn short_shift_warning(&self, current: &AttendanceState, now: DateTime<Utc>) -> Option<String> {
        let minimum = self.policy.minimum_worked_hours?;
        let check_in = current.check_in_timestamp?;
        if worked_hours(check_in, now) >= minimum {
            return None;
        }
        Some(format!(
            "You have worked only {}. Minimum {} hours required!",
            format_worked(worked_duration(check_in, now)),
            minimum
        ))
    }

    fn next_state(
        &self,
        action: Action,
        current: &AttendanceState,
        coordinate: Coordinate,
        now: DateTime<Utc>,
    ) -> AttendanceState {
        let clock = format_clock(now, self.offset);
        let location = format_location(coordinate);

        match action {
            Action::CheckIn => AttendanceState {
                checked_in: true,
                status_message: format!("You Checked In at {clock}\n{location}"),
                check_in_timestamp: Some(now),
            },
            Action::CheckOut => {
                let worked = current
                    .check_in_timestamp
                    .map(|t| format_worked(worked_duration(t, now)))
                    .unwrap_or_else(|| "Unknown".to_string());
                AttendanceState {
                    checked_in: false,
                    status_message: format!(
                        "You Checked Out at {clock}\n{location}\nWorked: {worked}"
                    ),
                    check_in_timestamp: None,
                }
            }
        }
    }

    fn commit(
        &self,
        action: Action,
        current: &AttendanceState,
        coordinate: Coordinate,
        now: DateTime<Utc>,
    ) -> AttendanceResult {
        let new_state = self.next_state(action, current, coordinate, now);

        if let Err(e) = self.store.save(&new_state) {
            error!(%action, error = %e, "failed to persist attendance state");
            return AttendanceResult::rejected(current, e.into(), Some(coordinate));
        }

        info!(%action, %coordinate, "attendance state persisted");
        AttendanceResult {
            allowed: true,
            user_message: new_state.status_message.clone(),
            new_state,
            requires_confirmation: false,
            warning: None,
            error: None,
            coordinate: Some(coordinate),
            pending: None,
        }
    }
}
