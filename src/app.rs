//! Presentation state for the attendance screen.
//!
//! `App` mirrors the persisted state for rendering and turns key presses
//! into engine calls. Dialog buttons carry an [`AlertChoice`] value instead
//! of a callback; activating a button dispatches on that value.

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::engine::{Action, AttendanceEngine, AttendanceResult, PendingAction};
use crate::geo::Coordinate;
use crate::location::LocationProvider;
use crate::store::{AttendanceState, StateStore, StoreError};
use crate::util::{format_clock, format_worked, worked_duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Info,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Default,
    Cancel,
    Destructive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertChoice {
    Dismiss,
    /// Commit an action the engine is holding for confirmation
    Confirm(PendingAction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertButton {
    pub text: &'static str,
    pub style: ButtonStyle,
    pub choice: AlertChoice,
}

impl AlertButton {
    fn ok() -> Self {
        Self {
            text: "OK",
            style: ButtonStyle::Default,
            choice: AlertChoice::Dismiss,
        }
    }

    fn cancel() -> Self {
        Self {
            text: "Cancel",
            style: ButtonStyle::Cancel,
            choice: AlertChoice::Dismiss,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub kind: AlertKind,
    pub buttons: Vec<AlertButton>,
    pub selected: usize,
}

impl Alert {
    fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        buttons: Vec<AlertButton>,
    ) -> Self {
        let selected = buttons.len().saturating_sub(1);
        Self {
            title: title.into(),
            message: message.into(),
            kind: AlertKind::Info,
            buttons,
            selected,
        }
    }

    fn warning(mut self) -> Self {
        self.kind = AlertKind::Warning;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The main button was pressed; redraw, then call [`App::run_action`]
    Evaluate,
    OpenMap,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub id: String,
}

pub struct App<L: LocationProvider, S: StateStore> {
    pub engine: AttendanceEngine<L, S>,
    pub state: AttendanceState,
    pub profile: Profile,
    pub alert: Option<Alert>,
    pub last_fix: Option<Coordinate>,
    pub outside: bool,
    pub now: DateTime<Utc>,
    in_flight: Option<Action>,
}

impl<L: LocationProvider, S: StateStore> App<L, S> {
    /// The screen asks before every action, after the location is known
    pub fn new(
        engine: AttendanceEngine<L, S>,
        state: AttendanceState,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            engine: engine.confirm_every_action(true),
            state,
            profile,
            alert: None,
            last_fix: None,
            outside: false,
            now,
            in_flight: None,
        }
    }

    /// Build the app from whatever the engine's store has persisted
    pub fn load(
        engine: AttendanceEngine<L, S>,
        profile: Profile,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let state = engine.store().load()?;
        Ok(Self::new(engine, state, profile, now))
    }

    pub fn on_tick(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn next_action(&self) -> Action {
        Action::for_state(&self.state)
    }

    /// True while a pressed action waits for [`App::run_action`]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn clock_text(&self) -> String {
        format_clock(self.now, self.engine.display_offset())
    }

    /// Live worked time while checked in
    pub fn worked_text(&self) -> Option<String> {
        if !self.state.checked_in {
            return None;
        }
        self.state
            .check_in_timestamp
            .map(|t| format_worked(worked_duration(t, self.now)))
    }

    /// Main toggle. Ignored while a dialog is open or an action is pending.
    /// On `true` the caller redraws, then calls [`App::run_action`].
    pub fn press_main_button(&mut self) -> bool {
        if self.alert.is_some() || self.is_busy() {
            return false;
        }
        self.in_flight = Some(self.next_action());
        true
    }

    /// Only offered after a sample landed outside the geofence
    pub fn press_request_attendance(&mut self) -> bool {
        if !self.outside || self.alert.is_some() || self.is_busy() {
            return false;
        }
        let message = self.engine.request_attendance(self.last_fix);
        self.alert = Some(Alert::new("Request Sent", message, vec![AlertButton::ok()]));
        true
    }

    pub fn select_next(&mut self) {
        if let Some(alert) = self.alert.as_mut() {
            alert.selected = (alert.selected + 1) % alert.buttons.len().max(1);
        }
    }

    pub fn select_prev(&mut self) {
        if let Some(alert) = self.alert.as_mut() {
            let n = alert.buttons.len().max(1);
            alert.selected = (alert.selected + n - 1) % n;
        }
    }

    /// Press the highlighted dialog button
    pub fn activate_selected(&mut self) -> Control {
        let Some(alert) = self.alert.take() else {
            return Control::Continue;
        };
        let Some(button) = alert.buttons.get(alert.selected) else {
            return Control::Continue;
        };
        debug!(button = button.text, "dialog button pressed");

        match button.choice {
            AlertChoice::Dismiss => Control::Continue,
            AlertChoice::Confirm(pending) => {
                let result = self.engine.confirm(&pending, &self.state, self.now);
                self.apply(result);
                Control::Continue
            }
        }
    }

    /// Close the dialog through its cancel button, if any
    pub fn cancel_alert(&mut self) {
        if let Some(alert) = self.alert.as_mut() {
            match alert.buttons.iter().position(|b| b.choice == AlertChoice::Dismiss) {
                Some(i) => alert.selected = i,
                None => {
                    self.alert = None;
                    return;
                }
            }
        }
        self.activate_selected();
    }

    /// Sample the location for the pressed action and fold the result in
    pub fn run_action(&mut self) {
        if self.in_flight.take().is_none() {
            return;
        }
        let result = self.engine.evaluate_action(&self.state, self.now);
        self.apply(result);
    }

    fn apply(&mut self, result: AttendanceResult) {
        if let Some(c) = result.coordinate {
            self.last_fix = Some(c);
            self.outside = result.outside_geofence();
        }

        if result.is_committed() {
            self.state = result.new_state;
            return;
        }

        if let Some(pending) = result.pending.filter(|_| result.requires_confirmation) {
            let alert = if result.warning.is_some() {
                Alert::new(
                    "Warning",
                    result.user_message,
                    vec![
                        AlertButton::cancel(),
                        AlertButton {
                            text: "Check Out Anyway",
                            style: ButtonStyle::Destructive,
                            choice: AlertChoice::Confirm(pending),
                        },
                    ],
                )
                .warning()
            } else {
                Alert::new(
                    format!("{}?", pending.action.label()),
                    result.user_message,
                    vec![
                        AlertButton::cancel(),
                        AlertButton {
                            text: "Yes",
                            style: ButtonStyle::Default,
                            choice: AlertChoice::Confirm(pending),
                        },
                    ],
                )
            };
            self.alert = Some(alert);
            return;
        }

        let title = result.error.as_ref().map_or("Error", |e| e.title());
        self.alert = Some(Alert::new(title, result.user_message, vec![AlertButton::ok()]));
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        if self.alert.is_some() {
            match key.code {
                KeyCode::Left | KeyCode::BackTab | KeyCode::Char('h') => self.select_prev(),
                KeyCode::Right | KeyCode::Tab | KeyCode::Char('l') => self.select_next(),
                KeyCode::Enter | KeyCode::Char(' ') => return self.activate_selected(),
                KeyCode::Char('y') => {
                    if let Some(alert) = self.alert.as_mut() {
                        alert.selected = alert.buttons.len().saturating_sub(1);
                    }
                    return self.activate_selected();
                }
                KeyCode::Esc | KeyCode::Char('n') => self.cancel_alert(),
                _ => {}
            }
            return Control::Continue;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Control::Quit,
            KeyCode::Enter | KeyCode::Char(' ') => {
                if self.press_main_button() {
                    Control::Evaluate
                } else {
                    Control::Continue
                }
            }
            KeyCode::Char('r') => {
                self.press_request_attendance();
                Control::Continue
            }
            KeyCode::Char('o') => Control::OpenMap,
            _ => Control::Continue,
        }
    }
}
