use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use geoattend::{
    app::{App, Control, Profile},
    engine::AttendanceEngine,
    geo::{Coordinate, GeofenceArea},
    location::{FixedPositionSource, LocationProvider, RetryPolicy, RetryingLocationProvider},
    runtime::{AppEvent, ManualClock, Runner, TestEventSource},
    store::{SqliteStateStore, StateStore},
    util::display_offset,
};

const OFFICE: Coordinate = Coordinate {
    latitude: 37.42210,
    longitude: -122.08410,
};

type TestRunner = Runner<TestEventSource, ManualClock>;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 3, 30, 0).unwrap()
}

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn engine_at(
    fix: Coordinate,
    store: SqliteStateStore,
) -> AttendanceEngine<RetryingLocationProvider<FixedPositionSource>, SqliteStateStore> {
    let provider = RetryingLocationProvider::new(
        FixedPositionSource::new(fix),
        RetryPolicy {
            attempts: 3,
            delay: Duration::ZERO,
        },
    );
    AttendanceEngine::new(GeofenceArea::circle(OFFICE, 200.0), provider, store)
        .with_display_offset(display_offset(330))
}

fn profile() -> Profile {
    Profile {
        name: "User Name".into(),
        id: "53739".into(),
    }
}

fn runner(clock: &ManualClock) -> (Sender<AppEvent>, TestRunner) {
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), clock.clone())
        .with_interval(Duration::from_millis(5));
    (tx, runner)
}

// Drives the App the way main's event loop does, minus the terminal
fn drive<L, S>(app: &mut App<L, S>, runner: &TestRunner, max_steps: u32)
where
    L: LocationProvider,
    S: StateStore,
{
    for _ in 0..max_steps {
        match runner.step() {
            AppEvent::Tick(now) => app.on_tick(now),
            AppEvent::Resize => {}
            AppEvent::Key(k) => {
                app.on_tick(runner.now());
                match app.on_key(k) {
                    Control::Quit => return,
                    Control::Evaluate => app.run_action(),
                    Control::Continue | Control::OpenMap => {}
                }
            }
        }
    }
}

#[test]
fn headless_check_in_flow_persists_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state.db");
    let clock = ManualClock::new(t0());

    let store = SqliteStateStore::open(&db).unwrap();
    let mut app = App::load(engine_at(OFFICE, store), profile(), t0()).unwrap();
    assert!(!app.state.checked_in);

    let (tx, runner) = runner(&clock);
    // sample and open the confirm dialog, accept it, quit
    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(key(KeyCode::Char('y'))).unwrap();
    tx.send(key(KeyCode::Char('q'))).unwrap();

    drive(&mut app, &runner, 100);

    assert!(app.state.checked_in);
    assert!(app.alert.is_none());
    assert_eq!(
        app.state.status_message,
        "You Checked In at 9:00:00 AM\nLocation: 37.42210, -122.08410"
    );

    // a fresh store on the same file sees the same state
    let reopened = SqliteStateStore::open(&db).unwrap();
    assert_eq!(reopened.load().unwrap(), app.state);
    assert_eq!(reopened.load().unwrap().check_in_timestamp, Some(t0()));
}

#[test]
fn headless_short_shift_checkout_needs_second_confirmation() {
    let clock = ManualClock::new(t0());
    let store = SqliteStateStore::open_in_memory().unwrap();
    let mut app = App::load(engine_at(OFFICE, store), profile(), t0()).unwrap();
    let (tx, runner) = runner(&clock);

    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(key(KeyCode::Char('y'))).unwrap();
    tx.send(key(KeyCode::Char('q'))).unwrap();
    drive(&mut app, &runner, 100);
    assert!(app.state.checked_in);

    // two hours later: check-out goes straight to the minimum-hours warning
    clock.advance(TimeDelta::hours(2));
    tx.send(key(KeyCode::Enter)).unwrap();
    drive(&mut app, &runner, 10);

    let alert = app.alert.as_ref().expect("warning dialog");
    assert_eq!(alert.title, "Warning");
    assert!(alert
        .message
        .starts_with("You have worked only 2h 0m. Minimum 8 hours required!"));
    assert!(app.state.checked_in);
    assert!(app.engine.store().load().unwrap().checked_in);

    // accept "Check Out Anyway"
    tx.send(key(KeyCode::Char('y'))).unwrap();
    tx.send(key(KeyCode::Char('q'))).unwrap();
    drive(&mut app, &runner, 100);

    assert!(!app.state.checked_in);
    assert!(app.state.status_message.ends_with("Worked: 2h 0m"));
    let stored = app.engine.store().load().unwrap();
    assert!(!stored.checked_in);
    assert_eq!(stored.check_in_timestamp, None);
}

#[test]
fn headless_outside_geofence_offers_request() {
    let away = Coordinate::new(37.43210, -122.08410);
    let clock = ManualClock::new(t0());
    let store = SqliteStateStore::open_in_memory().unwrap();
    let mut app = App::load(engine_at(away, store), profile(), t0()).unwrap();
    let (tx, runner) = runner(&clock);

    // rejected before any confirmation is shown
    tx.send(key(KeyCode::Enter)).unwrap();
    drive(&mut app, &runner, 10);

    assert!(!app.state.checked_in);
    assert!(app.outside);
    assert_eq!(app.last_fix, Some(away));
    let alert = app.alert.as_ref().expect("error dialog");
    assert_eq!(alert.title, "Outside Allowed Area");

    // dismiss, then request attendance
    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(key(KeyCode::Char('r'))).unwrap();
    drive(&mut app, &runner, 10);

    let alert = app.alert.as_ref().expect("request dialog");
    assert_eq!(
        alert.message,
        "You are outside the allowed area. Attendance request submitted."
    );
    assert_eq!(app.engine.store().load().unwrap(), Default::default());
}

#[test]
fn headless_ticks_move_the_clock_only() {
    let clock = ManualClock::new(t0());
    let store = SqliteStateStore::open_in_memory().unwrap();
    let mut app = App::load(engine_at(OFFICE, store), profile(), t0()).unwrap();
    let (_tx, runner) = runner(&clock);

    clock.advance(TimeDelta::seconds(61));
    drive(&mut app, &runner, 3);

    assert_eq!(app.now, t0() + TimeDelta::seconds(61));
    assert_eq!(app.clock_text(), "9:01:01 AM");
    assert!(!app.state.checked_in);
    assert!(app.alert.is_none());
    assert_eq!(app.engine.store().load().unwrap(), Default::default());
}
