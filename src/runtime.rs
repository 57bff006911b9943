//! Event plumbing for the attendance screen.
//!
//! A [`Runner`] waits on an [`AppEventSource`] until the next clock tick is
//! due. Ticks are aligned to whole multiples of the tick interval on the
//! runner's [`Clock`] and carry the time they were taken at, so the on-screen
//! clock flips exactly on the second and tests can run on a manual clock.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// The on-screen clock refreshes once per second
pub const CLOCK_TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// The clock reached a tick boundary
    Tick(DateTime<Utc>),
}

/// Source of terminal events (keyboard, resize)
pub trait AppEventSource: Send + 'static {
    /// Block for up to `timeout`; `Err(Timeout)` when nothing arrived.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                // Windows reports releases too; only presses drive the app
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => AppEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Channel-fed event source for tests
pub struct TestEventSource {
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl AppEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Time left until the next multiple of `interval` since the epoch
pub fn until_next_tick(now: DateTime<Utc>, interval: Duration) -> Duration {
    let period = interval.as_millis().max(1) as i64;
    let into = now.timestamp_millis().rem_euclid(period);
    Duration::from_millis((period - into) as u64)
}

/// Advances the application one event or tick at a time
pub struct Runner<E: AppEventSource, C: Clock> {
    event_source: E,
    clock: C,
    interval: Duration,
}

impl<E: AppEventSource, C: Clock> Runner<E, C> {
    pub fn new(event_source: E, clock: C) -> Self {
        Self {
            event_source,
            clock,
            interval: CLOCK_TICK,
        }
    }

    /// Tick more often than [`CLOCK_TICK`]; tests use a few milliseconds
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Blocks until an event arrives or the next tick is due
    pub fn step(&self) -> AppEvent {
        let timeout = until_next_tick(self.clock.now(), self.interval);
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                AppEvent::Tick(self.clock.now())
            }
        }
    }
}
