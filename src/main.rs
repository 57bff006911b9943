pub mod ui;

use chrono::Utc;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use geoattend::{
    app::{App, Control, Profile},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    engine::{AttendanceEngine, AttendanceResult},
    geo::{distance_meters, Coordinate},
    location::{
        FilePositionSource, FixedPositionSource, LocationError, LocationProvider, PositionSource,
        RetryingLocationProvider,
    },
    logging,
    runtime::{AppEvent, AppEventSource, Clock, CrosstermEventSource, Runner, SystemClock},
    store::{SqliteStateStore, StateStore},
    util::{display_offset, format_clock, format_location, format_worked, worked_duration},
    AttendanceError,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
    process::ExitCode,
};
use tracing::{info, warn};
use webbrowser::Browser;

/// terminal attendance tracker gated on a geofence
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Check in and out from a terminal. Each action samples the current position and is only allowed inside the configured office geofence; checking out before the minimum worked hours asks for a second confirmation."
)]
pub struct Cli {
    /// path to the JSON config file
    #[clap(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// path to the attendance state database
    #[clap(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// report this position instead of reading a device
    #[clap(short = 'a', long, value_name = "LAT,LON", allow_hyphen_values = true)]
    at: Option<Coordinate>,

    /// read the position from a JSON file ({"latitude":..,"longitude":..}) on every request
    #[clap(long, value_name = "PATH")]
    location_file: Option<PathBuf>,

    /// behave as if location permission was refused
    #[clap(long)]
    deny_location: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// print the persisted attendance state
    Status,
    /// check in or out once without the TUI
    Toggle {
        /// accept the short-shift warning on check-out
        #[clap(short = 'y', long)]
        yes: bool,
    },
    /// send an attendance request from outside the geofence
    Request,
    /// print the distance from the current position to the office
    Distance,
}

/// The position source picked from flags and config
#[derive(Debug, Clone)]
pub enum Source {
    Fixed(FixedPositionSource),
    File(FilePositionSource),
}

impl PositionSource for Source {
    fn request_permission(&self) -> bool {
        match self {
            Source::Fixed(s) => s.request_permission(),
            Source::File(s) => s.request_permission(),
        }
    }

    fn read_position(&self) -> Result<Coordinate, LocationError> {
        match self {
            Source::Fixed(s) => s.read_position(),
            Source::File(s) => s.read_position(),
        }
    }
}

impl Cli {
    fn source(&self, config: &Config) -> Source {
        if self.deny_location {
            return Source::Fixed(FixedPositionSource::denied());
        }
        if let Some(at) = self.at {
            return Source::Fixed(FixedPositionSource::new(at));
        }
        match self.location_file.as_ref().or(config.location_file.as_ref()) {
            Some(path) => Source::File(FilePositionSource::new(path)),
            None => {
                warn!("no position source configured; location requests will fail");
                Source::Fixed(FixedPositionSource::without_fix())
            }
        }
    }
}

type Engine<S> = AttendanceEngine<RetryingLocationProvider<Source>, S>;

const INSIDE_NO_REQUEST: &str = "You are inside the allowed area; check in or out instead.";

fn build_engine<S: StateStore>(cli: &Cli, config: &Config, store: S) -> Engine<S> {
    let provider = RetryingLocationProvider::new(cli.source(config), config.retry_policy());
    AttendanceEngine::new(config.geofence, provider, store)
        .with_policy(config.work_policy())
        .with_display_offset(display_offset(config.display_utc_offset_minutes))
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();

    let _log_guard = match AppDirs::log_dir() {
        Some(dir) => Some(logging::init(&dir)?),
        None => None,
    };

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let config = config_store.load();
    config.validate()?;

    let store = match cli.db.as_ref() {
        Some(path) => SqliteStateStore::open(path)?,
        None => SqliteStateStore::open_default()?,
    };
    let engine = build_engine(&cli, &config, store);
    info!(command = ?cli.command, "starting");

    let mut out = io::stdout();
    match cli.command.clone() {
        None => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            let profile = Profile {
                name: config.employee_name.clone(),
                id: config.employee_id.clone(),
            };
            let mut app = App::load(engine, profile, Utc::now())?;
            run_tui(&mut app)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Status) => {
            print_status(&engine, &mut out)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Toggle { yes }) => {
            let result = toggle(&engine, yes)?;
            writeln_result(&result, &mut out)?;
            Ok(if result.is_committed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(Command::Request) => request(&engine, &mut out),
        Some(Command::Distance) => print_distance(&engine, &mut out),
    }
}

/// One headless action. With `yes`, a short-shift warning is accepted immediately.
fn toggle<S: StateStore>(
    engine: &Engine<S>,
    yes: bool,
) -> Result<AttendanceResult, Box<dyn Error>> {
    let state = engine.store().load()?;
    let result = engine.evaluate_action(&state, Utc::now());
    match result.pending {
        Some(pending) if result.requires_confirmation && yes => {
            Ok(engine.confirm(&pending, &state, Utc::now()))
        }
        _ => Ok(result),
    }
}

fn writeln_result(result: &AttendanceResult, out: &mut impl Write) -> io::Result<()> {
    if let Some(e) = result.error.as_ref() {
        writeln!(out, "{}: {}", e.title(), result.user_message)
    } else if result.requires_confirmation {
        writeln!(out, "{}\n(re-run with --yes to check out anyway)", result.user_message)
    } else {
        writeln!(out, "{}", result.user_message)
    }
}

fn print_status<S: StateStore>(
    engine: &Engine<S>,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let state = engine.store().load()?;
    match (state.checked_in, state.check_in_timestamp) {
        (true, Some(since)) => writeln!(
            out,
            "Checked in since {} (worked {})",
            format_clock(since, engine.display_offset()),
            format_worked(worked_duration(since, Utc::now()))
        )?,
        (true, None) => writeln!(out, "Checked in")?,
        (false, _) => writeln!(out, "Checked out")?,
    }
    if !state.status_message.is_empty() {
        writeln!(out, "{}", state.status_message)?;
    }
    Ok(())
}

/// Only a sample outside the geofence can be turned into a request
fn request<S: StateStore>(
    engine: &Engine<S>,
    out: &mut impl Write,
) -> Result<ExitCode, Box<dyn Error>> {
    match engine.location().request_current_location() {
        Ok(fix) if engine.area().contains(fix) => {
            writeln!(out, "{INSIDE_NO_REQUEST}\n{}", format_location(fix))?;
            Ok(ExitCode::FAILURE)
        }
        Ok(fix) => {
            writeln!(out, "{}", engine.request_attendance(Some(fix)))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let e = AttendanceError::from(e);
            writeln!(out, "{}: {e}", e.title())?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_distance<S: StateStore>(
    engine: &Engine<S>,
    out: &mut impl Write,
) -> Result<ExitCode, Box<dyn Error>> {
    match engine.location().request_current_location() {
        Ok(fix) => {
            let area = engine.area();
            let verdict = if area.contains(fix) { "inside" } else { "outside" };
            writeln!(
                out,
                "{:.1} m from office ({verdict} the allowed area)",
                distance_meters(fix, area.center())
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            writeln!(out, "{e}")?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_tui<L: LocationProvider, S: StateStore>(
    app: &mut App<L, S>,
) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(CrosstermEventSource::new(), SystemClock);
    let res = event_loop(&mut terminal, app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn event_loop<B, L, S, E, C>(
    terminal: &mut Terminal<B>,
    app: &mut App<L, S>,
    runner: &Runner<E, C>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    L: LocationProvider,
    S: StateStore,
    E: AppEventSource,
    C: Clock,
{
    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        match runner.step() {
            AppEvent::Tick(now) => app.on_tick(now),
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                app.on_tick(runner.now());
                match app.on_key(key) {
                    Control::Quit => break,
                    Control::Continue => {}
                    Control::OpenMap => open_map(app.engine.area().center()),
                    Control::Evaluate => {
                        // show "Locating…" while the retry loop runs
                        terminal.draw(|f| ui::draw(app, f))?;
                        app.run_action();
                    }
                }
            }
        }
    }

    Ok(())
}

fn osm_url(center: Coordinate) -> String {
    format!(
        "https://www.openstreetmap.org/?mlat={lat:.5}&mlon={lon:.5}#map=17/{lat:.5}/{lon:.5}",
        lat = center.latitude,
        lon = center.longitude
    )
}

fn open_map(center: Coordinate) {
    if Browser::is_available() {
        if let Err(e) = webbrowser::open(&osm_url(center)) {
            warn!(error = %e, "could not open browser");
        }
    }
}
