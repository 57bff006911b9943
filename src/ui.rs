pub mod alert;
pub mod map;

use geoattend::{
    app::App,
    engine::Action,
    location::LocationProvider,
    store::StateStore,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const HORIZONTAL_MARGIN: u16 = 2;
const BLUE: Color = Color::Rgb(33, 150, 243);
const GREEN: Color = Color::Rgb(76, 175, 80);
const RED: Color = Color::Rgb(244, 67, 54);
const ORANGE: Color = Color::Rgb(255, 152, 0);

/// Row heights for the vertical stack, in render order
fn section_heights<L: LocationProvider, S: StateStore>(app: &App<L, S>) -> Vec<Constraint> {
    let status_lines = if app.state.status_message.is_empty() {
        0
    } else {
        app.state.status_message.lines().count() as u16 + 2
    };

    let request_lines = if app.outside { 3 } else { 0 };
    let worked_lines = if app.worked_text().is_some() { 3 } else { 0 };

    vec![
        Constraint::Length(1),             // title bar
        Constraint::Length(3),             // profile card
        Constraint::Min(8),                // map
        Constraint::Length(3),             // clock
        Constraint::Length(3),             // main button
        Constraint::Length(request_lines), // request button
        Constraint::Length(status_lines),  // status card
        Constraint::Length(worked_lines),  // worked time
        Constraint::Length(1),             // key help
    ]
}

fn button(label: &str, color: Color, dimmed: bool) -> Paragraph<'static> {
    let mut style = Style::default()
        .fg(Color::White)
        .bg(color)
        .add_modifier(Modifier::BOLD);
    if dimmed {
        style = style.add_modifier(Modifier::DIM);
    }
    Paragraph::new(label.to_string())
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)))
}

pub fn draw<L: LocationProvider, S: StateStore>(app: &App<L, S>, f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(section_heights(app))
        .split(area);

    let title = Paragraph::new("Attendance Tracker")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White).bg(BLUE).add_modifier(Modifier::BOLD));
    f.render_widget(title, chunks[0]);

    let profile = Paragraph::new(Line::from(vec![
        Span::styled(
            app.profile.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            format!("ID: {}", app.profile.id),
            Style::default().fg(Color::Gray),
        ),
        Span::styled("  ●", Style::default().fg(GREEN)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(profile, chunks[1]);

    f.render_widget(
        map::geofence_canvas(*app.engine.area(), app.last_fix, app.outside),
        chunks[2],
    );

    let clock = Paragraph::new(Span::styled(
        format!("🕒 {}", app.clock_text()),
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(clock, chunks[3]);

    let (label, color) = match app.next_action() {
        Action::CheckIn => ("Check In", GREEN),
        Action::CheckOut => ("Check Out", RED),
    };
    let label = if app.is_busy() { "Locating…" } else { label };
    f.render_widget(
        button(label, color, app.alert.is_some() || app.is_busy()),
        chunks[4],
    );

    if app.outside {
        f.render_widget(button("Request Attendance (r)", ORANGE, app.alert.is_some()), chunks[5]);
    }

    if !app.state.status_message.is_empty() {
        let status = Paragraph::new(app.state.status_message.as_str())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(BLUE))
                    .title("Status"),
            );
        f.render_widget(status, chunks[6]);
    }

    if let Some(worked) = app.worked_text() {
        let card = Paragraph::new(format!("Worked Time: {worked}"))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(GREEN)),
            );
        f.render_widget(card, chunks[7]);
    }

    let help = Paragraph::new("(enter) toggle | (r)equest | (o)pen map | (q)uit")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC));
    f.render_widget(help, chunks[8]);

    if let Some(alert) = app.alert.as_ref() {
        alert::render_alert(alert, area, f.buffer_mut());
    }
}
