use geoattend::app::{Alert, AlertKind, ButtonStyle};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

const MAX_WIDTH: u16 = 60;
const ORANGE: Color = Color::Rgb(255, 152, 0);

/// Centered rect sized to the message, clamped to `area`
pub fn alert_rect(alert: &Alert, area: Rect) -> Rect {
    let text_width = alert
        .message
        .lines()
        .map(UnicodeWidthStr::width)
        .chain(std::iter::once(alert.title.width() + 4))
        .max()
        .unwrap_or(0) as u16;
    let width = (text_width + 4).clamp(24, MAX_WIDTH).min(area.width);

    let inner = width.saturating_sub(4).max(1) as usize;
    let wrapped_lines: usize = alert
        .message
        .lines()
        .map(|l| l.width().max(1).div_ceil(inner))
        .sum();
    // borders + blank + buttons
    let height = (wrapped_lines as u16 + 5).min(area.height);

    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

fn button_span(text: &str, style: ButtonStyle, selected: bool) -> Span<'static> {
    let base = match style {
        ButtonStyle::Default => Style::default().fg(Color::White).bg(Color::Blue),
        ButtonStyle::Cancel => Style::default().fg(Color::Gray),
        ButtonStyle::Destructive => Style::default().fg(Color::White).bg(Color::Red),
    };
    let style = if selected {
        base.add_modifier(Modifier::BOLD | Modifier::REVERSED)
    } else {
        base
    };
    Span::styled(format!(" {text} "), style)
}

pub fn render_alert(alert: &Alert, area: Rect, buf: &mut Buffer) {
    let rect = alert_rect(alert, area);
    Clear.render(rect, buf);

    let (icon, title_color) = match alert.kind {
        AlertKind::Warning => ("⚠", ORANGE),
        AlertKind::Info => ("ℹ", Color::Blue),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(title_color))
        .title(Span::styled(
            format!(" {icon} {} ", alert.title),
            Style::default().fg(title_color).add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(rect);
    block.render(rect, buf);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(1)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    Paragraph::new(alert.message.as_str())
        .style(Style::default().fg(Color::Gray))
        .wrap(Wrap { trim: false })
        .render(chunks[0], buf);

    let mut spans = Vec::new();
    for (i, button) in alert.buttons.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(button_span(button.text, button.style, i == alert.selected));
    }
    Paragraph::new(Line::from(spans))
        .alignment(Alignment::Right)
        .render(chunks[1], buf);
}
