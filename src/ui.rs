//! Terminal rendering
//!
//! Turns color-tagged text into styled ratatui lines and lays out the dashboard.

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span, Text},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::app::{header_text, legend_text, App};

// ===============================
// Markup
// ===============================

fn tag_color(tag: &str) -> Option<Color> {
    match tag {
        "white" => Some(Color::White),
        "red" => Some(Color::Red),
        "blue" => Some(Color::Blue),
        "yellow" => Some(Color::Yellow),
        "green" => Some(Color::Green),
        _ => None,
    }
}

/// Parse one line of color-tagged text into styled spans.
///
/// A recognised `[color]` tag switches the style for the rest of the line;
/// any other bracketed text is kept as-is.
fn parse_line(line: &str, base: Style) -> Line<'static> {
    let mut spans = Vec::new();
    let mut style = base;
    let mut run = String::new();
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let (before, from_open) = rest.split_at(open);
        run.push_str(before);

        let color = from_open
            .find(']')
            .and_then(|close| tag_color(&from_open[1..close]).map(|c| (c, close)));
        match color {
            Some((color, close)) => {
                if !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), style));
                }
                style = style.fg(color);
                rest = &from_open[close + 1..];
            }
            None => {
                run.push('[');
                rest = &from_open[1..];
            }
        }
    }
    run.push_str(rest);
    if !run.is_empty() {
        spans.push(Span::styled(run, style));
    }
    Line::from(spans)
}

/// Parse color-tagged text; the style resets at each line break
pub fn parse_markup(text: &str, base: Style) -> Text<'static> {
    Text::from(text.lines().map(|line| parse_line(line, base)).collect::<Vec<_>>())
}

// ===============================
// Top-level draw
// ===============================
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // header
            Constraint::Min(0),    // data
            Constraint::Length(2), // legend
            Constraint::Length(2), // footer
        ])
        .split(f.area());

    let chrome = Style::default().fg(Color::Green);

    f.render_widget(Paragraph::new(parse_markup(&header_text(), chrome)), chunks[0]);
    f.render_widget(
        Paragraph::new(parse_markup(app.content(), Style::default())).wrap(Wrap { trim: false }),
        chunks[1],
    );
    f.render_widget(Paragraph::new(parse_markup(&legend_text(), chrome)), chunks[2]);
    f.render_widget(Paragraph::new(parse_markup(app.footer(), Style::default())), chunks[3]);
}
