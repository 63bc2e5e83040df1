//! Layout and rendering
//!
//! Arc reactor on a braille canvas, status label, waveform bars, the
//! conversation log and the input line. Every color goes through
//! [`App::tint`] so the whole window follows the fade alpha.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        canvas::{Canvas, Context, Points},
        Block, Borders, Paragraph, Wrap,
    },
    Frame,
};

use super::app::App;
use crate::animation::{arc_points, bar_color, circle_points, Point, Rgb};
use crate::runtime::{Author, Status};

/// Reactor height in rows; the canvas is twice as wide to stay round
const REACTOR_ROWS: u16 = 13;
const WAVEFORM_ROWS: u16 = 4;

const RING_POINTS: usize = 120;
const ARC_POINTS: usize = 40;
/// Degrees covered by each rotating arc
const ARC_EXTENT: f64 = 80.0;

const PROCESSING: Rgb = Rgb::new(0xff, 0xaa, 0x00);
const ALERT: Rgb = Rgb::new(0xff, 0x44, 0x44);
const ERROR: Rgb = Rgb::new(0xff, 0x00, 0x00);
const DIM: Rgb = Rgb::new(0x88, 0x88, 0x88);

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    frame.render_widget(
        Block::default().style(Style::default().bg(app.theme.background.to_ratatui())),
        area,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // title
            Constraint::Length(REACTOR_ROWS),  // arc reactor
            Constraint::Length(1),             // status
            Constraint::Length(WAVEFORM_ROWS), // waveform
            Constraint::Min(3),                // conversation
            Constraint::Length(1),             // input
            Constraint::Length(1),             // hints
        ])
        .split(area);

    render_title(frame, chunks[0], app);
    render_reactor(frame, chunks[1], app);
    render_status(frame, chunks[2], app);
    render_waveform(frame, chunks[3], app);
    render_conversation(frame, chunks[4], app);
    render_input(frame, chunks[5], app);
    render_hints(frame, chunks[6], app);
}

fn render_title(frame: &mut Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled(
            "J.A.R.V.I.S",
            Style::default()
                .fg(app.tint(app.theme.primary))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", app.label), Style::default().fg(app.tint(DIM))),
    ]);
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn points(ctx: &mut Context<'_>, coords: &[Point], color: ratatui::style::Color) {
    let coords: Vec<(f64, f64)> = coords.iter().map(|p| (p.x, p.y)).collect();
    ctx.draw(&Points {
        coords: &coords,
        color,
    });
}

fn render_reactor(frame: &mut Frame, area: Rect, app: &App) {
    let width = (area.height * 2).min(area.width);
    let area = Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    };

    let center = Point::new(0.0, 0.0);
    let rings = app.animation.reactor_rings.max(1);
    let glow = app.tint(app.glow);
    let primary = app.tint(app.theme.primary);
    let secondary = app.tint(app.theme.secondary);
    let active = app.listening || app.speaking;

    let canvas = Canvas::default()
        .marker(Marker::Braille)
        .background_color(app.theme.background.to_ratatui())
        .x_bounds([-1.0, 1.0])
        .y_bounds([-1.0, 1.0])
        .paint(move |ctx| {
            for i in (1..=rings).rev() {
                let radius = 0.8 * i as f64 / rings as f64;
                points(ctx, &circle_points(center, radius + 0.06, RING_POINTS), glow);
                points(ctx, &circle_points(center, radius, RING_POINTS), primary);
            }

            if active {
                for i in 0..3 {
                    let start = app.angle + f64::from(i) * 120.0;
                    points(
                        ctx,
                        &arc_points(center, 0.9, start, start + ARC_EXTENT, ARC_POINTS),
                        secondary,
                    );
                }
            }

            for radius in [0.03, 0.06, 0.09] {
                points(ctx, &circle_points(center, radius, 16), primary);
            }
        });

    frame.render_widget(canvas, area);
}

fn status_color(app: &App) -> Rgb {
    match app.status {
        Status::Online => app.theme.primary,
        Status::Listening => app.theme.glow,
        Status::Processing => PROCESSING,
        Status::Speaking => app.theme.secondary,
        Status::NoSpeech | Status::NotUnderstood => ALERT,
        Status::Error => ERROR,
    }
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let style = Style::default()
        .fg(app.tint(status_color(app)))
        .add_modifier(Modifier::BOLD);
    frame.render_widget(
        Paragraph::new(Line::styled(app.status.label(), style)).alignment(Alignment::Center),
        area,
    );
}

/// Column heights in rows, one entry per bar, centered in `width`
fn bar_rows(heights: &[f64], rows: u16) -> Vec<u16> {
    heights
        .iter()
        .map(|h| ((h.clamp(0.0, 1.0) * f64::from(rows)).round() as u16).max(1))
        .collect()
}

fn render_waveform(frame: &mut Frame, area: Rect, app: &App) {
    let heights = app.waveform.heights();
    if heights.is_empty() || area.width == 0 {
        return;
    }

    // One column per bar plus a gap, trimmed to the visible width
    let visible = heights.len().min(usize::from(area.width / 2).max(1));
    let heights = &heights[..visible];
    let rows = bar_rows(heights, area.height);

    let lines: Vec<Line> = (0..area.height)
        .map(|row| {
            let level = area.height - row;
            let spans: Vec<Span> = heights
                .iter()
                .zip(&rows)
                .map(|(h, bar)| {
                    let color = app.tint(bar_color(*h, app.theme.primary));
                    let cell = if *bar >= level { "█ " } else { "  " };
                    Span::styled(cell, Style::default().fg(color))
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    frame.render_widget(
        Paragraph::new(Text::from(lines)).alignment(Alignment::Center),
        area,
    );
}

fn speaker_color(app: &App, speaker: Author) -> Rgb {
    match speaker {
        Author::Jarvis => app.theme.primary,
        Author::You => app.theme.text,
        Author::System => DIM,
    }
}

fn render_conversation(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(app.tint(app.theme.panel)))
        .style(Style::default().bg(app.theme.background.to_ratatui()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.messages {
        let color = app.tint(speaker_color(app, msg.speaker));
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}: ", msg.speaker.label()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(msg.text.clone(), Style::default().fg(color)),
        ]));
    }

    // Approximate wrapped height so the view sticks to the bottom
    let width = usize::from(inner.width.max(1));
    let total: usize = lines.iter().map(|l| l.width().max(1).div_ceil(width)).sum();
    let visible = usize::from(inner.height);
    let scroll_pos = total
        .saturating_sub(visible)
        .saturating_sub(usize::from(app.scroll));

    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .scroll((u16::try_from(scroll_pos).unwrap_or(u16::MAX), 0)),
        inner,
    );
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let prompt = Style::default().fg(app.tint(app.theme.primary));
    let line = if app.input.is_empty() {
        Line::from(vec![
            Span::styled("> ", prompt),
            Span::styled("Type a command...", Style::default().fg(app.tint(DIM))),
        ])
    } else {
        Line::from(vec![
            Span::styled("> ", prompt),
            Span::styled(app.input.as_str(), Style::default().fg(app.tint(app.theme.text))),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);

    if area.width > 2 {
        let offset = u16::try_from(app.cursor).unwrap_or(u16::MAX);
        let x = area.x.saturating_add(2).saturating_add(offset);
        frame.set_cursor_position((x.min(area.x + area.width - 1), area.y));
    }
}

fn render_hints(frame: &mut Frame, area: Rect, app: &App) {
    let listen = if app.voice_enabled() {
        "Tab listen • "
    } else {
        ""
    };
    let hints = format!(
        "Enter send • {listen}Ctrl+S stop • Ctrl+R reset • Ctrl+Y copy • Esc close"
    );
    frame.render_widget(
        Paragraph::new(Line::styled(hints, Style::default().fg(app.tint(DIM))))
            .alignment(Alignment::Center),
        area,
    );
}
