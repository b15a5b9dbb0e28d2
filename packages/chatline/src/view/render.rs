use chat_protocol::{Message, Role};
use chrono::Local;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Paragraph},
};
use unicode_width::UnicodeWidthChar;

use super::state::ConversationView;

const TITLE: &str = " Conversational Bot ";
const WELCOME_TITLE: &str = "Welcome!";
const WELCOME_HINT: &str = "Start a conversation or upload files to get started.";
const TYPING: &str = "Agent is typing…";
const UPLOADING: &str = "Uploading…";

/// Draw the full chat screen.
pub fn render(frame: &mut Frame, view: &ConversationView) {
    let [thread_area, composer_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(frame.area());

    render_thread(frame, thread_area, view);
    render_composer(frame, composer_area, view);

    if let Some(alert) = view.alert() {
        render_alert(frame, alert);
    }
}

fn connection_indicator(view: &ConversationView) -> Line<'static> {
    if view.connection().is_connected() {
        Line::styled("● Connected ", Style::default().fg(Color::Green))
    } else {
        Line::styled("○ Disconnected ", Style::default().fg(Color::Red))
    }
}

fn render_thread(frame: &mut Frame, area: Rect, view: &ConversationView) {
    let mut block = Block::default().title(Line::styled(
        TITLE,
        Style::default().add_modifier(Modifier::BOLD),
    ));
    // Right-aligned titles stack leftwards, so the indicator stays at the edge.
    if view.is_uploading() {
        block = block.title(
            Line::styled(UPLOADING, Style::default().fg(Color::Yellow))
                .alignment(Alignment::Right),
        );
    }
    let block = block
        .title(connection_indicator(view).alignment(Alignment::Right))
        .borders(Borders::ALL)
        .padding(Padding::horizontal(1));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if view.messages().is_empty() && !view.is_loading() {
        render_welcome(frame, inner);
        return;
    }

    let width = usize::from(inner.width.max(1));
    let mut lines: Vec<Line> = Vec::new();
    for message in view.messages() {
        push_message(&mut lines, message, width);
    }
    if view.is_loading() {
        lines.push(Line::styled(
            TYPING,
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ));
    }

    // Keep the newest line at the bottom edge.
    let overflow = lines.len().saturating_sub(usize::from(inner.height));
    let scroll = u16::try_from(overflow).unwrap_or(u16::MAX);
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), inner);
}

fn render_welcome(frame: &mut Frame, area: Rect) {
    let top = area.height.saturating_sub(2) / 2;
    let [_, text_area] =
        Layout::vertical([Constraint::Length(top), Constraint::Min(0)]).areas(area);
    let welcome = Paragraph::new(vec![
        Line::styled(WELCOME_TITLE, Style::default().add_modifier(Modifier::BOLD)),
        Line::styled(WELCOME_HINT, Style::default().add_modifier(Modifier::DIM)),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(welcome, text_area);
}

fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Cyan),
        Role::Agent => Style::default().fg(Color::Magenta),
        Role::Error => Style::default().fg(Color::Red),
    }
}

fn push_message(lines: &mut Vec<Line<'static>>, message: &Message, width: usize) {
    let time = message.created_at.with_timezone(&Local).format("%H:%M");
    lines.push(Line::from(vec![
        Span::styled(
            message.role.label(),
            role_style(message.role).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {time}"), Style::default().add_modifier(Modifier::DIM)),
    ]));

    let body_style = match message.role {
        Role::Error => Style::default().fg(Color::Red),
        _ => Style::default(),
    };
    for row in wrap_text(&message.text, width) {
        lines.push(Line::styled(row, body_style));
    }
    lines.push(Line::default());
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

/// Hard-wrap on terminal columns so the scroll offset matches what is drawn.
/// A wide char that does not fit the rest of a row moves to the next one.
pub(crate) fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    for line in text.split('\n') {
        let mut row = String::new();
        let mut used = 0;
        for c in line.chars() {
            let w = char_width(c);
            if used + w > width && !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                used = 0;
            }
            row.push(c);
            used += w;
        }
        rows.push(row);
    }
    rows
}

/// The part of `text` that fits in `width` columns with the cursor on
/// screen, and the cursor's column within it.
fn visible_window(text: &str, cursor_col: usize, width: usize) -> (String, usize) {
    let width = width.max(1);
    let mut chars = text.chars();
    let mut skipped = 0;
    // The cursor needs one free cell after the text before it.
    while cursor_col.saturating_sub(skipped) + 1 > width {
        match chars.next() {
            Some(c) => skipped += char_width(c),
            None => break,
        }
    }

    let mut used = 0;
    let mut visible = String::new();
    for c in chars {
        let w = char_width(c);
        if used + w > width {
            break;
        }
        used += w;
        visible.push(c);
    }
    (visible, cursor_col.saturating_sub(skipped))
}

fn render_composer(frame: &mut Frame, area: Rect, view: &ConversationView) {
    let (title, input, placeholder) = match view.attach_prompt() {
        Some(prompt) if view.is_uploading() => (" Uploading… ", prompt, None),
        Some(prompt) => (" Attach files (quote paths that contain spaces) ", prompt, None),
        None if !view.connection().is_connected() => {
            (" Message ", view.composer(), Some("Waiting for connection…"))
        }
        None => (" Message ", view.composer(), None),
    };

    let hints = if view.attach_prompt().is_some() {
        " enter upload · esc cancel "
    } else {
        " enter send · ctrl-o attach · esc quit "
    };

    let block = Block::default()
        .title(title)
        .title_bottom(Line::styled(hints, Style::default().add_modifier(Modifier::DIM)))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if input.text().is_empty() {
        if let Some(placeholder) = placeholder {
            frame.render_widget(
                Paragraph::new(Line::styled(
                    placeholder,
                    Style::default().add_modifier(Modifier::DIM),
                )),
                inner,
            );
        }
    }

    // Scroll horizontally so the cursor stays visible.
    let (visible, col) =
        visible_window(input.text(), input.cursor_col(), usize::from(inner.width));
    if !visible.is_empty() {
        frame.render_widget(Paragraph::new(visible), inner);
    }

    if view.alert().is_none() && !view.is_uploading() {
        let x = inner.x + u16::try_from(col).unwrap_or(0);
        frame.set_cursor_position((x, inner.y));
    }
}

fn render_alert(frame: &mut Frame, text: &str) {
    let area = centered(frame.area(), 50, 5);
    let block = Block::default()
        .title(" Alert ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .padding(Padding::horizontal(1));
    let body = Paragraph::new(vec![
        Line::raw(text.to_string()),
        Line::styled(
            "press any key",
            Style::default().add_modifier(Modifier::DIM),
        ),
    ])
    .block(block)
    .alignment(Alignment::Center);
    frame.render_widget(Clear, area);
    frame.render_widget(body, area);
}

/// A box of `height` rows and at least `min_width` columns, centred in `area`.
fn centered(area: Rect, min_width: u16, height: u16) -> Rect {
    let width = min_width.max(area.width * 3 / 5).min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
