//! Drawing the transcript, status line and input

use crate::surface::{format, Node, NodeIndex, ToolCard, Transcript};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthChar;

const USER_PREFIX: &str = "› ";
const BODY_INDENT: &str = "    ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChatLayout {
    pub history: Rect,
    pub status: Rect,
    pub input: Rect,
}

pub fn split_layout(area: Rect, input_rows: u16) -> ChatLayout {
    let max_input = area.height.saturating_sub(4).max(1);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(input_rows.clamp(1, max_input)),
        ])
        .split(area);

    ChatLayout {
        history: chunks[0],
        status: chunks[1],
        input: chunks[2],
    }
}

/// Transcript flattened to display rows, plus the rows holding card headers
pub struct RenderedTranscript {
    pub lines: Vec<Line<'static>>,
    pub headers: Vec<(usize, NodeIndex)>,
}

impl RenderedTranscript {
    /// Card whose header sits on display row `row`
    pub fn card_at(&self, row: usize) -> Option<NodeIndex> {
        self.headers
            .iter()
            .find(|(header_row, _)| *header_row == row)
            .map(|(_, index)| *index)
    }
}

pub fn layout_transcript(transcript: &Transcript, width: usize) -> RenderedTranscript {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut headers = Vec::new();

    for (index, node) in transcript.nodes().iter().enumerate() {
        if index > 0 {
            lines.push(Line::default());
        }
        match node {
            Node::User(text) => push_prefixed(
                &mut lines,
                text,
                USER_PREFIX,
                width,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Node::Assistant(text) => {
                push_prefixed(&mut lines, text, "", width, Style::default().fg(Color::White));
            }
            Node::ToolCard(card) => {
                headers.push((lines.len(), index));
                push_card(&mut lines, card, width);
            }
            Node::StandaloneResult(text) => push_prefixed(
                &mut lines,
                &format::result_line(text),
                "",
                width,
                Style::default().fg(Color::Green),
            ),
            Node::Error(message) => push_prefixed(
                &mut lines,
                &format::error_line(message),
                "",
                width,
                Style::default().fg(Color::Red),
            ),
        }
    }

    if transcript.typing() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::styled(
            "…",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::SLOW_BLINK),
        ));
    }

    RenderedTranscript { lines, headers }
}

fn push_card(lines: &mut Vec<Line<'static>>, card: &ToolCard, width: usize) {
    let marker = if card.collapsed { "▸ " } else { "▾ " };
    push_prefixed(
        lines,
        &card.header(),
        marker,
        width,
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    );
    if card.collapsed {
        return;
    }
    let style = if card.is_waiting() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Gray)
    };
    for body in card.body() {
        push_prefixed(lines, &body, BODY_INDENT, width, style);
    }
}

/// Wrap `text` to `width`, putting `prefix` on the first row and matching
/// blank indentation on the rest.
fn push_prefixed(
    lines: &mut Vec<Line<'static>>,
    text: &str,
    prefix: &str,
    width: usize,
    style: Style,
) {
    let prefix_width = display_width(prefix);
    let indent = " ".repeat(prefix_width);
    let rows = wrap_text(text, width.saturating_sub(prefix_width).max(1));
    for (i, row) in rows.into_iter().enumerate() {
        let lead = if i == 0 { prefix.to_string() } else { indent.clone() };
        lines.push(Line::from(vec![
            Span::styled(lead, style),
            Span::styled(row, style),
        ]));
    }
}

/// Hard-wrap by display width, honouring embedded newlines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = vec![String::new()];
    let mut used = 0usize;

    for ch in text.chars() {
        match ch {
            '\r' => continue,
            '\n' => {
                rows.push(String::new());
                used = 0;
                continue;
            }
            _ => {}
        }
        let ch_width = char_display_width(ch);
        if used + ch_width > width && used > 0 {
            rows.push(String::new());
            used = 0;
        }
        if let Some(row) = rows.last_mut() {
            row.push(ch);
        }
        used += ch_width;
    }
    rows
}

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}

/// Row and column of a byte cursor inside wrapped input
pub fn cursor_row_col(input: &str, cursor: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let cursor = cursor.min(input.len());
    let (mut row, mut col) = (0usize, 0usize);

    for (idx, ch) in input.char_indices() {
        if idx >= cursor {
            break;
        }
        if ch == '\n' {
            row += 1;
            col = 0;
            continue;
        }
        let ch_width = char_display_width(ch);
        if col + ch_width > width && col > 0 {
            row += 1;
            col = 0;
        }
        col += ch_width;
    }
    if col >= width {
        row += 1;
        col = 0;
    }
    (row, col)
}

pub fn input_rows(input: &str, width: usize) -> u16 {
    u16::try_from(wrap_text(input, width).len()).unwrap_or(u16::MAX)
}

pub fn render_history(frame: &mut Frame<'_>, area: Rect, lines: &[Line<'static>], scroll: usize) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let end = (scroll + area.height as usize).min(lines.len());
    let visible = lines.get(scroll..end).unwrap_or_default().to_vec();
    frame.render_widget(Paragraph::new(visible), area);
}

pub fn render_status(frame: &mut Frame<'_>, area: Rect, title: &str, awaiting: bool) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let state = if awaiting { "waiting for reply" } else { "ready" };
    let text = format!(
        "{title} · {state} · Enter send · Shift+Enter newline · Ctrl+T toggle card · Esc quit"
    );
    frame.render_widget(
        Paragraph::new(truncate_to_width(&text, area.width as usize))
            .style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

pub fn render_input(frame: &mut Frame<'_>, area: Rect, input: &str, cursor: usize, enabled: bool) {
    if area.height == 0 || area.width <= 2 {
        return;
    }
    let width = area.width.saturating_sub(2).max(1) as usize;
    let rows = wrap_text(input, width);
    let (cursor_row, cursor_col) = cursor_row_col(input, cursor, width);
    let visible_rows = area.height as usize;
    let window_start = cursor_row.saturating_add(1).saturating_sub(visible_rows);

    let style = if enabled {
        Style::default().fg(Color::White).bg(Color::Rgb(24, 24, 24))
    } else {
        Style::default()
            .fg(Color::Gray)
            .bg(Color::Rgb(24, 24, 24))
            .add_modifier(Modifier::DIM)
    };

    let rendered: Vec<Line<'static>> = (0..visible_rows)
        .map(|offset| {
            let row_index = window_start + offset;
            let prefix = if row_index == 0 { "> " } else { "  " };
            let row = rows.get(row_index).cloned().unwrap_or_default();
            Line::from(format!("{prefix}{row}"))
        })
        .collect();
    frame.render_widget(Paragraph::new(rendered).style(style), area);

    if enabled {
        let y = area
            .y
            .saturating_add(u16::try_from(cursor_row - window_start).unwrap_or(0));
        let x = area
            .x
            .saturating_add(2 + u16::try_from(cursor_col).unwrap_or(0))
            .min(area.x.saturating_add(area.width.saturating_sub(1)));
        frame.set_cursor_position((x, y));
    }
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > max_width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StreamEvent;
    use crate::surface::{reduce, Action};
    use serde_json::json;

    fn plain(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_by_display_width() {
        assert_eq!(wrap_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
        assert_eq!(wrap_text("日本語", 4), vec!["日本", "語"]);
        assert_eq!(wrap_text("", 4), vec![""]);
    }

    #[test]
    fn test_cursor_row_col() {
        assert_eq!(cursor_row_col("abcdef", 6, 4), (1, 2));
        assert_eq!(cursor_row_col("ab\ncd", 3, 10), (1, 0));
        assert_eq!(cursor_row_col("abcd", 4, 4), (1, 0));
    }

    #[test]
    fn test_layout_splits_panes() {
        let panes = split_layout(Rect::new(0, 0, 80, 20), 3);
        assert_eq!(panes.history.height, 16);
        assert_eq!(panes.status.y, 16);
        assert_eq!(panes.input.height, 3);
    }

    #[test]
    fn test_card_layout_and_header_rows() {
        let mut t = Transcript::new();
        reduce(&mut t, Action::Submit("price of bitcoin".into()));
        reduce(
            &mut t,
            Action::Stream(StreamEvent::tool_call("t1", "Price", json!({"coin_id": "bitcoin"}))),
        );

        let rendered = layout_transcript(&t, 80);
        let text: Vec<String> = rendered.lines.iter().map(plain).collect();
        assert_eq!(
            text,
            vec![
                "› price of bitcoin".to_string(),
                String::new(),
                "▾ 🔧 Skill Use: Price".to_string(),
                format!("{BODY_INDENT}Arguments: {{\"coin_id\":\"bitcoin\"}}"),
                format!("{BODY_INDENT}{}", format::WAITING),
            ]
        );
        assert_eq!(rendered.card_at(2), Some(1));
        assert_eq!(rendered.card_at(3), None);

        reduce(&mut t, Action::ToggleCard(1));
        let collapsed = layout_transcript(&t, 80);
        assert_eq!(collapsed.lines.len(), 3);
        assert_eq!(plain(&collapsed.lines[2]), "▸ 🔧 Skill Use: Price");
    }

    #[test]
    fn test_typing_indicator_row() {
        let mut t = Transcript::new();
        reduce(&mut t, Action::Submit("hello".into()));
        let rendered = layout_transcript(&t, 80);
        assert_eq!(rendered.lines.len(), 3);
        assert_eq!(plain(&rendered.lines[2]), "…");
    }
}
