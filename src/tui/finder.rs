use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::theme::Theme;
use crate::util::unicode::truncate_to_width;

/// An entry in the finder results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderItem {
    pub title: String,
    pub path: String,
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinderEvent {
    /// The query text changed; the app re-runs the search and calls
    /// set_items with the results.
    QueryChanged(String),
    Selected(String),
    /// Enter on an empty result list with a non-empty query. The app is
    /// expected to confirm before creating anything.
    CreateRequest(String),
    Closed,
}

/// Fuzzy note finder overlay.
pub struct Finder {
    input: String,
    items: Vec<FinderItem>,
    cursor: usize,
    width: u16,
    height: u16,
    visible: bool,
}

impl Finder {
    pub fn new() -> Finder {
        Finder {
            input: String::new(),
            items: Vec::new(),
            cursor: 0,
            width: 0,
            height: 0,
            visible: false,
        }
    }

    /// Open with an empty query. The app follows up with the initial
    /// (match-all) result set.
    pub fn show(&mut self) {
        self.visible = true;
        self.input.clear();
        self.cursor = 0;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn query(&self) -> &str {
        &self.input
    }

    pub fn set_items(&mut self, items: Vec<FinderItem>) {
        self.items = items;
        self.cursor = 0;
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    fn max_results(&self) -> usize {
        ((self.height as usize) / 2).saturating_sub(4).max(5)
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Option<FinderEvent> {
        if !self.visible {
            return None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.visible = false;
                return Some(FinderEvent::Closed);
            }
            KeyCode::Enter => {
                if let Some(item) = self.items.get(self.cursor) {
                    let path = item.path.clone();
                    self.visible = false;
                    return Some(FinderEvent::Selected(path));
                }
                // No results: request note creation from the query.
                let query = self.input.trim().to_string();
                if !query.is_empty() {
                    return Some(FinderEvent::CreateRequest(query));
                }
            }
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char('p') | KeyCode::Char('k') if ctrl => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Char('n') | KeyCode::Char('j') if ctrl => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Backspace => {
                if self.input.pop().is_some() {
                    return Some(FinderEvent::QueryChanged(self.input.clone()));
                }
            }
            KeyCode::Char(c) if !ctrl => {
                self.input.push(c);
                return Some(FinderEvent::QueryChanged(self.input.clone()));
            }
            _ => {}
        }
        None
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if !self.visible {
            return;
        }

        let width = if self.width == 0 { 60 } else { self.width.min(area.width) };
        let inner_width = width.saturating_sub(6) as usize;

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(Span::styled(
            "Find Note",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent)),
            Span::styled(self.input.clone(), Style::default().fg(theme.text)),
            Span::styled("\u{2588}", Style::default().fg(theme.dim)),
        ]));
        lines.push(Line::default());

        let max_results = self.max_results().min(self.items.len());
        let dim = Style::default().fg(theme.dim);

        if self.items.is_empty() {
            lines.push(Line::from(Span::styled("No results", dim)));
            let query = self.input.trim();
            if !query.is_empty() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    format!("Enter: create note \"{query}\""),
                    dim,
                )));
                lines.push(Line::from(Span::styled("Esc: cancel", dim)));
            }
        } else {
            for (i, item) in self.items.iter().take(max_results).enumerate() {
                let (prefix, style) = if i == self.cursor {
                    (
                        "> ",
                        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                    )
                } else {
                    ("  ", Style::default().fg(theme.text))
                };

                let title = if item.title.is_empty() {
                    &item.path
                } else {
                    &item.title
                };
                let mut text = format!("{prefix}{title}");
                if !item.extra.is_empty() {
                    text.push(' ');
                    text.push_str(&item.extra);
                }
                lines.push(Line::from(Span::styled(
                    truncate_to_width(&text, inner_width),
                    style,
                )));
            }
            if self.items.len() > max_results {
                lines.push(Line::from(Span::styled(
                    format!("  ... and {} more", self.items.len() - max_results),
                    dim,
                )));
            }
        }

        let height = (lines.len() + 2) as u16;
        let popup = centered_rect(area, width, height);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent));
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

/// A rect of the given size centered inside `area`, clamped to fit.
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
