use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::theme::Theme;
use crate::util::unicode::truncate_to_width;

/// One row of the info panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoItem {
    pub title: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoEvent {
    FileSelected(PathBuf),
}

/// Dual-purpose side pane: backlinks of the open note, or its outline.
/// Keyboard navigable; enter on a backlink opens its source note.
pub struct Info {
    title: String,
    items: Vec<InfoItem>,
    cursor: usize,
    offset: usize,
    width: u16,
    height: u16,
    focused: bool,
}

impl Info {
    pub fn new() -> Info {
        Info {
            title: "Info".to_string(),
            items: Vec::new(),
            cursor: 0,
            offset: 0,
            width: 0,
            height: 0,
            focused: false,
        }
    }

    pub fn set_backlinks(&mut self, items: Vec<InfoItem>) {
        self.title = "Backlinks".to_string();
        self.items = items;
        self.clamp_cursor();
    }

    pub fn set_outline(&mut self, items: Vec<InfoItem>) {
        self.title = "Outline".to_string();
        self.items = items;
        self.clamp_cursor();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
        self.offset = 0;
    }

    fn clamp_cursor(&mut self) {
        if self.cursor >= self.items.len() {
            self.cursor = self.items.len().saturating_sub(1);
        }
        if self.cursor < self.offset {
            self.offset = self.cursor;
        }
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn view_height(&self) -> usize {
        self.height.saturating_sub(2) as usize
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Option<InfoEvent> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.cursor + 1 < self.items.len() {
                    self.cursor += 1;
                    if self.cursor - self.offset >= self.view_height() {
                        self.offset += 1;
                    }
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    if self.cursor < self.offset {
                        self.offset = self.cursor;
                    }
                }
            }
            KeyCode::Char('g') => {
                self.cursor = 0;
                self.offset = 0;
            }
            KeyCode::Char('G') => {
                if !self.items.is_empty() {
                    self.cursor = self.items.len() - 1;
                    let vh = self.view_height().max(1);
                    if self.cursor >= self.offset + vh {
                        self.offset = self.cursor + 1 - vh;
                    }
                }
            }
            KeyCode::Enter => {
                let item = self.items.get(self.cursor)?;
                return Some(InfoEvent::FileSelected(item.path.clone()));
            }
            _ => {}
        }
        None
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let title_style = if self.focused {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(theme.dim).add_modifier(Modifier::BOLD)
        };

        let mut lines = vec![Line::from(Span::styled(
            format!(" {}", self.title),
            title_style,
        ))];

        if self.items.is_empty() {
            lines.push(Line::from(Span::styled(
                " No items",
                Style::default().fg(theme.dim),
            )));
        } else {
            let max_width = (self.width.min(area.width) as usize).saturating_sub(2);
            for (i, item) in self
                .items
                .iter()
                .enumerate()
                .skip(self.offset)
                .take(self.view_height())
            {
                let text = format!(" {}", truncate_to_width(&item.title, max_width));
                let style = if i == self.cursor && self.focused {
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text)
                };
                lines.push(Line::from(Span::styled(text, style)));
            }
        }

        frame.render_widget(Paragraph::new(lines), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn items(n: usize) -> Vec<InfoItem> {
        (0..n)
            .map(|i| InfoItem {
                title: format!("note {i}"),
                path: PathBuf::from(format!("note-{i}.md")),
            })
            .collect()
    }

    #[test]
    fn test_enter_selects_backlink_source() {
        let mut info = Info::new();
        info.set_size(30, 10);
        info.set_backlinks(items(3));
        info.handle_key(&key(KeyCode::Char('j')));
        let event = info.handle_key(&key(KeyCode::Enter));
        assert_eq!(
            event,
            Some(InfoEvent::FileSelected(PathBuf::from("note-1.md")))
        );
    }

    #[test]
    fn test_navigation_bounds() {
        let mut info = Info::new();
        info.set_size(30, 10);
        info.set_backlinks(items(2));
        info.handle_key(&key(KeyCode::Char('k'))); // at top already
        assert_eq!(info.cursor, 0);
        info.handle_key(&key(KeyCode::Char('G')));
        assert_eq!(info.cursor, 1);
        info.handle_key(&key(KeyCode::Char('j'))); // at bottom already
        assert_eq!(info.cursor, 1);
        info.handle_key(&key(KeyCode::Char('g')));
        assert_eq!(info.cursor, 0);
    }

    #[test]
    fn test_enter_on_empty_is_none() {
        let mut info = Info::new();
        assert_eq!(info.handle_key(&key(KeyCode::Enter)), None);
    }

    #[test]
    fn test_setting_items_clamps_cursor() {
        let mut info = Info::new();
        info.set_size(30, 10);
        info.set_backlinks(items(5));
        info.handle_key(&key(KeyCode::Char('G')));
        info.set_backlinks(items(2));
        assert!(info.cursor < 2);
    }
}
