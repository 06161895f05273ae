use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::theme::Theme;
use crate::util::unicode::display_width;

use super::finder::centered_rect;

/// A single binding shown in the popup.
#[derive(Debug, Clone)]
pub struct WhichKeyEntry {
    pub key: String,
    pub label: String,
}

/// Bordered popup listing the options after a leader prefix, as a sorted
/// two-column key/label table.
pub struct WhichKey {
    entries: Vec<WhichKeyEntry>,
    prefix: String,
    width: u16,
}

impl WhichKey {
    pub fn new() -> WhichKey {
        WhichKey {
            entries: Vec::new(),
            prefix: String::new(),
            width: 0,
        }
    }

    pub fn set_entries(&mut self, prefix: &str, mut entries: Vec<WhichKeyEntry>) {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        self.entries = entries;
        self.prefix = prefix.to_string();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.prefix.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if self.entries.is_empty() {
            return;
        }

        let width = if self.width == 0 { 60 } else { self.width.min(area.width) };
        let inner = width.saturating_sub(4) as usize;

        let title = if self.prefix.is_empty() {
            "Leader".to_string()
        } else {
            format!("Leader > {}", self.prefix)
        };

        let mut lines = vec![Line::from(Span::styled(
            title,
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ))];

        let key_style = Style::default()
            .fg(theme.insert_mode)
            .add_modifier(Modifier::BOLD);
        let label_style = Style::default().fg(theme.text);

        let col_width = if inner / 2 >= 20 { inner / 2 } else { inner };
        let two_columns = col_width < inner;

        let mut i = 0;
        while i < self.entries.len() {
            let left = &self.entries[i];
            let mut spans = vec![
                Span::styled(left.key.clone(), key_style),
                Span::raw(" "),
                Span::styled(left.label.clone(), label_style),
            ];

            if two_columns && i + 1 < self.entries.len() {
                let used = display_width(&left.key) + 1 + display_width(&left.label);
                let pad = col_width.saturating_sub(used).max(1);
                spans.push(Span::raw(" ".repeat(pad)));
                let right = &self.entries[i + 1];
                spans.push(Span::styled(right.key.clone(), key_style));
                spans.push(Span::raw(" "));
                spans.push(Span::styled(right.label.clone(), label_style));
                i += 2;
            } else {
                i += 1;
            }
            lines.push(Line::from(spans));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_sorted_by_key() {
        let mut wk = WhichKey::new();
        wk.set_entries(
            "",
            vec![
                WhichKeyEntry {
                    key: "z".into(),
                    label: "zen".into(),
                },
                WhichKeyEntry {
                    key: "f".into(),
                    label: "find".into(),
                },
                WhichKeyEntry {
                    key: "n".into(),
                    label: "note".into(),
                },
            ],
        );
        let keys: Vec<&str> = wk.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["f", "n", "z"]);
    }

    #[test]
    fn test_clear_empties() {
        let mut wk = WhichKey::new();
        wk.set_entries(
            "n",
            vec![WhichKeyEntry {
                key: "n".into(),
                label: "New note".into(),
            }],
        );
        assert!(!wk.is_empty());
        wk.clear();
        assert!(wk.is_empty());
    }

}
