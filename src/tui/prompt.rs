use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::theme::Theme;

use super::finder::centered_rect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    /// Enter. For confirm prompts the value may be empty (unconfirmed).
    Result(String),
    Cancelled,
}

/// Centered overlay dialog: free text input or a typed yes/no confirmation.
/// The app may reject a submitted value and keep the prompt open with an
/// inline error.
pub struct Prompt {
    input: String,
    title: String,
    placeholder: String,
    error: String,
    confirm: bool,
    visible: bool,
    width: u16,
}

impl Prompt {
    pub fn new() -> Prompt {
        Prompt {
            input: String::new(),
            title: String::new(),
            placeholder: String::new(),
            error: String::new(),
            confirm: false,
            visible: false,
            width: 0,
        }
    }

    /// Free text input.
    pub fn show(&mut self, title: &str, placeholder: &str) {
        self.visible = true;
        self.confirm = false;
        self.title = title.to_string();
        self.placeholder = placeholder.to_string();
        self.input.clear();
        self.error.clear();
    }

    /// Yes/no confirmation; the user types "yes" to confirm.
    pub fn show_confirm(&mut self, label: &str) {
        self.visible = true;
        self.confirm = true;
        self.title = label.to_string();
        self.placeholder = "yes".to_string();
        self.input.clear();
        self.error.clear();
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Render an inline error and keep the prompt focused.
    pub fn set_error(&mut self, msg: &str) {
        self.error = msg.to_string();
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn set_size(&mut self, width: u16) {
        self.width = width;
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Option<PromptEvent> {
        if !self.visible {
            return None;
        }

        match key.code {
            KeyCode::Enter => {
                let value = self.input.trim().to_string();
                if self.confirm {
                    // Confirm prompts always resolve; empty means "no".
                    self.visible = false;
                    return Some(PromptEvent::Result(value));
                }
                if value.is_empty() {
                    self.visible = false;
                    return Some(PromptEvent::Cancelled);
                }
                // The app decides whether to hide or keep the prompt open.
                return Some(PromptEvent::Result(value));
            }
            KeyCode::Esc => {
                self.visible = false;
                return Some(PromptEvent::Cancelled);
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.visible = false;
                return Some(PromptEvent::Cancelled);
            }
            KeyCode::Backspace => {
                self.input.pop();
                self.error.clear();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if self.input.len() < 256 {
                    self.input.push(c);
                }
                self.error.clear();
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

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(Span::styled(
            self.title.clone(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )));

        if self.input.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("\u{2588}", Style::default().fg(theme.dim)),
                Span::styled(self.placeholder.clone(), Style::default().fg(theme.dim)),
            ]));
        } else {
            lines.push(Line::from(vec![
                Span::styled(self.input.clone(), Style::default().fg(theme.text)),
                Span::styled("\u{2588}", Style::default().fg(theme.dim)),
            ]));
        }

        if !self.error.is_empty() {
            lines.push(Line::from(Span::styled(
                self.error.clone(),
                Style::default().fg(theme.error),
            )));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Enter to confirm, Esc to cancel",
            Style::default().fg(theme.dim),
        )));

        let height = (lines.len() + 2) as u16;
        let popup = centered_rect(area, width, height);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent));
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}
