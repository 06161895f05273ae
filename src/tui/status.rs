use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::theme::Theme;
use crate::util::unicode::display_width;

/// Bottom status bar: mode badge, open file (or vault path), error string,
/// and a right-aligned clipboard summary.
pub struct Status {
    mode: String,
    file: String,
    vault_dir: String,
    clipboard: String,
    error: String,
}

impl Status {
    pub fn new(vault_dir: &str) -> Status {
        Status {
            mode: "NORMAL".to_string(),
            file: String::new(),
            vault_dir: vault_dir.to_string(),
            clipboard: String::new(),
            error: String::new(),
        }
    }

    pub fn set_mode(&mut self, mode: &str) {
        self.mode = mode.to_string();
    }

    pub fn set_file(&mut self, file: &str) {
        self.file = file.to_string();
    }

    pub fn set_clipboard(&mut self, label: &str) {
        self.clipboard = label.to_string();
    }

    pub fn set_error(&mut self, msg: &str) {
        self.error = msg.to_string();
    }

    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    fn mode_color(&self, theme: &Theme) -> Color {
        match self.mode.as_str() {
            "NORMAL" => theme.normal_mode,
            "INSERT" => theme.insert_mode,
            "VISUAL" | "V-LINE" | "V-BLOCK" => theme.visual_mode,
            "COMMAND" => theme.cmd_mode,
            "REPLACE" => theme.error,
            _ => theme.text,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let badge = format!(" {} ", self.mode);
        let badge_span = Span::styled(
            badge.clone(),
            Style::default()
                .bg(self.mode_color(theme))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );

        let middle = if !self.error.is_empty() {
            Span::styled(
                format!(" {} ", self.error),
                Style::default().bg(theme.status_bg).fg(theme.error),
            )
        } else {
            let file = if self.file.is_empty() {
                &self.vault_dir
            } else {
                &self.file
            };
            Span::styled(
                format!(" {file} "),
                Style::default().bg(theme.status_bg).fg(theme.status_fg),
            )
        };

        let right = if self.clipboard.is_empty() {
            Span::raw("")
        } else {
            Span::styled(
                format!(" {} ", self.clipboard),
                Style::default().bg(theme.status_bg).fg(theme.status_fg),
            )
        };

        let used = display_width(&badge)
            + display_width(middle.content.as_ref())
            + display_width(right.content.as_ref());
        let pad = (area.width as usize).saturating_sub(used);
        let filler = Span::styled(" ".repeat(pad), Style::default().bg(theme.status_bg));

        let line = Line::from(vec![badge_span, middle, filler, right]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_badge_colors() {
        let theme = Theme::default();
        let mut s = Status::new("/vault");
        assert_eq!(s.mode_color(&theme), theme.normal_mode);
        s.set_mode("INSERT");
        assert_eq!(s.mode_color(&theme), theme.insert_mode);
        s.set_mode("V-BLOCK");
        assert_eq!(s.mode_color(&theme), theme.visual_mode);
        s.set_mode("NO");
        assert_eq!(s.mode_color(&theme), theme.text);
    }

    #[test]
    fn test_error_persists_until_cleared() {
        let mut s = Status::new("/vault");
        s.set_error("index open failed");
        assert_eq!(s.error(), "index open failed");
        s.clear_error();
        assert_eq!(s.error(), "");
    }
}
