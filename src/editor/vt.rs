use std::io::Write;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use alacritty_terminal::event::{Event, EventListener};
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config as TermConfig, Term, test::TermSize};
use alacritty_terminal::vte::ansi::{Color as AnsiColor, NamedColor, Processor};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line as UiLine, Span, Text};

/// Forwards emulator-originated responses (device-attribute queries etc.)
/// into the sink channel. Without this drain the emulator would eventually
/// block when the editor queries the terminal.
struct EventProxy {
    sink: Sender<Vec<u8>>,
}

impl EventListener for EventProxy {
    fn send_event(&self, event: Event) {
        if let Event::PtyWrite(text) = event {
            let _ = self.sink.send(text.into_bytes());
        }
    }
}

/// An in-process virtual screen of the embedded editor.
pub struct VtScreen {
    term: Term<EventProxy>,
    parser: Processor,
    sink: Sender<Vec<u8>>,
    show_cursor: bool,
    width: u16,
    height: u16,
}

impl VtScreen {
    /// Create the emulator and start the drain thread writing terminal
    /// responses back to the PTY. The drain exits when the emulator (and
    /// with it the sink sender) is dropped.
    pub fn new(width: u16, height: u16, pty_writer: Arc<Mutex<Box<dyn Write + Send>>>) -> VtScreen {
        let (sink_tx, sink_rx) = mpsc::channel::<Vec<u8>>();

        thread::spawn(move || {
            while let Ok(bytes) = sink_rx.recv() {
                let mut w = pty_writer.lock().expect("pty writer lock");
                if w.write_all(&bytes).is_err() {
                    return;
                }
                let _ = w.flush();
            }
        });

        VtScreen::with_sink(width, height, sink_tx)
    }

    fn with_sink(width: u16, height: u16, sink: Sender<Vec<u8>>) -> VtScreen {
        let size = TermSize::new(width.max(1) as usize, height.max(1) as usize);
        let term = Term::new(
            TermConfig::default(),
            &size,
            EventProxy { sink: sink.clone() },
        );
        VtScreen {
            term,
            parser: Processor::new(),
            sink,
            show_cursor: true,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Ingest editor output.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.term, bytes);
    }

    /// Resize by recreating the emulator. Plain resizes have produced
    /// permanently blank frames after some terminal resize sequences;
    /// recreation avoids that and the editor repaints anyway.
    pub fn resize(self, width: u16, height: u16) -> VtScreen {
        let mut next = VtScreen::with_sink(width, height, self.sink.clone());
        next.show_cursor = self.show_cursor;
        next
    }

    pub fn set_show_cursor(&mut self, show: bool) {
        self.show_cursor = show;
    }

    /// Cursor position as (row, col), 0-based.
    pub fn cursor(&self) -> (u16, u16) {
        let point = self.term.grid().cursor.point;
        (point.line.0.max(0) as u16, point.column.0 as u16)
    }

    /// Render the screen as styled text. The cursor cell gets reverse video
    /// when the cursor is shown (editor focused).
    pub fn render_text(&self) -> Text<'static> {
        let grid = self.term.grid();
        let (cursor_row, cursor_col) = self.cursor();

        let mut lines = Vec::with_capacity(self.height as usize);
        for row in 0..self.height {
            let mut spans: Vec<Span<'static>> = Vec::new();
            let mut run = String::new();
            let mut run_style = Style::default();

            for col in 0..self.width {
                let cell = &grid[Line(row as i32)][Column(col as usize)];
                if cell.flags.contains(Flags::WIDE_CHAR_SPACER) {
                    continue;
                }

                let mut style = cell_style(cell.fg, cell.bg, cell.flags);
                if self.show_cursor && row == cursor_row && col == cursor_col {
                    style = style.add_modifier(Modifier::REVERSED);
                }

                let c = if cell.c == '\0' { ' ' } else { cell.c };
                if style == run_style {
                    run.push(c);
                } else {
                    if !run.is_empty() {
                        spans.push(Span::styled(std::mem::take(&mut run), run_style));
                    }
                    run_style = style;
                    run.push(c);
                }
            }
            if !run.is_empty() {
                spans.push(Span::styled(run, run_style));
            }
            lines.push(UiLine::from(spans));
        }

        Text::from(lines)
    }
}

fn cell_style(fg: AnsiColor, bg: AnsiColor, flags: Flags) -> Style {
    let mut style = Style::default();
    if let Some(c) = convert_color(fg) {
        style = style.fg(c);
    }
    if let Some(c) = convert_color(bg) {
        style = style.bg(c);
    }
    if flags.contains(Flags::BOLD) {
        style = style.add_modifier(Modifier::BOLD);
    }
    if flags.contains(Flags::ITALIC) {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if flags.intersects(Flags::UNDERLINE | Flags::DOUBLE_UNDERLINE | Flags::UNDERCURL) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if flags.contains(Flags::DIM) {
        style = style.add_modifier(Modifier::DIM);
    }
    if flags.contains(Flags::INVERSE) {
        style = style.add_modifier(Modifier::REVERSED);
    }
    if flags.contains(Flags::STRIKEOUT) {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    style
}

/// Map an emulator color to a ratatui color. Default foreground/background
/// stay unset so the surrounding theme shows through.
fn convert_color(color: AnsiColor) -> Option<Color> {
    match color {
        AnsiColor::Spec(rgb) => Some(Color::Rgb(rgb.r, rgb.g, rgb.b)),
        AnsiColor::Indexed(i) => Some(Color::Indexed(i)),
        AnsiColor::Named(named) => match named {
            NamedColor::Black => Some(Color::Black),
            NamedColor::Red => Some(Color::Red),
            NamedColor::Green => Some(Color::Green),
            NamedColor::Yellow => Some(Color::Yellow),
            NamedColor::Blue => Some(Color::Blue),
            NamedColor::Magenta => Some(Color::Magenta),
            NamedColor::Cyan => Some(Color::Cyan),
            NamedColor::White => Some(Color::Gray),
            NamedColor::BrightBlack => Some(Color::DarkGray),
            NamedColor::BrightRed => Some(Color::LightRed),
            NamedColor::BrightGreen => Some(Color::LightGreen),
            NamedColor::BrightYellow => Some(Color::LightYellow),
            NamedColor::BrightBlue => Some(Color::LightBlue),
            NamedColor::BrightMagenta => Some(Color::LightMagenta),
            NamedColor::BrightCyan => Some(Color::LightCyan),
            NamedColor::BrightWhite => Some(Color::White),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(width: u16, height: u16) -> VtScreen {
        let (tx, _rx) = mpsc::channel();
        VtScreen::with_sink(width, height, tx)
    }

    fn plain_text(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| {
                l.spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_feed_and_render() {
        let mut s = screen(10, 3);
        s.feed(b"hello");
        let lines = plain_text(&s.render_text());
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("hello"));
        // Lines are padded to the full width
        assert_eq!(lines[0].chars().count(), 10);
    }

    #[test]
    fn test_cursor_tracks_output() {
        let mut s = screen(10, 3);
        s.feed(b"ab");
        assert_eq!(s.cursor(), (0, 2));
        s.feed(b"\r\ncd");
        assert_eq!(s.cursor(), (1, 2));
    }

    #[test]
    fn test_cursor_cell_reversed_when_shown() {
        let mut s = screen(5, 2);
        s.feed(b"x");
        let text = s.render_text();
        // The cursor sits at (0,1); the span containing it carries REVERSED.
        let has_reversed = text.lines[0]
            .spans
            .iter()
            .any(|sp| sp.style.add_modifier.contains(Modifier::REVERSED));
        assert!(has_reversed);

        s.set_show_cursor(false);
        let text = s.render_text();
        let has_reversed = text.lines[0]
            .spans
            .iter()
            .any(|sp| sp.style.add_modifier.contains(Modifier::REVERSED));
        assert!(!has_reversed);
    }

    #[test]
    fn test_resize_recreates_cleanly() {
        let mut s = screen(10, 3);
        s.feed(b"hello");
        s.set_show_cursor(false);
        let s = s.resize(20, 5);
        assert!(!s.show_cursor);
        let lines = plain_text(&s.render_text());
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].chars().count(), 20);
    }

    #[test]
    fn test_device_query_reaches_sink() {
        let (tx, rx) = mpsc::channel();
        let mut s = VtScreen::with_sink(10, 3, tx);
        // DA1 query: the emulator must answer over the sink.
        s.feed(b"\x1b[c");
        let reply = rx.try_recv().expect("expected a device-attributes reply");
        assert!(reply.starts_with(b"\x1b["));
    }
}
