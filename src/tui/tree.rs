use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::theme::Theme;
use crate::util::unicode::{pad_to_width, truncate_to_width};
use crate::vault::{Entry, Vault};

/// A pending clipboard operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOp {
    None,
    Copy,
    Cut,
}

/// Events emitted by the tree towards the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    FileSelected(PathBuf),
    NewNote,
    DeleteNote { path: PathBuf, name: String },
    DeleteNotes { paths: Vec<PathBuf> },
    RenameNote { path: PathBuf, name: String },
    Paste {
        op: ClipboardOp,
        sources: Vec<PathBuf>,
        dest_dir: String,
    },
    ClipboardChanged { op: ClipboardOp, count: usize },
}

/// The file tree panel: full filesystem view with collapse, multi-select
/// and a yank/cut clipboard.
pub struct Tree {
    vault: Vault,
    all_entries: Vec<Entry>,
    entries: Vec<Entry>,
    collapsed: HashSet<PathBuf>,
    selected: HashSet<PathBuf>,
    clipboard_op: ClipboardOp,
    clipboard: Vec<PathBuf>,
    cursor: usize,
    offset: usize,
    width: u16,
    height: u16,
    focused: bool,
    show_help: bool,
}

impl Tree {
    pub fn new(vault_root: &Path) -> Tree {
        let mut tree = Tree {
            vault: Vault::new(vault_root),
            all_entries: Vec::new(),
            entries: Vec::new(),
            collapsed: HashSet::new(),
            selected: HashSet::new(),
            clipboard_op: ClipboardOp::None,
            clipboard: Vec::new(),
            cursor: 0,
            offset: 0,
            width: 0,
            height: 0,
            focused: false,
            show_help: false,
        };
        tree.refresh();
        tree
    }

    /// Reload entries from disk and prune stale selection/clipboard paths.
    pub fn refresh(&mut self) {
        self.all_entries = self.vault.list_entries();
        self.rebuild_visible();
        self.prune_stale();
    }

    fn rebuild_visible(&mut self) {
        self.entries = self
            .all_entries
            .iter()
            .filter(|e| !self.is_hidden_by_collapse(&e.path))
            .cloned()
            .collect();
        if self.cursor >= self.entries.len() {
            self.cursor = self.entries.len().saturating_sub(1);
        }
    }

    fn prune_stale(&mut self) {
        let exists: HashSet<&PathBuf> = self.all_entries.iter().map(|e| &e.path).collect();
        self.selected.retain(|p| exists.contains(p));
        self.clipboard.retain(|p| exists.contains(p));
        if self.clipboard.is_empty() {
            self.clipboard_op = ClipboardOp::None;
        }
    }

    fn is_hidden_by_collapse(&self, path: &Path) -> bool {
        path.ancestors()
            .skip(1)
            .take_while(|a| !a.as_os_str().is_empty())
            .any(|a| self.collapsed.contains(a))
    }

    /// Selected files, or the cursor file if nothing is selected.
    fn collect_targets(&self) -> Vec<PathBuf> {
        if !self.selected.is_empty() {
            return self.selected.iter().cloned().collect();
        }
        match self.entries.get(self.cursor) {
            Some(entry) if !entry.is_dir => vec![entry.path.clone()],
            _ => Vec::new(),
        }
    }

    /// The directory a paste lands in, based on the cursor position.
    fn resolve_dest_dir(&self) -> String {
        let Some(entry) = self.entries.get(self.cursor) else {
            return String::new();
        };
        if entry.is_dir {
            return entry.path.to_string_lossy().into_owned();
        }
        match entry.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_string_lossy().into_owned(),
            _ => String::new(),
        }
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard_op = ClipboardOp::None;
        self.clipboard.clear();
    }

    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    pub fn showing_help(&self) -> bool {
        self.show_help
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn view_height(&self) -> usize {
        let mut h = self.height.saturating_sub(2) as usize; // title + padding
        if self.show_help {
            h = h.saturating_sub(15); // help box
        }
        h
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> Option<TreeEvent> {
        // When help is shown, any key dismisses it
        if self.show_help {
            self.show_help = false;
            return None;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.cursor + 1 < self.entries.len() {
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
            KeyCode::Enter => {
                let entry = self.entries.get(self.cursor)?.clone();
                if entry.is_dir {
                    if !self.collapsed.remove(&entry.path) {
                        self.collapsed.insert(entry.path);
                    }
                    self.rebuild_visible();
                } else {
                    return Some(TreeEvent::FileSelected(entry.path));
                }
            }
            KeyCode::Char('G') => {
                if !self.entries.is_empty() {
                    self.cursor = self.entries.len() - 1;
                    let vh = self.view_height();
                    if self.cursor >= self.offset + vh {
                        self.offset = self.cursor + 1 - vh.max(1);
                    }
                }
            }
            KeyCode::Char('g') => {
                self.cursor = 0;
                self.offset = 0;
            }
            KeyCode::Char('a') => return Some(TreeEvent::NewNote),
            KeyCode::Char('v') => {
                if let Some(entry) = self.entries.get(self.cursor)
                    && !entry.is_dir
                {
                    if !self.selected.remove(&entry.path) {
                        self.selected.insert(entry.path.clone());
                    }
                }
            }
            KeyCode::Char('V') => {
                self.selected.clear();
                self.clear_clipboard();
                return Some(TreeEvent::ClipboardChanged {
                    op: ClipboardOp::None,
                    count: 0,
                });
            }
            KeyCode::Char('y') => {
                let targets = self.collect_targets();
                if !targets.is_empty() {
                    self.clipboard_op = ClipboardOp::Copy;
                    self.clipboard = targets;
                    self.selected.clear();
                    return Some(TreeEvent::ClipboardChanged {
                        op: ClipboardOp::Copy,
                        count: self.clipboard.len(),
                    });
                }
            }
            KeyCode::Char('x') => {
                let targets = self.collect_targets();
                if !targets.is_empty() {
                    self.clipboard_op = ClipboardOp::Cut;
                    self.clipboard = targets;
                    self.selected.clear();
                    return Some(TreeEvent::ClipboardChanged {
                        op: ClipboardOp::Cut,
                        count: self.clipboard.len(),
                    });
                }
            }
            KeyCode::Char('p') => {
                if self.clipboard_op == ClipboardOp::None || self.clipboard.is_empty() {
                    return None;
                }
                let event = TreeEvent::Paste {
                    op: self.clipboard_op,
                    sources: self.clipboard.clone(),
                    dest_dir: self.resolve_dest_dir(),
                };
                self.clear_clipboard();
                return Some(event);
            }
            KeyCode::Char('d') => {
                let targets = self.collect_targets();
                match targets.as_slice() {
                    [] => {}
                    [path] => {
                        let name = file_name(path);
                        return Some(TreeEvent::DeleteNote {
                            path: path.clone(),
                            name,
                        });
                    }
                    _ => return Some(TreeEvent::DeleteNotes { paths: targets }),
                }
            }
            KeyCode::Char('r') => {
                if let Some(entry) = self.entries.get(self.cursor)
                    && !entry.is_dir
                {
                    return Some(TreeEvent::RenameNote {
                        path: entry.path.clone(),
                        name: entry.name.clone(),
                    });
                }
            }
            KeyCode::Char('?') => self.show_help = !self.show_help,
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

        let mut lines: Vec<Line> = Vec::new();

        // Title row with a ? hint when focused
        let mut title_spans = vec![Span::styled(" Files", title_style)];
        if self.focused && !self.show_help {
            let gap = (area.width as usize).saturating_sub(" Files".len() + 2);
            if gap > 0 {
                title_spans.push(Span::raw(" ".repeat(gap)));
                title_spans.push(Span::styled("?", Style::default().fg(theme.dim)));
            }
        }
        lines.push(Line::from(title_spans));

        let view_height = self.view_height();
        let max_line_width = (self.width.min(area.width) as usize).saturating_sub(3);

        for (i, entry) in self
            .entries
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(view_height)
        {
            let marker = if !entry.is_dir && self.selected.contains(&entry.path) {
                Span::styled("\u{258e}", Style::default().fg(theme.accent))
            } else if !entry.is_dir && self.clipboard.contains(&entry.path) {
                let color = if self.clipboard_op == ClipboardOp::Copy {
                    theme.accent
                } else {
                    theme.dim
                };
                Span::styled("\u{258e}", Style::default().fg(color))
            } else {
                Span::raw(" ")
            };

            let icon = if entry.is_dir {
                if self.collapsed.contains(&entry.path) {
                    "\u{25b8} "
                } else {
                    "\u{25be} "
                }
            } else {
                "  "
            };

            let text = format!("{}{}{}", "  ".repeat(entry.depth), icon, entry.name);
            let text = pad_to_width(&truncate_to_width(&text, max_line_width), max_line_width);

            let style = if i == self.cursor && self.focused {
                Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.text)
            };

            lines.push(Line::from(vec![marker, Span::styled(text, style)]));
        }

        frame.render_widget(Paragraph::new(lines), area);

        if self.show_help {
            self.render_help(frame, area, theme);
        }
    }

    fn render_help(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let rows = [
            ("j/k", "Navigate"),
            ("enter", "Open / Toggle dir"),
            ("a", "New note"),
            ("v", "Toggle select"),
            ("V", "Clear selections"),
            ("y", "Yank (copy)"),
            ("x", "Cut (move)"),
            ("p", "Paste"),
            ("d", "Delete"),
            ("r", "Rename note"),
            ("g/G", "Top / Bottom"),
            ("?", "Toggle help"),
        ];

        let height = (rows.len() + 2) as u16;
        if area.height < height {
            return;
        }
        let help_area = Rect {
            x: area.x + 1,
            y: area.y + area.height - height,
            width: area.width.saturating_sub(2),
            height,
        };

        let lines: Vec<Line> = rows
            .iter()
            .map(|(k, v)| {
                Line::from(vec![
                    Span::styled(
                        format!(" {k:<5} "),
                        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(*v, Style::default().fg(theme.dim)),
                ])
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border));
        frame.render_widget(Paragraph::new(lines).block(block), help_area);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::fs;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)
    }

    fn tree_with(files: &[&str]) -> (tempfile::TempDir, Tree) {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            let path = dir.path().join(f);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        let mut tree = Tree::new(dir.path());
        tree.set_size(30, 20);
        tree.set_focused(true);
        (dir, tree)
    }

    #[test]
    fn test_enter_on_file_selects() {
        let (_dir, mut tree) = tree_with(&["a.md", "b.md"]);
        let event = tree.handle_key(&enter());
        assert_eq!(event, Some(TreeEvent::FileSelected(PathBuf::from("a.md"))));
    }

    #[test]
    fn test_enter_on_dir_collapses_and_expands() {
        let (_dir, mut tree) = tree_with(&["sub/x.md", "z.md"]);
        // Cursor starts on "sub"
        assert!(tree.entries[0].is_dir);
        assert_eq!(tree.entries.len(), 3);

        tree.handle_key(&enter());
        assert_eq!(tree.entries.len(), 2); // sub collapsed, x.md hidden

        tree.handle_key(&enter());
        assert_eq!(tree.entries.len(), 3);
    }

    #[test]
    fn test_multi_select_and_delete() {
        let (_dir, mut tree) = tree_with(&["a.md", "b.md", "c.md"]);
        tree.handle_key(&key('v')); // select a.md
        tree.handle_key(&key('j'));
        tree.handle_key(&key('v')); // select b.md
        let event = tree.handle_key(&key('d'));
        match event {
            Some(TreeEvent::DeleteNotes { paths }) => assert_eq!(paths.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_single_delete_uses_cursor() {
        let (_dir, mut tree) = tree_with(&["a.md"]);
        let event = tree.handle_key(&key('d'));
        assert_eq!(
            event,
            Some(TreeEvent::DeleteNote {
                path: PathBuf::from("a.md"),
                name: "a.md".to_string(),
            })
        );
    }

    #[test]
    fn test_yank_then_paste_targets_cursor_dir() {
        let (_dir, mut tree) = tree_with(&["docs/keep.md", "a.md"]);
        // Entries: docs, docs/keep.md, a.md (cursor starts on docs)
        tree.handle_key(&key('j'));
        tree.handle_key(&key('j')); // a.md
        let event = tree.handle_key(&key('x'));
        assert_eq!(
            event,
            Some(TreeEvent::ClipboardChanged {
                op: ClipboardOp::Cut,
                count: 1
            })
        );

        tree.handle_key(&key('g')); // back to docs
        let event = tree.handle_key(&key('p'));
        match event {
            Some(TreeEvent::Paste { op, sources, dest_dir }) => {
                assert_eq!(op, ClipboardOp::Cut);
                assert_eq!(sources, vec![PathBuf::from("a.md")]);
                assert_eq!(dest_dir, "docs");
            }
            other => panic!("unexpected: {other:?}"),
        }
        // Clipboard cleared after paste
        assert_eq!(tree.handle_key(&key('p')), None);
    }

    #[test]
    fn test_clear_selection_clears_clipboard_too() {
        let (_dir, mut tree) = tree_with(&["a.md"]);
        tree.handle_key(&key('y'));
        let event = tree.handle_key(&key('V'));
        assert_eq!(
            event,
            Some(TreeEvent::ClipboardChanged {
                op: ClipboardOp::None,
                count: 0
            })
        );
    }

    #[test]
    fn test_help_swallows_next_key() {
        let (_dir, mut tree) = tree_with(&["a.md"]);
        tree.handle_key(&key('?'));
        assert!(tree.showing_help());
        // Any key dismisses help and is not interpreted
        assert_eq!(tree.handle_key(&key('d')), None);
        assert!(!tree.showing_help());
    }

    #[test]
    fn test_rename_on_file_only() {
        let (_dir, mut tree) = tree_with(&["sub/x.md"]);
        // cursor on the directory
        assert_eq!(tree.handle_key(&key('r')), None);
        tree.handle_key(&key('j'));
        let event = tree.handle_key(&key('r'));
        assert_eq!(
            event,
            Some(TreeEvent::RenameNote {
                path: PathBuf::from("sub/x.md"),
                name: "x.md".to_string(),
            })
        );
    }

    #[test]
    fn test_refresh_prunes_stale_clipboard() {
        let (dir, mut tree) = tree_with(&["a.md", "b.md"]);
        tree.handle_key(&key('y'));
        fs::remove_file(dir.path().join("a.md")).unwrap();
        tree.refresh();
        assert_eq!(tree.handle_key(&key('p')), None); // clipboard emptied
    }
}
