use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use std::{fs, thread};

use base64::Engine;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::config::Config;
use crate::editor::{Editor, Notification, NvimMode, PtyOutput, Rpc};
use crate::index::{Index, IndexEvent, IndexJob, IndexWorker, VaultWatcher};
use crate::markdown;
use crate::session::{State, Store};
use crate::theme::Theme;
use crate::vault::{Vault, rewrite_links_in_note};

use super::finder::{Finder, FinderEvent, FinderItem};
use super::info::{Info, InfoEvent, InfoItem};
use super::keymap::{self, Binding, LeaderState, children_at};
use super::layout::{self, compute_layout};
use super::msg::AppMsg;
use super::prompt::{Prompt, PromptEvent};
use super::status::Status;
use super::tree::{ClipboardOp, Tree, TreeEvent};
use super::whichkey::{WhichKey, WhichKeyEntry};

/// Which panel receives keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Editor,
    Tree,
    Info,
    Finder,
}

/// The action an open overlay prompt is serving.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum PromptAction {
    #[default]
    None,
    /// Save-as for an unnamed buffer
    Save,
    /// Save-as, then close to splash (quit was requested)
    Close,
    CreateNote,
    RenameNote {
        path: PathBuf,
    },
    DeleteNote {
        path: PathBuf,
    },
    DeleteNotes {
        paths: Vec<PathBuf>,
    },
    FinderCreate {
        name: String,
    },
}

/// The application: single-threaded update loop owning every panel, the
/// editor host, the index, and the watcher.
pub struct App {
    cfg: Config,
    theme: Theme,
    vault: Vault,
    editor: Editor,
    tree: Tree,
    info: Info,
    status: Status,
    which_key: WhichKey,
    finder: Finder,
    prompt: Prompt,
    db: Option<Index>,
    worker: Option<IndexWorker>,
    watcher: Option<VaultWatcher>,
    store: Store,
    tx: Sender<AppMsg>,

    focused: Focus,
    show_tree: bool,
    show_info: bool,
    show_status: bool,
    zen_mode: bool,

    bindings: Vec<Binding>,
    leader: LeaderState,
    pending_prompt: PromptAction,

    /// Cached open-file path, relative to the vault. Render and message
    /// handlers read this instead of calling RPC; a dead RPC must never be
    /// able to hang a draw.
    current_file: Option<PathBuf>,
    /// Previously opened note, for gb navigation.
    prev_file: Option<PathBuf>,
    /// Restored from the session on startup, opened once RPC is up.
    restore_file: Option<PathBuf>,

    width: u16,
    height: u16,
    should_quit: bool,
    exit_code: i32,
    fatal: Option<String>,
}

impl App {
    pub fn new(cfg: Config, tx: Sender<AppMsg>) -> App {
        let vault = Vault::new(&cfg.vault_path);
        let store = Store::new(&cfg.vault_path);
        let state = store.load();

        let mut app = App {
            theme: Theme::default(),
            vault,
            editor: Editor::new(&cfg.vault_path),
            tree: Tree::new(&cfg.vault_path),
            info: Info::new(),
            status: Status::new(&cfg.vault_path.to_string_lossy()),
            which_key: WhichKey::new(),
            finder: Finder::new(),
            prompt: Prompt::new(),
            db: None,
            worker: None,
            watcher: None,
            store,
            tx,
            focused: Focus::Editor,
            show_tree: state.show_tree,
            show_info: state.show_info,
            show_status: cfg.show_status,
            zen_mode: false,
            bindings: keymap::default_bindings(),
            leader: LeaderState::default(),
            pending_prompt: PromptAction::None,
            current_file: None,
            prev_file: None,
            restore_file: state.active_file.as_ref().map(PathBuf::from),
            width: 0,
            height: 0,
            should_quit: false,
            exit_code: 0,
            fatal: None,
            cfg,
        };
        app.editor.set_focused(true);

        // Open the index. Failure is non-fatal: the finder and backlinks
        // stay disabled and the status bar says why.
        let db_path = app.cfg.vault_path.join(".kopr").join("index.db");
        if let Some(dir) = db_path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        match Index::open(&db_path) {
            Ok(db) => app.db = Some(db),
            Err(e) => app.status.set_error(&format!("index open failed: {e}")),
        }

        app
    }

    /// Spawn the editor and the background index, wired into the message
    /// channel. Called once the terminal size is known.
    pub fn start_background(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let l = self.layout();
        let editor_h = l.height.saturating_sub(1).max(1); // title row

        let frames_tx = self.tx.clone();
        let rpc_tx = self.tx.clone();
        let notify_tx = self.tx.clone();
        self.editor.start(
            l.editor_width,
            editor_h,
            move |out| {
                let _ = frames_tx.send(AppMsg::Pty(out));
            },
            move |result| {
                let _ = rpc_tx.send(AppMsg::RpcConnected(Box::new(result)));
            },
            move |n| {
                let _ = notify_tx.send(AppMsg::Editor(n));
            },
        )?;

        // Second connection for the background worker; the loop keeps its
        // own for queries. SQLite WAL serializes the writers.
        if self.db.is_some() {
            let db_path = self.cfg.vault_path.join(".kopr").join("index.db");
            match Index::open(&db_path) {
                Ok(db) => {
                    let events_tx = self.tx.clone();
                    let worker = IndexWorker::spawn(db, &self.cfg.vault_path, move |ev| {
                        let _ = events_tx.send(AppMsg::Index(ev));
                    });
                    worker.submit(IndexJob::Full);
                    self.worker = Some(worker);
                }
                Err(e) => self.status.set_error(&format!("index open failed: {e}")),
            }
        }
        Ok(())
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.finder.set_size(width / 2, height);
        self.which_key.set_width(width / 2);

        // Size the prompt relative to the editor pane, clamped to a sane
        // modal width.
        let l = self.layout();
        let prompt_w = ((l.editor_width as f32) * 0.8) as u16;
        self.prompt
            .set_size(prompt_w.clamp(40, 100).min(l.editor_width.saturating_sub(2).max(20)));
    }

    fn layout(&self) -> layout::Layout {
        let (tree, info) = self.panels_visible();
        compute_layout(
            self.width,
            self.height,
            tree,
            info,
            self.show_status,
            self.cfg.tree_width,
            self.cfg.info_width,
        )
    }

    fn panels_visible(&self) -> (bool, bool) {
        let splash = self.editor.show_splash();
        (
            self.show_tree && !self.zen_mode && !splash,
            self.show_info && !self.zen_mode && !splash,
        )
    }

    /// Keep the embedded editor sized to its pane.
    fn update_layout(&mut self) {
        let l = self.layout();
        self.tree.set_size(l.tree_width, l.height);
        self.info.set_size(l.info_width, l.height);
        let editor_h = l.height.saturating_sub(1).max(1);
        if let Err(e) = self.editor.resize(l.editor_width, editor_h) {
            self.fatal(format!("editor resize: {e}"));
        }
    }

    pub fn handle_resize(&mut self, width: u16, height: u16) {
        // Some terminals report transient 0x0 sizes during live resizes.
        if width == 0 || height == 0 {
            return;
        }
        self.set_size(width, height);
        self.update_layout();
    }

    fn fatal(&mut self, msg: String) {
        if self.fatal.is_none() {
            self.fatal = Some(msg);
        }
        self.exit_code = 1;
        self.should_quit = true;
    }

    pub fn take_fatal(&mut self) -> Option<String> {
        self.fatal.take()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    // ── messages ───────────────────────────────────────────────────

    pub fn handle_msg(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::Pty(PtyOutput::Frame(bytes)) => self.editor.feed(&bytes),
            AppMsg::Pty(PtyOutput::Closed(err)) => {
                if let Some(e) = err {
                    self.fatal(format!("editor closed: {e}"));
                } else {
                    self.should_quit = true;
                }
            }
            AppMsg::RpcConnected(result) => match *result {
                Ok(rpc) => self.on_rpc_connected(rpc),
                Err(e) => self.fatal(e.to_string()),
            },
            AppMsg::Editor(n) => self.handle_notification(n),
            AppMsg::ColorsReady(Ok(colors)) => {
                self.theme = Theme::from_extracted(&colors, self.theme.clone());
            }
            AppMsg::ColorsReady(Err(e)) => self.status.set_error(&e),
            AppMsg::Index(ev) => self.handle_index_event(ev),
            AppMsg::WatcherFailed(e) => self.fatal(format!("watcher failed: {e}")),
        }
    }

    fn on_rpc_connected(&mut self, rpc: Rpc) {
        let rpc = self.editor.attach_rpc(rpc);

        let setup = rpc
            .setup_quit_save_intercept()
            .and_then(|()| rpc.setup_save_notify())
            .and_then(|()| rpc.setup_link_navigation())
            .and_then(|()| rpc.setup_yank_notify())
            // Left gutter aligns buffer text with panel titles
            .and_then(|()| rpc.exec_command("set foldcolumn=1"))
            .and_then(|()| rpc.load_splash_buffer());
        if let Err(e) = setup {
            self.fatal(e.to_string());
            return;
        }

        // Apply the colorscheme and extract TUI colors off the loop.
        if !self.cfg.colorscheme.is_empty() {
            let rpc = rpc.clone();
            let colorscheme = self.cfg.colorscheme.clone();
            let tx = self.tx.clone();
            thread::spawn(move || {
                let result = rpc
                    .apply_colorscheme(&colorscheme)
                    .map_err(|e| format!("colorscheme {colorscheme:?}: {e}"))
                    .and_then(|()| rpc.extract_colors().map_err(|e| e.to_string()));
                // Clear explicit backgrounds after extraction so the
                // terminal's own background shows through.
                if result.is_ok() {
                    rpc.clear_highlight_bgs();
                }
                let _ = tx.send(AppMsg::ColorsReady(result));
            });
        }

        // Reopen the note from the previous session, if it still exists.
        if let Some(rel) = self.restore_file.take()
            && self.cfg.vault_path.join(&rel).is_file()
        {
            self.navigate_to(&rel);
        }
    }

    fn handle_notification(&mut self, n: Notification) {
        match n {
            Notification::ModeChanged { mode } => {
                self.status.set_mode(&mode.display_name());
                if mode != NvimMode::Normal {
                    self.leader.cancel();
                    self.update_which_key();
                }
            }
            Notification::NoteClosed { save } => {
                // :wq on an unnamed buffer sends save-unnamed then
                // close-note back to back; upgrade the pending prompt
                // instead of interrupting it.
                if self.prompt.visible() {
                    self.pending_prompt = PromptAction::Close;
                    return;
                }
                self.handle_note_close(save);
            }
            Notification::SaveUnnamed => {
                self.pending_prompt = PromptAction::Save;
                self.prompt.show("Save as", "my-note.md");
            }
            Notification::BufferWritten { path } => self.handle_buffer_written(&path),
            Notification::FollowLink => self.follow_link(),
            Notification::GoBack => self.go_back(),
            Notification::Yank { text } => copy_to_clipboard(&text),
        }
    }

    fn handle_index_event(&mut self, ev: IndexEvent) {
        match ev {
            IndexEvent::InitDone(Err(e)) => self.fatal(format!("indexing failed: {e}")),
            IndexEvent::InitDone(Ok(())) => {
                // Index ready: start watching the vault for changes.
                let Some(worker) = &self.worker else { return };
                let jobs = worker.sender();
                let errors_tx = self.tx.clone();
                match VaultWatcher::start(&self.cfg.vault_path, jobs, move |e| {
                    let _ = errors_tx.send(AppMsg::WatcherFailed(e));
                }) {
                    Ok(w) => self.watcher = Some(w),
                    Err(e) => self.fatal(format!("watcher init failed: {e}")),
                }
                self.tree.refresh();
            }
            IndexEvent::FileIndexed { rel_path, result } => {
                if let Err(e) = result {
                    self.fatal(format!("index note: {e}"));
                    return;
                }
                self.tree.refresh();
                // A save of the open note refreshes its backlinks in place.
                if self.current_file.as_deref() == Some(Path::new(&rel_path)) {
                    let rel = PathBuf::from(&rel_path);
                    self.update_backlinks(&rel);
                }
            }
            IndexEvent::FileRemoved { result, .. } => {
                if let Err(e) = result {
                    self.fatal(format!("index remove: {e}"));
                    return;
                }
                self.tree.refresh();
            }
        }
    }

    // ── keys ───────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.exit_code = 130;
            self.should_quit = true;
            return;
        }

        // The prompt overlay has priority over everything.
        if self.prompt.visible() {
            match self.prompt.handle_key(&key) {
                Some(PromptEvent::Result(value)) => self.handle_prompt_result(&value),
                Some(PromptEvent::Cancelled) => self.handle_prompt_cancelled(),
                None => {}
            }
            return;
        }

        // Finder is next.
        if self.finder.visible() {
            match self.finder.handle_key(&key) {
                Some(FinderEvent::QueryChanged(q)) => {
                    let items = self.search_notes(&q);
                    self.finder.set_items(items);
                }
                Some(FinderEvent::Selected(path)) => {
                    self.navigate_to(Path::new(&path));
                    self.set_focus(Focus::Editor);
                }
                Some(FinderEvent::CreateRequest(name)) => {
                    // Finder stays open so cancel returns to the query.
                    self.prompt.show_confirm(&format!("Create note \"{name}\"?"));
                    self.pending_prompt = PromptAction::FinderCreate { name };
                }
                Some(FinderEvent::Closed) => self.set_focus(Focus::Editor),
                None => {}
            }
            return;
        }

        // While the splash is showing only leader keys work.
        if self.editor.show_splash() && self.focused == Focus::Editor {
            if key.code == KeyCode::Esc {
                return;
            }
            if self.try_leader_key(&key) {
                self.update_which_key();
            }
            return;
        }

        // Panel focus switching
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('h') => {
                    self.focus_left();
                    return;
                }
                KeyCode::Char('l') => {
                    self.focus_right();
                    return;
                }
                _ => {}
            }
        }

        // Escape returns from side panels to the editor, unless tree help
        // is showing (the tree dismisses it first).
        if key.code == KeyCode::Esc
            && (self.focused == Focus::Tree || self.focused == Focus::Info)
            && !(self.focused == Focus::Tree && self.tree.showing_help())
        {
            self.set_focus(Focus::Editor);
            return;
        }

        // Leader keys work from the editor and from side panels.
        if (self.focused != Focus::Tree || !self.tree.showing_help()) && self.try_leader_key(&key) {
            self.update_which_key();
            return;
        }

        match self.focused {
            Focus::Tree => {
                if let Some(event) = self.tree.handle_key(&key) {
                    self.handle_tree_event(event);
                }
            }
            Focus::Info => {
                if let Some(InfoEvent::FileSelected(path)) = self.info.handle_key(&key) {
                    self.navigate_to(&path);
                    self.set_focus(Focus::Editor);
                }
            }
            _ => {
                if let Err(e) = self.editor.send_key(&key) {
                    self.fatal(format!("editor input: {e}"));
                }
            }
        }
    }

    fn handle_tree_event(&mut self, event: TreeEvent) {
        match event {
            TreeEvent::FileSelected(path) => {
                self.navigate_to(&path);
                self.set_focus(Focus::Editor);
            }
            TreeEvent::NewNote => {
                self.pending_prompt = PromptAction::CreateNote;
                self.prompt.show("New note", "my-note.md");
            }
            TreeEvent::DeleteNote { path, name } => {
                self.pending_prompt = PromptAction::DeleteNote { path };
                self.prompt.show_confirm(&format!("Delete {name}?"));
            }
            TreeEvent::DeleteNotes { paths } => {
                let names: Vec<String> = paths
                    .iter()
                    .map(|p| {
                        p.file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default()
                    })
                    .collect();
                self.prompt.show_confirm(&format!(
                    "Delete {} files ({})?",
                    paths.len(),
                    names.join(", ")
                ));
                self.pending_prompt = PromptAction::DeleteNotes { paths };
            }
            TreeEvent::RenameNote { path, name } => {
                self.pending_prompt = PromptAction::RenameNote { path };
                self.prompt.show("Rename", &name);
            }
            TreeEvent::Paste {
                op,
                sources,
                dest_dir,
            } => self.handle_paste(op, sources, &dest_dir),
            TreeEvent::ClipboardChanged { op, count } => self.update_clipboard_status(op, count),
        }
    }

    // ── leader key state machine ───────────────────────────────────

    /// Returns true when the key was consumed by the leader system.
    fn try_leader_key(&mut self, key: &KeyEvent) -> bool {
        if !key.modifiers.difference(KeyModifiers::SHIFT).is_empty() {
            return false;
        }
        let KeyCode::Char(c) = key.code else {
            // Any non-character key cancels an active sequence.
            if self.leader.active {
                self.leader.cancel();
                return true;
            }
            return false;
        };
        let key_str = c.to_string();

        if !self.leader.active {
            if key_str != self.cfg.leader_key {
                return false;
            }
            // From the editor the leader only triggers in Normal mode;
            // side panels take it regardless.
            if self.focused == Focus::Editor && self.editor.mode() != NvimMode::Normal {
                return false;
            }
            self.leader.active = true;
            self.leader.keys.clear();
            self.leader.show_help = false;
            self.leader.deadline =
                Some(Instant::now() + Duration::from_millis(self.cfg.leader_timeout));
            return true;
        }

        // Accumulate and resolve.
        self.leader.keys.push(key_str.clone());
        let found = children_at(&self.bindings, &self.leader.keys[..self.leader.keys.len() - 1])
            .and_then(|node| node.iter().find(|b| b.key == key_str))
            .map(|b| (b.action, !b.children.is_empty()));

        match found {
            Some((_, true)) => {
                // Group: wait for the next key.
                self.leader.show_help = false;
                self.leader.deadline =
                    Some(Instant::now() + Duration::from_millis(self.cfg.leader_timeout));
                true
            }
            Some((action, false)) => {
                self.leader.cancel();
                if let Some(action) = action {
                    action(self);
                }
                true
            }
            None => {
                self.leader.cancel();
                true
            }
        }
    }

    /// Flip to the which-key popup when the timeout elapses.
    pub fn tick(&mut self) {
        if self.leader.active
            && !self.leader.show_help
            && let Some(deadline) = self.leader.deadline
            && Instant::now() >= deadline
        {
            self.leader.show_help = true;
            self.update_which_key();
        }
    }

    fn update_which_key(&mut self) {
        if !self.leader.show_help {
            self.which_key.clear();
            return;
        }
        let Some(node) = children_at(&self.bindings, &self.leader.keys) else {
            self.which_key.clear();
            return;
        };
        let entries: Vec<WhichKeyEntry> = node
            .iter()
            .map(|b| WhichKeyEntry {
                key: keymap::display_key(b.key),
                label: b.label.to_string(),
            })
            .collect();
        let prefix: Vec<String> = self.leader.keys.iter().map(|k| keymap::display_key(k)).collect();
        self.which_key.set_entries(&prefix.join(" "), entries);
    }

    // ── leader actions ─────────────────────────────────────────────

    pub(crate) fn toggle_finder(&mut self) {
        if self.finder.visible() {
            self.finder.hide();
            self.set_focus(Focus::Editor);
        } else {
            self.finder.show();
            let items = self.search_notes("");
            self.finder.set_items(items);
            self.focused = Focus::Finder;
        }
    }

    pub(crate) fn create_blank_note(&mut self) {
        let Some(rpc) = self.editor.rpc().cloned() else {
            return;
        };
        if let Err(e) = rpc.new_buffer() {
            self.fatal(e.to_string());
            return;
        }
        self.editor.set_show_splash(false);
        self.current_file = None;
        self.status.set_file("");
        self.update_layout();
    }

    pub(crate) fn create_daily_note(&mut self) {
        match self.vault.create_daily_note() {
            Ok(abs) => self.open_created(&abs),
            Err(e) => self.status.set_error(&e.to_string()),
        }
    }

    pub(crate) fn create_inbox_note(&mut self) {
        match self.vault.create_inbox_note() {
            Ok(abs) => self.open_created(&abs),
            Err(e) => self.status.set_error(&e.to_string()),
        }
    }

    pub(crate) fn rename_current_note(&mut self) {
        let Some(rel) = self.current_file.clone() else {
            return;
        };
        let name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.pending_prompt = PromptAction::RenameNote { path: rel };
        self.prompt.show("Rename", &name);
    }

    pub(crate) fn insert_template(&mut self) {
        let templates = self.vault.load_templates();
        let Some(template) = templates.first() else {
            self.status.set_error("no templates in templates/");
            return;
        };
        // The first template for now; a picker would slot in here.
        match self.vault.create_from_template(template, "New Note") {
            Ok(abs) => self.open_created(&abs),
            Err(e) => self.status.set_error(&e.to_string()),
        }
    }

    pub(crate) fn toggle_tree(&mut self) {
        self.show_tree = !self.show_tree;
        if !self.show_tree && self.focused == Focus::Tree {
            self.set_focus(Focus::Editor);
        }
        self.update_layout();
    }

    pub(crate) fn toggle_info(&mut self) {
        self.show_info = !self.show_info;
        if !self.show_info && self.focused == Focus::Info {
            self.set_focus(Focus::Editor);
        }
        self.update_layout();
    }

    pub(crate) fn toggle_status(&mut self) {
        self.show_status = !self.show_status;
        self.update_layout();
    }

    pub(crate) fn toggle_zen(&mut self) {
        self.zen_mode = !self.zen_mode;
        if self.zen_mode && (self.focused == Focus::Tree || self.focused == Focus::Info) {
            self.set_focus(Focus::Editor);
        }
        self.update_layout();
    }

    pub(crate) fn request_quit(&mut self) {
        self.should_quit = true;
    }

    pub(crate) fn format_document(&mut self) {
        let Some(rpc) = self.editor.rpc().cloned() else {
            return;
        };
        let content = match rpc.buffer_content() {
            Ok(lines) => lines.join("\n"),
            Err(e) => {
                self.fatal(e.to_string());
                return;
            }
        };
        let formatted = markdown::format(&content);
        let lines: Vec<String> = formatted
            .trim_end_matches('\n')
            .split('\n')
            .map(str::to_string)
            .collect();
        if let Err(e) = rpc.set_buffer_lines(&lines) {
            self.fatal(e.to_string());
        }
    }

    pub(crate) fn reload_config(&mut self) {
        let mut cfg = Config::default();
        if cfg.load_file().is_ok() {
            self.cfg.colorscheme = cfg.colorscheme;
            self.cfg.colorscheme_repo = cfg.colorscheme_repo;
            self.cfg.leader_timeout = cfg.leader_timeout;
            self.cfg.auto_format_on_save = cfg.auto_format_on_save;
        }

        let Some(rpc) = self.editor.rpc().cloned() else {
            return;
        };
        if self.cfg.colorscheme.is_empty() {
            return;
        }
        match rpc.apply_colorscheme(&self.cfg.colorscheme) {
            Err(e) => self
                .status
                .set_error(&format!("colorscheme {:?}: {e}", self.cfg.colorscheme)),
            Ok(()) => {
                if let Ok(colors) = rpc.extract_colors() {
                    self.theme = Theme::from_extracted(&colors, self.theme.clone());
                }
                rpc.clear_highlight_bgs();
            }
        }
    }

    // ── navigation ─────────────────────────────────────────────────

    /// Open a note and update the gb history.
    fn navigate_to(&mut self, rel: &Path) {
        if let Some(current) = &self.current_file
            && current != rel
        {
            self.prev_file = Some(current.clone());
        }
        let abs = self.cfg.vault_path.join(rel);
        self.open_in_editor(&abs);
        self.status.clear_error();
        self.status.set_file(&rel.to_string_lossy());
        self.current_file = Some(rel.to_path_buf());
        self.update_backlinks(rel);
    }

    fn go_back(&mut self) {
        let Some(prev) = self.prev_file.clone() else {
            return;
        };
        if !self.cfg.vault_path.join(&prev).is_file() {
            self.prev_file = None;
            return;
        }
        // Swap so gb toggles between two notes. current_file is cleared
        // first so navigate_to leaves the new prev_file alone.
        self.prev_file = self.current_file.take();
        self.navigate_to(&prev);
        self.set_focus(Focus::Editor);
    }

    fn open_in_editor(&mut self, abs: &Path) {
        if let Err(e) = self.editor.open_file(abs) {
            self.fatal(e.to_string());
            return;
        }
        self.update_layout();
    }

    fn open_created(&mut self, abs: &Path) {
        let rel = abs
            .strip_prefix(&self.cfg.vault_path)
            .unwrap_or(abs)
            .to_path_buf();
        self.navigate_to(&rel);
        self.tree.refresh();
    }

    /// Follow the wiki link under the editor cursor, creating a stub note
    /// when the target does not exist yet.
    fn follow_link(&mut self) {
        let Some(rpc) = self.editor.rpc().cloned() else {
            return;
        };
        let Ok((line, col)) = rpc.cursor_position() else {
            return;
        };
        let Ok(lines) = rpc.buffer_content() else {
            return;
        };
        let content = lines.join("\n");

        let links = markdown::extract_wiki_links(&content);
        let Some(link) = markdown::wiki_link_at(&links, line, col) else {
            return;
        };
        if link.target.is_empty() {
            return;
        }

        // Resolve by basename through the index, falling back to a
        // root-level path.
        let basename = basename_of(&markdown::resolve_wiki_link_target(&link.target));
        let mut target = basename.clone();
        if let Some(db) = &self.db
            && let Ok(Some(resolved)) = db.find_note_by_basename(&basename)
        {
            target = resolved;
        }

        if !self.cfg.vault_path.join(&target).is_file() {
            if let Some(msg) = self.check_unique_basename(Path::new(&target)) {
                self.status.set_error(&msg);
                return;
            }
            let stub = format!("---\ntitle: {}\n---\n\n", link.target);
            if self.vault.create_note(&target, &stub).is_err() {
                return;
            }
            self.tree.refresh();
        }

        let target = PathBuf::from(target);
        self.navigate_to(&target);
        self.set_focus(Focus::Editor);
    }

    /// Refresh the info pane for a note: its backlinks, or its outline when
    /// nothing links to it yet.
    fn update_backlinks(&mut self, rel: &Path) {
        let Some(db) = &self.db else {
            return;
        };
        let backlinks = db.get_backlinks(&rel.to_string_lossy()).unwrap_or_default();
        if backlinks.is_empty() {
            let headings = db.note_headings(&rel.to_string_lossy()).unwrap_or_default();
            let items = headings
                .into_iter()
                .map(|h| InfoItem {
                    title: format!(
                        "{}{}",
                        "  ".repeat((h.level as usize).saturating_sub(1)),
                        h.text
                    ),
                    path: rel.to_path_buf(),
                })
                .collect();
            self.info.set_outline(items);
            return;
        }
        let items = backlinks
            .into_iter()
            .map(|bl| InfoItem {
                title: if bl.source_title.is_empty() {
                    bl.source_path.clone()
                } else {
                    bl.source_title
                },
                path: PathBuf::from(bl.source_path),
            })
            .collect();
        self.info.set_backlinks(items);
    }

    /// Finder results for a query: FTS first, file-name match as fallback,
    /// everything when the query is empty.
    fn search_notes(&self, query: &str) -> Vec<FinderItem> {
        let Some(db) = &self.db else {
            return Vec::new();
        };

        let results = if query.is_empty() {
            db.list_all_notes(50).unwrap_or_default()
        } else {
            match db.search(query, 50) {
                Ok(results) if !results.is_empty() => results,
                _ => db.search_files(query, 50).unwrap_or_default(),
            }
        };

        results
            .into_iter()
            .map(|r| FinderItem {
                title: r.title,
                path: r.path,
                extra: String::new(),
            })
            .collect()
    }

    // ── buffer lifecycle ───────────────────────────────────────────

    fn handle_note_close(&mut self, save: bool) {
        let Some(rpc) = self.editor.rpc().cloned() else {
            return;
        };
        if save {
            if self.current_file.is_none() {
                // Unnamed buffer: ask for a name, then close to splash.
                self.pending_prompt = PromptAction::Close;
                self.prompt.show("Save as", "my-note.md");
                return;
            }
            if let Err(e) = rpc.exec_command("w") {
                self.fatal(format!("editor write failed: {e}"));
                return;
            }
        }
        self.show_splash_screen();
    }

    fn show_splash_screen(&mut self) {
        if let Some(rpc) = self.editor.rpc().cloned()
            && let Err(e) = rpc.load_splash_buffer()
        {
            self.fatal(e.to_string());
            return;
        }
        self.editor.set_show_splash(true);
        self.status.set_file("");
        self.current_file = None;
        self.info.clear();
        self.set_focus(Focus::Editor);
        self.update_layout();
    }

    fn handle_buffer_written(&mut self, path: &str) {
        let is_markdown = path.to_lowercase().ends_with(".md");

        // Reindex off the loop so backlinks and search stay fresh.
        if is_markdown && let Some(worker) = &self.worker {
            worker.submit(IndexJob::File(PathBuf::from(path)));
        }

        if !self.cfg.auto_format_on_save || !is_markdown {
            return;
        }
        let Some(rpc) = self.editor.rpc().cloned() else {
            return;
        };

        // Only format the active buffer.
        let current = match rpc.current_file() {
            Ok(c) => c,
            Err(e) => {
                self.fatal(format!("editor current file: {e}"));
                return;
            }
        };
        if current != path {
            return;
        }

        if let Err(e) = format_buffer_in_place(&rpc) {
            self.fatal(e.to_string());
        }
    }

    // ── prompt dispatch ────────────────────────────────────────────

    fn handle_prompt_cancelled(&mut self) {
        let action = std::mem::take(&mut self.pending_prompt);
        if action == PromptAction::Close {
            self.show_splash_screen();
        }
    }

    fn handle_prompt_result(&mut self, value: &str) {
        // The prompt stays open after Enter; it hides only on success.
        match std::mem::take(&mut self.pending_prompt) {
            PromptAction::None => {}
            action @ (PromptAction::Save | PromptAction::Close) => {
                let close_after = action == PromptAction::Close;
                if self.handle_save_as(value, close_after) {
                    self.prompt.hide();
                } else {
                    self.pending_prompt = action;
                }
            }
            PromptAction::CreateNote => {
                if self.handle_create_note(value) {
                    self.prompt.hide();
                } else {
                    self.pending_prompt = PromptAction::CreateNote;
                }
            }
            PromptAction::RenameNote { path } => {
                if self.handle_rename_note(value, &path) {
                    self.prompt.hide();
                } else {
                    self.pending_prompt = PromptAction::RenameNote { path };
                }
            }
            PromptAction::DeleteNote { path } => {
                self.prompt.hide();
                self.handle_delete_notes(value, &[path]);
            }
            PromptAction::DeleteNotes { paths } => {
                self.prompt.hide();
                self.handle_delete_notes(value, &paths);
            }
            PromptAction::FinderCreate { name } => {
                self.prompt.hide();
                if value.trim().eq_ignore_ascii_case("yes") {
                    self.create_note_from_finder(&name);
                    self.finder.hide();
                    self.set_focus(Focus::Editor);
                }
            }
        }
    }

    /// Save-as for the current (unnamed) buffer. Returns false when the
    /// value was rejected and the prompt should stay open.
    fn handle_save_as(&mut self, value: &str, close_after: bool) -> bool {
        let rel = with_md_extension(value);

        if let Some(msg) = self.check_unique_basename(Path::new(&rel)) {
            self.prompt.set_error(&msg);
            return false;
        }

        let Some(rpc) = self.editor.rpc().cloned() else {
            self.prompt.set_error("editor RPC unavailable");
            return false;
        };

        let content = match rpc.buffer_content() {
            Ok(lines) => lines.join("\n"),
            Err(e) => {
                self.prompt.set_error(&e.to_string());
                return false;
            }
        };

        let abs = match self.vault.create_note(&rel, &content) {
            Ok(abs) => abs,
            Err(e) => {
                self.prompt.set_error(&e.to_string());
                return false;
            }
        };

        // Turn the scratch buffer into a regular file buffer and write it.
        let result = rpc
            .exec_command("setlocal modifiable")
            .and_then(|()| rpc.set_buffer_name(&abs.to_string_lossy()))
            .and_then(|()| rpc.exec_command("setlocal buftype="))
            .and_then(|()| rpc.write_buffer());
        if let Err(e) = result {
            self.fatal(e.to_string());
            return true;
        }

        self.editor.set_show_splash(false);
        self.status.set_file(&rel);
        self.current_file = Some(PathBuf::from(&rel));
        self.tree.refresh();
        self.update_backlinks(Path::new(&rel));

        if close_after {
            self.show_splash_screen();
        }
        true
    }

    fn handle_create_note(&mut self, name: &str) -> bool {
        if name.ends_with('/') {
            self.prompt.set_error("cannot create a directory here");
            return false;
        }

        let rel = with_md_extension(name);
        if let Some(msg) = self.check_unique_basename(Path::new(&rel)) {
            self.prompt.set_error(&msg);
            return false;
        }

        let title = name.strip_suffix(".md").unwrap_or(name);
        let content = format!("---\ntitle: {title}\n---\n\n");
        let abs = match self.vault.create_note(&rel, &content) {
            Ok(abs) => abs,
            Err(e) => {
                self.prompt.set_error(&e.to_string());
                return false;
            }
        };

        self.open_created(&abs);
        self.set_focus(Focus::Editor);
        true
    }

    fn handle_rename_note(&mut self, new_name: &str, old_path: &Path) -> bool {
        let mut new_rel = PathBuf::from(with_md_extension(new_name));
        // Renames keep the note in its directory.
        if let Some(dir) = old_path.parent()
            && !dir.as_os_str().is_empty()
        {
            new_rel = dir.join(&new_rel);
        }

        if let Some(msg) = self.check_unique_basename(&new_rel) {
            self.prompt.set_error(&msg);
            return false;
        }

        let old_basename = note_stem(old_path);
        let new_basename = note_stem(&new_rel);

        // Capture backlinks while the index still has the old name.
        let mut backlink_sources: Vec<String> = Vec::new();
        if old_basename != new_basename
            && let Some(db) = &self.db
            && let Ok(backlinks) = db.get_backlinks(&old_path.to_string_lossy())
        {
            backlink_sources = backlinks.into_iter().map(|b| b.source_path).collect();
        }

        if let Err(e) = self.vault.rename_note(old_path, &new_rel) {
            self.prompt.set_error(&e.to_string());
            return false;
        }

        // Rewrite wiki links in every note that pointed at the old name.
        if old_basename != new_basename {
            for source in &backlink_sources {
                let abs = self.cfg.vault_path.join(source);
                if let Err(e) = rewrite_links_in_note(&abs, &old_basename, &new_basename) {
                    self.fatal(e.to_string());
                    return true;
                }
            }
        }

        // Keep the open buffer consistent with the renamed file.
        if self.current_file.as_deref() == Some(old_path) {
            let abs = self.cfg.vault_path.join(&new_rel);
            if let Some(rpc) = self.editor.rpc().cloned() {
                let result = rpc
                    .set_buffer_name(&abs.to_string_lossy())
                    .and_then(|()| rpc.write_buffer());
                if let Err(e) = result {
                    self.fatal(e.to_string());
                    return true;
                }
            }
            self.status.set_file(&new_rel.to_string_lossy());
            self.current_file = Some(new_rel.clone());
        }

        self.tree.refresh();
        true
    }

    fn handle_delete_notes(&mut self, confirmation: &str, paths: &[PathBuf]) {
        if !confirmation.trim().eq_ignore_ascii_case("yes") {
            return;
        }

        for path in paths {
            if self.current_file.as_deref() == Some(path.as_path()) {
                self.show_splash_screen();
            }
            if let Err(e) = self.vault.delete_note(path) {
                self.status.set_error(&e.to_string());
                return;
            }
        }
        self.tree.clear_selected();
        self.tree.refresh();
    }

    fn create_note_from_finder(&mut self, name: &str) {
        let rel = with_md_extension(name);
        if let Some(msg) = self.check_unique_basename(Path::new(&rel)) {
            self.status.set_error(&msg);
            return;
        }

        let content = format!("---\ntitle: {name}\n---\n\n");
        let Ok(abs) = self.vault.create_note(&rel, &content) else {
            return;
        };
        self.open_created(&abs);
    }

    fn handle_paste(&mut self, op: ClipboardOp, sources: Vec<PathBuf>, dest_dir: &str) {
        // Copying would plant a second note with the same basename.
        if op == ClipboardOp::Copy {
            self.status
                .set_error("copy not allowed: vault requires unique basenames");
            return;
        }

        for source in &sources {
            let name = source.file_name().unwrap_or_default();
            let new_rel = if dest_dir.is_empty() {
                PathBuf::from(name)
            } else {
                PathBuf::from(dest_dir).join(name)
            };
            if let Some(msg) = self.check_unique_basename_except(&new_rel, Some(source)) {
                self.status.set_error(&msg);
                return;
            }
            if let Err(e) = self.vault.move_note(source, dest_dir) {
                self.status.set_error(&e.to_string());
                return;
            }

            if self.current_file.as_deref() == Some(source.as_path()) {
                let abs = self.cfg.vault_path.join(&new_rel);
                if let Some(rpc) = self.editor.rpc().cloned() {
                    let result = rpc
                        .set_buffer_name(&abs.to_string_lossy())
                        .and_then(|()| rpc.write_buffer());
                    if let Err(e) = result {
                        self.fatal(e.to_string());
                        return;
                    }
                }
                self.status.set_file(&new_rel.to_string_lossy());
                self.current_file = Some(new_rel);
            }
        }

        self.tree.clear_clipboard();
        self.tree.clear_selected();
        self.update_clipboard_status(ClipboardOp::None, 0);
        self.tree.refresh();
    }

    fn update_clipboard_status(&mut self, op: ClipboardOp, count: usize) {
        match op {
            ClipboardOp::Copy if count > 0 => {
                self.status.set_clipboard(&format!("{count} yanked"));
            }
            ClipboardOp::Cut if count > 0 => {
                self.status.set_clipboard(&format!("{count} cut"));
            }
            _ => self.status.set_clipboard(""),
        }
    }

    /// An error message when a different note already holds this canonical
    /// basename, or None when the name is free.
    fn check_unique_basename(&self, rel: &Path) -> Option<String> {
        self.check_unique_basename_except(rel, None)
    }

    fn check_unique_basename_except(&self, rel: &Path, except: Option<&Path>) -> Option<String> {
        let db = self.db.as_ref()?;
        let basename = rel.file_name()?.to_string_lossy();
        let existing = db.find_note_by_basename(&basename).ok()??;
        let existing_path = Path::new(&existing);
        if existing_path == rel || except == Some(existing_path) {
            return None;
        }
        Some(format!("\"{basename}\" already exists at {existing}"))
    }

    // ── focus ──────────────────────────────────────────────────────

    fn set_focus(&mut self, target: Focus) {
        self.tree.set_focused(target == Focus::Tree);
        self.info.set_focused(target == Focus::Info);
        self.editor.set_focused(target == Focus::Editor);
        self.focused = target;
    }

    fn focus_left(&mut self) {
        match self.focused {
            Focus::Editor => {
                if self.show_tree && !self.zen_mode {
                    self.set_focus(Focus::Tree);
                }
            }
            Focus::Info => self.set_focus(Focus::Editor),
            _ => {}
        }
    }

    fn focus_right(&mut self) {
        match self.focused {
            Focus::Editor => {
                if self.show_info && !self.zen_mode {
                    self.set_focus(Focus::Info);
                }
            }
            Focus::Tree => self.set_focus(Focus::Editor),
            _ => {}
        }
    }

    // ── render ─────────────────────────────────────────────────────

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        frame.render_widget(
            Block::default().style(Style::default().bg(self.theme.bg)),
            area,
        );

        if area.width < layout::MIN_WIDTH || area.height < layout::MIN_HEIGHT {
            self.render_too_small(frame, area);
            return;
        }

        let l = self.layout();
        let (show_tree, show_info) = self.panels_visible();

        let content = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height: l.height.min(area.height),
        };

        // Side-panel separators overlap the editor's edge columns: the tree
        // takes tree_width-1 cells, its separator sits on the editor's first
        // column, and symmetrically for the info pane. The editor leaves
        // those columns blank (foldcolumn gutter) so nothing is hidden.
        let mut x = content.x;
        if show_tree {
            let tree_area = Rect {
                x,
                y: content.y,
                width: l.tree_width.saturating_sub(1),
                height: content.height,
            };
            self.tree.render(frame, tree_area, &self.theme);
            x += l.tree_width.saturating_sub(1);
        }

        let editor_width = l
            .editor_width
            .min(content.width.saturating_sub(x - content.x));
        let editor_area = Rect {
            x,
            y: content.y,
            width: editor_width,
            height: content.height,
        };
        self.render_editor(frame, editor_area);

        if show_tree {
            self.render_separator(
                frame,
                Rect {
                    x,
                    y: content.y,
                    width: 1,
                    height: content.height,
                },
            );
        }

        if show_info {
            let sep_x = (x + editor_width.saturating_sub(1)).min(area.right().saturating_sub(1));
            self.render_separator(
                frame,
                Rect {
                    x: sep_x,
                    y: content.y,
                    width: 1,
                    height: content.height,
                },
            );
            let info_x = x + editor_width;
            if info_x < area.right() {
                let info_area = Rect {
                    x: info_x,
                    y: content.y,
                    width: l
                        .info_width
                        .saturating_sub(1)
                        .min(area.right().saturating_sub(info_x)),
                    height: content.height,
                };
                self.info.render(frame, info_area, &self.theme);
            }
        }

        if l.status_height > 0 && area.height > l.height {
            let status_area = Rect {
                x: area.x,
                y: area.y + l.height,
                width: area.width,
                height: 1,
            };
            self.status.render(frame, status_area, &self.theme);
        }

        // Overlays: which-key renders under the finder and the prompt.
        if self.leader.show_help && !self.which_key.is_empty() {
            self.which_key.render(frame, area, &self.theme);
        }
        if self.finder.visible() {
            self.finder.render(frame, area, &self.theme);
        }
        if self.prompt.visible() {
            self.prompt.render(frame, area, &self.theme);
        }
    }

    fn render_separator(&self, frame: &mut Frame, area: Rect) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let lines: Vec<Line> = (0..area.height)
            .map(|_| Line::from(Span::styled("\u{2502}", Style::default().fg(self.theme.border))))
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_editor(&self, frame: &mut Frame, area: Rect) {
        if area.height == 0 {
            return;
        }

        // Title row
        let title = match (&self.current_file, self.editor.show_splash()) {
            (Some(rel), false) => rel
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Kopr".to_string()),
            _ => "Kopr".to_string(),
        };
        let title_style = if self.focused == Focus::Editor {
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default()
                .fg(self.theme.dim)
                .add_modifier(Modifier::BOLD)
        };
        let title_area = Rect { height: 1, ..area };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(format!(" {title}"), title_style))),
            title_area,
        );

        let body = Rect {
            x: area.x,
            y: area.y + 1,
            width: area.width,
            height: area.height - 1,
        };
        if self.editor.show_splash() {
            self.render_splash(frame, body);
            return;
        }
        if let Some(screen) = self.editor.screen() {
            frame.render_widget(Paragraph::new(screen.render_text()), body);
        } else {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    " Starting editor...",
                    Style::default().fg(self.theme.dim),
                ))),
                body,
            );
        }
    }

    fn render_splash(&self, frame: &mut Frame, area: Rect) {
        let shortcuts = [
            ("Space Space", "Find note"),
            ("Space n n", "New note"),
            ("Space n d", "Daily note"),
            ("Ctrl+h/l", "Navigate panels"),
            ("Space q q", "Quit"),
        ];
        let key_width = shortcuts.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(Span::styled(
            "Kopr",
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::default());
        for (key, desc) in shortcuts {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{key:>key_width$}"),
                    Style::default().fg(self.theme.text),
                ),
                Span::raw("  "),
                Span::styled(desc, Style::default().fg(self.theme.dim)),
            ]));
        }

        let pad_top = (area.height as usize).saturating_sub(lines.len()) / 2;
        let mut padded: Vec<Line> = std::iter::repeat_with(Line::default)
            .take(pad_top)
            .collect();
        padded.extend(lines);

        frame.render_widget(
            Paragraph::new(padded).alignment(ratatui::layout::Alignment::Center),
            area,
        );
    }

    fn render_too_small(&self, frame: &mut Frame, area: Rect) {
        let msg = format!(
            "Window too small ({}x{})\nMinimum supported: {}x{}",
            area.width,
            area.height,
            layout::MIN_WIDTH,
            layout::MIN_HEIGHT
        );
        let lines: Vec<Line> = msg
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(self.theme.text))))
            .collect();
        let pad_top = (area.height as usize).saturating_sub(lines.len()) / 2;
        let mut padded: Vec<Line> = std::iter::repeat_with(Line::default)
            .take(pad_top)
            .collect();
        padded.extend(lines);
        frame.render_widget(
            Paragraph::new(padded).alignment(ratatui::layout::Alignment::Center),
            area,
        );
    }

    // ── shutdown ───────────────────────────────────────────────────

    /// The close sequence: persist session state, quit the editor, stop the
    /// watcher and the index worker. Best-effort throughout; every error is
    /// reported and shutdown continues.
    pub fn close(&mut self) {
        let state = State {
            active_file: self
                .current_file
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            open_files: Vec::new(),
            show_tree: self.show_tree,
            show_info: self.show_info,
            tree_width: Some(self.cfg.tree_width),
            info_width: Some(self.cfg.info_width),
        };
        if let Err(e) = self.store.save(&state) {
            eprintln!("fatal: save session state: {e}");
        }

        self.editor.close();
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
        self.db = None;
    }
}

/// Formats the active buffer with the deterministic Markdown formatter,
/// restores the cursor, and writes without re-triggering autocommands.
/// The formatter is a fixed point, so save-format-save converges.
fn format_buffer_in_place(rpc: &Rpc) -> Result<(), crate::editor::EditorError> {
    let (line, col) = rpc.cursor_position()?;
    let lines = rpc.buffer_content()?;
    let content = lines.join("\n");

    let formatted = markdown::format(&content);
    if formatted == content || formatted.trim_end_matches('\n') == content {
        return Ok(());
    }

    let new_lines: Vec<String> = formatted
        .trim_end_matches('\n')
        .split('\n')
        .map(str::to_string)
        .collect();
    rpc.set_buffer_lines(&new_lines)?;

    // Restore the cursor, clamping the line to the new buffer length.
    let line = line.clamp(1, new_lines.len().max(1));
    let _ = rpc.set_cursor_position(line, col);

    rpc.exec_command("noautocmd write")
}

fn with_md_extension(name: &str) -> String {
    if name.ends_with(".md") {
        name.to_string()
    } else {
        format!("{name}.md")
    }
}

fn basename_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn note_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// OSC 52: hand yanked text to the hosting terminal's clipboard.
fn copy_to_clipboard(text: &str) {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    let mut out = io::stdout();
    let _ = out.write_all(format!("\x1b]52;c;{encoded}\x07").as_bytes());
    let _ = out.flush();
}

// ── entry point ────────────────────────────────────────────────────

/// Run the TUI until quit. Returns the process exit code.
pub fn run(cfg: Config) -> Result<i32, Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel::<AppMsg>();
    let mut app = App::new(cfg, tx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Restore the terminal even when a panel panics mid-draw.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let size = terminal.size()?;
    app.set_size(size.width, size.height);
    if let Err(e) = app.start_background() {
        restore_terminal(&mut terminal)?;
        return Err(e);
    }
    app.update_layout();

    let loop_result = run_event_loop(&mut terminal, &mut app, &rx);

    app.close();
    restore_terminal(&mut terminal)?;
    loop_result?;

    if let Some(msg) = app.take_fatal() {
        eprintln!("fatal: {msg}");
    }
    Ok(app.exit_code())
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn std::error::Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rx: &Receiver<AppMsg>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        // Worker messages first: buffer-written handling runs before any
        // keystrokes polled in the same tick.
        while let Ok(msg) = rx.try_recv() {
            app.handle_msg(msg);
        }
        app.tick();

        terminal.draw(|frame| app.render(frame))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.handle_key(key),
                Event::Resize(w, h) => app.handle_resize(w, h),
                _ => {}
            }
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            vault_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let (tx, _rx) = mpsc::channel();
        let mut app = App::new(cfg, tx);
        app.set_size(120, 40);
        (dir, app)
    }

    fn press(app: &mut App, c: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }

    #[test]
    fn test_leader_space_q_q_quits() {
        let (_dir, mut app) = test_app();
        press(&mut app, ' ');
        assert!(app.leader.active);
        press(&mut app, 'q');
        assert!(app.leader.active);
        press(&mut app, 'q');
        assert!(!app.leader.active);
        assert!(app.should_quit());
    }

    #[test]
    fn test_leader_unknown_key_cancels() {
        let (_dir, mut app) = test_app();
        press(&mut app, ' ');
        press(&mut app, '!');
        assert!(!app.leader.active);
        // A fresh Space starts over.
        press(&mut app, ' ');
        assert!(app.leader.active);
    }

    #[test]
    fn test_mode_change_away_from_normal_cancels_leader() {
        let (_dir, mut app) = test_app();
        press(&mut app, ' ');
        assert!(app.leader.active);

        app.handle_msg(AppMsg::Editor(Notification::ModeChanged {
            mode: NvimMode::Insert,
        }));
        assert!(!app.leader.active);

        // Back to normal, the next Space triggers fresh.
        app.handle_msg(AppMsg::Editor(Notification::ModeChanged {
            mode: NvimMode::Normal,
        }));
        press(&mut app, ' ');
        assert!(app.leader.active);
    }

    #[test]
    fn test_leader_works_from_tree_focus() {
        let (_dir, mut app) = test_app();
        // Leave the splash so side panels can take focus.
        app.editor.set_show_splash(false);
        app.set_focus(Focus::Tree);
        press(&mut app, ' ');
        assert!(app.leader.active);
        press(&mut app, 'v');
        press(&mut app, 't');
        assert!(!app.show_tree);
    }

    #[test]
    fn test_leader_timeout_flips_help() {
        let (_dir, mut app) = test_app();
        press(&mut app, ' ');
        assert!(!app.leader.show_help);
        app.leader.deadline = Some(Instant::now() - Duration::from_millis(1));
        app.tick();
        assert!(app.leader.show_help);
        assert!(!app.which_key.is_empty());
    }

    #[test]
    fn test_zen_mode_hides_both_panels() {
        let (_dir, mut app) = test_app();
        app.editor.set_show_splash(false);
        assert_eq!(app.panels_visible(), (true, true));
        app.toggle_zen();
        assert_eq!(app.panels_visible(), (false, false));
        app.toggle_zen();
        assert_eq!(app.panels_visible(), (true, true));
    }

    #[test]
    fn test_splash_hides_panels_and_swallows_editing_keys() {
        let (_dir, mut app) = test_app();
        assert!(app.editor.show_splash());
        assert_eq!(app.panels_visible(), (false, false));
        // Plain editing keys are discarded; nothing panics, nothing quits.
        press(&mut app, 'i');
        press(&mut app, 'x');
        assert!(!app.should_quit());
    }

    #[test]
    fn test_navigate_then_go_back_swaps_history() {
        let (dir, mut app) = test_app();
        fs::write(dir.path().join("x.md"), "x\n").unwrap();
        fs::write(dir.path().join("y.md"), "y\n").unwrap();

        app.navigate_to(Path::new("x.md"));
        assert_eq!(app.current_file.as_deref(), Some(Path::new("x.md")));
        assert_eq!(app.prev_file, None);

        app.navigate_to(Path::new("y.md"));
        assert_eq!(app.current_file.as_deref(), Some(Path::new("y.md")));
        assert_eq!(app.prev_file.as_deref(), Some(Path::new("x.md")));

        app.go_back();
        assert_eq!(app.current_file.as_deref(), Some(Path::new("x.md")));
        assert_eq!(app.prev_file.as_deref(), Some(Path::new("y.md")));

        // gb toggles
        app.go_back();
        assert_eq!(app.current_file.as_deref(), Some(Path::new("y.md")));
        assert_eq!(app.prev_file.as_deref(), Some(Path::new("x.md")));
    }

    #[test]
    fn test_go_back_skips_deleted_prev() {
        let (dir, mut app) = test_app();
        fs::write(dir.path().join("x.md"), "x\n").unwrap();
        fs::write(dir.path().join("y.md"), "y\n").unwrap();
        app.navigate_to(Path::new("x.md"));
        app.navigate_to(Path::new("y.md"));

        fs::remove_file(dir.path().join("x.md")).unwrap();
        app.go_back();
        // prev no longer exists: history entry dropped, current unchanged.
        assert_eq!(app.current_file.as_deref(), Some(Path::new("y.md")));
        assert_eq!(app.prev_file, None);
    }

    #[test]
    fn test_create_note_rejects_duplicate_basename_inline() {
        let (dir, mut app) = test_app();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/foo.md"), "existing\n").unwrap();

        // Index the existing note through a second connection, as the
        // background worker would.
        {
            let db =
                Index::open(&dir.path().join(".kopr").join("index.db")).unwrap();
            let idx = crate::index::Indexer::new(db, dir.path());
            idx.index_all().unwrap();
        }

        let ok = app.handle_create_note("foo");
        assert!(!ok);
        assert_eq!(
            app.prompt.error(),
            "\"foo.md\" already exists at notes/foo.md"
        );
        assert!(!dir.path().join("foo.md").exists());
    }

    #[test]
    fn test_with_md_extension() {
        assert_eq!(with_md_extension("alpha"), "alpha.md");
        assert_eq!(with_md_extension("alpha.md"), "alpha.md");
    }

    #[test]
    fn test_note_stem() {
        assert_eq!(note_stem(Path::new("dir/b.md")), "b");
        assert_eq!(note_stem(Path::new("c.md")), "c");
    }
}
