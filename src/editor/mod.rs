pub(crate) mod debug;
pub mod input;
pub mod profile;
pub mod pty;
pub mod rpc;
pub mod vt;

use debug::debugf;

pub use input::key_event_to_bytes;
pub use profile::{ProfileMode, check_nvim_version, ensure_profile, reset_profile};
pub use pty::{NvimPty, PtyOutput, start_nvim};
pub use rpc::{Notification, Rpc};
pub use vt::VtScreen;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, process, thread};

use crossterm::event::KeyEvent;

/// Error type for the editor host
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("could not start editor: {0}")]
    SpawnFailed(String),
    #[error("editor binary unusable: {0}")]
    MissingEditor(String),
    #[error("could not connect to editor socket: {0}")]
    RpcConnectFailed(String),
    #[error("editor rpc failed: {0}")]
    RpcFailure(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Neovim's current mode, as reported by ModeChanged events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NvimMode {
    Normal,
    Insert,
    Visual,
    VisualLine,
    VisualBlock,
    Command,
    Replace,
    Terminal,
    Other(String),
}

impl NvimMode {
    /// Map a raw mode string from v:event. Operator-pending and other
    /// composite modes keep their raw form.
    pub fn from_event(s: &str) -> NvimMode {
        match s {
            "n" => NvimMode::Normal,
            "i" => NvimMode::Insert,
            "v" => NvimMode::Visual,
            "V" => NvimMode::VisualLine,
            "\u{16}" => NvimMode::VisualBlock,
            "c" => NvimMode::Command,
            "R" => NvimMode::Replace,
            "t" => NvimMode::Terminal,
            other => NvimMode::Other(other.to_string()),
        }
    }

    /// Status-bar badge text.
    pub fn display_name(&self) -> String {
        match self {
            NvimMode::Normal => "NORMAL".to_string(),
            NvimMode::Insert => "INSERT".to_string(),
            NvimMode::Visual => "VISUAL".to_string(),
            NvimMode::VisualLine => "V-LINE".to_string(),
            NvimMode::VisualBlock => "V-BLOCK".to_string(),
            NvimMode::Command => "COMMAND".to_string(),
            NvimMode::Replace => "REPLACE".to_string(),
            NvimMode::Terminal => "TERMINAL".to_string(),
            NvimMode::Other(s) => s.to_uppercase(),
        }
    }
}

/// The editor host: Neovim under a PTY, its virtual screen, and the RPC
/// channel. Oblivious to vault semantics; the app drives it.
pub struct Editor {
    vault_path: PathBuf,
    socket_path: PathBuf,
    pty: Option<NvimPty>,
    screen: Option<VtScreen>,
    rpc: Option<Arc<Rpc>>,
    show_splash: bool,
    width: u16,
    height: u16,
}

impl Editor {
    pub fn new(vault_path: &Path) -> Editor {
        Editor {
            vault_path: vault_path.to_path_buf(),
            socket_path: std::env::temp_dir().join(format!("kopr-{}.sock", process::id())),
            pty: None,
            screen: None,
            rpc: None,
            show_splash: true,
            width: 0,
            height: 0,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Spawn the editor and its PTY reader thread, create the screen, and
    /// start the RPC connection attempt on a background thread. The reader
    /// and connector report back through the given callbacks.
    pub fn start(
        &mut self,
        width: u16,
        height: u16,
        on_output: impl Fn(PtyOutput) + Send + 'static,
        on_rpc: impl FnOnce(Result<Rpc, EditorError>) + Send + 'static,
        notify: impl Fn(Notification) + Send + Sync + 'static,
    ) -> Result<(), EditorError> {
        if let Err(e) = fs::remove_file(&self.socket_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(EditorError::Io(e));
        }

        self.width = width.max(1);
        self.height = height.max(1);

        let pty = start_nvim(self.width, self.height, &self.socket_path, &self.vault_path)?;
        pty.spawn_reader(on_output)?;
        self.screen = Some(VtScreen::new(self.width, self.height, pty.writer()));
        self.pty = Some(pty);

        let socket = self.socket_path.clone();
        thread::spawn(move || {
            on_rpc(Rpc::connect(&socket, notify));
        });
        Ok(())
    }

    pub fn attach_rpc(&mut self, rpc: Rpc) -> Arc<Rpc> {
        let rpc = Arc::new(rpc);
        self.rpc = Some(Arc::clone(&rpc));
        rpc
    }

    pub fn rpc(&self) -> Option<&Arc<Rpc>> {
        self.rpc.as_ref()
    }

    /// Current editor mode; Normal until the RPC channel reports otherwise.
    pub fn mode(&self) -> NvimMode {
        self.rpc
            .as_ref()
            .map(|r| r.mode())
            .unwrap_or(NvimMode::Normal)
    }

    /// Ingest a chunk of editor output into the virtual screen.
    pub fn feed(&mut self, bytes: &[u8]) {
        if let Some(screen) = &mut self.screen {
            screen.feed(bytes);
        }
    }

    /// Resize the PTY (never to zero) and recreate the emulator. A redraw
    /// nudge covers terminals that end up with a blank frame otherwise.
    pub fn resize(&mut self, width: u16, height: u16) -> Result<(), EditorError> {
        let width = width.max(1);
        let height = height.max(1);
        if width == self.width && height == self.height {
            return Ok(());
        }
        debugf!(
            "resize {}x{} -> {width}x{height} splash={}",
            self.width,
            self.height,
            self.show_splash
        );
        self.width = width;
        self.height = height;

        let Some(pty) = &self.pty else {
            return Ok(());
        };
        pty.resize(width, height)?;

        if let Some(screen) = self.screen.take() {
            self.screen = Some(screen.resize(width, height));
        }

        if let Some(rpc) = &self.rpc
            && !self.show_splash
        {
            rpc.exec_command("redraw!")?;
        }
        Ok(())
    }

    /// Forward a keystroke to the editor.
    pub fn send_key(&self, key: &KeyEvent) -> Result<(), EditorError> {
        let Some(pty) = &self.pty else {
            return Ok(());
        };
        if let Some(bytes) = key_event_to_bytes(key) {
            pty.write(&bytes)?;
        }
        Ok(())
    }

    /// Open a file, leaving the splash screen.
    pub fn open_file(&mut self, path: &Path) -> Result<(), EditorError> {
        let rpc = self
            .rpc
            .as_ref()
            .ok_or_else(|| EditorError::RpcFailure("rpc not connected".to_string()))?;
        self.show_splash = false;
        rpc.open_file(&path.to_string_lossy())
    }

    pub fn show_splash(&self) -> bool {
        self.show_splash
    }

    pub fn set_show_splash(&mut self, show: bool) {
        self.show_splash = show;
    }

    /// The emulator's cursor marker only shows while the editor pane has
    /// focus.
    pub fn set_focused(&mut self, focused: bool) {
        if let Some(screen) = &mut self.screen {
            screen.set_show_cursor(focused);
        }
    }

    pub fn screen(&self) -> Option<&VtScreen> {
        self.screen.as_ref()
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Tear everything down: quit via RPC, close the PTY, reap the process.
    /// Best-effort; close errors are reported but never abort shutdown.
    pub fn close(&mut self) {
        if let Some(rpc) = self.rpc.take() {
            rpc.quit();
        }
        self.screen = None;
        if let Some(pty) = self.pty.take()
            && let Err(e) = pty.close()
        {
            eprintln!("fatal: close editor: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_event() {
        assert_eq!(NvimMode::from_event("n"), NvimMode::Normal);
        assert_eq!(NvimMode::from_event("i"), NvimMode::Insert);
        assert_eq!(NvimMode::from_event("V"), NvimMode::VisualLine);
        assert_eq!(NvimMode::from_event("\u{16}"), NvimMode::VisualBlock);
        assert_eq!(
            NvimMode::from_event("no"),
            NvimMode::Other("no".to_string())
        );
    }

    #[test]
    fn test_mode_display_names() {
        assert_eq!(NvimMode::Normal.display_name(), "NORMAL");
        assert_eq!(NvimMode::VisualBlock.display_name(), "V-BLOCK");
        assert_eq!(NvimMode::Other("no".into()).display_name(), "NO");
    }

    #[test]
    fn test_editor_defaults_before_start() {
        let editor = Editor::new(Path::new("/tmp"));
        assert!(editor.show_splash());
        assert_eq!(editor.mode(), NvimMode::Normal);
        assert!(editor.screen().is_none());
    }
}
