use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};

use super::EditorError;

/// Output read from the editor PTY.
#[derive(Debug)]
pub enum PtyOutput {
    /// A chunk of terminal bytes
    Frame(Vec<u8>),
    /// The PTY reached EOF (editor exited) or failed
    Closed(Option<String>),
}

/// Neovim running under a pseudo-terminal.
pub struct NvimPty {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    socket_path: PathBuf,
}

/// Spawn nvim with a listen socket, sized to the given dimensions, with the
/// vault as its working directory.
pub fn start_nvim(
    width: u16,
    height: u16,
    socket_path: &Path,
    cwd: &Path,
) -> Result<NvimPty, EditorError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: height,
            cols: width,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| EditorError::SpawnFailed(e.to_string()))?;

    let mut cmd = CommandBuilder::new("nvim");
    cmd.arg("--listen");
    cmd.arg(socket_path);
    cmd.cwd(cwd);
    cmd.env("NVIM_APPNAME", "kopr");
    cmd.env("TERM", "xterm-256color");

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| EditorError::SpawnFailed(e.to_string()))?;
    drop(pair.slave);

    let writer = pair
        .master
        .take_writer()
        .map_err(|e| EditorError::SpawnFailed(e.to_string()))?;

    Ok(NvimPty {
        master: pair.master,
        child,
        writer: Arc::new(Mutex::new(writer)),
        socket_path: socket_path.to_path_buf(),
    })
}

impl NvimPty {
    /// Shared writer used for keystrokes and emulator query replies.
    pub fn writer(&self) -> Arc<Mutex<Box<dyn Write + Send>>> {
        Arc::clone(&self.writer)
    }

    /// Start the dedicated reader thread. `on_output` runs on that thread
    /// and must only marshal the chunk into the app's channel.
    pub fn spawn_reader(
        &self,
        on_output: impl Fn(PtyOutput) + Send + 'static,
    ) -> Result<(), EditorError> {
        let mut reader = self
            .master
            .try_clone_reader()
            .map_err(|e| EditorError::SpawnFailed(e.to_string()))?;

        thread::spawn(move || {
            let mut buf = vec![0u8; 32 * 1024];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        on_output(PtyOutput::Closed(None));
                        return;
                    }
                    Ok(n) => on_output(PtyOutput::Frame(buf[..n].to_vec())),
                    Err(e) => {
                        on_output(PtyOutput::Closed(Some(e.to_string())));
                        return;
                    }
                }
            }
        });
        Ok(())
    }

    /// Forward raw keystroke bytes to the editor.
    pub fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut w = self.writer.lock().expect("pty writer lock");
        w.write_all(bytes)?;
        w.flush()
    }

    /// Resize the PTY. The ioctl alone is not always enough: Neovim also
    /// needs a SIGWINCH to reliably repaint after some resize sequences.
    pub fn resize(&self, width: u16, height: u16) -> Result<(), EditorError> {
        self.master
            .resize(PtySize {
                rows: height,
                cols: width,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| EditorError::Io(std::io::Error::other(e.to_string())))?;

        if let Some(pid) = self.child.process_id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGWINCH);
            }
        }
        Ok(())
    }

    /// Close the PTY, reap the editor process, and remove the socket file.
    pub fn close(self) -> Result<(), EditorError> {
        let NvimPty {
            master,
            mut child,
            writer,
            socket_path,
        } = self;
        drop(writer);
        drop(master);
        let _ = child.wait();
        match fs::remove_file(&socket_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EditorError::Io(e)),
        }
    }
}
