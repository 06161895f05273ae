use std::collections::HashMap;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use rmpv::Value;

use super::{EditorError, NvimMode};

/// Connection retry budget: the editor may not have the socket ready
/// immediately after spawn.
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_DELAY: Duration = Duration::from_millis(100);

/// In-editor events converted into outbound notifications. Handlers on the
/// decoder thread do nothing but build one of these and hand it to the app.
#[derive(Debug, Clone)]
pub enum Notification {
    ModeChanged { mode: NvimMode },
    NoteClosed { save: bool },
    SaveUnnamed,
    BufferWritten { path: String },
    FollowLink,
    GoBack,
    Yank { text: String },
}

type Pending = Arc<Mutex<HashMap<u64, mpsc::Sender<Result<Value, Value>>>>>;

/// Bidirectional msgpack-rpc connection to the embedded Neovim.
pub struct Rpc {
    writer: Mutex<UnixStream>,
    pending: Pending,
    next_id: AtomicU64,
    mode: Arc<RwLock<NvimMode>>,
    channel_id: i64,
}

impl Rpc {
    /// Dial the editor socket and install the mode-change hook. `notify`
    /// runs on the decoder thread for every editor-originated notification.
    pub fn connect(
        socket_path: &Path,
        notify: impl Fn(Notification) + Send + Sync + 'static,
    ) -> Result<Rpc, EditorError> {
        let mut last_err = None;
        let mut stream = None;
        for _ in 0..CONNECT_ATTEMPTS {
            match UnixStream::connect(socket_path) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    last_err = Some(e);
                    thread::sleep(CONNECT_DELAY);
                }
            }
        }
        let stream = stream.ok_or_else(|| {
            EditorError::RpcConnectFailed(
                last_err
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no connection attempts made".to_string()),
            )
        })?;

        let reader = stream
            .try_clone()
            .map_err(|e| EditorError::RpcConnectFailed(e.to_string()))?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let mode = Arc::new(RwLock::new(NvimMode::Normal));

        spawn_decoder(reader, Arc::clone(&pending), Arc::clone(&mode), notify);

        let mut rpc = Rpc {
            writer: Mutex::new(stream),
            pending,
            next_id: AtomicU64::new(1),
            mode,
            channel_id: 0,
        };

        let info = rpc.request("nvim_get_api_info", vec![])?;
        rpc.channel_id = info
            .as_array()
            .and_then(|a| a.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| EditorError::RpcConnectFailed("bad api info reply".to_string()))?;

        rpc.setup_mode_events()?;
        Ok(rpc)
    }

    /// The editor's current mode, updated by the decoder thread.
    pub fn mode(&self) -> NvimMode {
        self.mode.read().expect("mode lock").clone()
    }

    fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, EditorError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        self.pending.lock().expect("pending lock").insert(id, tx);

        let msg = Value::Array(vec![
            Value::from(0),
            Value::from(id),
            Value::from(method),
            Value::Array(params),
        ]);

        {
            let mut w = self.writer.lock().expect("rpc writer lock");
            let write = rmpv::encode::write_value(&mut *w, &msg)
                .map_err(|e| EditorError::RpcFailure(format!("{method}: {e}")))
                .and_then(|()| {
                    w.flush()
                        .map_err(|e| EditorError::RpcFailure(format!("{method}: {e}")))
                });
            if let Err(e) = write {
                self.pending.lock().expect("pending lock").remove(&id);
                return Err(e);
            }
        }

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(EditorError::RpcFailure(format!(
                "{method}: {}",
                describe_error(&err)
            ))),
            Err(_) => Err(EditorError::RpcFailure(format!(
                "{method}: connection closed"
            ))),
        }
    }

    /// Run an Ex command in the editor.
    pub fn exec_command(&self, cmd: &str) -> Result<(), EditorError> {
        self.request("nvim_command", vec![Value::from(cmd)])?;
        Ok(())
    }

    /// Run Lua code in the editor; `...` receives the args.
    pub fn exec_lua(&self, code: &str, args: Vec<Value>) -> Result<Value, EditorError> {
        self.request(
            "nvim_exec_lua",
            vec![Value::from(code), Value::Array(args)],
        )
    }

    /// Open and display a file.
    pub fn open_file(&self, path: &str) -> Result<(), EditorError> {
        self.exec_lua(
            "vim.cmd('edit ' .. vim.fn.fnameescape(...))",
            vec![Value::from(path)],
        )?;
        Ok(())
    }

    /// The current buffer's file path; empty for an unnamed buffer.
    pub fn current_file(&self) -> Result<String, EditorError> {
        let v = self.exec_lua("return vim.api.nvim_buf_get_name(0)", vec![])?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    /// All lines of the current buffer.
    pub fn buffer_content(&self) -> Result<Vec<String>, EditorError> {
        let v = self.exec_lua("return vim.api.nvim_buf_get_lines(0, 0, -1, false)", vec![])?;
        let lines = v
            .as_array()
            .map(|a| {
                a.iter()
                    .map(|l| l.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(lines)
    }

    /// Replace the entire contents of the current buffer.
    pub fn set_buffer_lines(&self, lines: &[String]) -> Result<(), EditorError> {
        let values: Vec<Value> = lines.iter().map(|l| Value::from(l.as_str())).collect();
        self.exec_lua(
            "local lines = ...\nvim.api.nvim_buf_set_lines(0, 0, -1, false, lines)",
            vec![Value::Array(values)],
        )?;
        Ok(())
    }

    /// Rename the current buffer.
    pub fn set_buffer_name(&self, name: &str) -> Result<(), EditorError> {
        self.exec_lua(
            "vim.api.nvim_buf_set_name(0, ...)",
            vec![Value::from(name)],
        )?;
        Ok(())
    }

    /// Save the current buffer to disk.
    pub fn write_buffer(&self) -> Result<(), EditorError> {
        self.exec_command("w!")
    }

    /// New empty editable buffer.
    pub fn new_buffer(&self) -> Result<(), EditorError> {
        self.exec_command("enew!")
    }

    /// Scratch buffer backing the splash screen: no file, non-modifiable,
    /// wiped when hidden.
    pub fn load_splash_buffer(&self) -> Result<(), EditorError> {
        self.exec_command("enew! | setlocal buftype=nofile bufhidden=wipe nomodifiable noswapfile")
    }

    /// Cursor position as (line, col): 1-based line, 0-based col.
    pub fn cursor_position(&self) -> Result<(usize, usize), EditorError> {
        let v = self.exec_lua("return vim.api.nvim_win_get_cursor(0)", vec![])?;
        let pair = v.as_array().ok_or_else(|| {
            EditorError::RpcFailure("cursor_position: unexpected reply".to_string())
        })?;
        let line = pair.first().and_then(Value::as_u64).unwrap_or(1) as usize;
        let col = pair.get(1).and_then(Value::as_u64).unwrap_or(0) as usize;
        Ok((line, col))
    }

    /// Best-effort cursor move. 1-based line, 0-based col.
    pub fn set_cursor_position(&self, line: usize, col: usize) -> Result<(), EditorError> {
        self.exec_lua(
            "local l, c = ...\npcall(vim.api.nvim_win_set_cursor, 0, {l, c})",
            vec![Value::from(line as u64), Value::from(col as u64)],
        )?;
        Ok(())
    }

    /// Tell the editor to exit: remove the quit intercept, then force quit.
    /// Errors are expected here, the connection may die mid-command.
    pub fn quit(&self) {
        let _ = self.exec_lua("vim.api.nvim_clear_autocmds({event='QuitPre'})", vec![]);
        let _ = self.exec_command("qa!");
    }

    /// Set the active colorscheme.
    pub fn apply_colorscheme(&self, name: &str) -> Result<(), EditorError> {
        self.exec_lua("vim.cmd('colorscheme ' .. ...)", vec![Value::from(name)])?;
        Ok(())
    }

    /// Query highlight groups and return group name → (fg, bg) hex strings.
    /// Groups missing from the colorscheme are skipped.
    pub fn extract_colors(&self) -> Result<HashMap<String, (String, String)>, EditorError> {
        let groups = [
            "Normal",
            "Function",
            "Keyword",
            "Comment",
            "NonText",
            "LineNr",
            "WinSeparator",
            "StatusLine",
            "DiagnosticError",
            "String",
            "Visual",
            "WarningMsg",
        ];

        let mut result = HashMap::new();
        for group in groups {
            let Ok(raw) = self.exec_lua(
                "return vim.api.nvim_get_hl(0, {name=..., link=false})",
                vec![Value::from(group)],
            ) else {
                continue;
            };
            let Some(map) = raw.as_map() else { continue };

            let mut fg = String::new();
            let mut bg = String::new();
            for (key, value) in map {
                match key.as_str() {
                    Some("fg") => fg = int_to_hex(value),
                    Some("bg") => bg = int_to_hex(value),
                    _ => {}
                }
            }
            if !fg.is_empty() || !bg.is_empty() {
                result.insert(group.to_string(), (fg, bg));
            }
        }
        Ok(result)
    }

    /// Clear explicit backgrounds on common groups so the editor uses the
    /// terminal default, preserving terminal transparency. Best-effort: a
    /// group may not exist in the active colorscheme.
    pub fn clear_highlight_bgs(&self) {
        for group in [
            "Normal",
            "NonText",
            "EndOfBuffer",
            "FoldColumn",
            "SignColumn",
            "NormalNC",
        ] {
            let _ = self.exec_command(&format!("hi {group} guibg=NONE"));
        }
    }

    fn setup_mode_events(&self) -> Result<(), EditorError> {
        let chan = self.channel_id;
        let lua = format!(
            r#"vim.api.nvim_create_autocmd('ModeChanged', {{
  callback = function()
    vim.rpcnotify({chan}, 'mode_changed', vim.v.event.old_mode, vim.v.event.new_mode)
  end,
}})"#
        );
        self.exec_lua(&lua, vec![])?;
        Ok(())
    }

    /// Remap quit/save commands to notifications so the application process
    /// survives `:q` and friends. ZZ saves and closes the note, ZQ discards.
    pub fn setup_quit_save_intercept(&self) -> Result<(), EditorError> {
        let chan = self.channel_id;
        let lua = format!(
            r#"local chan = {chan}

-- Intercept all quit commands via QuitPre.
-- Throwing aborts the :q/:wq/:qa; for :wq on named files the write has
-- already happened before QuitPre fires.
vim.api.nvim_create_autocmd('QuitPre', {{
  callback = function()
    vim.rpcnotify(chan, 'kopr:close-note', false)
    error('Kopr')
  end,
}})

vim.keymap.set('n', 'ZZ', function()
  vim.rpcnotify(chan, 'kopr:close-note', true)
end, {{noremap=true}})
vim.keymap.set('n', 'ZQ', function()
  vim.rpcnotify(chan, 'kopr:close-note', false)
end, {{noremap=true}})

-- :w/:wq/:x on unnamed buffers become save-as requests.
vim.cmd([[cnoreabbrev <expr> w  getcmdtype()==':' && getcmdline()=='w'  && bufname()=='' ? 'lua vim.rpcnotify(]] .. chan .. [[, "kopr:save-unnamed")' : 'w']])
vim.cmd([[cnoreabbrev <expr> wq getcmdtype()==':' && getcmdline()=='wq' && bufname()=='' ? 'lua vim.rpcnotify(]] .. chan .. [[, "kopr:close-note", true)' : 'wq']])
vim.cmd([[cnoreabbrev <expr> x  getcmdtype()==':' && getcmdline()=='x'  && bufname()=='' ? 'lua vim.rpcnotify(]] .. chan .. [[, "kopr:close-note", true)' : 'x']])
"#
        );
        self.exec_lua(&lua, vec![])?;
        Ok(())
    }

    /// Notify after every buffer write, with the absolute path.
    pub fn setup_save_notify(&self) -> Result<(), EditorError> {
        let chan = self.channel_id;
        let lua = format!(
            r#"vim.api.nvim_create_augroup('KoprBufWrite', {{clear=true}})
vim.api.nvim_create_autocmd('BufWritePost', {{
  group = 'KoprBufWrite',
  callback = function(args)
    if args == nil or args.file == nil or args.file == '' then
      return
    end
    vim.rpcnotify({chan}, 'kopr:buf-written', args.file)
  end,
}})"#
        );
        self.exec_lua(&lua, vec![])?;
        Ok(())
    }

    /// gf follows the wiki link under the cursor, gb goes back.
    pub fn setup_link_navigation(&self) -> Result<(), EditorError> {
        let chan = self.channel_id;
        let lua = format!(
            r#"vim.keymap.set('n', 'gf', function()
  vim.rpcnotify({chan}, 'kopr:follow-link')
end, {{noremap=true, desc='Follow wiki link'}})
vim.keymap.set('n', 'gb', function()
  vim.rpcnotify({chan}, 'kopr:go-back')
end, {{noremap=true, desc='Go back to previous note'}})"#
        );
        self.exec_lua(&lua, vec![])?;
        Ok(())
    }

    /// Forward yanked text for clipboard integration.
    pub fn setup_yank_notify(&self) -> Result<(), EditorError> {
        let chan = self.channel_id;
        let lua = format!(
            r#"vim.api.nvim_create_autocmd('TextYankPost', {{
  callback = function()
    local ev = vim.v.event
    if ev.operator == 'y' then
      vim.rpcnotify({chan}, 'kopr:yank', table.concat(ev.regcontents, '\n'))
    end
  end,
}})"#
        );
        self.exec_lua(&lua, vec![])?;
        Ok(())
    }
}

fn spawn_decoder(
    mut reader: UnixStream,
    pending: Pending,
    mode: Arc<RwLock<NvimMode>>,
    notify: impl Fn(Notification) + Send + Sync + 'static,
) {
    thread::spawn(move || {
        loop {
            let value = match rmpv::decode::read_value(&mut reader) {
                Ok(v) => v,
                Err(_) => break,
            };
            let Value::Array(items) = value else { continue };
            match items.first().and_then(Value::as_u64) {
                // Response: [1, msgid, error, result]
                Some(1) => {
                    let Some(id) = items.get(1).and_then(Value::as_u64) else {
                        continue;
                    };
                    let Some(tx) = pending.lock().expect("pending lock").remove(&id) else {
                        continue;
                    };
                    let err = items.get(2).cloned().unwrap_or(Value::Nil);
                    let result = items.get(3).cloned().unwrap_or(Value::Nil);
                    let _ = tx.send(if err.is_nil() { Ok(result) } else { Err(err) });
                }
                // Notification: [2, method, params]
                Some(2) => {
                    let method = items.get(1).and_then(Value::as_str).unwrap_or_default();
                    let params = items
                        .get(2)
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();
                    dispatch_notification(method, &params, &mode, &notify);
                }
                _ => {}
            }
        }

        // Wake any requests still blocked on a reply: dropping the senders
        // turns their recv() into a disconnect error.
        pending.lock().expect("pending lock").clear();
    });
}

fn dispatch_notification(
    method: &str,
    params: &[Value],
    mode: &Arc<RwLock<NvimMode>>,
    notify: &impl Fn(Notification),
) {
    match method {
        "mode_changed" => {
            let Some(new_mode) = params.get(1).and_then(Value::as_str) else {
                return;
            };
            let new_mode = NvimMode::from_event(new_mode);
            *mode.write().expect("mode lock") = new_mode.clone();
            notify(Notification::ModeChanged { mode: new_mode });
        }
        "kopr:close-note" => {
            let save = params.first().and_then(Value::as_bool).unwrap_or(false);
            notify(Notification::NoteClosed { save });
        }
        "kopr:save-unnamed" => notify(Notification::SaveUnnamed),
        "kopr:buf-written" => {
            let Some(path) = params.first().and_then(Value::as_str) else {
                return;
            };
            notify(Notification::BufferWritten {
                path: path.to_string(),
            });
        }
        "kopr:follow-link" => notify(Notification::FollowLink),
        "kopr:go-back" => notify(Notification::GoBack),
        "kopr:yank" => {
            let text = params
                .first()
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            notify(Notification::Yank { text });
        }
        _ => {}
    }
}

/// Render a msgpack-rpc error value ([type, message] or free-form) tersely.
fn describe_error(err: &Value) -> String {
    if let Some(items) = err.as_array()
        && let Some(msg) = items.get(1).and_then(Value::as_str)
    {
        return msg.to_string();
    }
    err.to_string()
}

/// Convert an integer-typed highlight color to a #rrggbb hex string.
fn int_to_hex(v: &Value) -> String {
    match v.as_u64() {
        Some(n) => format!("#{:06x}", n & 0xFFFFFF),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_hex() {
        assert_eq!(int_to_hex(&Value::from(0xcba6f7u64)), "#cba6f7");
        assert_eq!(int_to_hex(&Value::from(0u64)), "#000000");
        assert_eq!(int_to_hex(&Value::from("nope")), "");
    }

    #[test]
    fn test_describe_error_pair() {
        let err = Value::Array(vec![Value::from(0), Value::from("Vim:E492: Not a command")]);
        assert_eq!(describe_error(&err), "Vim:E492: Not a command");
    }

    #[test]
    fn test_dispatch_mode_changed_updates_cache() {
        let mode = Arc::new(RwLock::new(NvimMode::Normal));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let notify = move |n: Notification| seen2.lock().unwrap().push(n);

        dispatch_notification(
            "mode_changed",
            &[Value::from("n"), Value::from("i")],
            &mode,
            &notify,
        );
        assert_eq!(*mode.read().unwrap(), NvimMode::Insert);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispatch_close_note_default_save_false() {
        let mode = Arc::new(RwLock::new(NvimMode::Normal));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let notify = move |n: Notification| seen2.lock().unwrap().push(n);

        dispatch_notification("kopr:close-note", &[], &mode, &notify);
        match &seen.lock().unwrap()[0] {
            Notification::NoteClosed { save } => assert!(!save),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
