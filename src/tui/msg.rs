use crate::editor::{EditorError, Notification, PtyOutput, Rpc};
use crate::index::IndexEvent;
use crate::theme::ExtractedColors;

/// Messages delivered to the update loop from worker threads. Workers never
/// touch app state; they only post one of these.
pub enum AppMsg {
    /// Editor PTY output (frames and EOF)
    Pty(PtyOutput),
    /// The background RPC connection attempt finished
    RpcConnected(Box<Result<Rpc, EditorError>>),
    /// An editor-originated notification (mode change, save, quit intent, ...)
    Editor(Notification),
    /// Colorscheme applied and highlight colors extracted
    ColorsReady(Result<ExtractedColors, String>),
    /// Index worker progress (initial index, per-file results)
    Index(IndexEvent),
    /// The filesystem watcher hit a fatal error
    WatcherFailed(String),
}
