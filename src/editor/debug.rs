use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

static SINK: OnceLock<Option<Mutex<std::fs::File>>> = OnceLock::new();

/// Append a line to /tmp/kopr-debug.log when KOPR_DEBUG is set. The only
/// module-level mutable state in the crate, and it is opt-in.
pub(crate) fn write_line(args: std::fmt::Arguments) {
    let sink = SINK.get_or_init(|| {
        if std::env::var_os("KOPR_DEBUG").is_none() {
            return None;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/kopr-debug.log")
            .ok()
            .map(Mutex::new)
    });
    if let Some(file) = sink
        && let Ok(mut f) = file.lock()
    {
        let _ = writeln!(f, "{args}");
    }
}

macro_rules! debugf {
    ($($arg:tt)*) => {
        $crate::editor::debug::write_line(format_args!($($arg)*))
    };
}

pub(crate) use debugf;
