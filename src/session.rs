use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Persisted session state (written to <vault>/.kopr/state.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub open_files: Vec<String>,
    pub show_tree: bool,
    pub show_info: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_width: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_width: Option<u16>,
}

impl Default for State {
    fn default() -> Self {
        State {
            active_file: None,
            open_files: Vec::new(),
            show_tree: true,
            show_info: true,
            tree_width: Some(30),
            info_width: Some(30),
        }
    }
}

/// Handles session state persistence for one vault.
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(vault_path: &Path) -> Store {
        Store {
            path: vault_path.join(".kopr").join("state.json"),
        }
    }

    /// Read the session state from disk. A missing or corrupt file yields defaults.
    pub fn load(&self) -> State {
        let Ok(data) = fs::read_to_string(&self.path) else {
            return State::default();
        };
        serde_json::from_str(&data).unwrap_or_default()
    }

    /// Write the session state atomically (temp file + rename).
    pub fn save(&self, state: &State) -> Result<(), std::io::Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());

        let state = State {
            active_file: Some("notes/a.md".into()),
            show_tree: false,
            show_info: true,
            tree_width: Some(25),
            ..State::default()
        };
        store.save(&state).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.active_file.as_deref(), Some("notes/a.md"));
        assert!(!loaded.show_tree);
        assert!(loaded.show_info);
        assert_eq!(loaded.tree_width, Some(25));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let state = store.load();
        assert!(state.show_tree);
        assert!(state.show_info);
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let kopr = dir.path().join(".kopr");
        fs::create_dir_all(&kopr).unwrap();
        fs::write(kopr.join("state.json"), "{not json").unwrap();

        let store = Store::new(dir.path());
        let state = store.load();
        assert!(state.show_tree);
    }
}
