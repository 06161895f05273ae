use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

/// Runtime configuration, assembled from defaults, config.toml and CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub vault_path: PathBuf,
    pub listen: String,
    pub serve: bool,
    /// Vim colorscheme name passed to :colorscheme
    pub colorscheme: String,
    /// GitHub owner/repo the colorscheme is fetched from (managed installs)
    pub colorscheme_repo: String,
    pub tree_width: u16,
    pub info_width: u16,
    pub show_tree: bool,
    pub show_info: bool,
    pub show_status: bool,
    pub leader_key: String,
    /// Milliseconds before the which-key popup appears
    pub leader_timeout: u64,
    pub nvim_mode: String,
    pub reset_nvim_config: bool,
    /// Run the deterministic Markdown formatter after each save
    pub auto_format_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        Config {
            vault_path: home.join("notes"),
            listen: ":2222".to_string(),
            serve: false,
            colorscheme: "no-clown-fiesta".to_string(),
            colorscheme_repo: "aktersnurra/no-clown-fiesta.nvim".to_string(),
            tree_width: 30,
            info_width: 30,
            show_tree: true,
            show_info: true,
            show_status: true,
            leader_key: " ".to_string(),
            leader_timeout: 500,
            nvim_mode: "managed".to_string(),
            reset_nvim_config: false,
            auto_format_on_save: true,
        }
    }
}

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Mirror of Config with optional fields so "not set" can be
/// distinguished from zero values when merging the TOML file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    vault_path: Option<String>,
    colorscheme: Option<String>,
    colorscheme_repo: Option<String>,
    nvim_mode: Option<String>,
    leader_key: Option<String>,
    leader_timeout: Option<u64>,
    auto_format_on_save: Option<bool>,
}

/// The kopr config directory, respecting XDG_CONFIG_HOME.
pub fn config_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return PathBuf::from(xdg).join("kopr");
    }
    let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".config").join("kopr")
}

/// Full path to config.toml.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl Config {
    /// Read config.toml and merge set fields over `self`.
    /// Returns true if the file existed.
    pub fn load_file(&mut self) -> Result<bool, ConfigError> {
        let path = config_path();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(ConfigError::Read { path, source: e }),
        };
        self.merge_toml(&text)?;
        Ok(true)
    }

    /// Merge set fields from a TOML document over `self`.
    pub fn merge_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let fc: FileConfig = toml::from_str(text)?;
        if let Some(v) = fc.vault_path {
            self.vault_path = expand_home(&v);
        }
        if let Some(v) = fc.colorscheme {
            self.colorscheme = v;
        }
        if let Some(v) = fc.colorscheme_repo {
            self.colorscheme_repo = v;
        }
        if let Some(v) = fc.nvim_mode {
            self.nvim_mode = v;
        }
        if let Some(v) = fc.leader_key {
            self.leader_key = v;
        }
        if let Some(v) = fc.leader_timeout {
            self.leader_timeout = v;
        }
        if let Some(v) = fc.auto_format_on_save {
            self.auto_format_on_save = v;
        }
        Ok(())
    }
}

/// Replace a leading ~ with the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if !path.starts_with('~') {
        return PathBuf::from(path);
    }
    let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    if path == "~" {
        return home;
    }
    home.join(path.trim_start_matches("~/"))
}

/// Normalize a vault path: expand ~ and make absolute so the Neovim cwd
/// and :w targets stay stable regardless of where kopr was launched.
pub fn normalize_vault_path(path: &Path) -> PathBuf {
    let expanded = match path.to_str() {
        Some(s) => expand_home(s),
        None => path.to_path_buf(),
    };
    match expanded.canonicalize() {
        Ok(abs) => abs,
        Err(_) => match env::current_dir() {
            Ok(cwd) if expanded.is_relative() => cwd.join(expanded),
            _ => expanded,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_toml_overrides_set_fields() {
        let mut cfg = Config::default();
        cfg.merge_toml("colorscheme = \"gruvbox\"\nleader_timeout = 750\n")
            .unwrap();
        assert_eq!(cfg.colorscheme, "gruvbox");
        assert_eq!(cfg.leader_timeout, 750);
        // Unset fields keep defaults
        assert_eq!(cfg.nvim_mode, "managed");
        assert!(cfg.auto_format_on_save);
    }

    #[test]
    fn test_merge_toml_false_is_distinct_from_unset() {
        let mut cfg = Config::default();
        cfg.merge_toml("auto_format_on_save = false\n").unwrap();
        assert!(!cfg.auto_format_on_save);
    }

    #[test]
    fn test_merge_toml_rejects_garbage() {
        let mut cfg = Config::default();
        assert!(cfg.merge_toml("not valid = = toml").is_err());
    }

    #[test]
    fn test_expand_home_passthrough() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("rel/path"), PathBuf::from("rel/path"));
    }
}
