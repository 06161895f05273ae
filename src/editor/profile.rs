use std::fs;
use std::path::PathBuf;
use std::process::Command;

use crate::config::config_dir;

use super::EditorError;

const DEFAULT_INIT_LUA: &str = include_str!("init.lua");

/// Whether kopr manages the Neovim config or relies on the user's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileMode {
    Managed,
    User,
}

impl ProfileMode {
    pub fn from_str(s: &str) -> ProfileMode {
        match s {
            "user" => ProfileMode::User,
            _ => ProfileMode::Managed,
        }
    }
}

fn init_lua_path() -> PathBuf {
    config_dir().join("init.lua")
}

/// Set up the Neovim config directory for the given mode. Managed mode
/// writes init.lua if missing; user mode only warns when the directory
/// does not exist.
pub fn ensure_profile(mode: ProfileMode) -> Result<(), EditorError> {
    let dir = config_dir();

    if mode == ProfileMode::User {
        if !dir.exists() {
            eprintln!(
                "warning: {} does not exist, nvim will start with no config",
                dir.display()
            );
        }
        return Ok(());
    }

    fs::create_dir_all(&dir)?;
    let init = init_lua_path();
    if !init.exists() {
        fs::write(&init, DEFAULT_INIT_LUA)?;
    }
    Ok(())
}

/// Overwrite init.lua with the embedded default.
pub fn reset_profile() -> Result<(), EditorError> {
    fs::create_dir_all(config_dir())?;
    fs::write(init_lua_path(), DEFAULT_INIT_LUA)?;
    Ok(())
}

/// Verify that nvim is installed and at least 0.9.
pub fn check_nvim_version() -> Result<(), EditorError> {
    let output = Command::new("nvim")
        .arg("--version")
        .output()
        .map_err(|e| EditorError::MissingEditor(format!("nvim not found: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    // First line is like "NVIM v0.10.2"
    let version = stdout
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches("NVIM v");

    let (major, minor) = parse_semver(version).ok_or_else(|| {
        EditorError::MissingEditor(format!("could not parse nvim version {version:?}"))
    })?;

    if major == 0 && minor < 9 {
        return Err(EditorError::MissingEditor(format!(
            "nvim >= 0.9 required, found {major}.{minor}"
        )));
    }
    Ok(())
}

fn parse_semver(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor_part = parts.next()?;
    // Allow suffixes like "0.11.0-dev-123"
    let minor = minor_part
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_semver() {
        assert_eq!(parse_semver("0.10.2"), Some((0, 10)));
        assert_eq!(parse_semver("0.9"), Some((0, 9)));
        assert_eq!(parse_semver("1.0.0"), Some((1, 0)));
        assert_eq!(parse_semver("0.11.0-dev"), Some((0, 11)));
        assert_eq!(parse_semver("garbage"), None);
    }

    #[test]
    fn test_profile_mode_from_str() {
        assert_eq!(ProfileMode::from_str("user"), ProfileMode::User);
        assert_eq!(ProfileMode::from_str("managed"), ProfileMode::Managed);
        assert_eq!(ProfileMode::from_str("anything"), ProfileMode::Managed);
    }
}
