use std::path::PathBuf;
use std::{fs, process};

use clap::Parser;

use kopr::cli::Cli;
use kopr::config::{Config, normalize_vault_path};
use kopr::editor::{ProfileMode, check_nvim_version, ensure_profile, reset_profile};

fn main() {
    let cli = Cli::parse();

    let mut cfg = Config::default();
    if let Err(e) = cfg.load_file() {
        eprintln!("error loading config: {e}");
        process::exit(1);
    }

    if let Some(vault) = cli.vault {
        cfg.vault_path = PathBuf::from(vault);
    }
    cfg.vault_path = normalize_vault_path(&cfg.vault_path);
    cfg.serve = cli.serve;
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Some(colorscheme) = cli.colorscheme {
        cfg.colorscheme = colorscheme;
    }
    if let Some(mode) = cli.nvim_mode {
        cfg.nvim_mode = mode;
    }
    if let Some(key) = cli.leader_key {
        cfg.leader_key = key;
    }
    if let Some(timeout) = cli.leader_timeout {
        cfg.leader_timeout = timeout;
    }
    cfg.reset_nvim_config = cli.reset_nvim_config;

    if let Err(e) = fs::create_dir_all(&cfg.vault_path) {
        eprintln!("error creating vault dir: {e}");
        process::exit(1);
    }
    if let Err(e) = fs::create_dir_all(cfg.vault_path.join(".kopr")) {
        eprintln!("error creating .kopr dir: {e}");
        process::exit(1);
    }

    // Missing or too-old editor binary is its own failure class.
    if let Err(e) = check_nvim_version() {
        eprintln!("{e}");
        process::exit(2);
    }

    if cfg.reset_nvim_config {
        if let Err(e) = reset_profile() {
            eprintln!("reset nvim config: {e}");
            process::exit(1);
        }
        eprintln!("reset Neovim config");
    }

    if let Err(e) = ensure_profile(ProfileMode::from_str(&cfg.nvim_mode)) {
        eprintln!("neovim profile: {e}");
        process::exit(1);
    }

    if cfg.serve {
        // The SSH front-end lives outside this binary; the app itself makes
        // no global stdio assumptions and is constructible per session.
        eprintln!("--serve requires the SSH front-end, which is not part of this build");
        process::exit(1);
    }

    match kopr::tui::run(cfg) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
