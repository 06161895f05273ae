use clap::Parser;

#[derive(Parser)]
#[command(name = "kopr", about = concat!("kopr v", env!("CARGO_PKG_VERSION"), " - your notes are plain text"), version)]
pub struct Cli {
    /// Path to the vault directory
    #[arg(long)]
    pub vault: Option<String>,

    /// Run in SSH server mode
    #[arg(long)]
    pub serve: bool,

    /// Listen address for --serve (e.g. :2222)
    #[arg(long)]
    pub listen: Option<String>,

    /// Vim colorscheme name
    #[arg(long)]
    pub colorscheme: Option<String>,

    /// Neovim config mode: managed|user
    #[arg(long, value_name = "MODE")]
    pub nvim_mode: Option<String>,

    /// Leader key (default: space)
    #[arg(long, value_name = "KEY")]
    pub leader_key: Option<String>,

    /// Leader timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub leader_timeout: Option<u64>,

    /// Reset the managed Neovim config to defaults
    #[arg(long)]
    pub reset_nvim_config: bool,
}
