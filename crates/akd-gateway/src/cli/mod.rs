pub mod chat;
pub mod config;

use clap::{Parser, Subcommand};

/// akd — a development-workstation agents daemon.
#[derive(Debug, Parser)]
#[command(name = "akd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the daemon (default when no subcommand is given).
    Serve,
    /// Interactive REPL against a single session.
    Chat {
        /// Working directory for the new session.
        #[arg(long)]
        cwd: Option<String>,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `AKD_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the path
/// that was used. Shared by `serve`, `chat`, and `config` subcommands.
pub fn load_config() -> anyhow::Result<(akd_domain::config::Config, String)> {
    let config_path = std::env::var("AKD_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let path = std::path::Path::new(&config_path);
    let config = akd_domain::config::Config::load(Some(path))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}
