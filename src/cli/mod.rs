//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::{cmd_check_config, cmd_init_config};

/// Quill - a small blog with TOTP login and an OAuth2 relay
#[derive(Parser)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default search path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the web server (default)
    Serve,

    /// Write a default config file
    InitConfig {
        #[arg(long, default_value = "config.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the config, then print it without secrets
    CheckConfig,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["quill"]);
        assert_eq!(cli.command(), Commands::Serve);
        assert!(cli.config.is_none());
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["quill", "serve", "--config", "/etc/quill.toml"]);
        assert_eq!(cli.command(), Commands::Serve);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/quill.toml")));
    }

    #[test]
    fn init_config_defaults_path() {
        let cli = Cli::parse_from(["quill", "init-config"]);
        assert_eq!(
            cli.command(),
            Commands::InitConfig {
                path: PathBuf::from("config.toml"),
                force: false
            }
        );
    }
}
