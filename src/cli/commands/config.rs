//! Config file command handlers

use anyhow::Context;
use std::path::Path;

use crate::config::Config;

pub fn cmd_init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save_to_path(path)?;

    println!("✓ Config written to {}", path.display());
    println!("Set QUILL_SECRET_KEY and QUILL_OAUTH_CLIENT_SECRET in the environment or a .env file.");
    Ok(())
}

/// Prints the effective config. Secrets are never serialized.
pub fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    config.validate()?;

    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    println!("{rendered}");

    let secret_state = |s: &str| if s.is_empty() { "unset" } else { "set" };
    println!("# server.secret_key: {}", secret_state(&config.server.secret_key));
    println!(
        "# oauth.client_secret: {}",
        secret_state(&config.oauth.client_secret)
    );
    println!("✓ Configuration is valid");
    Ok(())
}
