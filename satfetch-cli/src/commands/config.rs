//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path` commands
//! for viewing and modifying configuration settings from the command line.

use clap::Subcommand;
use satfetch::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Shown instead of passwords.
const MASK: &str = "********";

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., download.store)
        key: String,
    },

    /// Set a configuration value (an empty value clears it)
    Set {
        /// Configuration key in format section.key (e.g., download.store)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List {
        /// Show passwords in clear text
        #[arg(long)]
        show_secrets: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List { show_secrets } => run_list(show_secrets),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'satfetch config list' to see available keys.",
            key
        ))
    })
}

/// Get a configuration value.
fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load().unwrap_or_default();
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value.
fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load().unwrap_or_default();
    config_key.set(&mut config, value)?;
    config.save()?;

    if config_key.is_secret() {
        println!("Set {}", config_key.name());
    } else {
        println!("Set {} = {}", config_key.name(), value);
    }

    Ok(())
}

/// List all configuration settings.
fn run_list(show_secrets: bool) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();

    println!("Configuration Settings");
    println!("======================");
    println!();

    for line in listing(&config, show_secrets) {
        println!("{}", line);
    }

    Ok(())
}

/// Lines of `config list`, one `[section]` header per section.
fn listing(config: &ConfigFile, show_secrets: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                lines.push(String::new());
            }
            lines.push(format!("[{}]", section));
            current_section = section;
        }

        let value = key.get(config);
        let shown = if value.is_empty() {
            "(not set)"
        } else if key.is_secret() && !show_secrets {
            MASK
        } else {
            value.as_str()
        };
        lines.push(format!("  {} = {}", key.key_name(), shown));
    }

    lines
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
