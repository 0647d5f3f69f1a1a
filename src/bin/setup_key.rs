//! setup-key — store the access key for the monitor.
//!
//! Reads the key interactively (hidden input) to keep it out of shell
//! history, trims it and saves it to the settings store. Use `--key` only for
//! scripted use. An empty key switches back to the free tier.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use kynetic_monitor::config::{AppConfig, CONFIG_PATH};
use kynetic_monitor::settings::{JsonFileStore, SettingsStore};

#[derive(Parser)]
#[command(name = "setup-key", about = "Save the access key used by the monitor")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Access key. If omitted, reads interactively with hidden input.
    #[arg(long)]
    key: Option<String>,

    /// Remove the stored key
    #[arg(long, conflicts_with = "key")]
    clear: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;
    let file = JsonFileStore::new(
        config
            .storage
            .settings_path
            .unwrap_or_else(JsonFileStore::default_path),
    );
    let path = file.path().to_path_buf();
    let mut store = SettingsStore::new(file);
    let mut settings = store.load()?;

    println!("=== Kynetic Monitor — Access Key Setup ===\n");

    let key = if cli.clear {
        String::new()
    } else {
        match cli.key {
            Some(key) => key,
            None => rpassword::prompt_password("Enter access key (empty for free tier): ")
                .context("failed to read access key")?,
        }
    };

    let changed = settings.set_api_key(&key);
    store.save(&settings)?;

    if settings.has_api_key() {
        println!("Key saved to {}", path.display());
        println!("The next monitor session will claim it; other devices using it are disconnected.");
    } else {
        println!("No key stored; the monitor runs on the free tier (30 min delay).");
    }
    if !changed {
        println!("(unchanged)");
    }
    Ok(())
}
