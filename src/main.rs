use anyhow::{Context, Result};
use clap::Parser;
use inmgr::input::InputManager;
use log::info;
use std::io::Write;
use std::path::PathBuf;

/// Devid used for the system keyboard
const KEYBOARD_DEVID: i64 = 0;

/// Load an input config, check it, and print it back out normalized
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input config file to load
    config: Option<PathBuf>,

    /// Connect the system keyboard, adding a default config for it if none matches
    #[arg(short, long)]
    keyboard: bool,

    /// Number of players
    #[arg(short, long, default_value = "2")]
    players: usize,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let mut manager = InputManager::new(None, args.players);

    if let Some(path) = &args.config {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        manager
            .load_config(&bytes)
            .with_context(|| format!("Failed to load {}", path.display()))?;
    }

    if args.keyboard {
        manager.connect(KEYBOARD_DEVID, None)?;
    }

    for (_, config) in manager.configs() {
        info!(
            "Config {:04x}:{:04x} '{}': {} rules{}",
            config.vendor(),
            config.product(),
            config.name(),
            config.rules().len(),
            if config.is_valid() { "" } else { " (incomplete)" }
        );
    }

    std::io::stdout()
        .write_all(&manager.save_config())
        .context("Failed to write config")?;

    Ok(())
}
