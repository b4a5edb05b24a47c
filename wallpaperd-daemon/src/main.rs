use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::Parser;

use wallpaperd_config::{ActiveConfig, Config};

mod backend;
mod compose;
mod event_loop;
mod signals;
mod x11;

#[derive(Parser)]
#[command(name = "wallpaperd", version, about = "X11 wallpaper daemon")]
struct Args {
    /// Configuration file, defaults to
    /// $XDG_CONFIG_HOME/wallpaperd/wallpaperd.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path().context("no configuration directory available")?,
    };

    let config = ActiveConfig::load(&config_path, SystemTime::now())
        .with_context(|| format!("failed to load configuration from {config_path:?}"))?;

    let (display, renderer) = x11::connect().context("failed to connect to the X11 display")?;
    let flags = signals::Flags::install();

    log::info!(
        "wallpaperd started in {} mode, configuration {config_path:?}",
        config.settings.mode
    );

    let mut daemon = event_loop::Daemon::new(display, renderer, config, config_path);
    daemon.run(&flags);

    log::info!("wallpaperd stopped");
    Ok(())
}
