#![forbid(unsafe_code)]

mod config;
mod constants;
mod grid;
mod render;
mod sequencer;
mod wallpaper;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use config::Config;
use grid::Grid;
use sequencer::FrameSequencer;
use wallpaper::{Backend, CommandSetter, WallpaperSetter, X11RootSetter};

fn init_logging(config: &Config) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
        .context(format!("Failed to open log file {}", config.log_path.display()))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn build_setter(config: &Config) -> Result<Box<dyn WallpaperSetter>> {
    Ok(match config.wallpaper.backend {
        Backend::X11 => Box::new(X11RootSetter::connect()?),
        Backend::Command => {
            let command = config.wallpaper.command.as_deref().unwrap_or_default();
            Box::new(CommandSetter::new(command, config.wallpaper.timeout)?)
        }
    })
}

/// SIGINT/SIGTERM raise the stop flag so the sequencer can finish its cycle
fn register_shutdown(stop: &Arc<AtomicBool>) -> Result<()> {
    #[cfg(unix)]
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(stop))
            .context(format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let dotenv_loaded = config::load_dotenv_from(Path::new(constants::env::DOTENV_FILE))?;
    let config = Config::from_env().context("Invalid configuration")?;
    init_logging(&config)?;
    if dotenv_loaded {
        info!(file = constants::env::DOTENV_FILE, "Loaded environment overrides");
    }
    info!(config = ?config, "Configuration loaded");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let grid = Grid::random(config.sequencer.cols, config.sequencer.rows, &mut rng)?;
    info!(population = grid.population(), seed = ?config.seed, "Initial grid seeded");

    let setter = build_setter(&config)?;
    info!(backend = ?config.wallpaper.backend, "Wallpaper backend ready");

    let stop = Arc::new(AtomicBool::new(false));
    register_shutdown(&stop)?;

    let mut sequencer = FrameSequencer::new(config.sequencer.clone(), grid, setter, stop)?;
    let frames = sequencer.run();
    info!(frames, population = sequencer.grid().population(), "Shutting down");
    Ok(())
}
