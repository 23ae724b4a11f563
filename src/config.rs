//! Startup configuration read from the environment
//!
//! Everything is read once in [`Config::from_env`]; the sequencer never looks at
//! the environment again. Missing required paths and values that would make the
//! grid or frame undrawable are startup errors.

use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::constants::{defaults, env as vars};
use crate::render::frame_dimensions;
use crate::wallpaper::Backend;

/// Grid and timing tunables for the frame sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Frame files are written to `{base_path}_{iteration}.png`
    pub base_path: PathBuf,
    pub cols: usize,
    pub rows: usize,
    /// Edge length of one cell in pixels
    pub cell_size: u32,
    /// Pause between cycles
    pub interval: Duration,
}

impl SequencerConfig {
    /// Reject configurations the grid or renderer cannot handle
    pub fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            bail!("{} must not be empty", vars::BASE_WALLPAPER_PATH);
        }
        crate::grid::Grid::new(self.cols, self.rows)
            .context("Invalid grid dimensions")?;
        frame_dimensions(self.cols, self.rows, self.cell_size)
            .context("Invalid frame size")?;
        Ok(())
    }
}

/// Wallpaper backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperConfig {
    pub backend: Backend,
    /// Program and fixed args for the command backend
    pub command: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub sequencer: SequencerConfig,
    pub wallpaper: WallpaperConfig,
    pub log_path: PathBuf,
    pub log_level: Level,
    /// Fixed seed for the initial grid; OS entropy when absent
    pub seed: Option<u64>,
}

impl Config {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("Required environment variable {name} is not set"))
        };

        let sequencer = SequencerConfig {
            base_path: PathBuf::from(required(vars::BASE_WALLPAPER_PATH)?),
            cols: parse_num(&lookup, vars::GRID_COLS)?.unwrap_or(defaults::GRID_COLS),
            rows: parse_num(&lookup, vars::GRID_ROWS)?.unwrap_or(defaults::GRID_ROWS),
            cell_size: parse_num(&lookup, vars::CELL_SIZE)?.unwrap_or(defaults::CELL_SIZE),
            interval: Duration::from_millis(
                parse_num(&lookup, vars::FRAME_INTERVAL_MS)?.unwrap_or(defaults::FRAME_INTERVAL_MS),
            ),
        };
        sequencer.validate()?;

        let backend = match lookup(vars::WALLPAPER_BACKEND) {
            Some(raw) => raw.parse::<Backend>()?,
            None => Backend::X11,
        };
        let command = lookup(vars::WALLPAPER_COMMAND).filter(|c| !c.trim().is_empty());
        if backend == Backend::Command && command.is_none() {
            bail!(
                "{} is required when {}=command",
                vars::WALLPAPER_COMMAND,
                vars::WALLPAPER_BACKEND
            );
        }
        let wallpaper = WallpaperConfig {
            backend,
            command,
            timeout: Duration::from_millis(
                parse_num(&lookup, vars::WALLPAPER_TIMEOUT_MS)?.unwrap_or(defaults::WALLPAPER_TIMEOUT_MS),
            ),
        };

        Ok(Self {
            sequencer,
            wallpaper,
            log_path: PathBuf::from(required(vars::BASE_LOGGING_PATH)?),
            log_level: parse_log_level(
                lookup(vars::LOG_LEVEL).as_deref().unwrap_or(defaults::LOG_LEVEL),
            ),
            seed: parse_num(&lookup, vars::GRID_SEED)?,
        })
    }
}

/// Export variables from a dotenv file without overriding ones already set.
/// Returns `false` when the file does not exist.
pub fn load_dotenv_from(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).context(format!("Failed to load {}", path.display())),
    }
}

/// Parse a decimal or `0x` hex number; unset is `None`, malformed is an error
fn parse_num<T, F>(lookup: &F, var: &str) -> Result<Option<T>>
where
    T: FromStr + TryFrom<u128>,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    <T as TryFrom<u128>>::Error: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let s = raw.trim();
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let n = u128::from_str_radix(hex, 16)
            .context(format!("{var}: invalid hex number '{s}'"))?;
        T::try_from(n).context(format!("{var}: value '{s}' out of range"))?
    } else {
        s.parse::<T>().context(format!("{var}: invalid number '{s}'"))?
    };
    Ok(Some(value))
}

fn parse_log_level(raw: &str) -> Level {
    match raw.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
