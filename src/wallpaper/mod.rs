//! Desktop wallpaper backends
//!
//! The frame sequencer only needs one capability: put the image at this path on
//! the desktop. Backends implement [`WallpaperSetter`]; tests substitute a fake.

mod command;
mod x11;

pub use command::CommandSetter;
pub use x11::X11RootSetter;

use anyhow::{Result, bail};
use std::path::Path;
use std::str::FromStr;

/// Applies an image file as the desktop background
pub trait WallpaperSetter {
    fn apply(&mut self, path: &Path) -> Result<()>;
}

impl<S: WallpaperSetter + ?Sized> WallpaperSetter for Box<S> {
    fn apply(&mut self, path: &Path) -> Result<()> {
        (**self).apply(path)
    }
}

/// Which backend to construct at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Root window background pixmap on every X11 screen
    X11,
    /// External program invoked with the frame path
    Command,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "x11" => Ok(Backend::X11),
            "command" => Ok(Backend::Command),
            other => bail!("Unknown wallpaper backend '{other}' (expected 'x11' or 'command')"),
        }
    }
}
