//! Application-wide constants
//!
//! Defaults, environment variable names and validation bounds live here so the
//! rest of the crate never carries a bare magic number.

/// Frame colors (RGB)
pub mod colors {
    /// Dead cells and everything outside a live block
    pub const BACKGROUND: [u8; 3] = [0, 0, 0];

    /// Live cells (hot pink)
    pub const LIVE_CELL: [u8; 3] = [255, 105, 180];
}

/// Defaults for tunables not set in the environment
pub mod defaults {
    pub const GRID_COLS: usize = 100;
    pub const GRID_ROWS: usize = 80;
    pub const CELL_SIZE: u32 = 15;
    pub const FRAME_INTERVAL_MS: u64 = 500;
    pub const LOG_LEVEL: &str = "debug";
    pub const WALLPAPER_TIMEOUT_MS: u64 = 10_000;
}

/// Environment variable names
pub mod env {
    /// Optional file in the working directory supplying any of the variables below
    pub const DOTENV_FILE: &str = ".env";

    pub const BASE_WALLPAPER_PATH: &str = "BASE_WALLPAPER_PATH";
    pub const BASE_LOGGING_PATH: &str = "BASE_LOGGING_PATH";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const GRID_COLS: &str = "GRID_COLS";
    pub const GRID_ROWS: &str = "GRID_ROWS";
    pub const CELL_SIZE: &str = "CELL_SIZE";
    pub const FRAME_INTERVAL_MS: &str = "FRAME_INTERVAL_MS";
    pub const GRID_SEED: &str = "GRID_SEED";
    pub const WALLPAPER_BACKEND: &str = "WALLPAPER_BACKEND";
    pub const WALLPAPER_COMMAND: &str = "WALLPAPER_COMMAND";
    pub const WALLPAPER_TIMEOUT_MS: &str = "WALLPAPER_TIMEOUT_MS";
}

/// Validation bounds for configuration values
pub mod validation {
    /// Grid dimension range (cells, inclusive)
    pub const MIN_GRID_DIMENSION: usize = 1;
    pub const MAX_GRID_DIMENSION: usize = 4096;

    /// Cell size range (pixels, inclusive)
    pub const MIN_CELL_SIZE: u32 = 1;
    pub const MAX_CELL_SIZE: u32 = 256;

    /// Largest rendered frame edge in pixels
    pub const MAX_FRAME_DIMENSION: u32 = 16384;
}

/// Frame file naming
pub mod frames {
    /// Extension appended after `{base}_{iteration}`
    pub const EXTENSION: &str = "png";
}

/// Frame sequencer timing
pub mod timing {
    /// Longest single wait while sleeping between frames; bounds shutdown latency
    pub const STOP_POLL_MS: u64 = 50;

    /// Poll interval while waiting on an external wallpaper command
    pub const COMMAND_POLL_MS: u64 = 20;
}

/// X11 root background constants
pub mod x11 {
    /// Properties compositors and pseudo-transparent terminals read for the root pixmap
    pub const XROOTPMAP_ID: &[u8] = b"_XROOTPMAP_ID";
    pub const ESETROOT_PMAP_ID: &[u8] = b"ESETROOT_PMAP_ID";

    /// Bits per pixel required for ZPixmap uploads
    pub const BITS_PER_PIXEL: u8 = 32;

    /// Bytes reserved for the PutImage request header when chunking
    pub const PUT_IMAGE_HEADER_BYTES: usize = 24;
}
