//! Grid-to-bitmap rendering and PNG frame files

use anyhow::{Context, Result, anyhow, bail};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::constants::colors::{BACKGROUND, LIVE_CELL};
use crate::constants::validation::{MAX_CELL_SIZE, MAX_FRAME_DIMENSION, MIN_CELL_SIZE};
use crate::grid::Grid;

/// Bytes per RGB8 pixel
const RGB_CHANNELS: usize = 3;

/// Packed row-major RGB8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Frame filled with a single color
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * RGB_CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&color);
        }
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB bytes, `width * height * 3` long
    pub fn rgb(&self) -> &[u8] {
        &self.pixels
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.offset(x, y);
        [self.pixels[offset], self.pixels[offset + 1], self.pixels[offset + 2]]
    }

    /// Fill the half-open rectangle `[x0, x0 + w) × [y0, y0 + h)`
    fn fill_rect(&mut self, x0: u32, y0: u32, w: u32, h: u32, color: [u8; 3]) {
        for y in y0..y0 + h {
            let start = self.offset(x0, y);
            let end = start + w as usize * RGB_CHANNELS;
            for px in self.pixels[start..end].chunks_exact_mut(RGB_CHANNELS) {
                px.copy_from_slice(&color);
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize * self.width as usize + x as usize) * RGB_CHANNELS
    }

    /// Write as an 8-bit RGB PNG, creating or truncating `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .context(format!("Failed to create frame file {}", path.display()))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), self.width, self.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .context(format!("Failed to write PNG header to {}", path.display()))?;
        writer
            .write_image_data(&self.pixels)
            .context(format!("Failed to write PNG data to {}", path.display()))?;
        writer
            .finish()
            .context(format!("Failed to finish PNG stream for {}", path.display()))?;
        Ok(())
    }

    /// Decode an 8-bit RGB or RGBA PNG; alpha is discarded
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).context(format!("Failed to open frame file {}", path.display()))?;
        let decoder = png::Decoder::new(BufReader::new(file));
        let mut reader = decoder
            .read_info()
            .context(format!("Failed to read PNG header from {}", path.display()))?;

        let (color_type, bit_depth) = reader.output_color_type();
        if bit_depth != png::BitDepth::Eight {
            bail!("Unsupported PNG bit depth {:?} in {} (expected 8)", bit_depth, path.display());
        }
        let (width, height) = {
            let info = reader.info();
            (info.width, info.height)
        };
        let mut buf = vec![0; width as usize * height as usize * color_type.samples()];
        let info = reader
            .next_frame(&mut buf)
            .context(format!("Failed to decode PNG data from {}", path.display()))?;
        let data = &buf[..info.buffer_size()];

        let pixels = match info.color_type {
            png::ColorType::Rgb => data.to_vec(),
            png::ColorType::Rgba => {
                let mut rgb = Vec::with_capacity(data.len() / 4 * RGB_CHANNELS);
                for chunk in data.chunks_exact(4) {
                    rgb.extend_from_slice(&chunk[..RGB_CHANNELS]);
                }
                rgb
            }
            other => {
                return Err(anyhow!(
                    "Unsupported PNG color type {:?} in {} (expected RGB or RGBA)",
                    other,
                    path.display()
                ))
            }
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            pixels,
        })
    }
}

/// Pixel size of a rendered grid, rejecting cell sizes and grids that cannot be drawn
pub fn frame_dimensions(cols: usize, rows: usize, cell_size: u32) -> Result<(u32, u32)> {
    if !(MIN_CELL_SIZE..=MAX_CELL_SIZE).contains(&cell_size) {
        bail!("Cell size must be between {MIN_CELL_SIZE} and {MAX_CELL_SIZE} pixels, got {cell_size}");
    }
    let edge = |cells: usize, axis: &str| -> Result<u32> {
        u32::try_from(cells)
            .ok()
            .and_then(|c| c.checked_mul(cell_size))
            .filter(|&px| px > 0 && px <= MAX_FRAME_DIMENSION)
            .ok_or_else(|| anyhow!(
                "Frame {axis} of {cells} cells at {cell_size}px must be between 1 and {MAX_FRAME_DIMENSION} pixels"
            ))
    };
    Ok((edge(cols, "width")?, edge(rows, "height")?))
}

/// One `cell_size` square block per live cell on a black background
pub fn render(grid: &Grid, cell_size: u32) -> Result<Frame> {
    let (width, height) = frame_dimensions(grid.cols(), grid.rows(), cell_size)?;
    let mut frame = Frame::filled(width, height, BACKGROUND);
    for (row, col) in grid.live_cells() {
        frame.fill_rect(
            col as u32 * cell_size,
            row as u32 * cell_size,
            cell_size,
            cell_size,
            LIVE_CELL,
        );
    }
    Ok(frame)
}
