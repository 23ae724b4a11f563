use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::{debug, error, info};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::WallpaperSetter;
use crate::constants::x11::{BITS_PER_PIXEL, ESETROOT_PMAP_ID, PUT_IMAGE_HEADER_BYTES, XROOTPMAP_ID};
use crate::render::Frame;

/// Root window of one X11 screen plus the pixmap currently installed on it
struct RootTarget {
    root: Window,
    depth: u8,
    gc: Gcontext,
    pixmap: Option<Pixmap>,
}

/// Atoms advertising the root pixmap to compositors
struct RootAtoms {
    xrootpmap_id: Atom,
    esetroot_pmap_id: Atom,
}

impl RootAtoms {
    fn new(conn: &RustConnection) -> Result<Self> {
        Ok(Self {
            xrootpmap_id: conn
                .intern_atom(false, XROOTPMAP_ID)
                .context("Failed to intern _XROOTPMAP_ID atom")?
                .reply()
                .context("Failed to get reply for _XROOTPMAP_ID atom")?
                .atom,
            esetroot_pmap_id: conn
                .intern_atom(false, ESETROOT_PMAP_ID)
                .context("Failed to intern ESETROOT_PMAP_ID atom")?
                .reply()
                .context("Failed to get reply for ESETROOT_PMAP_ID atom")?
                .atom,
        })
    }
}

/// Sets frames as the root window background on every screen of the display.
/// Frames smaller than a screen are tiled by the server.
pub struct X11RootSetter {
    conn: RustConnection,
    atoms: RootAtoms,
    image_order: ImageOrder,
    targets: Vec<RootTarget>,
}

impl X11RootSetter {
    /// Connect to `$DISPLAY` and prepare a graphics context per screen
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)
            .context("Failed to connect to X11 display (is DISPLAY set?)")?;
        let atoms = RootAtoms::new(&conn)?;
        let setup = conn.setup();
        let image_order = setup.image_byte_order;

        let mut targets = Vec::with_capacity(setup.roots.len());
        for (idx, screen) in setup.roots.iter().enumerate() {
            let bpp = setup
                .pixmap_formats
                .iter()
                .find(|f| f.depth == screen.root_depth)
                .map(|f| f.bits_per_pixel)
                .ok_or_else(|| anyhow!("No pixmap format for root depth {} on screen {}", screen.root_depth, idx))?;
            if bpp != BITS_PER_PIXEL {
                anyhow::bail!(
                    "Screen {} uses {} bits per pixel at depth {}; only {}-bit pixmaps are supported",
                    idx, bpp, screen.root_depth, BITS_PER_PIXEL
                );
            }

            let gc = conn
                .generate_id()
                .context("Failed to generate ID for root graphics context")?;
            conn.create_gc(gc, screen.root, &CreateGCAux::new())
                .context(format!("Failed to create graphics context on screen {}", idx))?;

            info!(
                screen = idx,
                root = screen.root,
                depth = screen.root_depth,
                width = screen.width_in_pixels,
                height = screen.height_in_pixels,
                is_default = (idx == screen_num),
                "Prepared X11 screen for wallpaper"
            );
            targets.push(RootTarget {
                root: screen.root,
                depth: screen.root_depth,
                gc,
                pixmap: None,
            });
        }

        Ok(Self {
            conn,
            atoms,
            image_order,
            targets,
        })
    }

    /// Upload `data` into a fresh pixmap and make it the root background.
    /// The pixmap is freed again if any step after its creation fails.
    fn install(&self, target: &RootTarget, frame: &Frame, data: &[u8]) -> Result<Pixmap> {
        let width = u16::try_from(frame.width()).context("Frame too wide for X11 pixmap")?;
        let height = u16::try_from(frame.height()).context("Frame too tall for X11 pixmap")?;

        let pixmap = self
            .conn
            .generate_id()
            .context("Failed to generate ID for wallpaper pixmap")?;
        self.conn
            .create_pixmap(target.depth, pixmap, target.root, width, height)
            .context(format!("Failed to create wallpaper pixmap for root {}", target.root))?;

        release_on_error(
            pixmap,
            || self.fill_and_attach(target, pixmap, width, height, data),
            |orphan| {
                if let Err(e) = self.conn.free_pixmap(orphan) {
                    error!("Failed to free orphaned pixmap {}: {}", orphan, e);
                }
            },
        )
    }

    fn fill_and_attach(
        &self,
        target: &RootTarget,
        pixmap: Pixmap,
        width: u16,
        height: u16,
        data: &[u8],
    ) -> Result<()> {
        let stride = width as usize * 4;
        let max_rows =
            self.conn.maximum_request_bytes().saturating_sub(PUT_IMAGE_HEADER_BYTES) / stride;
        let rows_per_chunk = max_rows.clamp(1, height as usize);
        for y in (0..height as usize).step_by(rows_per_chunk) {
            let rows = rows_per_chunk.min(height as usize - y);
            self.conn
                .put_image(
                    ImageFormat::Z_PIXMAP,
                    pixmap,
                    target.gc,
                    width,
                    rows as u16,
                    0,
                    y as i16,
                    0,
                    target.depth,
                    &data[y * stride..(y + rows) * stride],
                )
                .context(format!("Failed to upload wallpaper rows {}..{}", y, y + rows))?;
        }

        self.conn
            .change_window_attributes(
                target.root,
                &ChangeWindowAttributesAux::new().background_pixmap(pixmap),
            )
            .context(format!("Failed to set background pixmap on root {}", target.root))?
            .check()
            .context(format!("X11 rejected background pixmap for root {}", target.root))?;

        self.conn
            .clear_area(false, target.root, 0, 0, 0, 0)
            .context(format!("Failed to repaint root {}", target.root))?;

        for atom in [self.atoms.xrootpmap_id, self.atoms.esetroot_pmap_id] {
            self.conn
                .change_property32(PropMode::REPLACE, target.root, atom, AtomEnum::PIXMAP, &[pixmap])
                .context("Failed to publish root pixmap property")?;
        }
        Ok(())
    }
}

impl WallpaperSetter for X11RootSetter {
    fn apply(&mut self, path: &Path) -> Result<()> {
        let frame = Frame::load(path)?;
        let data = to_zpixmap(&frame, self.image_order);

        // A screen owns its new pixmap as soon as it is installed
        for idx in 0..self.targets.len() {
            let pixmap = self.install(&self.targets[idx], &frame, &data)?;
            if let Some(old) = self.targets[idx].pixmap.replace(pixmap) {
                self.conn
                    .free_pixmap(old)
                    .context(format!("Failed to free previous wallpaper pixmap {}", old))?;
            }
        }

        self.conn
            .flush()
            .context("Failed to flush X11 connection after setting wallpaper")?;
        debug!(path = %path.display(), screens = self.targets.len(), "Root background updated");
        Ok(())
    }
}

impl Drop for X11RootSetter {
    fn drop(&mut self) {
        for target in &self.targets {
            if let Err(e) = self.conn.free_gc(target.gc) {
                error!("Failed to free GC {}: {}", target.gc, e);
            }
        }
        if let Err(e) = self.conn.flush() {
            error!("Failed to flush X11 connection during cleanup: {}", e);
        }
    }
}

/// Run `body` for a freshly created resource; hand it to `release` if `body` fails
fn release_on_error<T, B, R>(resource: T, body: B, release: R) -> Result<T>
where
    T: Copy,
    B: FnOnce() -> Result<()>,
    R: FnOnce(T),
{
    match body() {
        Ok(()) => Ok(resource),
        Err(e) => {
            release(resource);
            Err(e)
        }
    }
}

/// Convert RGB8 to 32-bit ZPixmap bytes in the server's image byte order
fn to_zpixmap(frame: &Frame, order: ImageOrder) -> Vec<u8> {
    let mut data = Vec::with_capacity(frame.rgb().len() / 3 * 4);
    for px in frame.rgb().chunks_exact(3) {
        let (r, g, b) = (px[0], px[1], px[2]);
        if order == ImageOrder::MSB_FIRST {
            data.extend_from_slice(&[0, r, g, b]);
        } else {
            data.extend_from_slice(&[b, g, r, 0]);
        }
    }
    data
}
