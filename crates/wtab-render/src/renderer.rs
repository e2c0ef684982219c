//! Renderer contract
//!
//! A renderer rasterizes a complete HTML page holding one table, screenshots
//! the table element, and resolves the `<span id="n">` cell markers to their
//! on-screen rectangles. Coordinates are CSS pixels in page space.

use crate::error::Result;
use image::RgbaImage;
use std::time::Duration;
use wtab_core::CellId;

/// Page-space rectangle reported by the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A resolved cell marker
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSnapshot {
    /// Rendered text of the marker element
    pub text: String,
    pub rect: Rect,
}

/// Screenshot of the table element and its page-space rectangle
#[derive(Debug, Clone)]
pub struct TableCapture {
    pub image: RgbaImage,
    pub rect: Rect,
}

/// Rasterizes pages and resolves cell markers.
///
/// One renderer instance belongs to one worker for its whole lifetime; calls
/// are strictly sequential.
pub trait Renderer {
    /// Replace the current page with `page`.
    fn load(&mut self, page: &str) -> Result<()>;

    /// Screenshot the first table of the current page.
    fn capture_table(&mut self) -> Result<TableCapture>;

    /// Wait up to `timeout` for the marker of `id` and report it.
    fn locate(&mut self, id: CellId, timeout: Duration) -> Result<ElementSnapshot>;
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn load(&mut self, page: &str) -> Result<()> {
        (**self).load(page)
    }

    fn capture_table(&mut self) -> Result<TableCapture> {
        (**self).capture_table()
    }

    fn locate(&mut self, id: CellId, timeout: Duration) -> Result<ElementSnapshot> {
        (**self).locate(id, timeout)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn load(&mut self, page: &str) -> Result<()> {
        (**self).load(page)
    }

    fn capture_table(&mut self) -> Result<TableCapture> {
        (**self).capture_table()
    }

    fn locate(&mut self, id: CellId, timeout: Duration) -> Result<ElementSnapshot> {
        (**self).locate(id, timeout)
    }
}
