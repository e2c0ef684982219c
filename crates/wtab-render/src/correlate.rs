//! Render correlation
//!
//! Renders an id-injected table and maps every cell marker back to a
//! table-local bounding box. The result is all-or-nothing: any renderer
//! failure on any id fails the whole table, so a partial set of boxes never
//! leaves this module.

use crate::error::Result;
use crate::renderer::{Rect, Renderer};
use image::RgbaImage;
use log::debug;
use std::time::Duration;
use wtab_core::{BoundingBox, CellId};

/// Pixels added around every cell box on each side
pub const BORDER_PADDING: i64 = 2;

/// Correlation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelateOptions {
    /// Bounded wait for each cell marker
    pub element_timeout: Duration,
    pub border_padding: i64,
}

impl Default for CorrelateOptions {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_millis(crate::settings::ELEMENT_TIMEOUT_MS),
            border_padding: BORDER_PADDING,
        }
    }
}

/// A rendered table with one box per cell id, in id order
#[derive(Debug, Clone)]
pub struct RenderedTable {
    pub image: RgbaImage,
    pub boxes: Vec<BoundingBox>,
    /// Trimmed rendered text of every marker, in id order
    pub texts: Vec<String>,
}

/// Drives a [`Renderer`] for one table at a time.
#[derive(Debug)]
pub struct Correlator<R> {
    renderer: R,
    options: CorrelateOptions,
}

impl<R: Renderer> Correlator<R> {
    #[must_use]
    pub const fn new(renderer: R, options: CorrelateOptions) -> Self {
        Self { renderer, options }
    }

    #[must_use]
    pub const fn options(&self) -> &CorrelateOptions {
        &self.options
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Release the renderer.
    pub fn into_inner(self) -> R {
        self.renderer
    }

    /// Render `page` and resolve the markers `0..id_count`.
    ///
    /// # Errors
    ///
    /// Any renderer error: loading the page, capturing the table, or
    /// resolving one of the markers within the element timeout.
    pub fn render(&mut self, page: &str, id_count: usize) -> Result<RenderedTable> {
        self.renderer.load(page)?;
        let capture = self.renderer.capture_table()?;

        let mut boxes = Vec::with_capacity(id_count);
        let mut texts = Vec::with_capacity(id_count);
        for id in (0..id_count).map(CellId) {
            let marker = self
                .renderer
                .locate(id, self.options.element_timeout)
                .inspect_err(|e| debug!("marker {id}: {e}"))?;
            boxes.push(to_local_box(
                marker.rect,
                capture.rect,
                self.options.border_padding,
            ));
            texts.push(marker.text.trim().to_string());
        }

        Ok(RenderedTable {
            image: capture.image,
            boxes,
            texts,
        })
    }
}

/// Translate a page-space cell rectangle into the table's own coordinates.
///
/// Locations are rounded and sizes truncated to whole pixels before the
/// subtraction, then every edge is pushed outwards by `padding`.
#[must_use]
pub fn to_local_box(cell: Rect, table: Rect, padding: i64) -> BoundingBox {
    let xmin = round(cell.x) - round(table.x) - padding;
    let ymin = round(cell.y) - round(table.y) - padding;
    BoundingBox {
        xmin,
        ymin,
        xmax: xmin + trunc(cell.width) + padding * 2,
        ymax: ymin + trunc(cell.height) + padding * 2,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round(v: f64) -> i64 {
    v.round() as i64
}

#[allow(clippy::cast_possible_truncation)]
fn trunc(v: f64) -> i64 {
    v.trunc() as i64
}
