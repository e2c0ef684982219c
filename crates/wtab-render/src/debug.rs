//! Bounding-box overlay for visual inspection of rendered samples.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use wtab_core::BoundingBox;

/// Pixels each outline is moved inside its box
pub const OVERLAY_INSET: i64 = 3;

const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Copy of `image` with every box outlined in red.
///
/// Boxes too small to survive the inset are skipped.
#[must_use]
pub fn draw_boxes(image: &RgbaImage, boxes: &[BoundingBox]) -> RgbaImage {
    let mut canvas = image.clone();
    for bbox in boxes {
        let width = bbox.width() - 2 * OVERLAY_INSET;
        let height = bbox.height() - 2 * OVERLAY_INSET;
        if width <= 0 || height <= 0 {
            continue;
        }
        let (Ok(x), Ok(y), Ok(w), Ok(h)) = (
            i32::try_from(bbox.xmin + OVERLAY_INSET),
            i32::try_from(bbox.ymin + OVERLAY_INSET),
            u32::try_from(width),
            u32::try_from(height),
        ) else {
            continue;
        };
        draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), OUTLINE);
    }
    canvas
}
