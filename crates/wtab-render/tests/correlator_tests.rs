//! Correlator tests against a scripted renderer.

use image::{Rgba, RgbaImage};
use std::time::Duration;
use wtab_core::{normalize_html, tokenize, BoundingBox, CellId, LabeledSample};
use wtab_render::{
    CorrelateOptions, Correlator, ElementSnapshot, Rect, RenderError, Renderer, Result,
    TableCapture,
};

/// Lays cells out on a fixed grid; optionally stops resolving markers.
#[derive(Default)]
struct ScriptedRenderer {
    pages: Vec<String>,
    /// Markers at or after this id time out
    fail_from: Option<usize>,
    no_table: bool,
}

impl Renderer for ScriptedRenderer {
    fn load(&mut self, page: &str) -> Result<()> {
        self.pages.push(page.to_string());
        Ok(())
    }

    fn capture_table(&mut self) -> Result<TableCapture> {
        if self.no_table {
            return Err(RenderError::NoSuchElement("table".into()));
        }
        Ok(TableCapture {
            image: RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255])),
            rect: Rect::new(8.0, 8.0, 200.0, 100.0),
        })
    }

    fn locate(&mut self, id: CellId, timeout: Duration) -> Result<ElementSnapshot> {
        if self.fail_from.is_some_and(|from| id.index() >= from) {
            return Err(RenderError::Timeout {
                id: id.index(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        let (row, column) = (id.index() / 2, id.index() % 2);
        Ok(ElementSnapshot {
            text: format!(" cell {} ", id),
            rect: Rect::new(
                14.0 + 50.0 * column as f64,
                14.0 + 30.0 * row as f64,
                20.5,
                10.0,
            ),
        })
    }
}

fn options() -> CorrelateOptions {
    CorrelateOptions {
        element_timeout: Duration::from_millis(3000),
        border_padding: 2,
    }
}

const TWO_BY_TWO: &str = "<table class=\"wikitable\"><tr><th>A</th><th>B</th></tr>\
                          <tr><td>1</td><td>2</td></tr></table>";

#[test]
fn test_two_by_two_yields_four_boxes_in_id_order() {
    let tokenized = tokenize(&normalize_html(TWO_BY_TWO).unwrap()).unwrap();
    let mut correlator = Correlator::new(ScriptedRenderer::default(), options());

    let rendered = correlator
        .render(&tokenized.render_markup(), tokenized.id_count)
        .unwrap();

    assert_eq!(rendered.boxes.len(), 4);
    assert_eq!(
        rendered.boxes[0],
        BoundingBox {
            xmin: 4,
            ymin: 4,
            xmax: 28,
            ymax: 18
        }
    );
    assert_eq!(rendered.boxes[3].xmin, 54);
    assert_eq!(rendered.boxes[3].ymin, 34);
    assert_eq!(rendered.texts[2], "cell 2");

    let sample = LabeledSample::new(&tokenized, &rendered.boxes, 7, "train").unwrap();
    assert_eq!(sample.filename, "7.png");
    let with_box = sample.html.cells.iter().filter(|c| c.bbox.is_some()).count();
    assert_eq!(with_box, 4);
}

#[test]
fn test_timeout_on_five_ids_surfaces_no_boxes() {
    let tokenized = tokenize(
        &normalize_html(
            "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr>\
             <tr><td>3</td><td></td></tr></table>",
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(tokenized.id_count, 5);

    let renderer = ScriptedRenderer {
        fail_from: Some(3),
        ..ScriptedRenderer::default()
    };
    let mut correlator = Correlator::new(renderer, options());
    let err = correlator
        .render(&tokenized.render_markup(), tokenized.id_count)
        .unwrap_err();

    assert!(matches!(err, RenderError::Timeout { id: 3, timeout_ms: 3000 }));
    assert!(!err.is_fatal());
}

#[test]
fn test_missing_table_fails_the_render() {
    let renderer = ScriptedRenderer {
        no_table: true,
        ..ScriptedRenderer::default()
    };
    let mut correlator = Correlator::new(renderer, options());
    assert!(matches!(
        correlator.render("<html></html>", 1),
        Err(RenderError::NoSuchElement(_))
    ));
    assert_eq!(correlator.renderer_mut().pages.len(), 1);
}

#[test]
fn test_zero_ids_still_captures_the_table() {
    let mut correlator = Correlator::new(ScriptedRenderer::default(), options());
    let rendered = correlator.render("<table></table>", 0).unwrap();
    assert!(rendered.boxes.is_empty());
    assert_eq!(rendered.image.dimensions(), (200, 100));
}

#[test]
fn test_box_count_mismatch_is_rejected() {
    let tokenized = tokenize(&normalize_html(TWO_BY_TWO).unwrap()).unwrap();
    let boxes = [BoundingBox::default(); 3];
    assert!(LabeledSample::new(&tokenized, &boxes, 0, "train").is_err());
}
