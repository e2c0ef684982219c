//! # wtab-render - Table rendering and cell correlation
//!
//! Rasterizes id-injected wikitables and joins the on-screen rectangle of
//! every cell marker back to its cell id.
//!
//! - [`Renderer`]: the renderer contract (load a page, screenshot the table,
//!   resolve markers within a bounded wait)
//! - [`WebDriverRenderer`]: headless Firefox or Chrome over WebDriver
//! - [`Correlator`]: all-or-nothing box correlation in table-local space
//! - [`PageStyle`]: the stylesheet wrapped around each table
//! - [`draw_boxes`]: box overlay for inspection

pub mod correlate;
pub mod debug;
pub mod error;
pub mod renderer;
pub mod settings;
pub mod style;
pub mod webdriver;

pub use correlate::{to_local_box, CorrelateOptions, Correlator, RenderedTable, BORDER_PADDING};
pub use debug::draw_boxes;
pub use error::{RenderError, Result};
pub use renderer::{ElementSnapshot, Rect, Renderer, TableCapture};
pub use settings::{Browser, RenderSettings};
pub use style::{BorderStyle, Centering, PageStyle};
pub use webdriver::WebDriverRenderer;
