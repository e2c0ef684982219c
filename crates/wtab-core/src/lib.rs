//! # wtab-core - Wikitable structure tokenization
//!
//! Pure stages of the wtabhtml dataset builder. Given the HTML of a Wikipedia
//! article, this crate finds its wikitables, normalizes each one into a typed
//! table tree, and encodes its structure as a PubTabNet-style token stream
//! with one correlation id per non-empty cell.
//!
//! ## Quick Start
//!
//! ```rust
//! use wtab_core::{normalize_html, tokenize};
//!
//! let html = "<table class=\"wikitable\">\
//!             <tr><th>A</th><th>B</th></tr>\
//!             <tr><td>1</td><td>2</td></tr></table>";
//!
//! let table = normalize_html(html).expect("markup holds a table");
//! let tokenized = tokenize(&table).expect("table is well formed");
//!
//! assert_eq!(
//!     tokenized.structure_markup(),
//!     "<thead><tr><td></td><td></td></tr></thead><tbody><tr><td></td><td></td></tr></tbody>"
//! );
//! assert_eq!(tokenized.id_count, 4);
//! ```
//!
//! ## Stages
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`extract`] | parsed page | wikitables with caption and section aspects |
//! | [`record`] | dump page record (JSON) | [`TableRecord`]s |
//! | [`normalize`] | table markup | [`NormalizedTable`] |
//! | [`tokenize`](mod@tokenize) | [`NormalizedTable`] | [`TokenizedTable`] or [`Rejection`] |
//! | [`model`] | [`TokenizedTable`] + boxes | [`LabeledSample`] |
//!
//! Nothing here performs I/O or fails with an error: a table that cannot
//! become a sample is reported as a [`Rejection`] value.

pub mod error;
pub mod extract;
pub mod markup;
pub mod model;
pub mod normalize;
pub mod record;
pub mod tokenize;
pub mod tree;

// Re-exports for convenience
pub use error::Rejection;
pub use extract::{extract_tables, ExtractOptions, TableDocument};
pub use model::{BoundingBox, CellId, CellRecord, LabeledSample, Span};
pub use normalize::{normalize, normalize_html};
pub use record::{page_tables, TableRecord};
pub use tokenize::{tokenize, StructureToken, TokenizedTable};
pub use tree::{MarkupOptions, NormalizedTable};
