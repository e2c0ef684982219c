//! Structural rejections
//!
//! Extraction, normalization and tokenization never fail with an error in the
//! usual sense: a table that cannot become a training sample is *rejected*,
//! and the rejection is an ordinary value the pipeline routes to the error
//! stream together with the original record.

use thiserror::Error;

/// Why a table was not turned into a sample
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The record markup holds no `<table>` element at all.
    #[error("no table element found")]
    NoTable,

    /// Zero or several `<thead>` groups.
    #[error("expected exactly one thead group, found {0}")]
    HeaderGroups(usize),

    /// Zero or several `<tbody>` groups.
    #[error("expected exactly one tbody group, found {0}")]
    BodyGroups(usize),

    /// A cell holds a table of its own.
    #[error("nested table in cell at row {row}, column {column}")]
    NestedTable {
        /// Emitted row index
        row: usize,
        /// Cell index within the row
        column: usize,
    },

    /// A `colspan`/`rowspan` is present but not an integer in 2..=20.
    #[error("invalid {attribute}=\"{value}\" (expected an integer in 2..=20)")]
    InvalidSpan {
        /// `colspan` or `rowspan`
        attribute: &'static str,
        /// Attribute text as found
        value: String,
    },

    /// The renderer returned a different number of boxes than ids were injected.
    #[error("expected {expected} bounding boxes, got {actual}")]
    BoxCount {
        /// Ids handed out by the tokenizer
        expected: usize,
        /// Boxes supplied
        actual: usize,
    },
}
