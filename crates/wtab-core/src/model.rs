//! Dataset data model: cell ids, spans, cell records, bounding boxes and the
//! labeled sample written for every successfully rendered table.

use crate::error::Rejection;
use crate::tokenize::TokenizedTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest accepted `colspan`/`rowspan` value
pub const MIN_SPAN: u32 = 2;

/// Largest accepted `colspan`/`rowspan` value
pub const MAX_SPAN: u32 = 20;

/// Correlation id of a non-empty cell, dense from 0 in document order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CellId(pub usize);

impl CellId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CellId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated `colspan`/`rowspan` value
///
/// Keeps the attribute text as written so it can be copied verbatim into the
/// structure tokens (`"02"` stays `"02"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    raw: String,
    value: u32,
}

impl Span {
    /// Parse an attribute value; `None` unless it is all ASCII digits in
    /// `MIN_SPAN..=MAX_SPAN`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u32 = raw.parse().ok()?;
        (MIN_SPAN..=MAX_SPAN).contains(&value).then(|| Self {
            raw: raw.to_string(),
            value,
        })
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// One table cell as seen by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRecord {
    /// Index of the emitted row, counted across header and body
    pub row: usize,
    /// Index of the cell within its row, before spans are applied
    pub column: usize,
    /// Inner markup as characters and whole tags; empty for blank cells
    pub content: Vec<String>,
    pub colspan: Option<Span>,
    pub rowspan: Option<Span>,
    /// Present exactly when `content` is non-empty
    pub cell_id: Option<CellId>,
}

impl CellRecord {
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cell_id.is_none()
    }
}

/// Table-local rectangle of a rendered cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct BoundingBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl BoundingBox {
    #[inline]
    #[must_use]
    pub const fn width(&self) -> i64 {
        self.xmax - self.xmin
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> i64 {
        self.ymax - self.ymin
    }
}

impl From<BoundingBox> for [i64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.xmin, b.ymin, b.xmax, b.ymax]
    }
}

impl From<[i64; 4]> for BoundingBox {
    fn from([xmin, ymin, xmax, ymax]: [i64; 4]) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// Structure part of a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleStructure {
    pub tokens: Vec<String>,
}

/// One cell of a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCell {
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// `html` part of a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleHtml {
    pub structure: SampleStructure,
    pub cells: Vec<SampleCell>,
}

/// A labeled training sample
///
/// Built once from a tokenized table and the boxes of a successful render;
/// never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub filename: String,
    pub split: String,
    pub imgid: u64,
    pub html: SampleHtml,
}

impl LabeledSample {
    /// Join the tokenized table with its rendered boxes.
    ///
    /// `boxes[i]` is the box of cell id `i`; the number of boxes must equal
    /// the number of ids handed out by the tokenizer.
    ///
    /// # Errors
    ///
    /// [`Rejection::BoxCount`] when `boxes` does not cover every id exactly.
    pub fn new(
        table: &TokenizedTable,
        boxes: &[BoundingBox],
        imgid: u64,
        split: &str,
    ) -> Result<Self, Rejection> {
        if boxes.len() != table.id_count {
            return Err(Rejection::BoxCount {
                expected: table.id_count,
                actual: boxes.len(),
            });
        }

        let cells = table
            .cells
            .iter()
            .map(|cell| SampleCell {
                tokens: cell.content.clone(),
                bbox: cell.cell_id.and_then(|id| boxes.get(id.index()).copied()),
            })
            .collect();

        Ok(Self {
            filename: format!("{imgid}.png"),
            split: split.to_string(),
            imgid,
            html: SampleHtml {
                structure: SampleStructure {
                    tokens: table.structure_tokens(),
                },
                cells,
            },
        })
    }
}
