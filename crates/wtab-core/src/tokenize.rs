//! Structure tokenization and id injection
//!
//! Walks a [`NormalizedTable`] header group first, body group second, and
//! produces:
//!
//! - the structure token stream (`<thead>`, `<tr>`, `<td colspan="2">`, ...),
//! - one [`CellRecord`] per cell, with its content tokens,
//! - a copy of the table where every non-empty cell carries its [`CellId`].
//!
//! Ids are dense from 0 in row-major document order. The renderer page is
//! serialized from the id-carrying copy, so the markers found on screen map
//! back to cells without any string splicing.

use crate::error::Rejection;
use crate::markup::tokenize_markup;
use crate::model::{CellId, CellRecord, Span};
use crate::tree::{Element, MarkupOptions, NormalizedTable, Node};
use std::fmt;

/// One token of the structure grammar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StructureToken {
    TheadOpen,
    TheadClose,
    TbodyOpen,
    TbodyClose,
    RowOpen,
    RowClose,
    /// Cell opening tag; header cells are written as `<td>` as well.
    CellOpen {
        colspan: Option<Span>,
        rowspan: Option<Span>,
    },
    CellClose,
}

impl StructureToken {
    /// Token split the way PubTabNet stores it: a spanned cell opening becomes
    /// `"<td"`, one `" colspan=\"n\""` / `" rowspan=\"n\""` part per span, and
    /// `">"`. Every other token is a single part.
    #[must_use]
    pub fn pubtabnet_parts(&self) -> Vec<String> {
        match self {
            Self::CellOpen { colspan, rowspan } if colspan.is_some() || rowspan.is_some() => {
                let mut parts = vec!["<td".to_string()];
                if let Some(span) = colspan {
                    parts.push(format!(" colspan=\"{}\"", span.as_str()));
                }
                if let Some(span) = rowspan {
                    parts.push(format!(" rowspan=\"{}\"", span.as_str()));
                }
                parts.push(">".to_string());
                parts
            }
            other => vec![other.to_string()],
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_cell_open(&self) -> bool {
        matches!(self, Self::CellOpen { .. })
    }
}

impl fmt::Display for StructureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TheadOpen => f.write_str("<thead>"),
            Self::TheadClose => f.write_str("</thead>"),
            Self::TbodyOpen => f.write_str("<tbody>"),
            Self::TbodyClose => f.write_str("</tbody>"),
            Self::RowOpen => f.write_str("<tr>"),
            Self::RowClose => f.write_str("</tr>"),
            Self::CellOpen { colspan, rowspan } => {
                f.write_str("<td")?;
                if let Some(span) = colspan {
                    write!(f, " colspan=\"{}\"", span.as_str())?;
                }
                if let Some(span) = rowspan {
                    write!(f, " rowspan=\"{}\"", span.as_str())?;
                }
                f.write_str(">")
            }
            Self::CellClose => f.write_str("</td>"),
        }
    }
}

/// Result of tokenizing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedTable {
    pub tokens: Vec<StructureToken>,
    /// Every cell, empty ones included, in document order
    pub cells: Vec<CellRecord>,
    /// Number of ids handed out; also the next unused id
    pub id_count: usize,
    /// The normalized table with ids set on its non-empty cells
    pub table: NormalizedTable,
}

impl TokenizedTable {
    /// Structure tokens in the stored (PubTabNet) form.
    #[must_use]
    pub fn structure_tokens(&self) -> Vec<String> {
        self.tokens
            .iter()
            .flat_map(StructureToken::pubtabnet_parts)
            .collect()
    }

    /// The structure stream as one string.
    #[must_use]
    pub fn structure_markup(&self) -> String {
        self.tokens.iter().map(ToString::to_string).collect()
    }

    /// Table markup handed to the renderer: ids injected, captions blanked.
    #[must_use]
    pub fn render_markup(&self) -> String {
        self.table.to_markup(MarkupOptions::render())
    }
}

/// Tokenize a normalized table.
///
/// # Errors
///
/// Returns a [`Rejection`] when the table does not hold exactly one `<thead>`
/// and one `<tbody>`, when a cell contains a table, or when a `colspan` /
/// `rowspan` is not an integer in 2..=20.
pub fn tokenize(table: &NormalizedTable) -> Result<TokenizedTable, Rejection> {
    let heads = table.groups("thead").count();
    if heads != 1 {
        return Err(Rejection::HeaderGroups(heads));
    }
    let bodies = table.groups("tbody").count();
    if bodies != 1 {
        return Err(Rejection::BodyGroups(bodies));
    }

    let mut walker = Walker::default();
    let mut table = table.clone();

    for (name, open, close) in [
        ("thead", StructureToken::TheadOpen, StructureToken::TheadClose),
        ("tbody", StructureToken::TbodyOpen, StructureToken::TbodyClose),
    ] {
        let group = table
            .children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|element| element.is(name));
        if let Some(group) = group {
            walker.tokens.push(open);
            walker.group(group)?;
            walker.tokens.push(close);
        }
    }

    Ok(TokenizedTable {
        tokens: walker.tokens,
        cells: walker.cells,
        id_count: walker.next_id,
        table,
    })
}

#[derive(Default)]
struct Walker {
    tokens: Vec<StructureToken>,
    cells: Vec<CellRecord>,
    next_id: usize,
    row: usize,
}

impl Walker {
    fn group(&mut self, group: &mut Element) -> Result<(), Rejection> {
        for row in group.child_elements_mut().filter(|e| e.is("tr")) {
            if !row.child_elements().any(Element::is_cell) {
                continue;
            }
            self.tokens.push(StructureToken::RowOpen);
            for (column, cell) in row.child_elements_mut().filter(|e| e.is_cell()).enumerate() {
                self.cell(cell, column)?;
            }
            self.tokens.push(StructureToken::RowClose);
            self.row += 1;
        }
        Ok(())
    }

    fn cell(&mut self, cell: &mut Element, column: usize) -> Result<(), Rejection> {
        if cell.contains_element("table") {
            return Err(Rejection::NestedTable {
                row: self.row,
                column,
            });
        }
        let colspan = span(cell.attributes.colspan.as_deref(), "colspan")?;
        let rowspan = span(cell.attributes.rowspan.as_deref(), "rowspan")?;

        // Empty cells are written as a bare `<td></td>`; their spans only gate rejection
        let (content, cell_id, colspan, rowspan) = if cell.text().trim().is_empty() {
            (Vec::new(), None, None, None)
        } else {
            let id = CellId(self.next_id);
            self.next_id += 1;
            cell.cell_id = Some(id);
            let content = tokenize_markup(&cell.inner_html().replace('\n', ""));
            (content, Some(id), colspan, rowspan)
        };

        self.tokens.push(StructureToken::CellOpen {
            colspan: colspan.clone(),
            rowspan: rowspan.clone(),
        });
        self.tokens.push(StructureToken::CellClose);
        self.cells.push(CellRecord {
            row: self.row,
            column,
            content,
            colspan,
            rowspan,
            cell_id,
        });
        Ok(())
    }
}

fn span(raw: Option<&str>, attribute: &'static str) -> Result<Option<Span>, Rejection> {
    raw.map(|value| {
        Span::parse(value).ok_or_else(|| Rejection::InvalidSpan {
            attribute,
            value: value.to_string(),
        })
    })
    .transpose()
}
