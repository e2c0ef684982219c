//! Structure normalization
//!
//! Builds a fresh [`NormalizedTable`] from a parsed `<table>` element:
//!
//! 1. Leading rows of every `<tbody>` made only of `<th>` cells are moved into
//!    a new `<thead>` placed first in the table. Classification is a one-way
//!    latch over the whole table: once a row with a `<td>` has been seen, every
//!    later row stays in the body, even an all-`<th>` one.
//! 2. Attributes outside the allow-lists are dropped (see [`crate::tree`]).
//! 3. `a`, `span`, `link`, `img` and `div` are unwrapped; `sup` is removed with
//!    its content.
//! 4. The table border is forced to [`TABLE_BORDER`].
//!
//! The source DOM is only read; rows are partitioned first and the output tree
//! is constructed afterwards.

use crate::tree::{push_text, Element, ElementAttributes, NormalizedTable, Node, TableAttributes};
use once_cell::sync::Lazy;
use scraper::node::Node as DomNode;
use scraper::{ElementRef, Html, Selector};

/// Border value written on every normalized table
pub const TABLE_BORDER: &str = "1";

/// Tags replaced by their children
const UNWRAPPED_TAGS: [&str; 5] = ["a", "span", "link", "img", "div"];

/// Tags removed together with their content
const DROPPED_TAGS: [&str; 1] = ["sup"];

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("static selector is valid"));

type DomRef<'a> = ego_tree::NodeRef<'a, DomNode>;

/// Normalize the first `<table>` found in a markup fragment.
///
/// Returns `None` when the fragment contains no table.
#[must_use]
pub fn normalize_html(html: &str) -> Option<NormalizedTable> {
    let fragment = Html::parse_fragment(html);
    let table = fragment.select(&TABLE_SELECTOR).next()?;
    Some(normalize(table))
}

/// Normalize a parsed `<table>` element.
#[must_use]
pub fn normalize(table: ElementRef<'_>) -> NormalizedTable {
    let header_rows = header_rows(table);

    let mut children = Vec::new();
    if !header_rows.is_empty() {
        let mut rows = Vec::new();
        for row in &header_rows {
            convert_into(*row, &mut rows);
        }
        children.push(Node::Element(Element::new(
            "thead",
            ElementAttributes::default(),
            rows,
        )));
    }

    for child in table.children() {
        match child.value() {
            DomNode::Element(element) if element.name() == "tbody" => {
                let mut body = Vec::new();
                for row in child.children() {
                    if !header_rows.iter().any(|h| h.id() == row.id()) {
                        convert_into(row, &mut body);
                    }
                }
                children.push(Node::Element(Element::new(
                    "tbody",
                    ElementAttributes::from_pairs(element.attrs()),
                    body,
                )));
            }
            _ => convert_into(child, &mut children),
        }
    }

    let mut attributes = TableAttributes::from_pairs(table.value().attrs());
    attributes.border = Some(TABLE_BORDER.to_string());

    NormalizedTable {
        attributes,
        children,
    }
}

/// Leading all-`<th>` rows of the table's `<tbody>` groups, in order.
fn header_rows(table: ElementRef<'_>) -> Vec<DomRef<'_>> {
    let mut rows = Vec::new();
    let mut end_header = false;

    let bodies = table
        .children()
        .filter(|c| matches!(c.value(), DomNode::Element(e) if e.name() == "tbody"));
    for body in bodies {
        for row in body.children() {
            let is_row = matches!(row.value(), DomNode::Element(e) if e.name() == "tr");
            if !is_row {
                continue;
            }
            if !end_header && is_header_row(row) {
                rows.push(row);
            } else {
                end_header = true;
            }
        }
    }

    rows
}

/// Every child of the row is a `<th>` or not an element at all.
fn is_header_row(row: DomRef<'_>) -> bool {
    row.children().all(|cell| match cell.value() {
        DomNode::Element(e) => e.name() == "th",
        _ => true,
    })
}

/// Append the normalized form of `node` to `out`.
fn convert_into(node: DomRef<'_>, out: &mut Vec<Node>) {
    match node.value() {
        DomNode::Text(text) => push_text(out, text),
        DomNode::Comment(comment) => out.push(Node::Comment(String::from(&**comment))),
        DomNode::Element(element) => {
            let name = element.name();
            if DROPPED_TAGS.contains(&name) {
                return;
            }
            if UNWRAPPED_TAGS.contains(&name) {
                for child in node.children() {
                    convert_into(child, out);
                }
                return;
            }

            let mut children = Vec::new();
            for child in node.children() {
                convert_into(child, &mut children);
            }
            out.push(Node::Element(Element::new(
                name,
                ElementAttributes::from_pairs(element.attrs()),
                children,
            )));
        }
        _ => {}
    }
}
