//! Property-Based Tests
//!
//! Invariants of the normalize → tokenize chain over generated wikitables:
//! - one `<td` opening per cell record, well-nested groups
//! - dense ids in document order, present exactly on non-empty cells
//! - blank cells open with a bare `<td>`, whatever their spans
//! - re-normalizing normalized markup is a fixed point
//! - any out-of-range span rejects the whole table

use proptest::prelude::*;
use wtab_core::{normalize_html, tokenize, CellId, Rejection, StructureToken};

const CONTENTS: [&str; 8] = [
    "",
    "  ",
    "Tokyo",
    "1,234",
    "<b>bold</b> text",
    "<a href=\"/wiki/X\">link</a>",
    "note<sup>[1]</sup>",
    "a<br>b",
];

#[derive(Debug, Clone)]
struct Cell {
    content: &'static str,
    colspan: Option<u32>,
    rowspan: Option<u32>,
}

fn cell() -> impl Strategy<Value = Cell> {
    (
        prop::sample::select(CONTENTS.to_vec()),
        prop::option::of(2u32..=20),
        prop::option::of(2u32..=20),
    )
        .prop_map(|(content, colspan, rowspan)| Cell {
            content,
            colspan,
            rowspan,
        })
}

fn rows(min: usize, max: usize) -> impl Strategy<Value = Vec<Vec<Cell>>> {
    prop::collection::vec(prop::collection::vec(cell(), 1..5), min..max)
}

fn render_cell(tag: &str, cell: &Cell) -> String {
    let mut attributes = String::new();
    if let Some(span) = cell.colspan {
        attributes.push_str(&format!(" colspan=\"{span}\""));
    }
    if let Some(span) = cell.rowspan {
        attributes.push_str(&format!(" rowspan=\"{span}\""));
    }
    format!("<{tag}{attributes}>{}</{tag}>", cell.content)
}

fn table_html(header: &[Vec<Cell>], body: &[Vec<Cell>]) -> String {
    let mut html = String::from("<table class=\"wikitable sortable\" style=\"x\"><tbody>");
    for (tag, group) in [("th", header), ("td", body)] {
        for row in group {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&render_cell(tag, cell));
            }
            html.push_str("</tr>\n");
        }
    }
    html.push_str("</tbody></table>");
    html
}

fn is_blank(content: &str) -> bool {
    // mirrors what survives normalization: sup content is dropped, tags carry no text
    let without_sup = content.split("<sup>").next().unwrap_or_default();
    let mut text = String::new();
    let mut in_tag = false;
    for ch in without_sup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.trim().is_empty()
}

/// Property: one `<td` opening per cell, groups and rows properly nested
#[test]
fn proptest_structure_is_balanced() {
    proptest!(|(header in rows(1, 3), body in rows(1, 6))| {
        let table = normalize_html(&table_html(&header, &body)).unwrap();
        let tokenized = tokenize(&table).unwrap();

        let opens = tokenized.tokens.iter().filter(|t| t.is_cell_open()).count();
        prop_assert_eq!(opens, tokenized.cells.len());
        prop_assert_eq!(opens, header.iter().chain(&body).map(Vec::len).sum::<usize>());

        let mut stack = Vec::new();
        for token in &tokenized.tokens {
            match token {
                StructureToken::TheadOpen | StructureToken::TbodyOpen => {
                    prop_assert!(stack.is_empty());
                    stack.push(token.clone());
                }
                StructureToken::RowOpen => {
                    prop_assert_eq!(stack.len(), 1);
                    stack.push(token.clone());
                }
                StructureToken::CellOpen { .. } => {
                    prop_assert_eq!(stack.last(), Some(&StructureToken::RowOpen));
                    stack.push(token.clone());
                }
                StructureToken::CellClose => {
                    prop_assert!(stack.pop().is_some_and(|t| t.is_cell_open()));
                }
                StructureToken::RowClose => {
                    prop_assert_eq!(stack.pop(), Some(StructureToken::RowOpen));
                }
                StructureToken::TheadClose => {
                    prop_assert_eq!(stack.pop(), Some(StructureToken::TheadOpen));
                }
                StructureToken::TbodyClose => {
                    prop_assert_eq!(stack.pop(), Some(StructureToken::TbodyOpen));
                }
            }
        }
        prop_assert!(stack.is_empty());
    });
}

/// Property: ids are 0..N-1 in document order, exactly on non-empty cells
#[test]
fn proptest_ids_are_dense_and_ordered() {
    proptest!(|(header in rows(1, 3), body in rows(1, 6))| {
        let table = normalize_html(&table_html(&header, &body)).unwrap();
        let tokenized = tokenize(&table).unwrap();

        let ids: Vec<CellId> = tokenized.cells.iter().filter_map(|c| c.cell_id).collect();
        let expected: Vec<CellId> = (0..ids.len()).map(CellId).collect();
        prop_assert_eq!(&ids, &expected);
        prop_assert_eq!(tokenized.id_count, ids.len());

        for (record, generated) in tokenized.cells.iter().zip(header.iter().chain(&body).flatten()) {
            prop_assert_eq!(record.is_empty(), is_blank(generated.content));
            prop_assert_eq!(record.content.is_empty(), record.is_empty());
        }

        let markup = tokenized.render_markup();
        let mut cursor = 0;
        for id in &ids {
            let marker = format!("<span id=\"{id}\">");
            let found = markup[cursor..].find(&marker);
            prop_assert!(found.is_some(), "marker {} missing or out of order", id);
            cursor += found.unwrap_or_default() + marker.len();
        }
    });
}

/// Property: blank cells open bare, others keep their spans
#[test]
fn proptest_blank_cells_drop_their_spans() {
    proptest!(|(header in rows(1, 3), body in rows(1, 6))| {
        let table = normalize_html(&table_html(&header, &body)).unwrap();
        let tokenized = tokenize(&table).unwrap();

        let opens: Vec<&StructureToken> =
            tokenized.tokens.iter().filter(|t| t.is_cell_open()).collect();
        let generated = header.iter().chain(&body).flatten();
        for ((record, open), cell) in tokenized.cells.iter().zip(opens).zip(generated) {
            if record.cell_id.is_none() {
                prop_assert_eq!(open, &StructureToken::CellOpen { colspan: None, rowspan: None });
                prop_assert_eq!(open.pubtabnet_parts(), vec!["<td>".to_string()]);
            } else {
                let colspan = record.colspan.as_ref().map(|s| s.as_str().to_string());
                let rowspan = record.rowspan.as_ref().map(|s| s.as_str().to_string());
                prop_assert_eq!(colspan, cell.colspan.map(|n| n.to_string()));
                prop_assert_eq!(rowspan, cell.rowspan.map(|n| n.to_string()));
            }
        }
    });
}

/// Property: normalizing normalized markup changes nothing
#[test]
fn proptest_normalization_is_idempotent() {
    proptest!(|(header in rows(0, 3), body in rows(1, 5))| {
        let once = normalize_html(&table_html(&header, &body)).unwrap();
        let twice = normalize_html(&once.to_html()).unwrap();
        prop_assert_eq!(once, twice);
    });
}

/// Property: one bad span anywhere rejects the table
#[test]
fn proptest_invalid_span_rejects_table() {
    let invalid = prop_oneof![
        (21u32..1000).prop_map(|n| n.to_string()),
        Just("0".to_string()),
        Just("1".to_string()),
        "[a-z]{1,4}",
        Just("2.5".to_string()),
    ];
    proptest!(|(header in rows(1, 2), body in rows(1, 4), value in invalid, attribute in prop::sample::select(vec!["colspan", "rowspan"]))| {
        let mut html = table_html(&header, &body);
        let marker = "<td";
        let at = html.rfind(marker).unwrap() + marker.len();
        html.insert_str(at, &format!(" {attribute}=\"{value}\""));

        let table = normalize_html(&html).unwrap();
        let rejection = tokenize(&table).unwrap_err();
        let is_span_rejection = matches!(rejection, Rejection::InvalidSpan { .. });
        prop_assert!(is_span_rejection);
    });
}

#[test]
fn test_two_body_groups_are_rejected() {
    let table = normalize_html(
        "<table class=\"wikitable\"><thead><tr><th>A</th></tr></thead>\
         <tbody><tr><td>1</td></tr></tbody>\
         <tbody><tr><td>2</td></tr></tbody></table>",
    )
    .unwrap();
    assert_eq!(tokenize(&table).unwrap_err(), Rejection::BodyGroups(2));
}

#[test]
fn test_inner_wikitable_is_rejected_after_normalization() {
    let table = normalize_html(
        "<table class=\"wikitable\"><tr><th>A</th><th>B</th></tr>\
         <tr><td>1</td><td><table class=\"wikitable\"><tr><td>x</td></tr></table></td></tr></table>",
    )
    .unwrap();
    assert_eq!(table.groups("thead").count(), 1);
    assert!(matches!(
        tokenize(&table),
        Err(Rejection::NestedTable { row: 1, column: 1 })
    ));
}

#[test]
fn test_end_to_end_two_by_two() {
    let table = normalize_html(
        "<table class=\"wikitable\"><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>",
    )
    .unwrap();
    let tokenized = tokenize(&table).unwrap();
    assert_eq!(
        tokenized.structure_markup(),
        "<thead><tr><td></td><td></td></tr></thead><tbody><tr><td></td><td></td></tr></tbody>"
    );
    let ids: Vec<_> = tokenized.cells.iter().filter_map(|c| c.cell_id).collect();
    assert_eq!(ids, vec![CellId(0), CellId(1), CellId(2), CellId(3)]);
}

#[test]
fn test_spanned_blank_cells_tokenize_bare() {
    let table = normalize_html(
        "<table class=\"wikitable\"><tr><th>A</th><th>B</th><th>C</th></tr>\
         <tr><td colspan=\"3\"></td></tr>\
         <tr><td rowspan=\"2\">  </td><td>1</td><td>2</td></tr></table>",
    )
    .unwrap();
    let tokenized = tokenize(&table).unwrap();
    assert_eq!(
        tokenized.structure_markup(),
        "<thead><tr><td></td><td></td><td></td></tr></thead>\
         <tbody><tr><td></td></tr><tr><td></td><td></td><td></td></tr></tbody>"
    );
    assert!(tokenized.cells[3..5]
        .iter()
        .all(|c| c.cell_id.is_none() && c.colspan.is_none() && c.rowspan.is_none()));
    assert_eq!(tokenized.id_count, 5);
}
