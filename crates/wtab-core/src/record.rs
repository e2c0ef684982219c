//! Table records
//!
//! A dump page record is a JSON object shaped like the Wikimedia Enterprise
//! HTML dumps: `name`, `url`, `article_body.html`, `main_entity.identifier`.
//! Every retained wikitable of the page becomes one [`TableRecord`]; the table
//! record is also what the error stream stores verbatim when a later stage
//! rejects the table.

use crate::extract::{extract_tables, ExtractOptions};
use log::trace;
use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Substring a page body must contain before it is parsed at all
pub const WIKITABLE_MARKER: &str = "wikitable";

/// One wikitable and the page it came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Position among the page's retained wikitables
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata: Option<String>,
    /// Outer markup of the table, as found in the page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspects: Option<Vec<String>>,
}

/// Table records of one page record.
///
/// Returns `None` when the page lacks `article_body.html` or
/// `main_entity.identifier`, when its body does not mention a wikitable, or
/// when no wikitable survives extraction.
#[must_use]
pub fn page_tables(page: &Value, options: &ExtractOptions) -> Option<Vec<TableRecord>> {
    let html = non_empty(page.pointer("/article_body/html"))?;
    if !html.contains(WIKITABLE_MARKER) {
        return None;
    }
    let wikidata = non_empty(page.pointer("/main_entity/identifier"))?;

    let title = non_empty(page.get("name")).map(str::to_string);
    let url = non_empty(page.get("url")).map(str::to_string);

    let document = Html::parse_document(html);
    let records: Vec<TableRecord> = extract_tables(&document, options)
        .enumerate()
        .map(|(index, table)| TableRecord {
            index,
            title: title.clone(),
            url: url.clone(),
            wikidata: Some(wikidata.to_string()),
            html: Some(table.html()),
            caption: table.caption,
            aspects: table.aspects,
        })
        .collect();

    trace!("{}: {} wikitables", title.as_deref().unwrap_or("?"), records.len());
    (!records.is_empty()).then_some(records)
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(html: &str) -> Value {
        json!({
            "name": "Tokyo",
            "url": "https://en.wikipedia.org/wiki/Tokyo",
            "main_entity": {"identifier": "Q1490"},
            "article_body": {"html": html},
        })
    }

    #[test]
    fn test_page_tables_fill_every_field() {
        let records = page_tables(
            &page(
                r#"<section><h2>Climate</h2><table class="wikitable"><caption>Weather</caption>
                   <tr><th>Month</th></tr></table></section>"#,
            ),
            &ExtractOptions::default(),
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.index, 0);
        assert_eq!(record.title.as_deref(), Some("Tokyo"));
        assert_eq!(record.wikidata.as_deref(), Some("Q1490"));
        assert_eq!(record.caption.as_deref(), Some("Weather"));
        assert_eq!(record.aspects, Some(vec!["Climate".to_string()]));
        assert!(record.html.as_deref().unwrap().starts_with("<table class=\"wikitable\">"));
    }

    #[test]
    fn test_indices_count_retained_tables_only() {
        let records = page_tables(
            &page(
                r#"<table class="wikitable"><tr><td><table class="wikitable"></table></td></tr></table>
                   <table class="wikitable" id="a"></table>
                   <table class="wikitable" id="b"></table>"#,
            ),
            &ExtractOptions::default(),
        )
        .unwrap();
        let indices: Vec<_> = records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_pages_missing_fields_are_skipped() {
        let options = ExtractOptions::default();
        assert!(page_tables(&json!({}), &options).is_none());
        assert!(page_tables(&page("<p>no tables here</p>"), &options).is_none());

        let mut no_id = page("<table class=\"wikitable\"></table>");
        no_id["main_entity"] = json!({});
        assert!(page_tables(&no_id, &options).is_none());
    }

    #[test]
    fn test_empty_fields_are_omitted_from_json() {
        let record = TableRecord {
            index: 3,
            html: Some("<table></table>".to_string()),
            ..TableRecord::default()
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"index":3,"html":"<table></table>"}"#
        );
    }
}
