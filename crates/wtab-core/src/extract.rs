//! Wikitable extraction
//!
//! Finds the `<table class="wikitable ...">` elements of a parsed page.
//! A wikitable that contains another wikitable is dropped together with
//! everything inside it, so neither the outer table nor its inner tables turn
//! into records.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node as DomNode;
use scraper::{ElementRef, Html, Selector};

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("static selector is valid"));

/// Class pattern marking a Wikipedia data table
static WIKITABLE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new("wikitable*").expect("static regex is valid"));

/// Heading levels captured as aspects by default
pub const DEFAULT_HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Extraction options
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractOptions {
    /// Tags accepted as the leading heading of a `<section>`
    pub heading_tags: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            heading_tags: DEFAULT_HEADING_TAGS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A candidate wikitable found in a page
#[derive(Debug, Clone)]
pub struct TableDocument<'a> {
    pub element: ElementRef<'a>,
    /// Trimmed caption text, if the table has a non-empty caption
    pub caption: Option<String>,
    /// Enclosing section headings, root to leaf; `None` when there are none
    pub aspects: Option<Vec<String>>,
    /// Contains, or sits inside, another wikitable
    pub is_nested: bool,
}

impl TableDocument<'_> {
    /// Outer HTML of the table element.
    #[must_use]
    pub fn html(&self) -> String {
        self.element.html()
    }
}

/// Whether `element` is a table marked as a wikitable.
#[must_use]
pub fn is_wikitable(element: ElementRef<'_>) -> bool {
    element.value().name() == "table"
        && element
            .value()
            .attr("class")
            .is_some_and(|class| WIKITABLE_CLASS.is_match(class))
}

/// Every wikitable of the document, in document order, nested ones included.
pub fn candidate_tables<'a>(
    document: &'a Html,
    options: &'a ExtractOptions,
) -> impl Iterator<Item = TableDocument<'a>> + 'a {
    document
        .select(&TABLE_SELECTOR)
        .filter(|table| is_wikitable(*table))
        .map(move |element| {
            let is_nested = has_wikitable_descendant(element) || has_wikitable_ancestor(element);
            TableDocument {
                element,
                caption: caption(element),
                aspects: aspects(element, &options.heading_tags),
                is_nested,
            }
        })
}

/// The wikitables that become records: candidates that are not nested.
///
/// Single pass, lazy, in document order.
pub fn extract_tables<'a>(
    document: &'a Html,
    options: &'a ExtractOptions,
) -> impl Iterator<Item = TableDocument<'a>> + 'a {
    candidate_tables(document, options).filter(|table| !table.is_nested)
}

fn has_wikitable_descendant(table: ElementRef<'_>) -> bool {
    table
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(is_wikitable)
}

fn has_wikitable_ancestor(table: ElementRef<'_>) -> bool {
    table
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(is_wikitable)
}

fn caption(table: ElementRef<'_>) -> Option<String> {
    let caption = table
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "caption")?;
    let text = caption.text().collect::<String>().trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn aspects(table: ElementRef<'_>, heading_tags: &[String]) -> Option<Vec<String>> {
    // Collected leaf to root
    let mut headings: Vec<String> = table
        .ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "section")
        .filter_map(|section| leading_heading(section, heading_tags))
        .collect();

    if headings.is_empty() {
        return None;
    }
    headings.reverse();
    Some(headings)
}

/// Text of the section's first child when that child is an accepted heading.
fn leading_heading(section: ElementRef<'_>, heading_tags: &[String]) -> Option<String> {
    let first = section
        .children()
        .find(|child| !matches!(child.value(), DomNode::Text(t) if t.trim().is_empty()))?;
    let heading = ElementRef::wrap(first)?;
    let name = heading.value().name();
    heading_tags
        .iter()
        .any(|tag| tag == name)
        .then(|| heading.text().collect())
}
