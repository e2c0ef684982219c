//! Typed table tree
//!
//! A normalized wikitable is held as an owned tree whose nodes carry a fixed,
//! allow-listed attribute record instead of an open attribute map. Anything
//! outside the allow-list is dropped when the tree is built, so a
//! [`NormalizedTable`] can never carry a `class`, `id` or `href` attribute.
//!
//! The tree is serialized back to markup only where text is needed: when the
//! table record is persisted, when cell content is tokenized, and when the page
//! is handed to the renderer.

use crate::model::CellId;
use std::fmt::Write;

/// Attributes kept on the `<table>` element.
pub const TABLE_ATTRIBUTES: [&str; 3] = ["border", "cellpadding", "style"];

/// Attributes kept on every element below the `<table>` element.
pub const ELEMENT_ATTRIBUTES: [&str; 5] = ["colspan", "headers", "rowspan", "cellpadding", "style"];

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Allow-listed attributes of the `<table>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TableAttributes {
    pub border: Option<String>,
    pub cellpadding: Option<String>,
    pub style: Option<String>,
}

impl TableAttributes {
    /// Keep the allow-listed attributes from a raw `(name, value)` list.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut attributes = Self::default();
        for (name, value) in pairs {
            let slot = match name {
                "border" => &mut attributes.border,
                "cellpadding" => &mut attributes.cellpadding,
                "style" => &mut attributes.style,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        attributes
    }

    /// Present attributes in allow-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        TABLE_ATTRIBUTES
            .into_iter()
            .zip([&self.border, &self.cellpadding, &self.style])
            .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
    }
}

/// Allow-listed attributes of any element below the table
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ElementAttributes {
    pub colspan: Option<String>,
    pub headers: Option<String>,
    pub rowspan: Option<String>,
    pub cellpadding: Option<String>,
    pub style: Option<String>,
}

impl ElementAttributes {
    /// Keep the allow-listed attributes from a raw `(name, value)` list.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut attributes = Self::default();
        for (name, value) in pairs {
            let slot = match name {
                "colspan" => &mut attributes.colspan,
                "headers" => &mut attributes.headers,
                "rowspan" => &mut attributes.rowspan,
                "cellpadding" => &mut attributes.cellpadding,
                "style" => &mut attributes.style,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        attributes
    }

    /// Present attributes in allow-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        ELEMENT_ATTRIBUTES
            .into_iter()
            .zip([
                &self.colspan,
                &self.headers,
                &self.rowspan,
                &self.cellpadding,
                &self.style,
            ])
            .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// One node of the table tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    #[inline]
    #[must_use]
    pub const fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }
}

/// An element below the `<table>` element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    pub name: String,
    pub attributes: ElementAttributes,
    pub children: Vec<Node>,
    /// Correlation id; only ever set on `td`/`th` cells by the tokenizer.
    pub cell_id: Option<CellId>,
}

impl Element {
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: ElementAttributes, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            attributes,
            children,
            cell_id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// `td` or `th`
    #[inline]
    #[must_use]
    pub fn is_cell(&self) -> bool {
        matches!(self.name.as_str(), "td" | "th")
    }

    /// Direct element children.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Direct element children, mutably.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Whether any descendant element is named `name`.
    #[must_use]
    pub fn contains_element(&self, name: &str) -> bool {
        self.child_elements()
            .any(|child| child.is(name) || child.contains_element(name))
    }

    /// Concatenated descendant text, comments excluded.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        text
    }

    /// Serialized children, without the element's own tags.
    #[must_use]
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        write_nodes(&mut out, &self.children, MarkupOptions::default());
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
            Node::Comment(_) => {}
        }
    }
}

/// Push a text node, merging it into a preceding text node.
///
/// Keeps the tree in the shape an HTML parser would produce for the same
/// markup, which is what makes re-normalization a fixed point.
pub(crate) fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(previous)) = nodes.last_mut() {
        previous.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// A wikitable after normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NormalizedTable {
    pub attributes: TableAttributes,
    pub children: Vec<Node>,
}

impl NormalizedTable {
    /// Direct child groups named `name` (`thead`, `tbody`, `tfoot`).
    pub fn groups<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter_map(Node::as_element)
            .filter(move |element| element.is(name))
    }

    /// Rows of a group, in document order.
    pub fn rows<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.groups(group)
            .flat_map(|g| g.child_elements().filter(|row| row.is("tr")))
    }

    /// Serialize as plain markup, captions and ids left out of the picture.
    #[must_use]
    pub fn to_html(&self) -> String {
        self.to_markup(MarkupOptions::default())
    }

    /// Serialize with explicit options.
    #[must_use]
    pub fn to_markup(&self, options: MarkupOptions) -> String {
        let mut out = String::new();
        out.push_str("<table");
        for (name, value) in self.attributes.iter() {
            write_attribute(&mut out, name, value);
        }
        out.push('>');
        write_nodes(&mut out, &self.children, options);
        out.push_str("</table>");
        out
    }
}

/// Serialization switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MarkupOptions {
    /// Wrap the content of every cell carrying a [`CellId`] in `<span id="n">`.
    pub inject_ids: bool,
    /// Keep `<caption>` elements but drop their content.
    pub blank_captions: bool,
}

impl MarkupOptions {
    /// Options used for the page handed to the renderer.
    #[must_use]
    pub const fn render() -> Self {
        Self {
            inject_ids: true,
            blank_captions: true,
        }
    }
}

fn write_nodes(out: &mut String, nodes: &[Node], options: MarkupOptions) {
    for node in nodes {
        match node {
            Node::Text(text) => escape_text(out, text),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            Node::Element(element) => write_element(out, element, options),
        }
    }
}

fn write_element(out: &mut String, element: &Element, options: MarkupOptions) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in element.attributes.iter() {
        write_attribute(out, name, value);
    }
    if VOID_ELEMENTS.contains(&element.name.as_str()) {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let blank = options.blank_captions && element.is("caption");
    match (options.inject_ids, element.cell_id) {
        _ if blank => {}
        (true, Some(id)) => {
            // Infallible: writing into a String
            let _ = write!(out, "<span id=\"{id}\">");
            write_nodes(out, &element.children, options);
            out.push_str("</span>");
        }
        _ => write_nodes(out, &element.children, options),
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn write_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
