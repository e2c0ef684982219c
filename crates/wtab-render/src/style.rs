//! Page styling
//!
//! Wraps id-injected table markup in the page handed to the renderer.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cell border variant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    /// Full grid
    Full,
    #[default]
    None,
    /// Horizontal rules under every cell
    Bottom,
    /// Vertical rules between columns, a rule under header cells
    Left,
}

impl BorderStyle {
    fn cell_rules(self) -> &'static str {
        match self {
            Self::Full => "border:1px solid black;}",
            Self::None => "}",
            Self::Bottom => "border-bottom:1px solid black;}",
            Self::Left => {
                "border-left:1px solid black;}\
                 th{border-bottom:1px solid black;}\
                 table tr td:first-child,table tr th:first-child{border-left:0;}"
            }
        }
    }
}

/// When table text is centered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Centering {
    Never,
    Always,
    /// Decided per page with a fair coin
    #[default]
    Random,
}

/// Stylesheet settings for rendered pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PageStyle {
    pub border_style: BorderStyle,
    pub center: Centering,
}

impl PageStyle {
    /// The `<style>` element for one page.
    #[must_use]
    pub fn stylesheet(&self) -> String {
        let centered = match self.center {
            Centering::Never => false,
            Centering::Always => true,
            Centering::Random => rand::rng().random_bool(0.5),
        };

        let mut css = String::from("<style>html{background-color:white;}table{");
        if centered {
            css.push_str("text-align:center;");
        }
        css.push_str("border-collapse:collapse;}td,th{padding:6px;padding-left:6px;padding-right:6px;");
        css.push_str(self.border_style.cell_rules());
        css.push_str("</style>");
        css
    }

    /// Complete page around `table_markup`, newlines removed.
    #[must_use]
    pub fn render_page(&self, table_markup: &str) -> String {
        format!(
            "<html><head><meta charset=\"utf-8\">{}</head><body>{}</body></html>",
            self.stylesheet(),
            table_markup.replace('\n', "")
        )
    }
}
