//! Renderer settings, read from the `[render]` table of `.wtab.toml`.

use crate::correlate::{CorrelateOptions, BORDER_PADDING};
use crate::style::{BorderStyle, Centering, PageStyle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Default wait for one cell marker
pub const ELEMENT_TIMEOUT_MS: u64 = 3000;

/// Headless browser driven through WebDriver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Firefox,
    Chrome,
}

impl Browser {
    /// WebDriver binary looked up on `PATH` when none is configured.
    #[must_use]
    pub const fn default_driver(self) -> &'static str {
        match self {
            Self::Firefox => "geckodriver",
            Self::Chrome => "chromedriver",
        }
    }

    /// `alwaysMatch` capabilities for a headless session.
    #[must_use]
    pub fn capabilities(self) -> Value {
        match self {
            Self::Firefox => json!({
                "browserName": "firefox",
                "moz:firefoxOptions": {"args": ["-headless"]},
            }),
            Self::Chrome => json!({
                "browserName": "chrome",
                "goog:chromeOptions": {"args": ["--headless=new", "--disable-gpu", "--no-sandbox"]},
            }),
        }
    }
}

/// Renderer and page-style settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub browser: Browser,
    /// WebDriver binary; the browser's default driver when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Connect to an already running WebDriver instead of spawning one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_url: Option<String>,
    pub element_timeout_ms: u64,
    pub border_padding: i64,
    pub border_style: BorderStyle,
    pub center: Centering,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            browser: Browser::default(),
            driver: None,
            driver_url: None,
            element_timeout_ms: ELEMENT_TIMEOUT_MS,
            border_padding: BORDER_PADDING,
            border_style: BorderStyle::default(),
            center: Centering::default(),
        }
    }
}

impl RenderSettings {
    #[must_use]
    pub fn driver_program(&self) -> &str {
        self.driver
            .as_deref()
            .unwrap_or_else(|| self.browser.default_driver())
    }

    #[must_use]
    pub const fn page_style(&self) -> PageStyle {
        PageStyle {
            border_style: self.border_style,
            center: self.center,
        }
    }

    #[must_use]
    pub const fn correlate_options(&self) -> CorrelateOptions {
        CorrelateOptions {
            element_timeout: Duration::from_millis(self.element_timeout_ms),
            border_padding: self.border_padding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.driver_program(), "geckodriver");
        assert_eq!(
            settings.correlate_options().element_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(settings.border_padding, 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: RenderSettings =
            toml::from_str("browser = \"chrome\"\nelement_timeout_ms = 500").unwrap();
        assert_eq!(settings.browser, Browser::Chrome);
        assert_eq!(settings.driver_program(), "chromedriver");
        assert_eq!(settings.element_timeout_ms, 500);
        assert_eq!(settings.center, Centering::Random);
    }

    #[test]
    fn test_settings_round_trip_through_json() {
        let settings = RenderSettings {
            driver_url: Some("http://127.0.0.1:4444".into()),
            ..RenderSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: RenderSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
