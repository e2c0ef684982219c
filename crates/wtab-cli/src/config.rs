//! `.wtab.toml` configuration
//!
//! Precedence order (highest to lowest):
//! 1. Command-line arguments
//! 2. Project config (./.wtab.toml)
//! 3. User config (~/.wtab.toml)
//! 4. Built-in defaults

use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wtab_core::ExtractOptions;
use wtab_pipeline::{DEFAULT_DUMPS_VERSION, DEFAULT_DUMP_URL};
use wtab_render::{BorderStyle, Browser, Centering, RenderSettings};

pub const CONFIG_FILE: &str = ".wtab.toml";

const DEFAULT_ROOT_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data root; dumps under `<root>/dump`, outputs under `<root>/models`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dumps_version: Option<String>,

    /// Dump URL template with `{version}` and `{lang}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_url: Option<String>,

    /// TSV whose first column lists the languages of `--language all`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<Browser>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_padding: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_style: Option<BorderStyle>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<Centering>,
}

impl RenderConfig {
    fn merge(self, over: Self) -> Self {
        Self {
            browser: over.browser.or(self.browser),
            driver: over.driver.or(self.driver),
            driver_url: over.driver_url.or(self.driver_url),
            element_timeout_ms: over.element_timeout_ms.or(self.element_timeout_ms),
            border_padding: over.border_padding.or(self.border_padding),
            border_style: over.border_style.or(self.border_style),
            center: over.center.or(self.center),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).map_err(|e| {
            eprintln!(
                "{} Failed to parse config file: {}",
                "Error:".red().bold(),
                path.display()
            );
            eprintln!("{} {}", "Parse error:".yellow().bold(), e);
            eprintln!();
            eprintln!("{} Configuration file syntax:", "Help:".cyan().bold());
            eprintln!("  root_dir = \"data\"");
            eprintln!("  dumps_version = \"20220301\"");
            eprintln!();
            eprintln!("  [render]");
            eprintln!("  browser = \"firefox\"  # firefox or chrome");
            eprintln!("  border_style = \"none\" # full, none, bottom or left");
            anyhow::anyhow!("Failed to parse config file: {e}")
        })
    }

    /// User and project configs merged, unreadable files skipped with a warning
    pub fn discover() -> Self {
        let user = dirs::home_dir().and_then(|home| Self::load_optional(&home.join(CONFIG_FILE), "user"));
        let project = Self::load_optional(Path::new(CONFIG_FILE), "project");
        Self::merge(user, project)
    }

    fn load_optional(path: &Path, kind: &str) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!(
                    "{} Failed to load {kind} config from {}: {}",
                    "Warning:".yellow().bold(),
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Merge configs with precedence: project over user over defaults
    pub fn merge(user_config: Option<Self>, project_config: Option<Self>) -> Self {
        let user = user_config.unwrap_or_default();
        let Some(project) = project_config else {
            return user;
        };

        let render = match (user.render, project.render) {
            (Some(user), Some(project)) => Some(user.merge(project)),
            (user, project) => project.or(user),
        };
        Self {
            root_dir: project.root_dir.or(user.root_dir),
            dumps_version: project.dumps_version.or(user.dumps_version),
            dump_url: project.dump_url.or(user.dump_url),
            languages_file: project.languages_file.or(user.languages_file),
            heading_tags: project.heading_tags.or(user.heading_tags),
            render,
        }
    }

    /// Every setting resolved, for display
    #[must_use]
    pub fn effective(&self) -> Self {
        let settings = self.render_settings();
        Self {
            root_dir: Some(self.root_dir()),
            dumps_version: Some(self.dumps_version().to_string()),
            dump_url: Some(self.dump_url().to_string()),
            languages_file: self.languages_file.clone(),
            heading_tags: Some(self.extract_options().heading_tags),
            render: Some(RenderConfig {
                browser: Some(settings.browser),
                driver: Some(settings.driver_program().to_string()),
                driver_url: settings.driver_url,
                element_timeout_ms: Some(settings.element_timeout_ms),
                border_padding: Some(settings.border_padding),
                border_style: Some(settings.border_style),
                center: Some(settings.center),
            }),
        }
    }

    #[must_use]
    pub fn root_dir(&self) -> PathBuf {
        self.root_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR))
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout::new(self.root_dir())
    }

    #[must_use]
    pub fn dumps_version(&self) -> &str {
        self.dumps_version.as_deref().unwrap_or(DEFAULT_DUMPS_VERSION)
    }

    #[must_use]
    pub fn dump_url(&self) -> &str {
        self.dump_url.as_deref().unwrap_or(DEFAULT_DUMP_URL)
    }

    #[must_use]
    pub fn extract_options(&self) -> ExtractOptions {
        self.heading_tags
            .clone()
            .map_or_else(ExtractOptions::default, |heading_tags| ExtractOptions { heading_tags })
    }

    #[must_use]
    pub fn render_settings(&self) -> RenderSettings {
        let defaults = RenderSettings::default();
        let Some(render) = self.render.clone() else {
            return defaults;
        };
        RenderSettings {
            browser: render.browser.unwrap_or(defaults.browser),
            driver: render.driver,
            driver_url: render.driver_url,
            element_timeout_ms: render.element_timeout_ms.unwrap_or(defaults.element_timeout_ms),
            border_padding: render.border_padding.unwrap_or(defaults.border_padding),
            border_style: render.border_style.unwrap_or(defaults.border_style),
            center: render.center.unwrap_or(defaults.center),
        }
    }

    /// Languages named by `--language`: one code, or every code of the
    /// languages file for `all`.
    pub fn languages(&self, language: &str) -> Result<Vec<String>> {
        if language != "all" {
            return Ok(vec![language.to_string()]);
        }
        let path = self
            .languages_file
            .clone()
            .unwrap_or_else(|| self.root_dir().join("config").join("LANGS_322.tsv"));
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read languages file: {}", path.display()))?;
        Ok(parse_languages(&content))
    }
}

/// First column of every non-empty, non-comment TSV line
fn parse_languages(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|code| !code.is_empty() && !code.starts_with('#'))
        .map(ToString::to_string)
        .collect()
}

/// Where each stage reads and writes, relative to the data root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn dump_dir(&self) -> PathBuf {
        self.root.join("dump")
    }

    #[must_use]
    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    /// Table records of a language, optionally the limited variant
    #[must_use]
    pub fn table_records(&self, lang: &str, limit: Option<usize>) -> PathBuf {
        let name = match limit {
            Some(limit) => format!("{lang}_{limit}.jsonl.bz2"),
            None => format!("{lang}.jsonl.bz2"),
        };
        self.models_dir().join("wikitables_html_pubtabnet").join(name)
    }

    #[must_use]
    pub fn images_dir(&self, lang: &str) -> PathBuf {
        self.models_dir().join("wikitables_images").join(lang)
    }
}
