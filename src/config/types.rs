//! Configuration type definitions.
//!
//! This module contains the data structures read from `flatpage.yaml`.
//! These types are pure data - no I/O or complex logic.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// =============================================================================
// Site configuration
// =============================================================================

/// Site-wide settings, merged from user overrides onto built-in defaults.
///
/// Every field is exposed to templates as `config.*`, including keys this
/// struct does not know about (collected in `extra`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_title")]
    pub site_title: String,
    /// Absolute base URL. Derived from the incoming request when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the active theme (a directory under `themes_dir`)
    #[serde(default = "default_theme")]
    pub theme: String,
    /// strftime-style format used to build `date_formatted`
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub pages_order_by: PageOrderBy,
    #[serde(default)]
    pub pages_order: PageOrder,
    /// Number of words kept in page excerpts
    #[serde(default = "default_excerpt_length")]
    pub excerpt_length: usize,
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    /// File extension of content files, including the leading dot
    #[serde(default = "default_content_ext")]
    pub content_ext: String,
    #[serde(default = "default_themes_dir")]
    pub themes_dir: PathBuf,
    #[serde(default)]
    pub markdown: MarkdownConfig,
    /// Arbitrary user settings, passed through to templates untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_site_title() -> String {
    "Flatpage".to_string()
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_date_format() -> String {
    "%-d %b %Y".to_string()
}

fn default_excerpt_length() -> usize {
    50
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_content_ext() -> String {
    ".md".to_string()
}

fn default_themes_dir() -> PathBuf {
    PathBuf::from("themes")
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_title: default_site_title(),
            base_url: None,
            theme: default_theme(),
            date_format: default_date_format(),
            pages_order_by: PageOrderBy::default(),
            pages_order: PageOrder::default(),
            excerpt_length: default_excerpt_length(),
            content_dir: default_content_dir(),
            content_ext: default_content_ext(),
            themes_dir: default_themes_dir(),
            markdown: MarkdownConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Page ordering
// =============================================================================

/// Which key the page index is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrderBy {
    /// Directory walk order (files sorted by name)
    #[default]
    Alpha,
    /// The raw `Date:` header of each page
    Date,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrder {
    #[default]
    Asc,
    Desc,
}

// =============================================================================
// Markdown configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Extensions to enable for markdown processing
    #[serde(default = "default_markdown_extensions")]
    pub extensions: Vec<String>,
    /// Theme used for syntax-highlighted code blocks
    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,
    /// How highlighted code is colored
    #[serde(default)]
    pub highlight_style: HighlightStyle,
}

/// Coloring of highlighted code blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightStyle {
    /// CSS classes; the theme ships the stylesheet (`flatpage init` writes one)
    #[default]
    Classes,
    /// Inline `style` attributes taken from `highlight_theme`
    Inline,
}

fn default_markdown_extensions() -> Vec<String> {
    vec![
        "footnotes".to_string(),
        "heading_attributes".to_string(),
        "strikethrough".to_string(),
        "tables".to_string(),
        "tasklists".to_string(),
    ]
}

fn default_highlight_theme() -> String {
    "dracula".to_string()
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            extensions: default_markdown_extensions(),
            highlight_theme: default_highlight_theme(),
            highlight_style: HighlightStyle::default(),
        }
    }
}
