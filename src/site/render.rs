use std::path::{Component, Path};

use serde::Serialize;
use tera::{Context, Tera};

use super::meta::Meta;
use super::pages::PageRecord;
use crate::config::SiteConfig;

/// Template used when a page declares none, or declares one the theme lacks.
pub const DEFAULT_TEMPLATE: &str = "index.html";

const TEMPLATE_EXT: &str = "html";

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("theme not found: {0}")]
    ThemeNotFound(String),
}

/// The template renderer, wrapping Tera.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Load every `*.html` template of a theme directory.
    ///
    /// A missing theme directory is fatal: there is no fallback theme.
    pub fn new(theme_dir: &Path) -> Result<Self, RenderError> {
        if !theme_dir.is_dir() {
            return Err(RenderError::ThemeNotFound(theme_dir.display().to_string()));
        }

        let glob = theme_dir.join(format!("**/*.{TEMPLATE_EXT}"));
        let glob_str = glob.to_string_lossy();
        let mut tera = Tera::new(&glob_str)?;
        // Page content is already HTML.
        tera.autoescape_on(vec![]);

        Ok(Self { tera })
    }

    /// Render a template with the page's variables.
    pub fn render(&self, template: &str, vars: &TemplateVars) -> Result<String, RenderError> {
        let context = Context::from_serialize(vars)?;
        Ok(self.tera.render(template, &context)?)
    }
}

/// Pick the template for a page from its declared `template` header.
///
/// A bare name gets `.html` appended. Names the theme does not provide fall
/// back to [`DEFAULT_TEMPLATE`].
pub fn resolve_template(declared: &str, theme_dir: &Path) -> String {
    let declared = declared.trim();
    if declared.is_empty() {
        return DEFAULT_TEMPLATE.to_string();
    }

    let name = if Path::new(declared).extension().is_some() {
        declared.to_string()
    } else {
        format!("{declared}.{TEMPLATE_EXT}")
    };

    let stays_in_theme = Path::new(&name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));

    if stays_in_theme && theme_dir.join(&name).is_file() {
        name
    } else {
        tracing::warn!(template = %name, "template not found in theme, using {DEFAULT_TEMPLATE}");
        DEFAULT_TEMPLATE.to_string()
    }
}

/// Variables passed to every template.
///
/// The field names are part of the theme contract.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateVars {
    pub config: SiteConfig,
    /// Site root directory (where `flatpage.yaml` lives)
    pub base_dir: String,
    pub base_url: String,
    pub theme_dir: String,
    /// Public URL of the theme's assets
    pub theme_url: String,
    pub site_title: String,
    pub meta: Meta,
    /// Rendered HTML of the requested page
    pub content: String,
    pub pages: Vec<PageRecord>,
    pub prev_page: Option<PageRecord>,
    pub current_page: Option<PageRecord>,
    pub next_page: Option<PageRecord>,
    pub is_front_page: bool,
}
