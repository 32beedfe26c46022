//! Plugin hooks.
//!
//! A plugin observes and rewrites pipeline state at fixed checkpoints. Every
//! checkpoint is a method on [`Plugin`] with a no-op default, so a plugin
//! implements only the hooks it cares about:
//!
//! ```ignore
//! struct Shout;
//!
//! impl Plugin for Shout {
//!     fn name(&self) -> &'static str { "shout" }
//!
//!     fn after_parse_content(&self, content: &mut String) -> HookResult {
//!         *content = content.to_uppercase();
//!         Ok(())
//!     }
//! }
//!
//! let site = Site::new(config, root).with_plugin(Shout);
//! ```
//!
//! Hooks run in registration order. The first hook error aborts the request.

use std::path::PathBuf;

use super::meta::Meta;
use super::pages::PageRecord;
use super::render::TemplateVars;
use crate::config::SiteConfig;

/// Error returned by a plugin hook.
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct PluginError {
    pub message: String,
}

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type HookResult = Result<(), PluginError>;

/// A pipeline extension. All hooks default to doing nothing.
#[allow(unused_variables)]
pub trait Plugin: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Runs once the registry is assembled, before routing.
    fn plugins_loaded(&self) -> HookResult {
        Ok(())
    }

    /// The route derived from the request path (e.g. `blog/first-post`).
    fn request_url(&self, url: &mut String) -> HookResult {
        Ok(())
    }

    fn before_load_content(&self, file: &mut PathBuf) -> HookResult {
        Ok(())
    }

    fn after_load_content(&self, file: &mut PathBuf, content: &mut String) -> HookResult {
        Ok(())
    }

    fn before_404_load_content(&self, file: &mut PathBuf) -> HookResult {
        Ok(())
    }

    fn after_404_load_content(&self, file: &mut PathBuf, content: &mut String) -> HookResult {
        Ok(())
    }

    /// The per-request copy of the site configuration.
    fn config_loaded(&self, config: &mut SiteConfig) -> HookResult {
        Ok(())
    }

    /// Header names every page will expose, declared or not.
    fn before_read_file_meta(&self, headers: &mut Vec<String>) -> HookResult {
        Ok(())
    }

    /// Metadata of the requested page.
    fn file_meta(&self, meta: &mut Meta) -> HookResult {
        Ok(())
    }

    /// Body of the requested page, before markdown rendering.
    fn before_parse_content(&self, content: &mut String) -> HookResult {
        Ok(())
    }

    /// Rendered HTML of the requested page.
    fn after_parse_content(&self, content: &mut String) -> HookResult {
        Ok(())
    }

    /// Called for every record of the page index as it is built.
    fn get_page_data(&self, page: &mut PageRecord, meta: &Meta) -> HookResult {
        Ok(())
    }

    /// The sorted page index and the current page's neighbours.
    fn get_pages(
        &self,
        pages: &mut Vec<PageRecord>,
        current_page: &mut Option<PageRecord>,
        prev_page: &mut Option<PageRecord>,
        next_page: &mut Option<PageRecord>,
    ) -> HookResult {
        Ok(())
    }

    /// Runs before the theme's templates are loaded.
    fn before_template_register(&self) -> HookResult {
        Ok(())
    }

    /// Template variables and the template name about to be rendered.
    fn before_render(&self, vars: &mut TemplateVars, template: &mut String) -> HookResult {
        Ok(())
    }

    /// The final response body.
    fn after_render(&self, output: &mut String) -> HookResult {
        Ok(())
    }
}

/// Hook failure, tagged with the plugin and checkpoint that raised it.
#[derive(thiserror::Error, Debug)]
#[error("plugin '{plugin}' failed in '{hook}': {source}")]
pub struct HookError {
    pub plugin: &'static str,
    pub hook: &'static str,
    #[source]
    pub source: PluginError,
}

/// The ordered list of registered plugins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Hooks run in registration order.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Names of all registered plugins, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Invoke `hook` (named `hook_name` for errors) on every plugin in order.
    pub fn dispatch<F>(&self, hook_name: &'static str, mut hook: F) -> Result<(), HookError>
    where
        F: FnMut(&dyn Plugin) -> HookResult,
    {
        for plugin in &self.plugins {
            tracing::trace!(plugin = plugin.name(), hook = hook_name, "running hook");
            hook(plugin.as_ref()).map_err(|source| HookError {
                plugin: plugin.name(),
                hook: hook_name,
                source,
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
