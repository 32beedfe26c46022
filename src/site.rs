//! The flat-file site: routing, metadata, markdown, page index, plugins and
//! theme rendering, tied together by [`Site::handle`].

mod highlight;
pub mod markdown;
pub mod meta;
pub mod pages;
mod pipeline;
pub mod plugin;
pub mod render;
pub mod route;

pub use highlight::SyntaxHighlighter;
pub use pipeline::{PipelineError, Request, Response, Site, Status, base_path_from_config};
pub use plugin::{HookError, HookResult, Plugin, PluginError, PluginRegistry};
