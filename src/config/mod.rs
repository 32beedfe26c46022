//! Configuration loading and types for flatpage.
//!
//! This module handles all aspects of configuration:
//! - Type definitions for config structures (`types`)
//! - Layered loading from defaults, `flatpage.yaml` and the environment (`load`)

mod load;
mod types;

pub use load::{CONFIG_FILE_NAME, ENV_PREFIX};
pub use types::{HighlightStyle, MarkdownConfig, PageOrder, PageOrderBy, SiteConfig};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to deserialize config: {0}")]
    Deserialize(#[from] config::ConfigError),

    #[error("failed to get current working directory: {0}")]
    CwdFailure(std::io::Error),

    #[error("{0}")]
    Validation(String),
}
