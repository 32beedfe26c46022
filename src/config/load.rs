//! Configuration loading from files and the environment.
//!
//! Sources are layered in this order, later ones winning:
//! 1. Built-in defaults (serde defaults on `SiteConfig`)
//! 2. `flatpage.yaml` next to the site root (optional)
//! 3. `FLATPAGE_*` environment variables (`__` separates nested keys)

use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};

use super::{ConfigError, SiteConfig};

/// Default name of the site configuration file.
pub const CONFIG_FILE_NAME: &str = "flatpage.yaml";

/// Prefix of environment variables that override config keys.
pub const ENV_PREFIX: &str = "FLATPAGE";

impl SiteConfig {
    /// Load the config from the command line argument, defaulting to `flatpage.yaml`
    /// in the current directory.
    ///
    /// Returns the config together with the absolute path it was looked up at.
    pub fn load_from_arg(config_file: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let config_file = config_file.unwrap_or(Path::new(CONFIG_FILE_NAME));
        let config_file = if config_file.is_relative() {
            std::env::current_dir()
                .map_err(ConfigError::CwdFailure)?
                .join(config_file)
        } else {
            config_file.to_path_buf()
        };

        let config = Self::load_from_file(&config_file)?;
        Ok((config, config_file))
    }

    /// Load the config from a file path. A missing file yields the defaults
    /// (plus any environment overrides).
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let path_str = path.to_str().ok_or_else(|| {
            ConfigError::Validation(format!(
                "config file path is not valid unicode: {}",
                path.display()
            ))
        })?;

        let layered = config::Config::builder()
            .add_source(File::new(path_str, FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SiteConfig = layered.try_deserialize()?;
        config.validated()
    }

    /// Parse a config from YAML text, without consulting the environment.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let layered = config::Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()?;
        let config: SiteConfig = layered.try_deserialize()?;
        config.validated()
    }

    /// Normalize and check values that serde cannot express.
    fn validated(mut self) -> Result<Self, ConfigError> {
        if self.content_ext.is_empty() {
            return Err(ConfigError::Validation(
                "invalid config: 'content_ext' must not be empty".to_string(),
            ));
        }
        if !self.content_ext.starts_with('.') {
            self.content_ext.insert(0, '.');
        }

        if self.theme.is_empty() || self.theme.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "invalid config: 'theme' must be a directory name, got '{}'",
                self.theme
            )));
        }

        // Trailing slashes would double up when page URLs are joined.
        if let Some(base_url) = self.base_url.take() {
            let trimmed = base_url.trim_end_matches('/');
            self.base_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PageOrder, PageOrderBy};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SiteConfig::from_yaml_str("").unwrap();
        assert_eq!(config.site_title, "Flatpage");
        assert_eq!(config.theme, "default");
        assert_eq!(config.excerpt_length, 50);
        assert_eq!(config.content_ext, ".md");
        assert_eq!(config.pages_order_by, PageOrderBy::Alpha);
        assert_eq!(config.pages_order, PageOrder::Asc);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_overrides_merge_onto_defaults() {
        let yaml = r#"
site_title: My Blog
pages_order_by: date
pages_order: desc
excerpt_length: 20
social:
  twitter: myblog
"#;
        let config = SiteConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.site_title, "My Blog");
        assert_eq!(config.pages_order_by, PageOrderBy::Date);
        assert_eq!(config.pages_order, PageOrder::Desc);
        assert_eq!(config.excerpt_length, 20);
        // Untouched keys keep their defaults
        assert_eq!(config.theme, "default");
        // Unknown keys are passed through for templates
        assert!(config.extra.contains_key("social"));
    }

    #[test]
    fn test_content_ext_gets_leading_dot() {
        let config = SiteConfig::from_yaml_str("content_ext: txt").unwrap();
        assert_eq!(config.content_ext, ".txt");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = SiteConfig::from_yaml_str("base_url: https://example.com/blog/").unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://example.com/blog"));
    }

    #[test]
    fn test_theme_must_be_a_name() {
        let result = SiteConfig::from_yaml_str("theme: ../elsewhere");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SiteConfig::load_from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.theme, "default");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "site_title: From Disk\ntheme: clean\n").unwrap();

        let config = SiteConfig::load_from_file(&path).unwrap();
        assert_eq!(config.site_title, "From Disk");
        assert_eq!(config.theme, "clean");
    }
}
