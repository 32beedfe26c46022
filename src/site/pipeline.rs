//! The request pipeline.
//!
//! One call to [`Site::handle`] serves one request:
//!
//! 1. Route the request path to a content file (or the not-found document)
//! 2. Load the file and the per-request configuration
//! 3. Extract metadata and render the body
//! 4. Build the page index for navigation
//! 5. Render the page through the active theme
//!
//! Plugins are invoked between every step.

use std::path::{Path, PathBuf};

use super::highlight::SyntaxHighlighter;
use super::markdown::{MarkdownError, parse_content, strip_meta_block};
use super::meta::{read_file_meta, standard_headers};
use super::pages::{PageIndex, PageIndexBuilder, PageIndexError};
use super::plugin::{HookError, Plugin, PluginRegistry};
use super::render::{RenderError, Renderer, TemplateVars, resolve_template};
use super::route::{RouteStatus, request_route, resolve_content_file};
use crate::config::{ConfigError, SiteConfig};

/// Errors that abort a request.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("markdown rendering error: {0}")]
    Markdown(#[from] MarkdownError),

    #[error("page index error: {0}")]
    PageIndex(#[from] PageIndexError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

/// An incoming request, reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct Request {
    /// Raw request path, query string included
    pub path: String,
    /// Path the site is mounted under (`/` for the server root)
    pub mount_path: String,
    /// Base URL derived from the request; used when the config sets none
    pub base_url: String,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mount_path: "/".to_string(),
            base_url: String::new(),
        }
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub body: String,
}

/// A flat-file site: configuration, location on disk and plugins.
pub struct Site {
    config: SiteConfig,
    /// Directory relative config paths resolve against
    root_dir: PathBuf,
    plugins: PluginRegistry,
    highlighter: SyntaxHighlighter,
}

impl Site {
    pub fn new(config: SiteConfig, root_dir: impl Into<PathBuf>) -> Self {
        let highlighter = SyntaxHighlighter::from_config(&config.markdown);
        Self {
            config,
            root_dir: root_dir.into(),
            plugins: PluginRegistry::new(),
            highlighter,
        }
    }

    /// Load the site whose configuration file is `config_file`
    /// (`flatpage.yaml` in the current directory by default).
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, config_path) = SiteConfig::load_from_arg(config_file)?;
        Ok(Self::new(config, base_path_from_config(&config_path)))
    }

    /// Register a plugin. Hooks run in registration order.
    pub fn with_plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.register(plugin);
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn content_dir(&self) -> PathBuf {
        self.resolve_dir(&self.config.content_dir)
    }

    pub fn themes_dir(&self) -> PathBuf {
        self.resolve_dir(&self.config.themes_dir)
    }

    /// URL path segment theme assets are published under (`themes` by default).
    pub fn themes_url_segment(&self) -> String {
        themes_url_segment(&self.config)
    }

    fn resolve_dir(&self, dir: &Path) -> PathBuf {
        if dir.is_relative() {
            self.root_dir.join(dir)
        } else {
            dir.to_path_buf()
        }
    }

    /// Serve one request.
    pub fn handle(&self, request: &Request) -> Result<Response, PipelineError> {
        let plugins = &self.plugins;
        plugins.dispatch("plugins_loaded", |p| p.plugins_loaded())?;

        let mut route = request_route(&request.path, &request.mount_path);
        plugins.dispatch("request_url", |p| p.request_url(&mut route))?;

        let content_dir = self.content_dir();
        let resolved = resolve_content_file(&route, &content_dir, &self.config.content_ext);
        tracing::debug!(route = %route, file = %resolved.path.display(), status = ?resolved.status, "resolved route");

        let status = match resolved.status {
            RouteStatus::Found => Status::Ok,
            RouteStatus::NotFound => Status::NotFound,
        };

        let mut file = resolved.path;
        let raw = match status {
            Status::Ok => {
                plugins.dispatch("before_load_content", |p| p.before_load_content(&mut file))?;
                let mut raw = std::fs::read_to_string(&file).map_err(|source| PipelineError::Read {
                    path: file.clone(),
                    source,
                })?;
                plugins.dispatch("after_load_content", |p| {
                    p.after_load_content(&mut file, &mut raw)
                })?;
                raw
            }
            Status::NotFound => {
                plugins.dispatch("before_404_load_content", |p| {
                    p.before_404_load_content(&mut file)
                })?;
                let mut raw = std::fs::read_to_string(&file).unwrap_or_else(|e| {
                    tracing::warn!(path = %file.display(), error = %e, "not-found document unavailable, serving an empty page");
                    String::new()
                });
                plugins.dispatch("after_404_load_content", |p| {
                    p.after_404_load_content(&mut file, &mut raw)
                })?;
                raw
            }
        };

        let mut config = self.config.clone();
        plugins.dispatch("config_loaded", |p| p.config_loaded(&mut config))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| request.base_url.trim_end_matches('/').to_string());

        let mut headers = standard_headers();
        plugins.dispatch("before_read_file_meta", |p| p.before_read_file_meta(&mut headers))?;
        let mut meta = read_file_meta(&raw, &headers, &config.date_format);
        plugins.dispatch("file_meta", |p| p.file_meta(&mut meta))?;

        // config_loaded may have switched the highlight theme or style.
        let request_highlighter;
        let highlighter = if config.markdown.highlight_theme == self.config.markdown.highlight_theme
            && config.markdown.highlight_style == self.config.markdown.highlight_style
        {
            &self.highlighter
        } else {
            request_highlighter = SyntaxHighlighter::from_config(&config.markdown);
            &request_highlighter
        };

        let mut body = strip_meta_block(&raw).to_string();
        plugins.dispatch("before_parse_content", |p| p.before_parse_content(&mut body))?;
        let mut content = parse_content(&body, &base_url, &config.markdown, highlighter)?;
        plugins.dispatch("after_parse_content", |p| p.after_parse_content(&mut content))?;

        let pages = PageIndexBuilder {
            config: &config,
            content_dir: &content_dir,
            base_url: &base_url,
            headers: &headers,
            highlighter,
            plugins,
        }
        .build()?;

        let current_source = (status == Status::Ok).then_some(file.as_path());
        let PageIndex {
            mut pages,
            mut current_page,
            mut prev_page,
            mut next_page,
        } = PageIndex::new(pages, current_source);
        plugins.dispatch("get_pages", |p| {
            p.get_pages(&mut pages, &mut current_page, &mut prev_page, &mut next_page)
        })?;

        plugins.dispatch("before_template_register", |p| p.before_template_register())?;
        let theme_dir = self.resolve_dir(&config.themes_dir).join(&config.theme);
        let renderer = Renderer::new(&theme_dir)?;

        let declared_template = meta
            .get("template")
            .filter(|t| !t.is_empty())
            .or_else(|| meta.get("layout"))
            .map(String::as_str)
            .unwrap_or_default();
        let mut template = resolve_template(declared_template, &theme_dir);

        let mut vars = TemplateVars {
            base_dir: self.root_dir.to_string_lossy().trim_end_matches('/').to_string(),
            theme_dir: theme_dir.to_string_lossy().to_string(),
            theme_url: format!("{}/{}/{}", base_url, themes_url_segment(&config), config.theme),
            site_title: config.site_title.clone(),
            base_url,
            config,
            meta,
            content,
            pages,
            prev_page,
            current_page,
            next_page,
            is_front_page: route.is_empty(),
        };
        plugins.dispatch("before_render", |p| p.before_render(&mut vars, &mut template))?;

        tracing::debug!(template = %template, pages = vars.pages.len(), "rendering page");
        let mut output = renderer.render(&template, &vars)?;
        plugins.dispatch("after_render", |p| p.after_render(&mut output))?;

        Ok(Response {
            status,
            body: output,
        })
    }
}

fn themes_url_segment(config: &SiteConfig) -> String {
    config
        .themes_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "themes".to_string())
}

/// Get the base path from a config file path (its parent directory).
pub fn base_path_from_config(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::{HighlightStyle, MarkdownConfig, PageOrder, PageOrderBy};
    use crate::site::meta::Meta;
    use crate::site::pages::PageRecord;
    use crate::site::plugin::{HookResult, PluginError};

    const THEME: &str = "<title>{{ meta.title }}</title>\n\
<main>{{ content }}</main>\n\
<nav>{% for page in pages %}[{{ page.title }}]{% endfor %}</nav>\n\
{% if current_page %}CURRENT={{ current_page.url }}\n{% endif %}\
{% if prev_page %}PREV={{ prev_page.title }}\n{% endif %}\
{% if next_page %}NEXT={{ next_page.title }}\n{% endif %}\
{% if is_front_page %}FRONT\n{% endif %}\
SITE={{ site_title }} THEME={{ theme_url }}\n";

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn site_fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "content/index.md", "/*\nTitle: Home\n*/\n# Hello\n\nWelcome.");
        write(root, "content/404.md", "/*\nTitle: Not Found\n*/\nNothing here.");
        write(root, "content/about.md", "About\n=====\n\nSee [home](%base_url%/).");
        write(root, "content/wide.md", "/*\nTitle: Wide\nTemplate: wide\n*/\nWide page.");
        write(root, "content/odd.md", "/*\nTitle: Odd\nTemplate: gallery\n*/\nOdd page.");
        write(root, "content/blog/one.md", "/*\nTitle: One\nDate: 2020-01-01\n*/\nFirst.");
        write(root, "content/blog/two.md", "/*\nTitle: Two\nDate: 2021-06-01\n*/\nSecond.");
        write(root, "content/blog/three.md", "/*\nTitle: Three\nDate: 2019-12-31\n*/\nThird.");
        write(root, "themes/default/index.html", THEME);
        write(root, "themes/default/wide.html", "WIDE {{ content }}");
        dir
    }

    fn site(dir: &tempfile::TempDir) -> Site {
        Site::new(SiteConfig::default(), dir.path())
    }

    #[test]
    fn test_front_page() {
        let dir = site_fixture();
        let response = site(&dir).handle(&Request::new("/")).unwrap();

        assert_eq!(response.status, Status::Ok);
        assert!(response.body.contains("<title>Home</title>"));
        assert!(response.body.contains("<h1 id=\"hello\">Hello</h1>"));
        assert!(response.body.contains("FRONT"));
        assert!(response.body.contains("CURRENT=/\n"));
    }

    #[test]
    fn test_mount_path_and_query() {
        let dir = site_fixture();
        let site = site(&dir);

        let mounted = Request::new("/docs").with_mount_path("/docs");
        let response = site.handle(&mounted).unwrap();
        assert!(response.body.contains("<title>Home</title>"));

        let response = site.handle(&Request::new("/?utm=feed")).unwrap();
        assert!(response.body.contains("<title>Home</title>"));

        let response = site.handle(&Request::new("/docs/about").with_mount_path("/docs")).unwrap();
        assert!(response.body.contains("<title>About</title>"));
        assert!(!response.body.contains("FRONT"));
    }

    #[test]
    fn test_missing_page_is_404() {
        let dir = site_fixture();
        let response = site(&dir).handle(&Request::new("/no/such/page")).unwrap();

        assert_eq!(response.status, Status::NotFound);
        assert_eq!(response.status.code(), 404);
        assert!(response.body.contains("<title>Not Found</title>"));
        assert!(response.body.contains("Nothing here."));
        assert!(!response.body.contains("CURRENT="));
        // The not-found document never appears in navigation
        assert!(!response.body.contains("[Not Found]"));
    }

    #[test]
    fn test_missing_404_document_renders_empty_page() {
        let dir = site_fixture();
        std::fs::remove_file(dir.path().join("content/404.md")).unwrap();

        let response = site(&dir).handle(&Request::new("/nope")).unwrap();
        assert_eq!(response.status, Status::NotFound);
        assert!(response.body.contains("<main></main>"));
    }

    #[test]
    fn test_title_recovered_and_base_url_substituted() {
        let dir = site_fixture();
        let request = Request::new("/about").with_base_url("http://localhost:3000/");
        let response = site(&dir).handle(&request).unwrap();

        assert!(response.body.contains("<title>About</title>"));
        assert!(response.body.contains("href=\"http://localhost:3000/\""));
        assert!(response.body.contains("THEME=http://localhost:3000/themes/default"));
        assert!(response.body.contains("CURRENT=http://localhost:3000/about"));
    }

    #[test]
    fn test_configured_base_url_wins() {
        let dir = site_fixture();
        let config = SiteConfig {
            base_url: Some("https://example.com".to_string()),
            ..SiteConfig::default()
        };
        let request = Request::new("/about").with_base_url("http://localhost:3000");
        let response = Site::new(config, dir.path()).handle(&request).unwrap();

        assert!(response.body.contains("href=\"https://example.com/\""));
    }

    #[test]
    fn test_code_blocks_follow_highlight_settings() {
        let dir = site_fixture();
        write(dir.path(), "content/code.md", "# Code\n\n```rust\nfn main() {}\n```\n");

        let response = site(&dir).handle(&Request::new("/code")).unwrap();
        assert!(response.body.contains("<pre class=\"athl\">"));

        let config = SiteConfig {
            markdown: MarkdownConfig {
                highlight_style: HighlightStyle::Inline,
                ..MarkdownConfig::default()
            },
            ..SiteConfig::default()
        };
        let response = Site::new(config, dir.path())
            .handle(&Request::new("/code"))
            .unwrap();
        assert!(response.body.contains("<span style="));
    }

    struct InlineCode;

    impl Plugin for InlineCode {
        fn name(&self) -> &'static str {
            "inline-code"
        }

        fn config_loaded(&self, config: &mut SiteConfig) -> HookResult {
            config.markdown.highlight_style = HighlightStyle::Inline;
            Ok(())
        }
    }

    #[test]
    fn test_config_loaded_can_switch_highlighting() {
        let dir = site_fixture();
        write(dir.path(), "content/code.md", "```rust\nfn main() {}\n```\n");

        let response = site(&dir)
            .with_plugin(InlineCode)
            .handle(&Request::new("/code"))
            .unwrap();
        assert!(response.body.contains("<span style="));
    }

    #[test]
    fn test_template_override_and_fallback() {
        let dir = site_fixture();
        let site = site(&dir);

        let response = site.handle(&Request::new("/wide")).unwrap();
        assert!(response.body.starts_with("WIDE <p>Wide page.</p>"));

        let response = site.handle(&Request::new("/odd")).unwrap();
        assert!(response.body.contains("<title>Odd</title>"));
    }

    #[test]
    fn test_missing_theme_is_fatal() {
        let dir = site_fixture();
        let config = SiteConfig {
            theme: "missing".to_string(),
            ..SiteConfig::default()
        };
        let result = Site::new(config, dir.path()).handle(&Request::new("/"));
        assert!(matches!(
            result,
            Err(PipelineError::Render(RenderError::ThemeNotFound(_)))
        ));
    }

    #[test]
    fn test_neighbours_in_date_order() {
        let dir = site_fixture();
        let config = SiteConfig {
            pages_order_by: PageOrderBy::Date,
            pages_order: PageOrder::Desc,
            ..SiteConfig::default()
        };
        let response = Site::new(config, dir.path())
            .handle(&Request::new("/blog/one"))
            .unwrap();

        assert!(response.body.contains("PREV=Three"));
        assert!(response.body.contains("NEXT=Two"));
        assert!(response.body.contains("[Two][One][Three]"));
    }

    #[test]
    fn test_current_page_found_despite_shared_title() {
        let dir = site_fixture();
        write(dir.path(), "content/blog/copy.md", "/*\nTitle: One\n*/\nSame title.");

        let response = site(&dir).handle(&Request::new("/blog/copy")).unwrap();
        assert!(response.body.contains("CURRENT=/blog/copy\n"));
    }

    struct Alias;

    impl Plugin for Alias {
        fn name(&self) -> &'static str {
            "alias"
        }

        fn request_url(&self, url: &mut String) -> HookResult {
            if url == "home" {
                url.clear();
            }
            Ok(())
        }
    }

    struct Footer;

    impl Plugin for Footer {
        fn name(&self) -> &'static str {
            "footer"
        }

        fn config_loaded(&self, config: &mut SiteConfig) -> HookResult {
            config.site_title = "Plugged".to_string();
            Ok(())
        }

        fn after_render(&self, output: &mut String) -> HookResult {
            output.push_str("<!-- footer -->");
            Ok(())
        }
    }

    struct OnlyBlog;

    impl Plugin for OnlyBlog {
        fn name(&self) -> &'static str {
            "only-blog"
        }

        fn get_pages(
            &self,
            pages: &mut Vec<PageRecord>,
            _current_page: &mut Option<PageRecord>,
            _prev_page: &mut Option<PageRecord>,
            _next_page: &mut Option<PageRecord>,
        ) -> HookResult {
            pages.retain(|page| page.url.contains("/blog/"));
            Ok(())
        }
    }

    struct Broken;

    impl Plugin for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn file_meta(&self, _meta: &mut Meta) -> HookResult {
            Err(PluginError::new("bad metadata"))
        }
    }

    struct Trace(Arc<Mutex<Vec<&'static str>>>);

    impl Trace {
        fn record(&self, hook: &'static str) -> HookResult {
            self.0.lock().unwrap().push(hook);
            Ok(())
        }
    }

    impl Plugin for Trace {
        fn name(&self) -> &'static str {
            "trace"
        }

        fn plugins_loaded(&self) -> HookResult {
            self.record("plugins_loaded")
        }

        fn request_url(&self, _url: &mut String) -> HookResult {
            self.record("request_url")
        }

        fn before_load_content(&self, _file: &mut PathBuf) -> HookResult {
            self.record("before_load_content")
        }

        fn after_load_content(&self, _file: &mut PathBuf, _content: &mut String) -> HookResult {
            self.record("after_load_content")
        }

        fn before_404_load_content(&self, _file: &mut PathBuf) -> HookResult {
            self.record("before_404_load_content")
        }

        fn after_404_load_content(&self, _file: &mut PathBuf, _content: &mut String) -> HookResult {
            self.record("after_404_load_content")
        }

        fn config_loaded(&self, _config: &mut SiteConfig) -> HookResult {
            self.record("config_loaded")
        }

        fn before_read_file_meta(&self, _headers: &mut Vec<String>) -> HookResult {
            self.record("before_read_file_meta")
        }

        fn file_meta(&self, _meta: &mut Meta) -> HookResult {
            self.record("file_meta")
        }

        fn before_parse_content(&self, _content: &mut String) -> HookResult {
            self.record("before_parse_content")
        }

        fn after_parse_content(&self, _content: &mut String) -> HookResult {
            self.record("after_parse_content")
        }

        fn get_pages(
            &self,
            _pages: &mut Vec<PageRecord>,
            _current_page: &mut Option<PageRecord>,
            _prev_page: &mut Option<PageRecord>,
            _next_page: &mut Option<PageRecord>,
        ) -> HookResult {
            self.record("get_pages")
        }

        fn before_template_register(&self) -> HookResult {
            self.record("before_template_register")
        }

        fn before_render(&self, _vars: &mut TemplateVars, _template: &mut String) -> HookResult {
            self.record("before_render")
        }

        fn after_render(&self, _output: &mut String) -> HookResult {
            self.record("after_render")
        }
    }

    #[test]
    fn test_plugins_rewrite_state() {
        let dir = site_fixture();
        let site = site(&dir).with_plugin(Alias).with_plugin(Footer).with_plugin(OnlyBlog);
        assert_eq!(site.plugins().names(), vec!["alias", "footer", "only-blog"]);

        let response = site.handle(&Request::new("/home")).unwrap();
        assert_eq!(response.status, Status::Ok);
        assert!(response.body.contains("<title>Home</title>"));
        assert!(response.body.contains("SITE=Plugged"));
        assert!(response.body.ends_with("<!-- footer -->"));
        assert!(response.body.contains("<nav>[One][Three][Two]</nav>"));
    }

    #[test]
    fn test_plugin_error_aborts_request() {
        let dir = site_fixture();
        let result = site(&dir).with_plugin(Broken).handle(&Request::new("/"));

        match result {
            Err(PipelineError::Hook(err)) => {
                assert_eq!(err.plugin, "broken");
                assert_eq!(err.hook, "file_meta");
            }
            other => panic!("expected hook error, got {other:?}"),
        }
    }

    #[test]
    fn test_hook_order() {
        let dir = site_fixture();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let site = site(&dir).with_plugin(Trace(Arc::clone(&calls)));

        site.handle(&Request::new("/")).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "plugins_loaded",
                "request_url",
                "before_load_content",
                "after_load_content",
                "config_loaded",
                "before_read_file_meta",
                "file_meta",
                "before_parse_content",
                "after_parse_content",
                "get_pages",
                "before_template_register",
                "before_render",
                "after_render",
            ]
        );

        calls.lock().unwrap().clear();
        site.handle(&Request::new("/missing")).unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[2], "before_404_load_content");
        assert_eq!(calls[3], "after_404_load_content");
    }

    #[test]
    fn test_base_path_from_config() {
        assert_eq!(
            base_path_from_config(Path::new("/srv/site/flatpage.yaml")),
            PathBuf::from("/srv/site")
        );
    }
}
