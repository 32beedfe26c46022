//! The page index: every content page of the site, for navigation.
//!
//! The index is rebuilt from disk on every request. Each content file is
//! read, its metadata extracted and its body rendered, exactly as for the
//! requested page.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use walkdir::WalkDir;

use super::highlight::SyntaxHighlighter;
use super::markdown::{MarkdownError, parse_content, strip_meta_block};
use super::meta::{Meta, read_file_meta};
use super::plugin::{HookError, PluginRegistry};
use super::route::{INDEX_NAME, NOT_FOUND_NAME};
use crate::config::{PageOrder, PageOrderBy, SiteConfig};

/// Appended to excerpts that were cut short.
pub const EXCERPT_ELLIPSIS: &str = "…";

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:/?([A-Za-z][A-Za-z0-9]*))?[^>]*>").expect("html tag pattern is valid")
});

/// Elements that sit inside a run of text. Any other tag separates words.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "del", "em", "i", "ins", "kbd", "mark", "q", "s", "samp",
    "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

#[derive(thiserror::Error, Debug)]
pub enum PageIndexError {
    #[error("failed to render {path}: {source}")]
    Markdown {
        path: PathBuf,
        source: MarkdownError,
    },

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// One page of the site, as exposed to templates in `pages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub author: String,
    pub date: String,
    pub date_formatted: String,
    /// Rendered HTML
    pub content: String,
    pub excerpt: String,
    /// Declared headers, empty entries for undeclared standard headers, and
    /// `date_formatted`
    pub meta: Meta,
    /// The content file this record was built from
    #[serde(skip)]
    pub source: PathBuf,
}

/// The sorted page index plus the requested page's position in it.
#[derive(Debug, Clone, Default)]
pub struct PageIndex {
    pub pages: Vec<PageRecord>,
    pub current_page: Option<PageRecord>,
    pub prev_page: Option<PageRecord>,
    pub next_page: Option<PageRecord>,
}

/// Sort key for the page index. Undated pages sort before dated ones.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Position(usize),
    Date(String, usize),
}

/// Everything needed to build the page index for one request.
pub struct PageIndexBuilder<'a> {
    pub config: &'a SiteConfig,
    pub content_dir: &'a Path,
    pub base_url: &'a str,
    /// Header names every page exposes (after `before_read_file_meta`)
    pub headers: &'a [String],
    pub highlighter: &'a SyntaxHighlighter,
    pub plugins: &'a PluginRegistry,
}

impl PageIndexBuilder<'_> {
    /// Build the sorted list of all pages.
    pub fn build(&self) -> Result<Vec<PageRecord>, PageIndexError> {
        let files = discover_content_files(self.content_dir, &self.config.content_ext);
        tracing::debug!(count = files.len(), dir = %self.content_dir.display(), "discovered content files");

        let mut keyed: Vec<(SortKey, PageRecord)> = Vec::with_capacity(files.len());
        let mut dated = 0;

        for (position, file) in files.into_iter().enumerate() {
            let raw = match std::fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "skipping unreadable page");
                    continue;
                }
            };

            let meta = read_file_meta(&raw, self.headers, &self.config.date_format);
            let content = parse_content(
                strip_meta_block(&raw),
                self.base_url,
                &self.config.markdown,
                self.highlighter,
            )
            .map_err(|source| PageIndexError::Markdown {
                path: file.clone(),
                source,
            })?;

            let mut page = PageRecord {
                url: page_url(&file, self.content_dir, &self.config.content_ext, self.base_url),
                title: meta_value(&meta, "title"),
                author: meta_value(&meta, "author"),
                date: meta_value(&meta, "date"),
                date_formatted: meta_value(&meta, "date_formatted"),
                excerpt: excerpt(&content, self.config.excerpt_length),
                content,
                meta,
                source: file,
            };

            // The record is borrowed mutably by the hook, so it reads a copy of the meta.
            let meta = page.meta.clone();
            self.plugins
                .dispatch("get_page_data", |p| p.get_page_data(&mut page, &meta))?;

            let key = match self.config.pages_order_by {
                PageOrderBy::Date if !page.date.is_empty() => {
                    dated += 1;
                    SortKey::Date(page.date.clone(), dated)
                }
                _ => SortKey::Position(position),
            };
            keyed.push((key, page));
        }

        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        if self.config.pages_order == PageOrder::Desc {
            keyed.reverse();
        }

        Ok(keyed.into_iter().map(|(_, page)| page).collect())
    }
}

impl PageIndex {
    /// Locate the requested page by its source file and pick its neighbours.
    ///
    /// `prev_page` is the entry after the current one and `next_page` the
    /// entry before it, so that a newest-first listing reads naturally.
    pub fn new(pages: Vec<PageRecord>, current_source: Option<&Path>) -> Self {
        let position = current_source
            .and_then(|source| pages.iter().position(|page| page.source == source));

        let Some(position) = position else {
            return Self {
                pages,
                ..Self::default()
            };
        };

        let current_page = pages.get(position).cloned();
        let prev_page = pages.get(position + 1).cloned();
        let next_page = position
            .checked_sub(1)
            .and_then(|i| pages.get(i))
            .cloned();

        Self {
            pages,
            current_page,
            prev_page,
            next_page,
        }
    }
}

fn meta_value(meta: &Meta, key: &str) -> String {
    meta.get(key).cloned().unwrap_or_default()
}

/// List content files under `content_dir`, depth first, each directory's
/// files (by name) before its sub-directories.
///
/// The not-found document and editor leftovers (`name~`, `#name#`) are not
/// part of the index.
pub fn discover_content_files(content_dir: &Path, content_ext: &str) -> Vec<PathBuf> {
    WalkDir::new(content_dir)
        .follow_links(true)
        .sort_by(|a, b| match (a.file_type().is_dir(), b.file_type().is_dir()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => a.file_name().cmp(b.file_name()),
        })
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable content entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| is_index_candidate(name, content_ext))
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn is_index_candidate(file_name: &str, content_ext: &str) -> bool {
    if file_name.ends_with('~') || file_name.ends_with('#') {
        return false;
    }
    match file_name.strip_suffix(content_ext) {
        Some(stem) => !stem.is_empty() && stem != NOT_FOUND_NAME,
        None => false,
    }
}

/// Compute the public URL of a content file.
///
/// ```ignore
/// content/index.md          => {base_url}/
/// content/about.md          => {base_url}/about
/// content/blog/index.md     => {base_url}/blog
/// content/blog/first.md     => {base_url}/blog/first
/// ```
pub fn page_url(file: &Path, content_dir: &Path, content_ext: &str, base_url: &str) -> String {
    let relative = file.strip_prefix(content_dir).unwrap_or(file);
    let relative = relative.to_string_lossy().replace('\\', "/");
    let relative = relative.strip_suffix(content_ext).unwrap_or(&relative);

    let route = if relative == INDEX_NAME {
        ""
    } else {
        relative
            .strip_suffix(&format!("/{INDEX_NAME}"))
            .unwrap_or(relative)
    };

    format!("{}/{}", base_url.trim_end_matches('/'), route)
}

/// Plain-text excerpt of rendered HTML: the first `length` words, with an
/// ellipsis when the text was longer.
pub fn excerpt(html: &str, length: usize) -> String {
    let text = HTML_TAG.replace_all(html, |caps: &Captures| {
        let inline = caps
            .get(1)
            .is_some_and(|name| INLINE_TAGS.contains(&name.as_str().to_ascii_lowercase().as_str()));
        if inline { "" } else { " " }
    });
    let mut words = text.split_whitespace();

    let mut excerpt = words.by_ref().take(length).collect::<Vec<_>>().join(" ");
    if words.next().is_some() {
        excerpt.push_str(EXCERPT_ELLIPSIS);
    }
    excerpt
}
