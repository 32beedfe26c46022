//! Markdown rendering with syntax highlighting and heading ids.

use std::collections::HashSet;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use super::highlight::SyntaxHighlighter;
use super::meta::split_meta_block;
use crate::config::MarkdownConfig;

/// Placeholder replaced with the site's base URL before rendering.
pub const BASE_URL_PLACEHOLDER: &str = "%base_url%";

#[derive(thiserror::Error, Debug)]
pub enum MarkdownError {
    #[error("invalid markdown extension: {0}")]
    InvalidExtension(String),
}

/// Remove the leading metadata block, leaving the page body.
pub fn strip_meta_block(raw: &str) -> &str {
    split_meta_block(raw).1
}

/// Substitute the base URL placeholder and render the body to HTML.
pub fn parse_content(
    body: &str,
    base_url: &str,
    markdown_config: &MarkdownConfig,
    highlighter: &SyntaxHighlighter,
) -> Result<String, MarkdownError> {
    let body = body.replace(BASE_URL_PLACEHOLDER, base_url);
    render_markdown(&body, highlighter, markdown_config)
}

fn markdown_options(markdown_config: &MarkdownConfig) -> Result<Options, MarkdownError> {
    let mut options = Options::empty();
    for extension in &markdown_config.extensions {
        match extension.as_str() {
            "definition_lists" => options.insert(Options::ENABLE_DEFINITION_LIST),
            "footnotes" => options.insert(Options::ENABLE_FOOTNOTES),
            "gfm" => options.insert(Options::ENABLE_GFM),
            "heading_attributes" => options.insert(Options::ENABLE_HEADING_ATTRIBUTES),
            "smart_punctuation" => options.insert(Options::ENABLE_SMART_PUNCTUATION),
            "strikethrough" => options.insert(Options::ENABLE_STRIKETHROUGH),
            "tables" => options.insert(Options::ENABLE_TABLES),
            "tasklists" => options.insert(Options::ENABLE_TASKLISTS),
            other => return Err(MarkdownError::InvalidExtension(other.to_string())),
        }
    }
    Ok(options)
}

/// A heading whose events are buffered until its end tag.
struct PendingHeading<'a> {
    level: HeadingLevel,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    text: String,
    inner: Vec<Event<'a>>,
}

/// Render markdown to HTML using pulldown-cmark with syntax highlighting.
pub fn render_markdown(
    markdown: &str,
    highlighter: &SyntaxHighlighter,
    markdown_config: &MarkdownConfig,
) -> Result<String, MarkdownError> {
    let parser = Parser::new_ext(markdown, markdown_options(markdown_config)?);

    let mut in_code_block = false;
    let mut code_language = String::new();
    let mut code_content = String::new();

    let mut heading: Option<PendingHeading> = None;
    let mut used_heading_ids: HashSet<String> = HashSet::new();

    let mut events: Vec<Event> = Vec::new();
    for event in parser {
        match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                heading = Some(PendingHeading {
                    level,
                    id: id.map(|id| id.to_string()),
                    classes: classes.iter().map(|c| c.to_string()).collect(),
                    attrs: attrs
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.as_ref().map(|v| v.to_string())))
                        .collect(),
                    text: String::new(),
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(pending) = heading.take() {
                    events.push(heading_html(pending, &mut used_heading_ids));
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                in_code_block = true;
                code_language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                code_content.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                let highlighted = highlighter.highlight(&code_content, &code_language);
                events.push(Event::Html(highlighted.into()));
            }
            Event::Text(text) if in_code_block => {
                code_content.push_str(&text);
            }
            other => match heading.as_mut() {
                Some(pending) => {
                    if let Event::Text(text) | Event::Code(text) = &other {
                        pending.text.push_str(text);
                    }
                    pending.inner.push(other);
                }
                None => events.push(other),
            },
        }
    }

    let mut html_output = String::new();
    html::push_html(&mut html_output, events.into_iter());
    Ok(html_output)
}

/// Emit a buffered heading with a unique id attribute.
fn heading_html<'a>(pending: PendingHeading<'a>, used_ids: &mut HashSet<String>) -> Event<'a> {
    let id = match pending.id {
        Some(existing) => existing,
        None => {
            let base_id = slugify(&pending.text);
            let mut id = base_id.clone();
            let mut suffix = 1;
            while used_ids.contains(&id) {
                id = format!("{}-{}", base_id, suffix);
                suffix += 1;
            }
            id
        }
    };
    used_ids.insert(id.clone());

    let class_attr = if pending.classes.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", pending.classes.join(" "))
    };

    let extra_attrs = pending
        .attrs
        .iter()
        .map(|(k, v)| match v {
            Some(val) => format!(" {}=\"{}\"", k, val),
            None => format!(" {}", k),
        })
        .collect::<String>();

    let mut inner_html = String::new();
    html::push_html(&mut inner_html, pending.inner.into_iter());

    let level = pending.level as usize;
    Event::Html(
        format!(
            "<h{level} id=\"{id}\"{class_attr}{extra_attrs}>{inner_html}</h{level}>\n"
        )
        .into(),
    )
}

/// Convert a string to a slug suitable for use as an HTML id.
fn slugify(s: &str) -> String {
    s.to_lowercase()
        .replace(' ', "-")
        .replace(|c: char| !c.is_alphanumeric() && c != '-', "")
}
