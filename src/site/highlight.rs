//! Syntax highlighting of fenced code blocks.

use autumnus::formatter::Formatter;
use autumnus::languages::Language;
use autumnus::themes::{self, Theme};
use autumnus::{HtmlInlineBuilder, HtmlLinkedBuilder};

use crate::config::{HighlightStyle, MarkdownConfig};

/// Code block highlighter backed by autumnus.
///
/// The theme is looked up once. With [`HighlightStyle::Classes`] it only
/// feeds [`SyntaxHighlighter::stylesheet`]; with [`HighlightStyle::Inline`]
/// its colors are written into every block.
pub struct SyntaxHighlighter {
    theme: Option<&'static Theme>,
    style: HighlightStyle,
}

impl SyntaxHighlighter {
    pub fn new(theme_name: &str, style: HighlightStyle) -> Self {
        let theme = match themes::get(theme_name) {
            Ok(theme) => Some(theme),
            Err(_) => {
                tracing::warn!(theme = theme_name, "unknown highlight theme, code blocks will not be colored by it");
                None
            }
        };
        Self { theme, style }
    }

    pub fn from_config(config: &MarkdownConfig) -> Self {
        Self::new(&config.highlight_theme, config.highlight_style)
    }

    /// Highlight a fenced code block given its info string (`rust`,
    /// `rust,ignore`, `sh title="setup"`).
    ///
    /// Unknown languages and formatter failures degrade to an escaped
    /// `<pre><code>` block.
    pub fn highlight(&self, code: &str, info: &str) -> String {
        let language = fence_language(info);
        let lang = Language::guess(language, code);

        let explicitly_plain = matches!(language, "" | "text" | "plaintext");
        if matches!(lang, Language::PlainText) && !explicitly_plain {
            return plain_code_block(code, language);
        }

        let highlighted = match (self.style, self.theme) {
            (HighlightStyle::Inline, Some(theme)) => HtmlInlineBuilder::new()
                .source(code)
                .lang(lang)
                .theme(Some(theme))
                .build()
                .ok()
                .and_then(|formatter| format_to_string(&formatter)),
            _ => HtmlLinkedBuilder::new()
                .source(code)
                .lang(lang)
                .build()
                .ok()
                .and_then(|formatter| format_to_string(&formatter)),
        };
        highlighted.unwrap_or_else(|| plain_code_block(code, language))
    }

    /// CSS for class-based output, or `None` if the theme is unknown.
    pub fn stylesheet(&self) -> Option<String> {
        self.theme.map(|theme| theme.css(false))
    }
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::from_config(&MarkdownConfig::default())
    }
}

/// The language token of a fence info string.
fn fence_language(info: &str) -> &str {
    info.split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or_default()
}

fn format_to_string(formatter: &dyn Formatter) -> Option<String> {
    let mut output: Vec<u8> = Vec::new();
    formatter.format(&mut output).ok()?;
    String::from_utf8(output).ok()
}

fn plain_code_block(code: &str, language: &str) -> String {
    let escaped = html_escape(code);
    if language.is_empty() {
        format!("<pre><code>{escaped}</code></pre>")
    } else {
        format!(
            "<pre><code class=\"language-{}\">{escaped}</code></pre>",
            html_escape(language)
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
