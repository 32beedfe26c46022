//! Metadata extraction from content files.
//!
//! Metadata lives in a single comment block at the top of a content file:
//!
//! ```markdown
//! /*
//! Title: Welcome
//! Description: The front page
//! Date: 2024-03-01
//! Template: wide
//! */
//!
//! Page body starts here.
//! ```
//!
//! Keys are case-insensitive and stored lower-cased. When no title is
//! declared, one is recovered from the first heading of the body.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Page metadata: lower-cased header names to their values.
pub type Meta = BTreeMap<String, String>;

/// Headers every page exposes to templates, declared or not.
pub const STANDARD_HEADERS: &[&str] = &["title", "description", "author", "date", "robots", "template"];

const OPEN_MARKER: &str = "/*";
const CLOSE_MARKER: &str = "*/";

/// Byte order mark some editors put at the start of UTF-8 files.
const BOM: char = '\u{feff}';

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
];

/// The standard header list as owned strings, ready for plugins to extend.
pub fn standard_headers() -> Vec<String> {
    STANDARD_HEADERS.iter().map(|h| h.to_string()).collect()
}

/// Split raw file text into its leading metadata block and the body.
///
/// Returns `None` for the block when the file does not start with one; the
/// body is then the whole input. A leading byte order mark is dropped.
pub fn split_meta_block(raw: &str) -> (Option<&str>, &str) {
    let raw = raw.strip_prefix(BOM).unwrap_or(raw);
    let Some(after_open) = raw.trim_start().strip_prefix(OPEN_MARKER) else {
        return (None, raw);
    };
    let Some(close) = after_open.find(CLOSE_MARKER) else {
        return (None, raw);
    };

    let block = &after_open[..close];
    let body = &after_open[close + CLOSE_MARKER.len()..];
    (Some(block), body)
}

/// Extract metadata from raw file text.
///
/// Every name in `headers` is present in the result (empty when not
/// declared), as is `date_formatted`. Declared keys outside `headers` are
/// kept too.
pub fn read_file_meta(raw: &str, headers: &[String], date_format: &str) -> Meta {
    let (block, body) = split_meta_block(raw);

    let mut meta: Meta = headers
        .iter()
        .map(|h| (h.to_lowercase(), String::new()))
        .collect();

    let mut declared = Meta::new();
    for line in block.into_iter().flat_map(str::lines) {
        if let Some((key, value)) = parse_meta_line(line) {
            // First declaration wins.
            declared.entry(key).or_insert(value);
        }
    }
    meta.extend(declared);

    let has_title = meta.get("title").is_some_and(|t| !t.is_empty());
    if !has_title && let Some(title) = recover_title(body) {
        meta.insert("title".to_string(), title);
    }

    let date_formatted = meta
        .get("date")
        .filter(|d| !d.is_empty())
        .map(|d| format_date(d, date_format))
        .unwrap_or_default();
    meta.insert("date_formatted".to_string(), date_formatted);

    meta
}

/// Parse one `Key: value` line of a metadata block.
fn parse_meta_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_start_matches([' ', '\t', '/', '*', '#', '@']);
    let (key, value) = line.split_once(':')?;

    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }

    Some((key.to_lowercase(), value.trim().to_string()))
}

/// Recover a title from the first heading of a body.
///
/// A setext heading (text underlined with `=` or `-`) takes priority over
/// an ATX heading; only level-one ATX headings (`# Title`) count. Lines in
/// code blocks and HTML are never headings.
pub fn recover_title(body: &str) -> Option<String> {
    let parser = Parser::new_ext(body, Options::ENABLE_HEADING_ATTRIBUTES);

    // (is_setext, text) of the heading being read
    let mut current: Option<(bool, String)> = None;
    let mut first_atx: Option<String> = None;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let is_setext = !body[range].trim_start().starts_with('#');
                if is_setext || level == HeadingLevel::H1 {
                    current = Some((is_setext, String::new()));
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, title)) = current.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, title)) = current.as_mut() {
                    title.push(' ');
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                let Some((is_setext, title)) = current.take() else {
                    continue;
                };
                let title = title.trim().to_string();
                if title.is_empty() {
                    continue;
                }
                if is_setext {
                    return Some(title);
                }
                first_atx.get_or_insert(title);
            }
            _ => {}
        }
    }

    first_atx
}

/// Format a declared date with a strftime-style format.
///
/// Returns an empty string when the date cannot be parsed or the format is
/// invalid.
pub fn format_date(date: &str, format: &str) -> String {
    let Some(parsed) = parse_date(date) else {
        return String::new();
    };

    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return String::new();
    }

    let mut out = String::new();
    match write!(out, "{}", parsed.format_with_items(items.iter())) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

fn parse_date(date: &str) -> Option<NaiveDateTime> {
    let date = date.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(date) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
