//! HTML conversion into the supported output formats.
//!
//! [`Format::Html`] returns the input untouched, [`Format::Markdown`] renders
//! through `html2md`, and [`Format::Json`] / [`Format::Yaml`] serialise a
//! [`Document`] extracted from the page.

use std::fmt;
use std::str::FromStr;

use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;
use crate::html::{collapse_whitespace, first_text, selector};
use crate::{Error, Result};

/// Output format for fetched or converted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Raw HTML.
    Html,
    /// Markdown.
    #[default]
    Markdown,
    /// Pretty-printed JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl Format {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Markdown => "markdown",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(Format::Html),
            "markdown" | "md" => Ok(Format::Markdown),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(Error::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured view of a page used by the JSON and YAML formats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// `<title>` text, else the first `<h1>`.
    pub title: Option<String>,
    /// Visible text, one block per line.
    pub content: String,
    /// `href` values of all anchors, in document order.
    pub links: Vec<String>,
    /// `src` values of all images, in document order.
    pub images: Vec<String>,
}

/// Elements whose text never reaches the document content.
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Elements rendered on their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

impl Document {
    /// Extracts a document from HTML. Malformed markup is tolerated.
    pub fn parse(html: &str) -> Self {
        let page = Html::parse_document(html);
        let root = page.root_element();

        let title = selector("title")
            .ok()
            .and_then(|s| first_text(&root, &s))
            .or_else(|| selector("h1").ok().and_then(|s| first_text(&root, &s)));

        let mut raw = String::new();
        collect_text(root, &mut raw);
        let content = raw
            .lines()
            .map(collapse_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            title,
            content,
            links: attribute_values(&page, "a[href]", "href"),
            images: attribute_values(&page, "img[src]", "src"),
        }
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

fn attribute_values(page: &Html, css: &str, attr: &str) -> Vec<String> {
    let Ok(sel) = selector(css) else {
        return Vec::new();
    };
    page.select(&sel)
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Converts HTML into a [`Format`]. Stateless apart from its default format,
/// so a single instance can be shared across tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Converter {
    default_format: Format,
}

impl Converter {
    /// Creates a converter whose default format is markdown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a converter with the given default format.
    pub fn with_format(format: Format) -> Self {
        Self {
            default_format: format,
        }
    }

    /// Creates a converter using `fetcher.format` as the default. An
    /// unrecognised value falls back to markdown.
    pub fn from_config(config: &Config) -> Self {
        let format = config.fetcher.output_format().unwrap_or_else(|e| {
            warn!("{}; falling back to markdown", e);
            Format::Markdown
        });
        Self::with_format(format)
    }

    /// Returns the default format.
    pub fn default_format(&self) -> Format {
        self.default_format
    }

    /// Converts `html` into `format`.
    pub fn convert(&self, html: &str, format: Format) -> Result<String> {
        match format {
            Format::Html => Ok(html.to_string()),
            Format::Markdown => Ok(to_markdown(html)),
            Format::Json => Ok(serde_json::to_string_pretty(&Document::parse(html))?),
            Format::Yaml => Ok(serde_yaml::to_string(&Document::parse(html))?),
        }
    }

    /// Converts `html` into the format named by `format`.
    pub fn convert_str(&self, html: &str, format: &str) -> Result<String> {
        self.convert(html, format.parse()?)
    }

    /// Converts `html` into the default format.
    pub fn convert_default(&self, html: &str) -> Result<String> {
        self.convert(html, self.default_format)
    }
}

/// Characters html2md backslash-escapes in text runs.
const MARKDOWN_ESCAPED: &[char] = &['_', '*', '<', '>'];

fn to_markdown(html: &str) -> String {
    let rendered = unescape_text(&html2md::parse_html(html));
    let mut out = String::with_capacity(rendered.len());
    let mut blank_run = 0;
    for line in rendered.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Drops the backslashes html2md puts before `_`, `*`, `<` and `>` so page
/// text such as identifiers comes through verbatim.
fn unescape_text(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut chars = markdown.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some_and(|next| MARKDOWN_ESCAPED.contains(next)) {
            continue;
        }
        out.push(c);
    }
    out
}
