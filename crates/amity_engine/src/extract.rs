use amity_logging::amity_debug;
use amity_core::SiteConfig;
use chrono::{DateTime, Utc};
use ego_tree::NodeId;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::dates;
use crate::sanitize::{sanitize_html, strip_tags};

/// Class/id markers that usually wrap the main content of a page.
const BODY_MARKERS: &[&str] = &[
    "article", "blog", "body", "content", "entry", "hentry", "main", "page", "post", "text",
    "story",
];

const DATE_MARKERS: &[&str] = &["date"];

/// Extraction result before the orchestrator attaches the source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Plain text, markup removed, trimmed.
    pub title: String,
    /// Sanitized HTML.
    pub content: String,
    pub date: DateTime<Utc>,
}

/// Readability-style extractor: builds a permissive DOM, applies the
/// optional per-site overrides, and selects title/body/date.
#[derive(Debug, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn extract(&self, html: &str, config: Option<&SiteConfig>) -> ExtractedContent {
        let default_config = SiteConfig::default();
        let config = config.unwrap_or(&default_config);

        // Verbatim substitutions happen on the raw HTML, before any DOM
        // work, in file order.
        let mut source = html.to_string();
        for (search, replace) in &config.replace {
            source = source.replace(search, replace);
        }

        // scraper recovers from arbitrary broken markup; there is no error
        // path out of parsing.
        let mut doc = Html::parse_document(&source);

        for marker in &config.strip_id_or_class {
            strip_by_marker(&mut doc, marker);
        }
        for query in &config.strip {
            strip_by_query(&mut doc, query);
        }

        let title_query = config.title.as_deref().unwrap_or("h1");
        let mut title = select_inner_markup(&doc, title_query);
        if title.is_empty() {
            title = select_inner_markup(&doc, "title");
        }
        let title = strip_tags(&title);

        let body_default = marker_query(BODY_MARKERS);
        let body_query = config.body.as_deref().unwrap_or(&body_default);
        let mut content = select_inner_markup(&doc, body_query);
        if content.is_empty() {
            content = select_inner_markup(&doc, "body");
        }
        let content = sanitize_html(&content);

        let date_default = marker_query(DATE_MARKERS);
        let date_query = config.date.as_deref().unwrap_or(&date_default);
        let date_text = strip_tags(&select_inner_markup(&doc, date_query));
        let date = dates::parse_loose(&date_text).unwrap_or_else(Utc::now);

        ExtractedContent {
            title,
            content,
            date,
        }
    }
}

/// CSS query matching any element whose class or id contains one of the
/// markers as a substring.
fn marker_query(markers: &[&str]) -> String {
    let mut query = String::new();
    for marker in markers {
        if !query.is_empty() {
            query.push_str(", ");
        }
        query.push_str(&format!("[class*=\"{marker}\"], [id*=\"{marker}\"]"));
    }
    query
}

/// Detach every element whose class or id contains `marker` as a substring.
fn strip_by_marker(doc: &mut Html, marker: &str) {
    let ids: Vec<NodeId> = doc
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| {
            let value = el.value();
            value.attr("class").is_some_and(|class| class.contains(marker))
                || value.attr("id").is_some_and(|id| id.contains(marker))
        })
        .map(|el| el.id())
        .collect();
    detach_all(doc, ids);
}

/// Detach every match of a configured query expression. Unparseable
/// expressions are skipped, in keeping with the silent-degradation rule
/// for site configs.
fn strip_by_query(doc: &mut Html, query: &str) {
    let Ok(selector) = Selector::parse(query) else {
        amity_debug!("ignoring unparseable strip query {query:?}");
        return;
    };
    let ids: Vec<NodeId> = doc.select(&selector).map(|el| el.id()).collect();
    detach_all(doc, ids);
}

fn detach_all(doc: &mut Html, ids: Vec<NodeId>) {
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Select a query and serialize the matches' inner markup: every child of
/// every match, one wrapping-tag layer removed, newline separated, blank
/// runs collapsed.
fn select_inner_markup(doc: &Html, query: &str) -> String {
    let Ok(selector) = Selector::parse(query) else {
        amity_debug!("ignoring unparseable query {query:?}");
        return String::new();
    };
    let matches: Vec<ElementRef> = doc.select(&selector).collect();
    inner_markup(&matches)
}

fn inner_markup(matches: &[ElementRef]) -> String {
    let mut out = String::new();
    for element in matches {
        for child in element.children() {
            let piece = match child.value() {
                Node::Element(_) => {
                    let Some(el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    unwrap_one_layer(el)
                }
                Node::Text(text) => escape_text(&text.text),
                Node::Comment(comment) => format!("<!--{}-->", &comment.comment),
                _ => continue,
            };
            out.push_str(&piece);
            out.push('\n');
        }
    }
    collapse_blank_lines(&out)
}

/// A non-void element sheds exactly one wrapping tag; void elements keep
/// their serialized form since there is no inner content to expose.
/// Executable/metadata tags also keep theirs, so the sanitizer can still
/// recognize and drop them wholesale instead of seeing their raw text.
fn unwrap_one_layer(el: ElementRef) -> String {
    let outer = el.html();
    let name = el.value().name();
    if crate::sanitize::drops_content(name) {
        return outer;
    }
    let closing = format!("</{name}>");
    if outer.ends_with(&closing) {
        el.inner_html()
    } else {
        outer
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Collapse runs of blank lines down to a single blank line; trim the
/// surrounding whitespace.
fn collapse_blank_lines(input: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_blank_run = false;
    for line in input.trim().lines() {
        if line.trim().is_empty() {
            in_blank_run = true;
            continue;
        }
        if in_blank_run && !lines.is_empty() {
            lines.push("");
        }
        in_blank_run = false;
        lines.push(line);
    }
    lines.join("\n")
}
