use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

/// Tags that survive sanitization. Everything else is unwrapped (children
/// kept) or, for the executable/metadata tags below, dropped entirely.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "cite", "code", "dd", "del", "dl", "dt",
    "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins",
    "li", "ol", "p", "pre", "q", "s", "small", "span", "strong", "sub", "sup", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

const ALLOWED_ATTRS: &[&str] = &[
    "href", "src", "srcset", "alt", "title", "width", "height", "class", "id", "datetime",
    "cite", "colspan", "rowspan",
];

/// Dropped together with their contents.
const DROP_WITH_CONTENT: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "object", "embed", "head",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// True for tags the sanitizer removes together with their contents.
pub(crate) fn drops_content(tag: &str) -> bool {
    DROP_WITH_CONTENT.contains(&tag)
}

/// Reduce arbitrary HTML to the allow-listed subset used for stored
/// bookmark content. Unknown tags are unwrapped so their text survives.
pub fn sanitize_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        write_node(child, &mut out);
    }
    out.trim().to_string()
}

/// Reduce HTML to its concatenated text, skipping executable/metadata tags.
pub fn strip_tags(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        write_text(child, &mut out);
    }
    out.trim().to_string()
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&escape_text(&text.text)),
        Node::Element(element) => {
            let name = element.name();
            if DROP_WITH_CONTENT.contains(&name) {
                return;
            }
            if !ALLOWED_TAGS.contains(&name) {
                // Unwrap: keep the children, lose the tag.
                for child in node.children() {
                    write_node(child, out);
                }
                return;
            }

            out.push('<');
            out.push_str(name);
            for (attr_name, attr_value) in element.attrs() {
                if !ALLOWED_ATTRS.contains(&attr_name) {
                    continue;
                }
                if matches!(attr_name, "href" | "src" | "cite") && !safe_url(attr_value) {
                    continue;
                }
                out.push(' ');
                out.push_str(attr_name);
                out.push_str("=\"");
                out.push_str(&escape_attr(attr_value));
                out.push('"');
            }
            out.push('>');

            if VOID_TAGS.contains(&name) {
                return;
            }
            for child in node.children() {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        _ => {}
    }
}

fn write_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&text.text),
        Node::Element(element) => {
            if DROP_WITH_CONTENT.contains(&element.name()) {
                return;
            }
            for child in node.children() {
                write_text(child, out);
            }
        }
        _ => {}
    }
}

fn safe_url(value: &str) -> bool {
    let trimmed = value.trim();
    let lowered = trimmed.to_ascii_lowercase();
    !(lowered.starts_with("javascript:")
        || lowered.starts_with("vbscript:")
        || lowered.starts_with("data:"))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
