//! Allow-list policy for raw markup embedded in replies
//!
//! Raw markup is parsed, not escaped, and only structural elements survive.
//! Script-capable and interactive elements are dropped with their content;
//! unknown elements are unwrapped so their text still shows. Every attribute
//! is stripped except `href` on links, and that only for safe schemes.

use super::node::MarkupNode;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::OnceLock;

/// Structural elements kept as nodes
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "cite", "code", "dd", "del", "details",
    "div", "dl", "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "s", "samp", "small", "span",
    "strong", "sub", "summary", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u",
    "ul", "var",
];

/// Elements removed together with everything inside them
const DROPPED_TAGS: &[&str] = &[
    "applet", "audio", "base", "button", "canvas", "embed", "frame", "frameset", "head",
    "iframe", "img", "input", "link", "math", "meta", "noscript", "object", "option", "param",
    "picture", "portal", "script", "select", "source", "style", "svg", "template", "textarea",
    "title", "track", "video",
];

/// Elements that never have content
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta", "source", "track"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// What to do with an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Policy {
    Allow(&'static str),
    Drop,
    Unwrap,
}

pub(super) fn policy(tag: &str) -> Policy {
    let tag = tag.to_ascii_lowercase();
    if let Some(allowed) = ALLOWED_TAGS.iter().find(|t| **t == tag) {
        Policy::Allow(allowed)
    } else if DROPPED_TAGS.contains(&tag.as_str()) {
        Policy::Drop
    } else {
        Policy::Unwrap
    }
}

pub(super) fn is_void(tag: &str) -> bool {
    VOID_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Vet a link target. Relative targets pass; absolute ones need a safe scheme.
pub fn sanitize_href(raw: &str) -> Option<String> {
    // Browsers ignore control characters and whitespace inside a scheme,
    // so `java\nscript:` must be judged as `javascript:`
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_ascii_control() && !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }

    let scheme_end = compact.find(':');
    let path_start = compact.find(['/', '?', '#']);
    let has_scheme = match (scheme_end, path_start) {
        (Some(colon), Some(path)) => colon < path,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if has_scheme {
        let scheme = compact.split(':').next().unwrap_or_default().to_ascii_lowercase();
        if !SAFE_SCHEMES.contains(&scheme.as_str()) {
            return None;
        }
    }
    Some(raw.trim().to_string())
}

// ============================================================================
// Inline tag tokens
// ============================================================================

/// A single raw inline tag as delivered by the markdown parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum TagToken {
    Open {
        name: String,
        href: Option<String>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    /// Comments, doctypes, processing instructions
    Ignored,
}

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^<([A-Za-z][A-Za-z0-9-]*)").expect("valid open tag regex"))
}

fn close_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^</([A-Za-z][A-Za-z0-9-]*)\s*>").expect("valid close tag regex"))
}

pub(super) fn parse_tag(raw: &str) -> TagToken {
    let raw = raw.trim();
    if let Some(caps) = close_tag_re().captures(raw) {
        return TagToken::Close {
            name: caps[1].to_ascii_lowercase(),
        };
    }
    let Some(caps) = open_tag_re().captures(raw) else {
        return TagToken::Ignored;
    };
    let name = caps[1].to_ascii_lowercase();
    let href = if name == "a" { parse_href(raw) } else { None };
    TagToken::Open {
        self_closing: raw.ends_with("/>") || is_void(&name),
        name,
        href,
    }
}

/// Pull the `href` out of a lone opening `<a ...>` tag
fn parse_href(raw: &str) -> Option<String> {
    let fragment = Html::parse_fragment(raw);
    let root = fragment.root_element();
    root.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|el| el.value().attr("href").map(str::to_string))
        .and_then(|href| sanitize_href(&href))
}

// ============================================================================
// Raw markup blocks
// ============================================================================

/// Parse a raw markup block into allow-listed nodes
pub(super) fn sanitize_fragment(html: &str) -> Vec<MarkupNode> {
    let fragment = Html::parse_fragment(html);
    let mut out = Vec::new();
    convert_children(fragment.root_element(), &mut out);
    out
}

fn convert_children(element: ElementRef<'_>, out: &mut Vec<MarkupNode>) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            let el = child_el.value();
            match policy(el.name()) {
                Policy::Drop => {}
                Policy::Unwrap => convert_children(child_el, out),
                Policy::Allow("a") => {
                    let mut children = Vec::new();
                    convert_children(child_el, &mut children);
                    out.push(MarkupNode::Link {
                        href: el.attr("href").and_then(sanitize_href),
                        children,
                    });
                }
                Policy::Allow(tag) => {
                    let mut children = Vec::new();
                    convert_children(child_el, &mut children);
                    out.push(MarkupNode::Element { tag, children });
                }
            }
        } else if let Node::Text(text) = child.value() {
            push_text(out, &text.text);
        }
    }
}

fn push_text(out: &mut Vec<MarkupNode>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(MarkupNode::Text { text: last }) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(MarkupNode::Text {
            text: text.to_string(),
        });
    }
}
