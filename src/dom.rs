//! DOM text helpers and URL normalization shared by the listing and detail extractors.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

static BACKGROUND_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+)["']?\s*\)"#).expect("background-image pattern is valid")
});

fn is_hidden_container(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template")
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "dd"
            | "div"
            | "dl"
            | "dt"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "li"
            | "main"
            | "nav"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "table"
            | "td"
            | "th"
            | "tr"
            | "ul"
    )
}

/// Rendered lines of `element`, split the way a browser's `innerText` is.
///
/// Inline markup (`<b>`, `<span>`, `<a>`) stays on the current line; block
/// elements and `<br>` start a new one. Whitespace inside a line collapses
/// to single spaces and blank lines are dropped. Text inside `script`,
/// `style`, `noscript` and `template` is skipped.
pub fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    collect_lines(element, &mut lines, &mut current);
    flush_line(&mut lines, &mut current);
    lines
}

fn collect_lines(element: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if is_hidden_container(name) {
                continue;
            }
            if name == "br" {
                flush_line(lines, current);
            } else if is_block(name) {
                flush_line(lines, current);
                collect_lines(child_element, lines, current);
                flush_line(lines, current);
            } else {
                collect_lines(child_element, lines, current);
            }
        } else if let Some(text) = child.value().as_text() {
            current.push_str(text);
        }
    }
}

fn flush_line(lines: &mut Vec<String>, current: &mut String) {
    let line = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

/// Visible text of `element` on one line, its rendered lines joined by single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    text_lines(element).join(" ")
}

/// Text of the first element, by selector priority, whose text is non-empty.
pub fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        scope
            .select(selector)
            .map(visible_text)
            .find(|text| !text.is_empty())
    })
}

/// Resolve protocol-relative (`//host/..`) and root-relative (`/path`) URLs.
///
/// Anything else, including URLs that are already absolute, is returned
/// unchanged, so normalizing twice is the same as normalizing once.
pub fn normalize_url(raw: &str, origin: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{rest}")
    } else if raw.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), raw)
    } else {
        raw.to_string()
    }
}

/// Normalize `raw` and accept it only if it ends up as an http(s) URL.
///
/// Page-relative paths (`event/123`) are joined against `origin`.
pub fn absolute_url(raw: &str, origin: &str) -> Option<String> {
    let normalized = normalize_url(raw, origin);
    if normalized.is_empty() {
        return None;
    }
    if normalized.starts_with("http://") || normalized.starts_with("https://") {
        return Some(normalized);
    }
    if normalized.contains(':') {
        // data:, javascript:, mailto: and friends
        return None;
    }
    let base = Url::parse(origin).ok()?;
    base.join(&normalized).ok().map(String::from)
}

/// URL inside an inline `background-image: url(...)` declaration.
pub fn background_image_url(style: &str) -> Option<String> {
    BACKGROUND_IMAGE
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// URL of the first candidate in a `srcset` attribute.
pub fn first_srcset_url(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .next()
        .and_then(|entry| entry.split_whitespace().next())
        .map(ToString::to_string)
}

/// Keep the first `budget` characters and mark the cut with `...`.
pub fn truncate_with_ellipsis(text: &str, budget: usize) -> String {
    let head: String = text.chars().take(budget).collect();
    format!("{head}...")
}
