//! HTML parser for extracting page text, anchors and contact emails
//!
//! The output of this module is everything the detector and the link
//! discoverer need from a fetched page.

use crate::detector::{email_from_mailto, extract_emails};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Elements whose text is never shown to a visitor
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// An anchor element found on a page
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    /// Resolved target, `None` when the href is not a followable http(s) link
    pub url: Option<Url>,

    /// Visible label of the anchor
    pub label: String,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text with whitespace collapsed
    pub text: String,

    /// Every `<a href>` in document order
    pub anchors: Vec<Anchor>,

    /// Addresses from the visible text and `mailto:` anchors
    pub emails: BTreeSet<String>,
}

impl ParsedPage {
    /// Labels of all anchors, for anchor-text scoring
    pub fn anchor_labels(&self) -> Vec<String> {
        self.anchors
            .iter()
            .filter(|a| !a.label.is_empty())
            .map(|a| a.label.clone())
            .collect()
    }

    /// Followable link targets in document order
    pub fn links(&self) -> impl Iterator<Item = &Url> {
        self.anchors.iter().filter_map(|a| a.url.as_ref())
    }
}

/// Parses HTML content into text, anchors and emails
///
/// # Link Rules
///
/// **Skipped (no followable URL):**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - Fragment-only hrefs
/// - Anything that is not http(s) after resolution
///
/// Skipped anchors still contribute their label to anchor-text scoring, and
/// `mailto:` anchors contribute their address to the email set.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Example
///
/// ```
/// use affiliate_scout::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/partners">Partner with us</a></body></html>"#;
/// let base_url = Url::parse("https://acme.io/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.anchors[0].label, "Partner with us");
/// assert_eq!(parsed.links().next().unwrap().as_str(), "https://acme.io/partners");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let text = visible_text(document.root_element());

    let mut emails = extract_emails(&text);
    let mut anchors = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            let href = element.value().attr("href").unwrap_or_default();

            if let Some(email) = email_from_mailto(href) {
                emails.insert(email);
            }

            let url = if element.value().attr("download").is_some() {
                None
            } else {
                resolve_link(href, base_url)
            };

            anchors.push(Anchor {
                url,
                label: anchor_label(element),
            });
        }
    }

    ParsedPage {
        title,
        text,
        anchors,
        emails,
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Collects the text of every node not nested in a hidden element
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();

    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    collapse(&parts.join(" "))
}

/// Visible text of an anchor, falling back to its `aria-label` or `title`
fn anchor_label(element: ElementRef<'_>) -> String {
    let label = collapse(&element.text().collect::<Vec<_>>().join(" "));
    if !label.is_empty() {
        return label;
    }

    ["aria-label", "title"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(collapse)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves an href against the page URL
///
/// Returns None for special schemes, fragment-only links, unparseable
/// values and non-http(s) results. The fragment of the result is dropped.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}
