//! Link discovery: which internal pages of a target are worth visiting
//!
//! Links come from the fetched page's anchors and, optionally, the site's
//! sitemap. Only same-site links survive; links mentioning a priority term
//! ("affiliate", "partner", "contact") are visited first.

use super::parser::ParsedPage;
use crate::url::{canonicalize_link, is_same_site};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Path suffixes that never lead to an HTML page
const ASSET_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".mp4", ".mp3", ".css",
    ".js", ".xml", ".dmg", ".exe",
];

/// Ranks the same-site links of a page
///
/// # Arguments
///
/// * `page` - The parsed page the links come from
/// * `base_url` - Final URL of that page
/// * `sitemap_urls` - URLs listed in the site's sitemap, possibly empty
/// * `priority_terms` - Lowercase terms that move a link to the front
/// * `budget` - Maximum number of links to return
///
/// # Returns
///
/// Links as written on the page, minus their fragment: priority links first,
/// then everything else, each tier in first-seen order. Links are compared by
/// their canonical form, so the first spelling of a page wins.
pub fn discover(
    page: &ParsedPage,
    base_url: &Url,
    sitemap_urls: &[Url],
    priority_terms: &[String],
    budget: usize,
) -> Vec<Url> {
    if budget == 0 {
        return Vec::new();
    }

    let base = canonicalize_link(base_url);
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(base.to_string());

    let mut priority = Vec::new();
    let mut regular = Vec::new();

    for link in page.links().chain(sitemap_urls.iter()) {
        if !is_same_site(base_url, link) || is_asset(link) {
            continue;
        }

        if !seen.insert(canonicalize_link(link).to_string()) {
            continue;
        }

        let mut target = link.clone();
        target.set_fragment(None);
        if is_priority(&target, priority_terms) {
            priority.push(target);
        } else {
            regular.push(target);
        }
    }

    priority.extend(regular);
    priority.truncate(budget);
    priority
}

fn is_priority(url: &Url, terms: &[String]) -> bool {
    let lower = url.as_str().to_lowercase();
    terms.iter().any(|term| lower.contains(term.as_str()))
}

fn is_asset(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Extracts `<loc>` entries from a sitemap document
///
/// Entries that are not absolute http(s) URLs are dropped. Sitemap index
/// files are not followed.
pub fn parse_sitemap(xml: &str) -> Vec<Url> {
    let document = Html::parse_document(xml);
    let Ok(selector) = Selector::parse("loc") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let text = element.text().collect::<String>();
            Url::parse(text.trim()).ok()
        })
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .collect()
}
