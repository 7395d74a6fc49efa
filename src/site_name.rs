//! Derive a display name for the feed from the page title, site-name meta
//! tags or, failing those, the source host.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::text::{element_text, title_case};

static SEL_PAGE_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static SEL_SITE_NAME_META: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[property="og:site_name"], meta[property="twitter:title"], meta[name="og:site_name"], meta[name="twitter:title"]"#,
    )
    .unwrap()
});

static RE_TITLE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-|·•]|\s+[—–-]\s+|\b(?:Blog|Home|Website)\b").unwrap());
static RE_BLOG_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^blog\b\s*[-|·•:]?\s*").unwrap());

const GENERIC_NAMES: [&str; 3] = ["blog", "home", "website"];
const EDGE_SEPARATORS: [char; 6] = ['-', '|', '·', '•', ':', ' '];

/// Human-readable site name for `source`.
pub fn resolve(document: &Html, source: &Url) -> String {
    let from_title = page_title(document)
        .and_then(|title| name_from_title(&title, document))
        .map(|name| trim_separators(&name))
        .filter(|name| !name.is_empty() && !GENERIC_NAMES.contains(&name.to_lowercase().as_str()));

    match from_title {
        Some(name) => name,
        None => trim_separators(&host_label(source)),
    }
}

/// `"{display_name} Blog Feed"`
pub fn feed_title(display_name: &str) -> String {
    format!("{} Blog Feed", display_name)
}

pub fn feed_description(source_url: &str) -> String {
    format!("RSS feed generated from {}", source_url)
}

fn page_title(document: &Html) -> Option<String> {
    document
        .select(&SEL_PAGE_TITLE)
        .next()
        .map(|t| element_text(&t).trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Keep the first non-empty segment of the title; a leading "Blog" is
/// replaced by the site-name meta tag when the page has one.
fn name_from_title(title: &str, document: &Html) -> Option<String> {
    let segment = RE_TITLE_SPLIT
        .split(title)
        .map(str::trim)
        .find(|s| !s.is_empty())?;

    if segment.to_lowercase().starts_with("blog") {
        if let Some(meta) = site_name_meta(document) {
            return Some(meta);
        }
        return Some(RE_BLOG_PREFIX.replace(segment, "").into_owned());
    }
    Some(segment.to_string())
}

fn site_name_meta(document: &Html) -> Option<String> {
    document
        .select(&SEL_SITE_NAME_META)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// First label of the host without a leading `www.`, title-cased.
fn host_label(source: &Url) -> String {
    let host = source.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    title_case(host.split('.').next().unwrap_or_default())
}

fn trim_separators(s: &str) -> String {
    s.trim_matches(&EDGE_SEPARATORS[..]).trim().to_string()
}
