//! Heuristic extraction of article records from a blog index page.
//!
//! Page templates are unknown, so every lookup is a cascade of [`Probe`]s
//! tried in priority order: the first probe that matches anything wins and
//! later probes are never consulted.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::text::{class_contains_any, element_text, normalize_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: String,
    pub description: String,
    /// Absolute link, the identity of the article within one source.
    pub link: String,
    pub published: DateTime<Utc>,
    pub author: Option<String>,
}

/// A CSS selector, optionally narrowed to elements whose class attribute
/// contains one of `class_keywords`.
pub struct Probe {
    selector: &'static Lazy<Selector>,
    class_keywords: &'static [&'static str],
}

impl Probe {
    fn accepts(&self, el: &ElementRef) -> bool {
        self.class_keywords.is_empty() || class_contains_any(el, self.class_keywords)
    }

    /// Matching descendants of `scope` in document order.
    fn find_all<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        scope.select(self.selector).filter(|el| self.accepts(el)).collect()
    }

    fn find_first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        scope.select(self.selector).find(|el| self.accepts(el))
    }
}

/// First element found by the highest-priority probe that finds anything.
fn first_match<'a>(scope: ElementRef<'a>, probes: &[Probe]) -> Option<ElementRef<'a>> {
    probes.iter().find_map(|probe| probe.find_first(scope))
}

struct Strategy {
    name: &'static str,
    probe: Probe,
}

static SEL_BLOG_GRID: Lazy<Selector> = Lazy::new(|| Selector::parse(".blog-basic-grid--container").unwrap());
static SEL_ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static SEL_CLASSED_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[class]").unwrap());
static SEL_CLASSED_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div[class], section[class]").unwrap());

static SEL_BLOG_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".blog-title").unwrap());
static SEL_HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2").unwrap());
static SEL_SEMIBOLD: Lazy<Selector> = Lazy::new(|| Selector::parse(".font-semibold").unwrap());

static SEL_BLOG_EXCERPT: Lazy<Selector> = Lazy::new(|| Selector::parse(".blog-excerpt").unwrap());
static SEL_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static SEL_UTILITY_PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p.mt-4").unwrap());

static SEL_BLOG_AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse(".blog-author").unwrap());
static SEL_INLINE_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("span, div").unwrap());
static SEL_REL_AUTHOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[rel~="author"], span[rel~="author"], div[rel~="author"]"#).unwrap()
});

static SEL_ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SEL_ANCHOR_WITH_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

static RE_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());

static CANDIDATE_STRATEGIES: [Strategy; 4] = [
    Strategy {
        name: "blog grid container",
        probe: Probe { selector: &SEL_BLOG_GRID, class_keywords: &[] },
    },
    Strategy {
        name: "article element",
        probe: Probe { selector: &SEL_ARTICLE, class_keywords: &[] },
    },
    Strategy {
        name: "grouped anchor",
        probe: Probe { selector: &SEL_CLASSED_ANCHOR, class_keywords: &["group"] },
    },
    Strategy {
        name: "post-like block",
        probe: Probe {
            selector: &SEL_CLASSED_BLOCK,
            class_keywords: &["blog-post", "post", "article", "entry"],
        },
    },
];

static TITLE_PROBES: [Probe; 4] = [
    Probe { selector: &SEL_BLOG_TITLE, class_keywords: &[] },
    Probe { selector: &SEL_HEADING, class_keywords: &["title"] },
    Probe { selector: &SEL_HEADING, class_keywords: &[] },
    Probe { selector: &SEL_SEMIBOLD, class_keywords: &[] },
];

static DESCRIPTION_PROBES: [Probe; 4] = [
    Probe { selector: &SEL_BLOG_EXCERPT, class_keywords: &[] },
    Probe { selector: &SEL_PARAGRAPH, class_keywords: &["excerpt", "summary", "description"] },
    Probe { selector: &SEL_UTILITY_PARAGRAPH, class_keywords: &[] },
    Probe { selector: &SEL_PARAGRAPH, class_keywords: &[] },
];

static AUTHOR_PROBES: [Probe; 3] = [
    Probe { selector: &SEL_BLOG_AUTHOR, class_keywords: &[] },
    Probe { selector: &SEL_INLINE_BLOCK, class_keywords: &["author"] },
    Probe { selector: &SEL_REL_AUTHOR, class_keywords: &[] },
];

const SKIPPED_LINK_PATHS: [&str; 3] = ["/category/", "/tag/", "/page/"];
const SKIPPED_LINK_TEXT: [&str; 2] = ["category", "read more"];
const NAVIGATION_CONTAINERS: [&str; 3] = ["nav", "header", "footer"];

/// Extract articles, stamping every record with the current time.
pub fn extract(document: &Html, source_url: &str) -> Vec<ArticleRecord> {
    extract_at(document, source_url, Utc::now())
}

/// Extract articles in document order. `published` is applied to every
/// record: index pages carry no reliable per-article date.
pub fn extract_at(document: &Html, source_url: &str, published: DateTime<Utc>) -> Vec<ArticleRecord> {
    let candidates = select_candidates(document);
    let mut seen_links: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    for element in candidates {
        if inside_navigation(&element) {
            debug!("skipping candidate inside navigation");
            continue;
        }

        let Some(link) = resolve_candidate_link(element, source_url) else {
            continue;
        };
        if !seen_links.insert(link.clone()) {
            debug!(%link, "skipping duplicate link");
            continue;
        }

        let Some(raw_title) = extract_title(element) else {
            debug!(%link, "skipping candidate without title");
            continue;
        };
        if raw_title.chars().count() <= 3 {
            debug!(%link, title = %raw_title, "skipping candidate with short title");
            continue;
        }
        let title = normalize_text(&raw_title);

        let description = extract_description(element).unwrap_or_else(|| title.clone());
        let author = extract_author(element);

        items.push(ArticleRecord { title, description, link, published, author });
    }

    items
}

/// Run the candidate strategies in priority order; the first one that
/// matches at least one element supplies the whole candidate list.
fn select_candidates(document: &Html) -> Vec<ElementRef<'_>> {
    let root = document.root_element();
    for strategy in &CANDIDATE_STRATEGIES {
        let found = strategy.probe.find_all(root);
        if !found.is_empty() {
            debug!(strategy = strategy.name, count = found.len(), "candidate strategy matched");
            return found;
        }
    }
    debug!("no candidate strategy matched");
    Vec::new()
}

fn inside_navigation(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| NAVIGATION_CONTAINERS.contains(&a.value().name()))
}

/// The candidate itself when it is a link, else its first descendant link.
fn link_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if el.value().name() == "a" {
        return el.value().attr("href").is_some().then_some(el);
    }
    el.select(&SEL_ANCHOR_WITH_HREF).next()
}

fn resolve_candidate_link(el: ElementRef, source_url: &str) -> Option<String> {
    let anchor = link_element(el)?;
    let href = anchor.value().attr("href")?.trim();

    let href_lower = href.to_lowercase();
    if SKIPPED_LINK_PATHS.iter().any(|p| href_lower.contains(p)) {
        debug!(href, "skipping taxonomy or pagination link");
        return None;
    }
    let text_lower = element_text(&anchor).to_lowercase();
    if SKIPPED_LINK_TEXT.iter().any(|t| text_lower.contains(t)) {
        debug!(href, "skipping category or read-more link");
        return None;
    }

    Some(resolve_link(source_url, href))
}

/// Absolute targets pass through; anything else is appended to the source
/// URL with exactly one slash between them.
pub fn resolve_link(source_url: &str, href: &str) -> String {
    if RE_SCHEME.is_match(href) {
        return href.to_string();
    }
    format!("{}/{}", source_url.trim_end_matches('/'), href.trim_start_matches('/'))
}

fn extract_title(el: ElementRef) -> Option<String> {
    let found = first_match(el, &TITLE_PROBES)?;
    let source = found.select(&SEL_ANCHOR).next().unwrap_or(found);
    let title = element_text(&source).trim().to_string();
    (!title.is_empty()).then_some(title)
}

fn extract_description(el: ElementRef) -> Option<String> {
    let found = first_match(el, &DESCRIPTION_PROBES)?;
    let paragraphs: Vec<String> = found
        .select(&SEL_PARAGRAPH)
        .map(|p| element_text(&p).trim().to_string())
        .collect();
    let text = if paragraphs.is_empty() {
        element_text(&found)
    } else {
        paragraphs.join(" ")
    };
    let text = normalize_text(&text);
    (!text.is_empty()).then_some(text)
}

fn extract_author(el: ElementRef) -> Option<String> {
    let found = first_match(el, &AUTHOR_PROBES)?;
    let author = normalize_text(&element_text(&found));
    (!author.is_empty()).then_some(author)
}
