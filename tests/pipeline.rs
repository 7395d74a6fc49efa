//! End-to-end runs against canned pages, persisting into temporary
//! directories.

use std::fs;

use blog2rss::config::{Config, Source};
use blog2rss::fetch::Fetch;
use blog2rss::run::{run_at, Outcome, Report};
use blog2rss::store::{EntryStore, FeedState};
use blog2rss::{Error, FetchError};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use url::Url;

const SOURCE: &str = "https://www.acme.test/blog";

/// Serves a fixed page, or fails like a server returning 503.
struct StubFetcher {
    page: Option<String>,
}

impl StubFetcher {
    fn serving(html: &str) -> Self {
        Self { page: Some(html.to_string()) }
    }

    fn failing() -> Self {
        Self { page: None }
    }
}

impl Fetch for StubFetcher {
    fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.page.clone().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        })
    }
}

fn setup() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(
        Source::parse(SOURCE).unwrap(),
        dir.path().join("data"),
        dir.path().join("feeds"),
    );
    (dir, config)
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap()
}

fn article(slug: &str, title: &str) -> String {
    format!(
        r#"<article>
             <h2 class="entry-title"><a href="/{slug}">{title}</a></h2>
             <p class="excerpt">About {title}</p>
           </article>"#
    )
}

fn page(articles: &[(&str, &str)]) -> String {
    let body: String = articles.iter().map(|(slug, title)| article(slug, title)).collect();
    format!(
        r#"<html><head><title>Blog - Acme Corp</title></head>
           <body><nav><a href="/about">About us</a></nav><main>{body}</main></body></html>"#
    )
}

fn published(outcome: Outcome) -> Report {
    match outcome {
        Outcome::Published(report) => report,
        Outcome::NoArticles => panic!("expected a published feed"),
    }
}

fn stored(config: &Config) -> FeedState {
    EntryStore::new(config.store_path()).load()
}

const FIRST_THREE: [(&str, &str); 3] = [
    ("first-post", "First post"),
    ("second-post", "Second post"),
    ("third-post", "Third post"),
];

#[test]
fn first_run_creates_store_and_feed() {
    let (_dir, config) = setup();
    let report = published(run_at(&config, &StubFetcher::serving(&page(&FIRST_THREE)), at(8)).unwrap());

    assert_eq!(report.extracted, 3);
    assert_eq!(report.newly_added, 3);
    assert_eq!(report.total, 3);
    assert_eq!(report.document.matches("<item>").count(), 3);
    assert!(report.document.contains("<title>Acme Corp Blog Feed</title>"));
    assert!(report.document.contains("<link>https://www.acme.test/blog/first-post</link>"));

    assert!(config.store_path().ends_with("data/acme.json"));
    assert_eq!(fs::read_to_string(config.feed_path()).unwrap(), report.document);

    let state = stored(&config);
    assert_eq!(state.len(), 3);
    assert_eq!(state.feed_title, "Acme Corp Blog Feed");
    assert_eq!(state.feed_description, "RSS feed generated from https://www.acme.test/blog");
}

#[test]
fn second_run_adds_only_new_articles() {
    let (_dir, config) = setup();
    published(run_at(&config, &StubFetcher::serving(&page(&FIRST_THREE)), at(8)).unwrap());
    let before = stored(&config);

    // The page now leads with a new post; the old entries were edited upstream.
    let updated = page(&[
        ("fourth-post", "Fourth post"),
        ("first-post", "First post (edited)"),
        ("second-post", "Second post"),
        ("third-post", "Third post"),
    ]);
    let report = published(run_at(&config, &StubFetcher::serving(&updated), at(9)).unwrap());

    assert_eq!(report.newly_added, 1);
    assert_eq!(report.total, 4);
    assert_eq!(report.document.matches("<item>").count(), 4);
    assert!(!report.document.contains("(edited)"));

    let after = stored(&config);
    assert_eq!(after.len(), 4);
    assert_eq!(after.feed_title, before.feed_title);
    assert_eq!(after.feed_description, before.feed_description);
    for (link, entry) in &before.entries {
        assert_eq!(&after.entries[link], entry);
    }

    // Newest entry renders first.
    let first_item = report.document.find("<item>").unwrap();
    let fourth = report.document.find("fourth-post").unwrap();
    let first = report.document.find("/first-post").unwrap();
    assert!(first_item < fourth && fourth < first);
}

#[test]
fn repeated_run_is_idempotent() {
    let (_dir, config) = setup();
    let html = page(&FIRST_THREE);
    published(run_at(&config, &StubFetcher::serving(&html), at(8)).unwrap());
    let first_state = stored(&config);

    let report = published(run_at(&config, &StubFetcher::serving(&html), at(10)).unwrap());

    assert_eq!(report.newly_added, 0);
    assert_eq!(stored(&config), first_state);
}

#[test]
fn entries_survive_articles_leaving_the_page() {
    let (_dir, config) = setup();
    published(run_at(&config, &StubFetcher::serving(&page(&FIRST_THREE)), at(8)).unwrap());

    let report = published(
        run_at(&config, &StubFetcher::serving(&page(&[("fifth-post", "Fifth post")])), at(9)).unwrap(),
    );

    assert_eq!(report.total, 4);
    assert_eq!(stored(&config).len(), 4);
}

#[test]
fn page_without_articles_writes_nothing() {
    let (_dir, config) = setup();
    let html = "<html><head><title>Acme</title></head><body><p>Coming soon</p></body></html>";

    let outcome = run_at(&config, &StubFetcher::serving(html), at(8)).unwrap();

    assert!(matches!(outcome, Outcome::NoArticles));
    assert!(!config.store_path().exists());
    assert!(!config.feed_path().exists());
}

#[test]
fn fetch_failure_aborts_without_writing() {
    let (_dir, config) = setup();
    published(run_at(&config, &StubFetcher::serving(&page(&FIRST_THREE)), at(8)).unwrap());
    let store_before = fs::read_to_string(config.store_path()).unwrap();
    let feed_before = fs::read_to_string(config.feed_path()).unwrap();

    let err = run_at(&config, &StubFetcher::failing(), at(9)).unwrap_err();

    assert!(matches!(err, Error::Fetch(FetchError::Status { .. })));
    assert_eq!(fs::read_to_string(config.store_path()).unwrap(), store_before);
    assert_eq!(fs::read_to_string(config.feed_path()).unwrap(), feed_before);
}

#[test]
fn corrupt_store_is_rebuilt() {
    let (_dir, config) = setup();
    fs::create_dir_all(config.store_path().parent().unwrap()).unwrap();
    fs::write(config.store_path(), "{\"entries\": [1, 2").unwrap();

    let report = published(run_at(&config, &StubFetcher::serving(&page(&FIRST_THREE)), at(8)).unwrap());

    assert_eq!(report.total, 3);
    let state = stored(&config);
    assert_eq!(state.len(), 3);
    assert_eq!(state.feed_title, "Acme Corp Blog Feed");
}

#[test]
fn tag_links_never_reach_the_feed() {
    let (_dir, config) = setup();
    let html = page(&[("tag/foo", "Everything tagged foo"), ("real-post", "A real post")]);

    let report = published(run_at(&config, &StubFetcher::serving(&html), at(8)).unwrap());

    assert_eq!(report.total, 1);
    assert!(!report.document.contains("/tag/foo"));
}
