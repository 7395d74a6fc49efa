//! Per-source accumulation of every article ever seen, persisted as JSON.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::extract::ArticleRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedState {
    #[serde(default)]
    pub feed_title: String,
    #[serde(default)]
    pub feed_description: String,
    /// Keyed by article link.
    #[serde(default)]
    pub entries: BTreeMap<String, StoredEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub title: String,
    pub description: String,
    /// RFC 3339 timestamp of first discovery.
    pub pub_date: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// Feed-level metadata, computed once per source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHeader {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub state: FeedState,
    pub newly_added: Vec<ArticleRecord>,
}

impl FeedState {
    /// No feed metadata has been recorded yet.
    pub fn is_fresh(&self) -> bool {
        self.feed_title.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entries as records, newest first and by link within the same
    /// timestamp.
    pub fn articles(&self) -> Vec<ArticleRecord> {
        let mut articles: Vec<ArticleRecord> = self
            .entries
            .iter()
            .map(|(link, entry)| ArticleRecord {
                title: entry.title.clone(),
                description: entry.description.clone(),
                link: link.clone(),
                published: parse_stored_date(link, &entry.pub_date),
                author: entry.author.clone(),
            })
            .collect();
        articles.sort_by(|a, b| b.published.cmp(&a.published).then_with(|| a.link.cmp(&b.link)));
        articles
    }
}

impl From<&ArticleRecord> for StoredEntry {
    fn from(article: &ArticleRecord) -> Self {
        StoredEntry {
            title: article.title.clone(),
            description: article.description.clone(),
            pub_date: article.published.to_rfc3339(),
            author: article.author.clone(),
        }
    }
}

fn parse_stored_date(link: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            warn!(link, pub_date = raw, "unparsable stored date, using epoch: {}", e);
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

/// Fold freshly extracted records into `existing`. Links already stored are
/// left untouched; `header` is only evaluated for a fresh state.
pub fn merge(
    existing: &FeedState,
    fresh: &[ArticleRecord],
    header: impl FnOnce() -> FeedHeader,
) -> MergeOutcome {
    let mut state = existing.clone();
    if state.is_fresh() {
        let header = header();
        state.feed_title = header.title;
        state.feed_description = header.description;
    }

    let mut newly_added = Vec::new();
    for article in fresh {
        if state.entries.contains_key(&article.link) {
            continue;
        }
        state.entries.insert(article.link.clone(), StoredEntry::from(article));
        newly_added.push(article.clone());
    }

    MergeOutcome { state, newly_added }
}

/// JSON file holding the [`FeedState`] of one source.
#[derive(Debug, Clone)]
pub struct EntryStore {
    path: PathBuf,
}

impl EntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state. A missing file is a fresh state; so is a
    /// file that cannot be read or decoded.
    pub fn load(&self) -> FeedState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored state, starting fresh");
                return FeedState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "stored state unreadable, starting fresh: {}", e);
                return FeedState::default();
            }
        };

        match serde_json::from_str::<FeedState>(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), "stored state corrupt, starting fresh: {}", e);
                FeedState::default()
            }
        }
    }

    pub fn encode(state: &FeedState) -> Result<String> {
        serde_json::to_string_pretty(state).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(link: &str, title: &str, hour: u32) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            description: format!("{} description", title),
            link: link.to_string(),
            published: Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap(),
            author: None,
        }
    }

    fn header() -> FeedHeader {
        FeedHeader {
            title: "Acme Blog Feed".to_string(),
            description: "RSS feed generated from https://acme.test/blog".to_string(),
        }
    }

    #[test]
    fn first_merge_sets_header_and_entries() {
        let fresh = vec![record("https://a/1", "One", 1), record("https://a/2", "Two", 1)];
        let out = merge(&FeedState::default(), &fresh, header);

        assert_eq!(out.state.feed_title, "Acme Blog Feed");
        assert_eq!(out.state.len(), 2);
        assert_eq!(out.newly_added, fresh);
    }

    #[test]
    fn merging_the_same_records_twice_adds_nothing() {
        let fresh = vec![record("https://a/1", "One", 1), record("https://a/2", "Two", 1)];
        let first = merge(&FeedState::default(), &fresh, header);
        let second = merge(&first.state, &fresh, || panic!("header recomputed"));

        assert!(second.newly_added.is_empty());
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn existing_entries_are_never_overwritten() {
        let first = merge(&FeedState::default(), &[record("https://a/1", "Original", 1)], header);
        let changed = record("https://a/1", "Edited title", 5);
        let second = merge(&first.state, &[changed, record("https://a/2", "New", 5)], header);

        assert_eq!(second.newly_added.len(), 1);
        assert_eq!(second.newly_added[0].link, "https://a/2");
        assert_eq!(second.state.entries["https://a/1"], first.state.entries["https://a/1"]);
        assert_eq!(second.state.len(), 2);
    }

    #[test]
    fn header_survives_later_merges() {
        let first = merge(&FeedState::default(), &[record("https://a/1", "One", 1)], header);
        let second = merge(&first.state, &[record("https://a/2", "Two", 2)], || FeedHeader {
            title: "Other".to_string(),
            description: "Other".to_string(),
        });
        assert_eq!(second.state.feed_title, first.state.feed_title);
        assert_eq!(second.state.feed_description, first.state.feed_description);
    }

    #[test]
    fn merge_leaves_input_untouched() {
        let existing = FeedState::default();
        let _ = merge(&existing, &[record("https://a/1", "One", 1)], header);
        assert!(existing.is_empty());
        assert!(existing.is_fresh());
    }

    #[test]
    fn articles_are_newest_first_then_by_link() {
        let first = merge(
            &FeedState::default(),
            &[record("https://a/b", "B", 1), record("https://a/a", "A", 1)],
            header,
        );
        let second = merge(&first.state, &[record("https://a/c", "C", 2)], header);
        let links: Vec<String> = second.state.articles().into_iter().map(|a| a.link).collect();
        assert_eq!(links, vec!["https://a/c", "https://a/a", "https://a/b"]);
    }

    #[test]
    fn stored_dates_round_trip() {
        let original = record("https://a/1", "One", 7);
        let out = merge(&FeedState::default(), &[original.clone()], header);
        assert_eq!(out.state.articles(), vec![original]);
    }

    #[test]
    fn bad_stored_date_falls_back_to_epoch() {
        let mut state = FeedState::default();
        state.entries.insert(
            "https://a/1".to_string(),
            StoredEntry {
                title: "One".to_string(),
                description: "One".to_string(),
                pub_date: "yesterday".to_string(),
                author: None,
            },
        );
        assert_eq!(state.articles()[0].published, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn load_missing_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load(), FeedState::default());
    }

    #[test]
    fn load_corrupt_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(EntryStore::new(&path).load(), FeedState::default());
    }

    #[test]
    fn load_reads_isoformat_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.json");
        std::fs::write(
            &path,
            r#"{"feed_title": "Acme Blog Feed", "feed_description": "RSS feed generated from https://acme.test",
                "entries": {"https://acme.test/p": {"title": "Post", "description": "Post",
                "pub_date": "2024-02-25T10:00:00.123456+00:00", "author": null}}}"#,
        )
        .unwrap();

        let state = EntryStore::new(&path).load();
        assert_eq!(state.feed_title, "Acme Blog Feed");
        let articles = state.articles();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].published, Utc.with_ymd_and_hms(2024, 2, 25, 10, 0, 0).unwrap() + chrono::Duration::microseconds(123456));
    }

    #[test]
    fn encoded_state_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.json");
        let out = merge(&FeedState::default(), &[record("https://a/1", "One", 1)], header);
        std::fs::write(&path, EntryStore::encode(&out.state).unwrap()).unwrap();
        assert_eq!(EntryStore::new(&path).load(), out.state);
    }
}
