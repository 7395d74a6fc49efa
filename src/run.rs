//! One scrape: fetch, extract, merge, render, persist.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scraper::Html;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract;
use crate::feed::{self, Channel};
use crate::fetch::Fetch;
use crate::site_name;
use crate::store::{self, EntryStore, FeedHeader};

#[derive(Debug)]
pub enum Outcome {
    /// The feed was rendered and both files were written.
    Published(Report),
    /// The page yielded no articles; nothing was written.
    NoArticles,
}

#[derive(Debug)]
pub struct Report {
    pub document: String,
    pub extracted: usize,
    pub newly_added: usize,
    pub total: usize,
    pub store_path: PathBuf,
    pub feed_path: PathBuf,
}

pub fn run(config: &Config, fetcher: &dyn Fetch) -> Result<Outcome> {
    run_at(config, fetcher, Utc::now())
}

/// Like [`run`], stamping newly discovered articles with `now`.
pub fn run_at(config: &Config, fetcher: &dyn Fetch, now: DateTime<Utc>) -> Result<Outcome> {
    let source = &config.source;
    let body = fetcher.fetch(source.url())?;
    let document = Html::parse_document(&body);

    let articles = extract::extract_at(&document, source.as_str(), now);
    if articles.is_empty() {
        info!(url = source.as_str(), "no blog posts found");
        return Ok(Outcome::NoArticles);
    }

    let entry_store = EntryStore::new(config.store_path());
    let existing = entry_store.load();
    let merged = store::merge(&existing, &articles, || {
        let name = site_name::resolve(&document, source.url());
        info!(site = %name, "new feed");
        FeedHeader {
            title: site_name::feed_title(&name),
            description: site_name::feed_description(source.as_str()),
        }
    });
    info!(
        extracted = articles.len(),
        new = merged.newly_added.len(),
        total = merged.state.len(),
        "merged entries"
    );

    let state = &merged.state;
    let rendered = feed::render(
        Channel {
            title: &state.feed_title,
            link: source.as_str(),
            description: &state.feed_description,
        },
        &state.articles(),
    )?;
    let encoded = EntryStore::encode(state)?;

    let feed_path = config.feed_path();
    // The store goes last: if its rename fails the previous store stays and
    // the next run re-renders the feed from it.
    commit(&[
        (feed_path.as_path(), rendered.as_bytes()),
        (entry_store.path(), encoded.as_bytes()),
    ])?;

    Ok(Outcome::Published(Report {
        document: rendered,
        extracted: articles.len(),
        newly_added: merged.newly_added.len(),
        total: state.len(),
        store_path: entry_store.path().to_path_buf(),
        feed_path,
    }))
}

/// Write every file next to its target first and only then move them into
/// place, in order. A failure at any point removes whatever is still staged,
/// so a target is either fully replaced or left as it was.
fn commit(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for (target, contents) in files {
        if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                discard(&staged);
                return Err(Error::io(dir, e));
            }
        }
        let tmp = staging_path(target);
        if let Err(e) = fs::write(&tmp, contents) {
            discard(&staged);
            return Err(Error::io(&tmp, e));
        }
        staged.push((tmp, *target));
    }

    for (i, (tmp, target)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, target) {
            discard(&staged[i..]);
            return Err(Error::io(*target, e));
        }
    }
    Ok(())
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        if let Err(e) = fs::remove_file(tmp) {
            warn!(path = %tmp.display(), "could not remove staged file: {}", e);
        }
    }
}
