//! blog2rss - scrape a blog index page into an RSS feed.
//!
//! Articles are found with cascading structural heuristics, merged into a
//! per-source entry store so the feed keeps posts that have scrolled off the
//! page, and rendered as RSS 2.0.

pub mod config;
pub mod error;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod run;
pub mod site_name;
pub mod store;
pub mod text;

pub use error::{Error, FetchError, Result};
