//! Command-line arguments and the run configuration derived from them.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_URL: &str = "https://ollama.com/blog";

/// blog2rss - turn a blog index page into an RSS feed that keeps its history
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL of the blog index page
    #[arg(default_value = DEFAULT_URL)]
    pub url: String,

    /// Directory holding the per-source entry stores
    #[arg(long = "data-dir", env = "BLOG2RSS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory receiving the rendered feeds
    #[arg(long = "feeds-dir", env = "BLOG2RSS_FEEDS_DIR", default_value = "feeds")]
    pub feeds_dir: PathBuf,

    /// Timeout in milliseconds for the page request
    #[arg(short = 't', long = "timeout-ms", env = "BLOG2RSS_TIMEOUT_MS", default_value_t = 10000)]
    pub timeout_ms: u64,

    /// Extra attempts after a failed request
    #[arg(short = 'r', long = "retries", env = "BLOG2RSS_RETRIES", default_value_t = 2)]
    pub retries: u32,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub retries: u32,
}

/// The page being scraped. Its host names the persisted files.
#[derive(Debug, Clone)]
pub struct Source {
    raw: String,
    url: Url,
}

impl Source {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let url = Url::parse(raw)?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::Config(format!("source URL has no host: {}", raw)));
        }
        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// The URL exactly as given, used for link resolution and feed text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// First label of the host without a leading `www.`.
    pub fn file_stem(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(host);
        host.split('.').next().unwrap_or_default().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    pub data_dir: PathBuf,
    pub feeds_dir: PathBuf,
    pub fetch: FetchSettings,
}

impl Config {
    pub fn new(source: Source, data_dir: impl Into<PathBuf>, feeds_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            data_dir: data_dir.into(),
            feeds_dir: feeds_dir.into(),
            fetch: FetchSettings {
                timeout: Duration::from_millis(10_000),
                retries: 2,
            },
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.source.file_stem()))
    }

    pub fn feed_path(&self) -> PathBuf {
        self.feeds_dir.join(format!("{}.xml", self.source.file_stem()))
    }
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self> {
        let source = Source::parse(&args.url)?;
        let mut config = Config::new(source, args.data_dir, args.feeds_dir);
        config.fetch = FetchSettings {
            timeout: Duration::from_millis(args.timeout_ms),
            retries: args.retries,
        };
        Ok(config)
    }
}
