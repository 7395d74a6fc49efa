use std::thread::sleep;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::thread_rng;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, USER_AGENT};
use tracing::{info, warn};
use url::Url;

use crate::config::FetchSettings;
use crate::error::FetchError;

/// Retrieves the raw HTML of a page.
pub trait Fetch {
    fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
];

const MAX_BACKOFF: Duration = Duration::from_secs(10);

// Only the head of the document is searched for a charset declaration.
const CHARSET_SNIFF_LEN: usize = 1024;

static RE_META_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([A-Za-z0-9_.:\-]+)"#).unwrap());
static RE_HEADER_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_.:\-]+)"#).unwrap());

/// Blocking HTTP fetcher with browser-like headers and bounded retries.
pub struct HttpFetcher {
    client: Client,
    retries: u32,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            retries: settings.retries,
        })
    }

    fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, pick_user_agent())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(CONNECTION, "keep-alive")
            .send()
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().map_err(transport)?;
        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        with_retries(url, self.retries, || self.fetch_once(url), sleep)
    }
}

/// Run `attempt` until it succeeds, fails with an error retrying cannot fix,
/// or `retries` extra attempts are spent. `pause` receives each backoff.
fn with_retries<T>(
    url: &Url,
    retries: u32,
    mut attempt: impl FnMut() -> Result<T, FetchError>,
    mut pause: impl FnMut(Duration),
) -> Result<T, FetchError> {
    let mut tried = 0;
    loop {
        info!(%url, attempt = tried + 1, "fetching page");
        let e = match attempt() {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };
        tried += 1;
        if !is_retryable(&e) {
            return Err(e);
        }
        if tried > retries {
            if retries == 0 {
                return Err(e);
            }
            return Err(FetchError::RetriesExhausted {
                url: url.to_string(),
                attempts: tried,
                last: Box::new(e),
            });
        }
        let backoff = backoff_for(tried - 1);
        warn!(%url, "attempt {}/{} failed, retrying in {:?}: {}", tried, retries + 1, backoff, e);
        pause(backoff);
    }
}

fn pick_user_agent() -> &'static str {
    let mut rng = thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// 1s, 2s, 4s, ... capped at ten seconds.
fn backoff_for(attempt: u32) -> Duration {
    Duration::from_millis(1000u64.saturating_mul(2u64.saturating_pow(attempt))).min(MAX_BACKOFF)
}

// Client errors will not change on retry.
fn is_retryable(e: &FetchError) -> bool {
    match e {
        FetchError::Status { status, .. } => !status.is_client_error(),
        FetchError::Transport { .. } => true,
        FetchError::Client(_) | FetchError::RetriesExhausted { .. } => false,
    }
}

/// Decode a response body: charset from the `Content-Type` header, else
/// from a `<meta>` declaration near the top of the document, else UTF-8.
/// A byte-order mark overrides both.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(|ct| RE_HEADER_CHARSET.captures(ct))
        .and_then(|c| Encoding::for_label(c[1].as_bytes()))
        .or_else(|| sniff_meta_charset(bytes))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(CHARSET_SNIFF_LEN)]);
    let caps = RE_META_CHARSET.captures(&head)?;
    Encoding::for_label(caps[1].as_bytes())
}
