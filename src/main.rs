use std::io::{self, Write};

use anyhow::Context;
use blog2rss::config::{Args, Config};
use blog2rss::fetch::HttpFetcher;
use blog2rss::run::{self, Outcome};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "blog2rss=info".into()))
        .init();

    let args = Args::parse();

    match execute(args) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error processing the URL: {:#}", e);
            std::process::exit(4);
        }
    }
}

fn execute(args: Args) -> anyhow::Result<()> {
    let config = Config::try_from(args).context("invalid arguments")?;
    let fetcher = HttpFetcher::new(&config.fetch)?;

    let outcome = run::run(&config, &fetcher)
        .with_context(|| format!("scraping {}", config.source.as_str()))?;

    match outcome {
        Outcome::Published(report) => {
            info!(
                extracted = report.extracted,
                new = report.newly_added,
                total = report.total,
                feed = %report.feed_path.display(),
                store = %report.store_path.display(),
                "feed written"
            );
            let mut stdout = io::stdout().lock();
            stdout.write_all(report.document.as_bytes())?;
            stdout.flush()?;
        }
        Outcome::NoArticles => {
            println!("No blog posts found at the specified URL.");
        }
    }
    Ok(())
}
