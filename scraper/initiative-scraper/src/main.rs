use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crawl::{CachedSource, PageCache, ScrapingClient};
use initiative_scraper::cli::Args;
use initiative_scraper::driver::scrape;
use initiative_scraper::output::{write_aggregate, write_split, Format, OutputError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if args.format == Format::Csv {
        bail!(OutputError::UnsupportedFormat("csv".into()));
    }

    let cache = PageCache::new(&args.cache_dir);
    if args.clear_cache {
        info!(dir = %cache.dir().display(), "clearing cache");
        cache.clear().await.context("failed to clear the page cache")?;
    }
    cache
        .ensure_dir()
        .await
        .with_context(|| format!("cannot use {} as page cache", cache.dir().display()))?;

    let client = ScrapingClient::builder()
        .encoding_label(&args.encoding)?
        .timeout(args.timeout())
        .build()?;
    let source = Arc::new(CachedSource::new(client, cache));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping workers");
                cancel.cancel();
            }
        }
    });

    let options = args.scrape_options();
    info!(
        start = options.ids.start,
        end = options.ids.end,
        workers = options.workers,
        "scraping initiatives"
    );
    let report = scrape(source, &options, cancel).await?;
    if !report.failed.is_empty() {
        warn!(
            failed = report.failed.len(),
            ids = ?report.failed.iter().map(|f| f.id).collect::<Vec<_>>(),
            "some ids could not be fetched"
        );
    }

    let outfile = args.outfile();
    info!(path = %outfile.display(), records = report.records.len(), "Saving to file");
    if args.split {
        let dir = outfile.parent().unwrap_or(Path::new(""));
        write_split(dir, report.records.values(), args.indent).await?;
    } else {
        write_aggregate(&outfile, &report.records, args.indent).await?;
    }

    info!("Done.");
    Ok(())
}
