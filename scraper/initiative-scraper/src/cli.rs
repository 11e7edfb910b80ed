use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use crawl::cache::DEFAULT_CACHE_DIR;

use crate::driver::{CollisionPolicy, ScrapeOptions, DEFAULT_CHUNK_SIZE};
use crate::extract::DEFAULT_URL_TEMPLATE;
use crate::output::Format;

pub const DEFAULT_START: u32 = 0;
pub const DEFAULT_END: u32 = 5000;
pub const DEFAULT_INDENT: usize = 2;
pub const DEFAULT_PROCESSES: usize = 2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Scrape legislative initiatives from parlamento.pt into JSON
#[derive(Parser, Debug, Clone)]
#[command(name = "initiative-scraper")]
#[command(version)]
pub struct Args {
    /// Output format; csv is not implemented
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// First initiative id to try
    #[arg(short, long, default_value_t = DEFAULT_START)]
    pub start: u32,

    /// Stop before this id
    #[arg(short, long, default_value_t = DEFAULT_END)]
    pub end: u32,

    /// Output file (default: iniciativas.json, or iniciativas.csv for csv)
    #[arg(short, long)]
    pub outfile: Option<PathBuf>,

    /// Write one file per initiative under iniciativas/ next to the outfile
    #[arg(long)]
    pub split: bool,

    /// Spaces per JSON indentation level
    #[arg(short, long, default_value_t = DEFAULT_INDENT)]
    pub indent: usize,

    /// Concurrent workers; 1 scrapes sequentially
    #[arg(short, long, env = "SCRAPER_PROCESSES", default_value_t = DEFAULT_PROCESSES)]
    pub processes: usize,

    /// Ids handed to a worker at a time
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Clear the page cache before scraping
    #[arg(short, long)]
    pub clear_cache: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, env = "SCRAPER_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Initiative page url, `{id}` is replaced by the identifier
    #[arg(long, env = "SCRAPER_URL_TEMPLATE", default_value = DEFAULT_URL_TEMPLATE)]
    pub url_template: String,

    /// Character encoding of the pages (any WHATWG label, e.g. windows-1252)
    #[arg(long, env = "SCRAPER_ENCODING", default_value = "utf-8")]
    pub encoding: String,

    #[arg(long, env = "SCRAPER_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// What to do when two initiatives share a title
    #[arg(long, value_enum, default_value_t = CollisionPolicy::Overwrite)]
    pub on_collision: CollisionPolicy,

    /// Leave scrape_date out of the records
    #[arg(long)]
    pub no_timestamp: bool,
}

impl Args {
    pub fn outfile(&self) -> PathBuf {
        self.outfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.format.default_outfile()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            ids: self.start..self.end,
            workers: self.processes,
            chunk_size: self.chunk_size,
            url_template: self.url_template.clone(),
            on_collision: self.on_collision,
            timestamp: !self.no_timestamp,
        }
    }
}
