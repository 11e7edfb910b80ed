//! Shared plumbing for the scrapers: an HTTP client with browser-like headers,
//! a disk cache keyed by the SHA-1 of the request URL, and text helpers.

pub mod cache;
pub mod characters;
pub mod client;
pub mod error;
pub mod utils;

pub use cache::{CachedSource, PageCache};
pub use client::{PageSource, ScrapingClient};
pub use error::CrawlError;
