use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::{debug, info};

use crate::characters::CHARACTERS;
use crate::client::PageSource;
use crate::error::CrawlError;

pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Page bodies stored on disk under the SHA-1 of their URL.
///
/// Entries never expire; the only way to invalidate them is [`PageCache::clear`].
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lowercase hex SHA-1 of the URL string.
    pub fn key(url: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(Self::key(url))
    }

    pub async fn get(&self, url: &str) -> Result<Option<String>, CrawlError> {
        match fs::read_to_string(self.path_for(url)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stores `content` with carriage returns stripped and returns what was written.
    pub async fn put(&self, url: &str, content: &str) -> Result<String, CrawlError> {
        self.ensure_dir().await?;
        let cleaned = content.replace(CHARACTERS::CARRIAGE_RETURN, "");
        fs::write(self.path_for(url), &cleaned).await?;
        Ok(cleaned)
    }

    /// Removes the cache directory and everything in it.
    pub async fn clear(&self) -> Result<(), CrawlError> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                info!(dir = %self.dir.display(), "cleared page cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the cache directory if it is missing.
    pub async fn ensure_dir(&self) -> Result<(), CrawlError> {
        if fs::try_exists(&self.dir).await? {
            return Ok(());
        }
        info!(dir = %self.dir.display(), "creating page cache directory");
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

/// Memoizes another [`PageSource`] through a [`PageCache`].
pub struct CachedSource<S> {
    inner: S,
    cache: PageCache,
}

impl<S: PageSource> CachedSource<S> {
    pub fn new(inner: S, cache: PageCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: PageSource> PageSource for CachedSource<S> {
    async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        if let Some(page) = self.cache.get(url).await? {
            debug!(url, "cache hit");
            return Ok(page);
        }

        debug!(url, "cache miss");
        let page = self.inner.fetch(url).await?;
        self.cache.put(url, &page).await
    }
}
