use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown page encoding: {0}")]
    UnknownEncoding(String),
}
