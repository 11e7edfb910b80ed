use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{header, Client};
use tracing::debug;

use crate::error::CrawlError;

/// Anything that can turn a URL into page text.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CrawlError>;
}

pub struct ScrapingClient {
    client: Client,
    encoding: &'static Encoding,
}

impl ScrapingClient {
    pub fn builder() -> ScrapingClientBuilder {
        ScrapingClientBuilder::default()
    }

    pub async fn get(&self, url: &str) -> Result<reqwest::Response, CrawlError> {
        let response = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await?;

        Ok(response)
    }

    fn headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0"));
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("pt-PT,pt;q=0.9,en;q=0.8"));
        headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));
        headers.insert(header::UPGRADE_INSECURE_REQUESTS, header::HeaderValue::from_static("1"));
        headers.insert(header::REFERER, header::HeaderValue::from_static("https://www.parlamento.pt"));

        headers
    }
}

#[async_trait]
impl PageSource for ScrapingClient {
    async fn fetch(&self, url: &str) -> Result<String, CrawlError> {
        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let raw_bytes = response.bytes().await?;
        let (decoded, _, had_errors) = self.encoding.decode(&raw_bytes);
        if had_errors {
            debug!(url, encoding = self.encoding.name(), "page contained malformed sequences");
        }

        Ok(decoded.into_owned())
    }
}

/// Settings for [`ScrapingClient`].
#[derive(Debug, Clone)]
pub struct ScrapingClientBuilder {
    encoding: &'static Encoding,
    timeout: Option<Duration>,
}

impl Default for ScrapingClientBuilder {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            timeout: None,
        }
    }
}

impl ScrapingClientBuilder {
    /// Decode page bodies with the encoding named by `label` (e.g. `windows-1252`).
    pub fn encoding_label(mut self, label: &str) -> Result<Self, CrawlError> {
        self.encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CrawlError::UnknownEncoding(label.to_string()))?;
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<ScrapingClient, CrawlError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(ScrapingClient {
            client: builder.build()?,
            encoding: self.encoding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_label_accepts_windows_1252() {
        let builder = ScrapingClient::builder().encoding_label("windows-1252").unwrap();
        assert_eq!(builder.encoding.name(), "windows-1252");
    }

    #[test]
    fn encoding_label_is_case_insensitive() {
        let builder = ScrapingClient::builder().encoding_label("UTF-8").unwrap();
        assert_eq!(builder.encoding, UTF_8);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let err = ScrapingClient::builder().encoding_label("klingon").unwrap_err();
        assert!(matches!(err, CrawlError::UnknownEncoding(label) if label == "klingon"));
    }
}
