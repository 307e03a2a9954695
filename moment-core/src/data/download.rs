//! Remote fetcher for the vendor's supported-ticker archive.
//!
//! The archive is a zip of a single CSV; the fetcher only opens the byte
//! stream. Persisting and extracting are the archive store's job.

use super::http::HttpClient;
use super::provider::FinanceError;
use std::io::Read;

/// Anything that can produce a fresh copy of the ticker archive.
pub trait ArchiveSource: Send + Sync {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Open a streaming read of the archive bytes.
    fn open(&self) -> Result<Box<dyn Read + Send>, FinanceError>;
}

/// Streams the archive from a fixed URL.
pub struct HttpArchiveSource {
    http: HttpClient,
    url: String,
}

impl HttpArchiveSource {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ArchiveSource for HttpArchiveSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn open(&self) -> Result<Box<dyn Read + Send>, FinanceError> {
        tracing::debug!(url = %self.url, "downloading ticker archive");
        let resp = self.http.get(&self.url, &[])?;
        Ok(Box::new(resp))
    }
}
