//! HTTP media fetcher

use super::{MediaFetcher, PartFile};
use crate::config::DownloadSettings;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

/// Fetches media over HTTP with reqwest
#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    /// Client with a connect timeout per request and an overall timeout per resource
    pub fn new(request_timeout: Duration, resource_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(request_timeout)
            .timeout(resource_timeout)
            .build()?;
        Ok(Self { http })
    }

    pub fn from_settings(settings: &DownloadSettings) -> Result<Self> {
        Self::new(settings.request_timeout(), settings.resource_timeout())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    async fn get(&self, url: &Url) -> Result<Response> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        // Statuses below 400 are accepted, including redirects reqwest did not follow
        if !(status.is_success() || status.is_redirection()) {
            return Err(PlaybackError::Download(format!(
                "{} returned status {}",
                url,
                status.as_u16()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn download_to_file(&self, url: &Url, dest: &Path) -> Result<u64> {
        debug!(url = %url, dest = %dest.display(), "Downloading media");

        let response = self.get(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // A partial file never shows up under the final name
        let part = PartFile::new(dest);
        let written = write_body(response, part.path()).await?;
        part.persist().await?;

        info!(url = %url, dest = %dest.display(), size = written, "Media downloaded");
        Ok(written)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(url = %url, "Fetching media into memory");
        let response = self.get(url).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

async fn write_body(response: Response, path: &Path) -> Result<u64> {
    let mut file = File::create(path).await?;
    let mut written: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}
