//! Catalog client for a streaming endpoint of the form
//! `{base}/v1/tracks/{id}/stream?app_name={app}`

use super::CatalogClient;
use crate::config::CatalogSettings;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use url::Url;

/// Builds stream URLs without a network round trip
#[derive(Debug, Clone)]
pub struct StreamEndpointCatalog {
    base: Url,
    app_name: String,
}

impl StreamEndpointCatalog {
    pub fn new(base: Url, app_name: impl Into<String>) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(PlaybackError::Config(format!(
                "{} cannot be used as a catalog base URL",
                base
            )));
        }
        Ok(Self {
            base,
            app_name: app_name.into(),
        })
    }

    pub fn from_settings(settings: &CatalogSettings) -> Result<Self> {
        let base = settings
            .base_url
            .as_deref()
            .ok_or_else(|| PlaybackError::Config("catalog.base_url is not set".to_string()))?;
        let base =
            Url::parse(base).map_err(|e| PlaybackError::Config(format!("catalog.base_url: {}", e)))?;
        Self::new(base, settings.app_name.clone())
    }

    pub fn stream_url(&self, track_id: &str) -> Result<Url> {
        if track_id.is_empty() {
            return Err(PlaybackError::Catalog("empty track id".to_string()));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| PlaybackError::Catalog(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(["v1", "tracks", track_id, "stream"]);
        url.query_pairs_mut().append_pair("app_name", &self.app_name);
        Ok(url)
    }
}

#[async_trait]
impl CatalogClient for StreamEndpointCatalog {
    async fn resolve_stream_url(&self, track_id: &str) -> Result<Url> {
        self.stream_url(track_id)
    }
}
