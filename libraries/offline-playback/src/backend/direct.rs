//! Direct stream backend
//!
//! Hands the resolved URL to the host's streaming player. No DSP, lowest
//! startup cost.

use super::host::StreamPlayer;
use crate::error::Result;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct DirectStreamBackend {
    player: Box<dyn StreamPlayer>,
    url: Url,
}

impl DirectStreamBackend {
    /// Load `url` and position it at `offset`, paused
    pub async fn start(mut player: Box<dyn StreamPlayer>, url: Url, offset: Duration) -> Result<Self> {
        player.load(&url).await?;
        if !offset.is_zero() {
            player.seek(offset);
        }
        debug!(url = %url, offset_ms = offset.as_millis() as u64, "Direct stream ready");
        Ok(Self { player, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn play(&mut self) {
        self.player.play();
    }

    pub fn pause(&mut self) {
        self.player.pause();
    }

    pub fn seek(&mut self, position: Duration) {
        self.player.seek(position);
    }

    pub fn current_time(&self) -> Duration {
        self.player.current_time()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.player.duration()
    }

    pub fn buffered(&self) -> Duration {
        self.player.buffered()
    }

    pub fn is_finished(&self) -> bool {
        self.player.is_finished()
    }
}

impl Drop for DirectStreamBackend {
    fn drop(&mut self) {
        self.player.stop();
    }
}
