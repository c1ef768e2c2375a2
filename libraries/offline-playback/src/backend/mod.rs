//! Playback backends
//!
//! Exactly two variants. The coordinator matches on [`Backend`] rather than
//! going through a trait object, and builds either one with [`launch`].

mod direct;
mod engine;
mod host;

#[cfg(feature = "desktop")]
mod cpal_sink;

pub use direct::DirectStreamBackend;
pub use engine::{EngineBackend, EngineSetup};
pub use host::{AudioHost, AudioSink, RenderCallback, StreamPlayer};

#[cfg(feature = "desktop")]
pub use cpal_sink::CpalSink;

use crate::error::{PlaybackError, Result};
use crate::resolver::SourceResolver;
use crate::types::{BackendKind, PlaybackEntry};
use offline_audio::effects::{EqualizerSettings, SnapshotReader, StageHandle};
use offline_audio::{StreamFormat, TrackDecoder};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The active playback engine
pub enum Backend {
    DirectStream(DirectStreamBackend),
    Engine(EngineBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::DirectStream(_) => BackendKind::DirectStream,
            Self::Engine(_) => BackendKind::Engine,
        }
    }

    pub fn play(&mut self) {
        match self {
            Self::DirectStream(b) => b.play(),
            Self::Engine(b) => b.play(),
        }
    }

    pub fn pause(&mut self) {
        match self {
            Self::DirectStream(b) => b.pause(),
            Self::Engine(b) => b.pause(),
        }
    }

    pub fn seek(&mut self, position: Duration) {
        match self {
            Self::DirectStream(b) => b.seek(position),
            Self::Engine(b) => b.seek(position),
        }
    }

    pub fn current_time(&self) -> Duration {
        match self {
            Self::DirectStream(b) => b.current_time(),
            Self::Engine(b) => b.current_time(),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::DirectStream(b) => b.duration(),
            Self::Engine(b) => Some(b.duration()),
        }
    }

    pub fn buffered(&self) -> Duration {
        match self {
            Self::DirectStream(b) => b.buffered(),
            Self::Engine(b) => b.buffered(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Self::DirectStream(b) => b.is_finished(),
            Self::Engine(b) => b.is_finished(),
        }
    }

    /// Filter stage of the engine, if this is one
    pub fn stage(&self) -> Option<&StageHandle> {
        match self {
            Self::DirectStream(_) => None,
            Self::Engine(b) => Some(b.stage()),
        }
    }

    /// Render format of the engine, if this is one
    pub fn render_format(&self) -> Option<StreamFormat> {
        match self {
            Self::DirectStream(_) => None,
            Self::Engine(b) => Some(b.format()),
        }
    }

    /// Stop output and release the backend
    pub fn stop(self) {
        debug!(backend = %self.kind(), "Stopping backend");
        drop(self);
    }
}

/// Shared collaborators needed to build a backend
#[derive(Clone)]
pub struct LaunchContext {
    pub host: Arc<dyn AudioHost>,
    pub decoder: Arc<dyn TrackDecoder>,
    pub resolver: Arc<SourceResolver>,
    pub reader: SnapshotReader,
}

/// What to build
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub entry: PlaybackEntry,
    pub kind: BackendKind,
    pub offset: Duration,
    pub equalizer: EqualizerSettings,
    pub revision: u64,
}

/// Resolve the entry's source for `request.kind` and start that backend, paused
pub async fn launch(
    request: LaunchRequest,
    ctx: LaunchContext,
    cancel: CancellationToken,
) -> Result<Backend> {
    debug!(
        entry_id = %request.entry.id,
        backend = %request.kind,
        offset_ms = request.offset.as_millis() as u64,
        "Launching backend"
    );

    match request.kind {
        BackendKind::DirectStream => {
            let url = ctx.resolver.stream_url(&request.entry, &cancel).await?;
            let player = ctx.host.stream_player();
            let backend = tokio::select! {
                () = cancel.cancelled() => return Err(PlaybackError::Cancelled),
                result = DirectStreamBackend::start(player, url, request.offset) => result?,
            };
            Ok(Backend::DirectStream(backend))
        }
        BackendKind::Engine => {
            let path = ctx.resolver.local_file(&request.entry, &cancel).await?;
            if cancel.is_cancelled() {
                return Err(PlaybackError::Cancelled);
            }
            let sink = ctx.host.output_sink();
            let decoder = Arc::clone(&ctx.decoder);
            let reader = ctx.reader.clone();

            let started = tokio::task::spawn_blocking(move || {
                EngineBackend::start(
                    &path,
                    request.offset,
                    EngineSetup {
                        decoder: decoder.as_ref(),
                        sink,
                        reader,
                        equalizer: request.equalizer,
                        revision: request.revision,
                    },
                )
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "Engine start task failed");
                PlaybackError::EngineStartFailed(e.to_string())
            })?;

            Ok(Backend::Engine(started?))
        }
    }
}
