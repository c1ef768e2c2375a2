//! Offline Player - Playback Coordination
//!
//! Queue, transport and dual-backend playback for Offline Player.
//!
//! This crate provides:
//! - Play queue with shuffle and repeat (Off, One, All)
//! - Two playback backends: direct streaming and a local decode engine
//!   with the equalizer in its render path
//! - Position-preserving migration between the backends when the
//!   equalizer is toggled
//! - Source resolution with download-to-cache and in-memory fallback
//! - Telemetry (`watch`) and events (`broadcast`) for the UI layer
//!
//! # Architecture
//!
//! The platform supplies an [`AudioHost`] (a streaming player and a raw
//! output sink), a [`TrackDecoder`](offline_audio::TrackDecoder) and a
//! [`SourceResolver`]. [`PlaybackCoordinator::spawn`] starts an actor
//! that owns everything else; the returned [`CoordinatorHandle`] is the
//! only way in.
//!
//! With the `desktop` feature, [`CpalSink`](backend::CpalSink) renders the
//! engine through the default output device.
//!
//! # Example
//!
//! ```rust,no_run
//! use offline_playback::{
//!     CoordinatorHandle, HttpFetcher, PlaybackCoordinator, PlaybackEntry, PlaybackServices,
//!     PlayerConfig, SourceResolver, StreamEndpointCatalog,
//! };
//! use offline_playback::backend::AudioHost;
//! use offline_audio::SymphoniaDecoder;
//! use std::sync::Arc;
//!
//! # async fn example(host: Arc<dyn AudioHost>) -> offline_playback::Result<()> {
//! let config = PlayerConfig::load()?;
//! let resolver = SourceResolver::new(
//!     Arc::new(StreamEndpointCatalog::from_settings(&config.catalog)?),
//!     Arc::new(HttpFetcher::from_settings(&config.downloads)?),
//!     config.downloads.cache_dir.clone(),
//! )
//! .with_default_extension(config.downloads.default_extension.clone());
//!
//! let player: CoordinatorHandle = PlaybackCoordinator::spawn(
//!     PlaybackServices {
//!         host,
//!         decoder: Arc::new(SymphoniaDecoder::new()),
//!         resolver: Arc::new(resolver),
//!     },
//!     &config.playback,
//! );
//!
//! player
//!     .set_queue(vec![PlaybackEntry::remote("e1", "D7KyD", "Song", "Artist")], 0, true)
//!     .await?;
//! player.set_equalizer_on(true).await?; // migrates to the engine at the same position
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
mod coordinator;
pub mod error;
pub mod events;
pub mod queue;
pub mod resolver;
pub mod types;

pub use config::PlayerConfig;
pub use coordinator::{CoordinatorHandle, PlaybackCoordinator, PlaybackServices};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use queue::{PlaybackQueue, QueueStep};
pub use resolver::{
    CatalogClient, HttpFetcher, MediaFetcher, SourceResolver, StreamEndpointCatalog,
};
pub use types::{
    BackendKind, NowPlayingMeta, PlaybackEntry, RepeatMode, SourceRef, Telemetry, TransportState,
};

pub use backend::AudioHost;
