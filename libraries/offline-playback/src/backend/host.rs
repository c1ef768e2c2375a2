//! Host audio session
//!
//! The coordinator never talks to an OS media API directly. A platform
//! supplies an [`AudioHost`] that hands out streaming players (for the
//! direct backend) and raw output sinks (for the engine backend).

use crate::error::Result;
use async_trait::async_trait;
use offline_audio::StreamFormat;
use std::time::Duration;
use url::Url;

/// Render callback handed to an output sink at graph-setup time
///
/// Called on the host's real-time thread with an interleaved buffer to fill.
/// Must not block or allocate.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// OS-level streaming media player with an opaque decode graph
#[async_trait]
pub trait StreamPlayer: Send {
    /// Open `url` and wait until it is ready to play
    async fn load(&mut self, url: &Url) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, position: Duration);

    fn current_time(&self) -> Duration;

    /// `None` until the container reports a duration
    fn duration(&self) -> Option<Duration>;

    fn buffered(&self) -> Duration;

    /// Reached the end of the media
    fn is_finished(&self) -> bool;

    /// Release the media; no further output after this returns
    fn stop(&mut self);
}

/// Raw PCM output driven by a render callback
pub trait AudioSink: Send {
    /// Open the device at `format` and start pulling from `render`
    fn start(&mut self, format: StreamFormat, render: RenderCallback) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Close the device; `render` is never called after this returns
    fn stop(&mut self);
}

/// Factory for the platform's playback primitives
pub trait AudioHost: Send + Sync {
    fn stream_player(&self) -> Box<dyn StreamPlayer>;

    fn output_sink(&self) -> Box<dyn AudioSink>;
}
