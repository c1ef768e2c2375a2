//! Engine backend
//!
//! Decodes a local file up front and renders it through an output sink,
//! with a [`RealtimeFilterStage`] between the decoded samples and the
//! device. Position is the render cursor in frames, so it survives a
//! handoff between backends exactly.

use super::host::{AudioSink, RenderCallback};
use crate::error::{PlaybackError, Result};
use offline_audio::effects::{
    EqualizerSettings, FilterSnapshot, RealtimeFilterStage, SnapshotReader, StageHandle,
};
use offline_audio::{DecodedTrack, StreamFormat, TrackDecoder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const NO_SEEK: u64 = u64::MAX;

/// Distance from the end used when asked to start at or past it
const TAIL_CLAMP: Duration = Duration::from_millis(50);

/// Transport state shared with the render callback
#[derive(Debug)]
struct EngineShared {
    position_frames: AtomicU64,
    seek_to: AtomicU64,
    playing: AtomicBool,
    finished: AtomicBool,
}

/// Everything the engine needs besides the file itself
pub struct EngineSetup<'a> {
    pub decoder: &'a dyn TrackDecoder,
    pub sink: Box<dyn AudioSink>,
    pub reader: SnapshotReader,
    pub equalizer: EqualizerSettings,
    pub revision: u64,
}

pub struct EngineBackend {
    shared: Arc<EngineShared>,
    sink: Box<dyn AudioSink>,
    stage: StageHandle,
    format: StreamFormat,
    total_frames: u64,
    path: PathBuf,
}

impl EngineBackend {
    /// Decode `path`, insert the filter stage and open the sink, paused at `offset`
    ///
    /// Blocking; run it off the async executor.
    pub fn start(path: &Path, offset: Duration, setup: EngineSetup<'_>) -> Result<Self> {
        let track = setup
            .decoder
            .decode(path)
            .map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;
        Self::start_with_track(path, track, offset, setup)
    }

    fn start_with_track(
        path: &Path,
        track: DecodedTrack,
        offset: Duration,
        setup: EngineSetup<'_>,
    ) -> Result<Self> {
        let format = track.format;
        let total_frames = track.frames() as u64;
        if total_frames == 0 {
            return Err(PlaybackError::EngineStartFailed(format!(
                "{} decoded to no audio",
                path.display()
            )));
        }

        let mut stage = RealtimeFilterStage::new(setup.reader);
        stage
            .prepare(format)
            .map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;
        let snapshot = FilterSnapshot::build(setup.revision, &setup.equalizer, format)
            .map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;
        stage.adopt(&snapshot);
        let stage_handle = stage.handle();

        let start_frame = start_frame(offset, format.sample_rate, total_frames);
        let shared = Arc::new(EngineShared {
            position_frames: AtomicU64::new(start_frame),
            seek_to: AtomicU64::new(NO_SEEK),
            playing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });

        let render = render_callback(track.samples, format, stage, Arc::clone(&shared));
        let mut sink = setup.sink;
        sink.start(format, render)
            .map_err(|e| PlaybackError::EngineStartFailed(e.to_string()))?;

        info!(
            path = %path.display(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            start_frame,
            "Engine started"
        );

        Ok(Self {
            shared,
            sink,
            stage: stage_handle,
            format,
            total_frames,
            path: path.to_path_buf(),
        })
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stage(&self) -> &StageHandle {
        &self.stage
    }

    pub fn play(&mut self) {
        self.shared.playing.store(true, Ordering::Release);
        self.sink.resume();
    }

    pub fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::Release);
        self.sink.pause();
    }

    pub fn seek(&mut self, position: Duration) {
        let frame = frames_for(position, self.format.sample_rate).min(self.total_frames);
        self.shared.seek_to.store(frame, Ordering::Release);
        self.shared.finished.store(false, Ordering::Release);
        self.stage.request_reset();
        debug!(frame, "Engine seek queued");
    }

    pub fn current_time(&self) -> Duration {
        let pending = self.shared.seek_to.load(Ordering::Acquire);
        let frame = if pending == NO_SEEK {
            self.shared.position_frames.load(Ordering::Acquire)
        } else {
            pending
        };
        duration_for(frame, self.format.sample_rate)
    }

    pub fn duration(&self) -> Duration {
        duration_for(self.total_frames, self.format.sample_rate)
    }

    /// The whole file is decoded before playback starts
    pub fn buffered(&self) -> Duration {
        self.duration()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }
}

impl Drop for EngineBackend {
    fn drop(&mut self) {
        self.shared.playing.store(false, Ordering::Release);
        self.sink.stop();
    }
}

fn render_callback(
    samples: Vec<f32>,
    format: StreamFormat,
    mut stage: RealtimeFilterStage,
    shared: Arc<EngineShared>,
) -> RenderCallback {
    let channels = usize::from(format.channels);
    let total_frames = samples.len() / channels;

    Box::new(move |out: &mut [f32]| {
        let requested = shared.seek_to.swap(NO_SEEK, Ordering::AcqRel);
        if requested != NO_SEEK {
            shared.position_frames.store(requested, Ordering::Release);
        }

        if !shared.playing.load(Ordering::Acquire) {
            out.fill(0.0);
            return;
        }

        let position = shared.position_frames.load(Ordering::Acquire) as usize;
        let wanted = out.len() / channels;
        let frames = total_frames.saturating_sub(position).min(wanted);
        let n = frames * channels;

        let start = position * channels;
        out[..n].copy_from_slice(&samples[start..start + n]);
        out[n..].fill(0.0);
        stage.process(&mut out[..n], frames);

        let next = position + frames;
        shared.position_frames.store(next as u64, Ordering::Release);
        if next >= total_frames {
            shared.finished.store(true, Ordering::Release);
        }
    })
}

fn frames_for(position: Duration, sample_rate: u32) -> u64 {
    (position.as_secs_f64() * f64::from(sample_rate)).round() as u64
}

fn duration_for(frames: u64, sample_rate: u32) -> Duration {
    let nanos = u128::from(frames) * 1_000_000_000 / u128::from(sample_rate);
    Duration::from_nanos(nanos as u64)
}

/// Frame to start rendering from, clamped into the file's tail
fn start_frame(offset: Duration, sample_rate: u32, total_frames: u64) -> u64 {
    let frame = frames_for(offset, sample_rate);
    if frame < total_frames {
        frame
    } else {
        total_frames.saturating_sub(frames_for(TAIL_CLAMP, sample_rate))
    }
}
