//! Fakes for the host audio session, catalog and fetcher

#![allow(dead_code)]

use async_trait::async_trait;
use offline_audio::{AudioError, DecodedTrack, StreamFormat, TrackDecoder};
use offline_playback::backend::{AudioHost, AudioSink, RenderCallback, StreamPlayer};
use offline_playback::config::PlaybackSettings;
use offline_playback::{
    CatalogClient, CoordinatorHandle, MediaFetcher, PlaybackCoordinator, PlaybackEntry,
    PlaybackError, PlaybackEvent, PlaybackServices, Result, SourceResolver, Telemetry,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, Semaphore};
use url::Url;

pub const TRACK_LENGTH: Duration = Duration::from_secs(120);
const DECODE_RATE: u32 = 8000;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn entries(n: usize) -> Vec<PlaybackEntry> {
    (0..n)
        .map(|i| PlaybackEntry::remote(format!("e{}", i), format!("t{}", i), format!("Song {}", i), "Artist"))
        .collect()
}

// Stream player

#[derive(Debug, Default)]
pub struct StreamState {
    pub url: Option<Url>,
    pub position: Duration,
    pub playing: bool,
    pub finished: bool,
    pub stopped: bool,
}

pub struct FakeStreamPlayer {
    state: Arc<Mutex<StreamState>>,
    fail_load: bool,
}

#[async_trait]
impl StreamPlayer for FakeStreamPlayer {
    async fn load(&mut self, url: &Url) -> Result<()> {
        if self.fail_load {
            return Err(PlaybackError::Player(format!("cannot open {}", url)));
        }
        self.state.lock().unwrap().url = Some(url.clone());
        Ok(())
    }

    fn play(&mut self) {
        self.state.lock().unwrap().playing = true;
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().playing = false;
    }

    fn seek(&mut self, position: Duration) {
        let mut state = self.state.lock().unwrap();
        state.position = position.min(TRACK_LENGTH);
        state.finished = false;
    }

    fn current_time(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn duration(&self) -> Option<Duration> {
        Some(TRACK_LENGTH)
    }

    fn buffered(&self) -> Duration {
        TRACK_LENGTH
    }

    fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.stopped = true;
    }
}

/// Handle to one stream player the host handed out
#[derive(Clone)]
pub struct PlayerProbe(Arc<Mutex<StreamState>>);

impl PlayerProbe {
    pub fn playing(&self) -> bool {
        self.0.lock().unwrap().playing
    }

    pub fn stopped(&self) -> bool {
        self.0.lock().unwrap().stopped
    }

    pub fn position(&self) -> Duration {
        self.0.lock().unwrap().position
    }

    /// Move the playhead as if the media had advanced on its own
    pub fn advance_to(&self, position: Duration) {
        self.0.lock().unwrap().position = position;
    }

    pub fn finish(&self) {
        let mut state = self.0.lock().unwrap();
        state.position = TRACK_LENGTH;
        state.finished = true;
    }
}

// Output sink

/// Accepts a render callback and never calls it, so engine time only moves on seek
#[derive(Default)]
pub struct SinkCounters {
    pub started: AtomicUsize,
    pub stopped: AtomicUsize,
    pub resumed: AtomicUsize,
}

pub struct ManualSink {
    counters: Arc<SinkCounters>,
    render: Option<RenderCallback>,
}

impl AudioSink for ManualSink {
    fn start(&mut self, _format: StreamFormat, render: RenderCallback) -> Result<()> {
        self.render = Some(render);
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {
        self.counters.resumed.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        if self.render.take().is_some() {
            self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// Host

#[derive(Default)]
pub struct FakeHost {
    players: Mutex<Vec<Arc<Mutex<StreamState>>>>,
    pub sinks: Arc<SinkCounters>,
    pub fail_loads: AtomicBool,
}

impl FakeHost {
    pub fn player(&self, index: usize) -> PlayerProbe {
        PlayerProbe(Arc::clone(&self.players.lock().unwrap()[index]))
    }

    pub fn last_player(&self) -> PlayerProbe {
        let players = self.players.lock().unwrap();
        PlayerProbe(Arc::clone(players.last().expect("no stream player created")))
    }

    pub fn player_count(&self) -> usize {
        self.players.lock().unwrap().len()
    }
}

impl AudioHost for FakeHost {
    fn stream_player(&self) -> Box<dyn StreamPlayer> {
        let state = Arc::new(Mutex::new(StreamState::default()));
        self.players.lock().unwrap().push(Arc::clone(&state));
        Box::new(FakeStreamPlayer {
            state,
            fail_load: self.fail_loads.load(Ordering::SeqCst),
        })
    }

    fn output_sink(&self) -> Box<dyn AudioSink> {
        Box::new(ManualSink {
            counters: Arc::clone(&self.sinks),
            render: None,
        })
    }
}

// Decoder

/// Two minutes of mono silence for any path
#[derive(Default)]
pub struct FakeDecoder {
    pub fail: AtomicBool,
}

impl TrackDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> offline_audio::Result<DecodedTrack> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AudioError::DecodeError(format!("{} is not audio", path.display())));
        }
        let frames = TRACK_LENGTH.as_secs() as usize * DECODE_RATE as usize;
        Ok(DecodedTrack::new(vec![0.0; frames], StreamFormat::new(DECODE_RATE, 1)))
    }

    fn supports_format(&self, _path: &Path) -> bool {
        true
    }
}

// Catalog and fetcher

#[derive(Default)]
pub struct FakeCatalog {
    pub failing: Mutex<HashSet<String>>,
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn resolve_stream_url(&self, track_id: &str) -> Result<Url> {
        if self.failing.lock().unwrap().contains(track_id) {
            return Err(PlaybackError::Catalog(format!("unknown track {}", track_id)));
        }
        Ok(Url::parse(&format!("https://media.test/stream/{}.mp3", track_id)).unwrap())
    }
}

/// Fetcher keyed by the track id embedded in the URL
pub struct FakeFetcher {
    failing_downloads: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<String>>,
    gate: Semaphore,
    gated: AtomicBool,
    pub downloads: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self {
            failing_downloads: Mutex::default(),
            failing_fetches: Mutex::default(),
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            downloads: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }
}

impl FakeFetcher {
    pub fn fail_download(&self, track_id: &str) {
        self.failing_downloads.lock().unwrap().insert(track_id.to_string());
    }

    pub fn fail_fetch(&self, track_id: &str) {
        self.failing_fetches.lock().unwrap().insert(track_id.to_string());
    }

    /// Hold every download until [`Self::open`]
    pub fn close(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.gate.add_permits(1);
    }

    async fn wait_gate(&self) {
        if self.gated.load(Ordering::SeqCst) {
            let _permit = self.gate.acquire().await.unwrap();
        }
    }

    fn fails(set: &Mutex<HashSet<String>>, url: &Url) -> bool {
        set.lock().unwrap().iter().any(|id| url.path().ends_with(&format!("/{}.mp3", id)))
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn download_to_file(&self, url: &Url, dest: &Path) -> Result<u64> {
        self.wait_gate().await;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if Self::fails(&self.failing_downloads, url) {
            return Err(PlaybackError::Download(format!("{} reset by peer", url)));
        }
        let body = url.as_str().as_bytes();
        tokio::fs::write(dest, body).await?;
        Ok(body.len() as u64)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if Self::fails(&self.failing_fetches, url) {
            return Err(PlaybackError::Download(format!("{} returned status 503", url)));
        }
        Ok(url.as_str().as_bytes().to_vec())
    }
}

// Coordinator harness

pub struct Harness {
    pub handle: CoordinatorHandle,
    pub host: Arc<FakeHost>,
    pub decoder: Arc<FakeDecoder>,
    pub catalog: Arc<FakeCatalog>,
    pub fetcher: Arc<FakeFetcher>,
    pub cache: TempDir,
}

pub fn resolver(catalog: Arc<FakeCatalog>, fetcher: Arc<FakeFetcher>, cache: &Path) -> SourceResolver {
    SourceResolver::new(catalog, fetcher, cache)
}

pub fn harness() -> Harness {
    init_tracing();
    let host = Arc::new(FakeHost::default());
    let decoder = Arc::new(FakeDecoder::default());
    let catalog = Arc::new(FakeCatalog::default());
    let fetcher = Arc::new(FakeFetcher::default());
    let cache = TempDir::new().unwrap();

    let settings = PlaybackSettings {
        telemetry_interval_ms: 10,
        ..PlaybackSettings::default()
    };
    let handle = PlaybackCoordinator::spawn(
        PlaybackServices {
            host: host.clone(),
            decoder: decoder.clone(),
            resolver: Arc::new(resolver(catalog.clone(), fetcher.clone(), cache.path())),
        },
        &settings,
    );

    Harness {
        handle,
        host,
        decoder,
        catalog,
        fetcher,
        cache,
    }
}

/// Poll status until `done` holds
pub async fn wait_for(handle: &CoordinatorHandle, done: impl Fn(&Telemetry) -> bool) -> Telemetry {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = handle.status().await.unwrap();
        if done(&status) {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached, last status: {:?}",
            status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Receive events until one matches
pub async fn wait_for_event(
    events: &mut broadcast::Receiver<PlaybackEvent>,
    matches: impl Fn(&PlaybackEvent) -> bool,
) -> PlaybackEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("event not received")
}

pub fn approx(actual: Duration, expected: Duration, tolerance: Duration) -> bool {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    diff <= tolerance
}
