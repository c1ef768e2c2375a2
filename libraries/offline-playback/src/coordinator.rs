//! Playback coordinator
//!
//! A single tokio task owns the queue, the transport state, the equalizer
//! and the active backend. Callers talk to it through a cloneable
//! [`CoordinatorHandle`]; every request is a message, so queue and
//! transport mutations are serialized without locks.
//!
//! Backend launches (resolving a source, downloading, decoding) run as
//! separate tasks and report back through an internal channel. Each
//! launch carries a generation number; a result whose generation is no
//! longer the pending one is dropped, which stops that backend.

use crate::backend::{self, AudioHost, Backend, LaunchContext, LaunchRequest};
use crate::config::PlaybackSettings;
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::queue::{PlaybackQueue, QueueStep};
use crate::resolver::SourceResolver;
use crate::types::{BackendKind, PlaybackEntry, RepeatMode, Telemetry, TransportState};
use offline_audio::effects::{
    BandSetting, EqPreset, EqualizerSettings, EqualizerState, StageStatus, BAND_COUNT,
};
use offline_audio::{AudioError, TrackDecoder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 128;

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    SetQueue {
        entries: Vec<PlaybackEntry>,
        start_at: usize,
        autoplay: bool,
        reply: Reply<()>,
    },
    ReplaceWithSingle {
        entry: PlaybackEntry,
        autoplay: bool,
        reply: Reply<()>,
    },
    Enqueue {
        entry: PlaybackEntry,
        autoplay_if_idle: bool,
        reply: Reply<()>,
    },
    Play {
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    TogglePlay {
        reply: Reply<()>,
    },
    Seek {
        position: Duration,
        reply: Reply<()>,
    },
    Next {
        reply: Reply<()>,
    },
    Prev {
        reply: Reply<()>,
    },
    SetRepeat {
        mode: RepeatMode,
        reply: Reply<()>,
    },
    SetShuffle {
        on: bool,
        reply: Reply<()>,
    },
    SetEqualizer {
        is_on: bool,
        bands: [BandSetting; BAND_COUNT],
        reply: Reply<()>,
    },
    SetEqualizerOn {
        is_on: bool,
        reply: Reply<()>,
    },
    SetBandGain {
        slot: usize,
        gain_db: f64,
        reply: Reply<()>,
    },
    ApplyPreset {
        preset: EqPreset,
        reply: Reply<()>,
    },
    BeginScrubbing {
        reply: Reply<()>,
    },
    EndScrubbing {
        position: Duration,
        reply: Reply<()>,
    },
    Status {
        reply: Reply<Telemetry>,
    },
    Equalizer {
        reply: Reply<EqualizerSettings>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Why a backend is being launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaunchPurpose {
    /// Current entry changed; there is no backend for it yet
    Load,

    /// Same entry, other backend; the old one stays paused until this resolves
    Migrate,
}

struct PendingLaunch {
    generation: u64,
    purpose: LaunchPurpose,
    kind: BackendKind,
    cancel: CancellationToken,
}

struct LaunchFinished {
    generation: u64,
    result: Result<Backend>,
}

/// Collaborators the coordinator builds backends from
#[derive(Clone)]
pub struct PlaybackServices {
    pub host: Arc<dyn AudioHost>,
    pub decoder: Arc<dyn TrackDecoder>,
    pub resolver: Arc<SourceResolver>,
}

/// The playback actor. Created with [`PlaybackCoordinator::spawn`].
pub struct PlaybackCoordinator {
    queue: PlaybackQueue,
    state: TransportState,
    equalizer: EqualizerState,
    backend: Option<Backend>,
    reported_backend: Option<BackendKind>,
    pending: Option<PendingLaunch>,
    pending_seek: Option<Duration>,
    /// Position reported while no backend is installed
    parked_time: Duration,
    generation: u64,
    scrubbing: bool,
    skip_streak: usize,
    stage_status: StageStatus,
    restart_threshold: Duration,
    telemetry_interval: Duration,
    rng: StdRng,
    ctx: LaunchContext,
    launches: mpsc::UnboundedSender<LaunchFinished>,
    telemetry: watch::Sender<Telemetry>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackCoordinator {
    /// Start the actor on the current tokio runtime
    pub fn spawn(services: PlaybackServices, settings: &PlaybackSettings) -> CoordinatorHandle {
        let equalizer = EqualizerState::new();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (launch_tx, launch_rx) = mpsc::unbounded_channel();
        let (telemetry_tx, telemetry_rx) = watch::channel(Telemetry {
            repeat: settings.repeat,
            shuffle: settings.shuffle,
            ..Telemetry::default()
        });
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let coordinator = Self {
            queue: PlaybackQueue::with_modes(settings.shuffle, settings.repeat),
            state: TransportState::Idle,
            ctx: LaunchContext {
                host: services.host,
                decoder: services.decoder,
                resolver: services.resolver,
                reader: equalizer.reader(),
            },
            equalizer,
            backend: None,
            reported_backend: None,
            pending: None,
            pending_seek: None,
            parked_time: Duration::ZERO,
            generation: 0,
            scrubbing: false,
            skip_streak: 0,
            stage_status: StageStatus::empty(),
            restart_threshold: settings.restart_threshold(),
            telemetry_interval: settings.telemetry_interval(),
            rng: StdRng::from_entropy(),
            launches: launch_tx,
            telemetry: telemetry_tx,
            events: events_tx.clone(),
        };

        tokio::spawn(coordinator.run(command_rx, launch_rx));

        CoordinatorHandle {
            commands: command_tx,
            telemetry: telemetry_rx,
            events: events_tx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut launches: mpsc::UnboundedReceiver<LaunchFinished>,
    ) {
        let mut ticker = tokio::time::interval(self.telemetry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Playback coordinator started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(Ok(()));
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(finished) = launches.recv() => self.on_launch_finished(finished),
                _ = ticker.tick() => self.on_tick(),
            }
        }

        info!("Playback coordinator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetQueue {
                entries,
                start_at,
                autoplay,
                reply,
            } => {
                let _ = reply.send(self.set_queue(entries, start_at, autoplay));
            }
            Command::ReplaceWithSingle {
                entry,
                autoplay,
                reply,
            } => {
                let previous = self.current_entry_id();
                self.queue.replace_with_single(entry);
                self.skip_streak = 0;
                self.load_current(autoplay, previous);
                let _ = reply.send(Ok(()));
            }
            Command::Enqueue {
                entry,
                autoplay_if_idle,
                reply,
            } => {
                let was_empty = self.queue.is_empty();
                self.queue.push(entry);
                if was_empty {
                    self.load_current(autoplay_if_idle, None);
                }
                let _ = reply.send(Ok(()));
            }
            Command::Play { reply } => {
                let _ = reply.send(self.play());
            }
            Command::Pause { reply } => {
                self.pause();
                let _ = reply.send(Ok(()));
            }
            Command::TogglePlay { reply } => {
                let result = if self.state.is_playing() {
                    self.pause();
                    Ok(())
                } else {
                    self.play()
                };
                let _ = reply.send(result);
            }
            Command::Seek { position, reply } => {
                let _ = reply.send(self.seek(position));
            }
            Command::Next { reply } => {
                self.skip_streak = 0;
                let _ = reply.send(self.next());
            }
            Command::Prev { reply } => {
                self.skip_streak = 0;
                let _ = reply.send(self.prev());
            }
            Command::SetRepeat { mode, reply } => {
                self.queue.set_repeat_mode(mode);
                let _ = reply.send(Ok(()));
            }
            Command::SetShuffle { on, reply } => {
                self.queue.set_shuffle(on);
                let _ = reply.send(Ok(()));
            }
            Command::SetEqualizer {
                is_on,
                bands,
                reply,
            } => {
                let result = self.update_equalizer(|eq| eq.set_equalizer(is_on, bands));
                let _ = reply.send(result);
            }
            Command::SetEqualizerOn { is_on, reply } => {
                let result = self.update_equalizer(|eq| eq.set_on(is_on));
                let _ = reply.send(result);
            }
            Command::SetBandGain {
                slot,
                gain_db,
                reply,
            } => {
                let result = self.update_equalizer(|eq| eq.set_band_gain(slot, gain_db));
                let _ = reply.send(result);
            }
            Command::ApplyPreset { preset, reply } => {
                let result = self.update_equalizer(|eq| eq.apply_preset(&preset));
                let _ = reply.send(result);
            }
            Command::BeginScrubbing { reply } => {
                self.scrubbing = true;
                let _ = reply.send(Ok(()));
            }
            Command::EndScrubbing { position, reply } => {
                self.scrubbing = false;
                let _ = reply.send(self.seek(position));
            }
            Command::Status { reply } => {
                let _ = reply.send(Ok(self.build_telemetry()));
            }
            Command::Equalizer { reply } => {
                let _ = reply.send(Ok(self.equalizer.settings()));
            }
            Command::Shutdown { .. } => {}
        }
        self.publish_telemetry();
    }

    // Queue and transport

    fn set_queue(&mut self, entries: Vec<PlaybackEntry>, start_at: usize, autoplay: bool) -> Result<()> {
        let previous = self.current_entry_id();
        self.queue.set_entries(entries, start_at)?;
        self.skip_streak = 0;
        self.load_current(autoplay, previous);
        Ok(())
    }

    /// Tear down whatever is playing and launch the queue's current entry
    fn load_current(&mut self, autoplay: bool, previous_entry_id: Option<String>) {
        self.cancel_pending();
        if let Some(old) = self.backend.take() {
            old.stop();
        }
        self.pending_seek = None;
        self.parked_time = Duration::ZERO;

        let Some(entry) = self.queue.current().cloned() else {
            self.set_state(TransportState::Idle);
            return;
        };

        self.emit(PlaybackEvent::TrackChanged {
            entry_id: entry.id.clone(),
            previous_entry_id,
        });
        self.set_state(if autoplay {
            TransportState::Playing
        } else {
            TransportState::Loaded
        });

        let kind = BackendKind::for_equalizer(self.equalizer.is_on());
        self.start_launch(LaunchPurpose::Load, entry, kind, Duration::ZERO);
    }

    fn play(&mut self) -> Result<()> {
        match self.state {
            TransportState::Idle => return Err(PlaybackError::QueueEmpty),
            TransportState::Playing => return Ok(()),
            TransportState::Finished => self.seek_backend(Duration::ZERO),
            TransportState::Loaded | TransportState::Paused => {}
        }
        self.set_state(TransportState::Playing);
        if self.backend.is_none() && self.pending.is_none() {
            // Last launch failed or the entry was skipped; nothing is rendering
            if let Some(entry) = self.queue.current().cloned() {
                let kind = BackendKind::for_equalizer(self.equalizer.is_on());
                info!(entry_id = %entry.id, backend = %kind, "Relaunching backend to play");
                self.relaunch_parked(entry, kind);
            }
            return Ok(());
        }
        if !self.migrating() {
            if let Some(backend) = self.backend.as_mut() {
                backend.play();
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.pause();
        }
        self.set_state(TransportState::Paused);
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        match self.state {
            TransportState::Idle => return Err(PlaybackError::NoTrackLoaded),
            TransportState::Finished => {
                debug!("Seek ignored after the queue finished");
                return Ok(());
            }
            TransportState::Loaded | TransportState::Playing | TransportState::Paused => {}
        }
        let position = match self.backend.as_ref().and_then(Backend::duration) {
            Some(duration) => position.min(duration),
            None => position,
        };
        self.seek_backend(position);
        Ok(())
    }

    /// Seek the active backend, or queue the seek while a launch is in flight
    fn seek_backend(&mut self, position: Duration) {
        match (self.pending.is_some(), self.backend.as_mut()) {
            (false, Some(backend)) => backend.seek(position),
            _ => {
                debug!(position_ms = position.as_millis() as u64, "Seek queued");
                self.pending_seek = Some(position);
            }
        }
    }

    fn next(&mut self) -> Result<()> {
        let previous = self.current_entry_id();
        match self.queue.step_forward(&mut self.rng) {
            QueueStep::Moved(_) => {
                self.load_current(true, previous);
                Ok(())
            }
            QueueStep::AtBoundary => {
                self.finish();
                Ok(())
            }
            QueueStep::Empty => Err(PlaybackError::QueueEmpty),
        }
    }

    fn prev(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if self.current_time() > self.restart_threshold {
            self.seek_backend(Duration::ZERO);
            return Ok(());
        }
        let previous = self.current_entry_id();
        match self.queue.step_back(&mut self.rng) {
            QueueStep::Moved(_) => self.load_current(true, previous),
            QueueStep::AtBoundary => self.seek_backend(Duration::ZERO),
            QueueStep::Empty => return Err(PlaybackError::QueueEmpty),
        }
        Ok(())
    }

    /// End of the queue: pause, rewind and stay on the last entry
    fn finish(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.pause();
        }
        self.seek_backend(Duration::ZERO);
        info!(index = ?self.queue.current_index(), "Reached end of queue");
        self.set_state(TransportState::Finished);
    }

    fn on_track_end(&mut self) {
        debug!(entry_id = ?self.current_entry_id(), "Track ended");
        if self.queue.repeat_mode() == RepeatMode::One {
            if let Some(backend) = self.backend.as_mut() {
                backend.seek(Duration::ZERO);
                backend.play();
            }
            return;
        }
        let previous = self.current_entry_id();
        match self.queue.step_forward(&mut self.rng) {
            QueueStep::Moved(_) => self.load_current(true, previous),
            QueueStep::AtBoundary => self.finish(),
            QueueStep::Empty => {}
        }
    }

    // Equalizer and backend selection

    fn update_equalizer(
        &mut self,
        change: impl FnOnce(&mut EqualizerState) -> offline_audio::Result<()>,
    ) -> Result<()> {
        change(&mut self.equalizer)?;
        self.emit(PlaybackEvent::EqualizerChanged {
            settings: self.equalizer.settings(),
            revision: self.equalizer.revision(),
        });
        self.reconcile_backend();
        Ok(())
    }

    /// Bring the backend in line with the equalizer's on/off flag
    fn reconcile_backend(&mut self) {
        if matches!(self.state, TransportState::Idle) {
            return;
        }
        let Some(entry) = self.queue.current().cloned() else {
            return;
        };
        let wanted = BackendKind::for_equalizer(self.equalizer.is_on());

        match self.pending.as_ref().map(|p| (p.purpose, p.kind)) {
            Some((_, kind)) if kind == wanted => {}
            Some((LaunchPurpose::Load, _)) => {
                debug!(backend = %wanted, "Relaunching load for the new backend");
                self.start_launch(LaunchPurpose::Load, entry, wanted, Duration::ZERO);
            }
            Some((LaunchPurpose::Migrate, _)) => {
                self.cancel_pending();
                match self.backend.as_ref().map(Backend::kind) {
                    Some(kind) if kind == wanted => {
                        info!(backend = %kind, "Migration abandoned, keeping current backend");
                        self.resume_current();
                    }
                    Some(_) => self.start_migration(entry, wanted),
                    None => self.relaunch_parked(entry, wanted),
                }
            }
            None => match self.backend.as_ref().map(Backend::kind) {
                Some(kind) if kind == wanted => {}
                Some(_) => self.start_migration(entry, wanted),
                None => self.relaunch_parked(entry, wanted),
            },
        }
    }

    fn start_migration(&mut self, entry: PlaybackEntry, target: BackendKind) {
        let pending_seek = self.pending_seek;
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let offset = pending_seek.unwrap_or_else(|| backend.current_time());
        backend.pause();
        info!(
            entry_id = %entry.id,
            from = %backend.kind(),
            to = %target,
            offset_ms = offset.as_millis() as u64,
            "Migrating backend"
        );
        self.start_launch(LaunchPurpose::Migrate, entry, target, offset);
    }

    /// No backend survived a failed start or skip; try again where we left off
    fn relaunch_parked(&mut self, entry: PlaybackEntry, kind: BackendKind) {
        let offset = self.pending_seek.take().unwrap_or(self.parked_time);
        self.start_launch(LaunchPurpose::Load, entry, kind, offset);
    }

    // Launch bookkeeping

    fn start_launch(
        &mut self,
        purpose: LaunchPurpose,
        entry: PlaybackEntry,
        kind: BackendKind,
        offset: Duration,
    ) {
        self.cancel_pending();
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();

        let request = LaunchRequest {
            entry,
            kind,
            offset,
            equalizer: self.equalizer.settings(),
            revision: self.equalizer.revision(),
        };
        let ctx = self.ctx.clone();
        let token = cancel.clone();
        let launches = self.launches.clone();
        tokio::spawn(async move {
            let result = backend::launch(request, ctx, token).await;
            let _ = launches.send(LaunchFinished { generation, result });
        });

        self.pending = Some(PendingLaunch {
            generation,
            purpose,
            kind,
            cancel,
        });
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(generation = pending.generation, backend = %pending.kind, "Cancelling launch");
            pending.cancel.cancel();
        }
    }

    fn migrating(&self) -> bool {
        matches!(&self.pending, Some(p) if p.purpose == LaunchPurpose::Migrate)
    }

    fn on_launch_finished(&mut self, finished: LaunchFinished) {
        if self.pending.as_ref().map(|p| p.generation) != Some(finished.generation) {
            debug!(generation = finished.generation, "Dropping superseded launch");
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };

        match (pending.purpose, finished.result) {
            (_, Err(PlaybackError::Cancelled)) => {
                debug!(generation = pending.generation, "Launch cancelled");
            }
            (LaunchPurpose::Load, Ok(backend)) => {
                self.skip_streak = 0;
                self.install(backend);
            }
            (LaunchPurpose::Load, Err(err @ PlaybackError::SourceUnavailable { .. })) => {
                self.skip_entry(err);
            }
            (LaunchPurpose::Load, Err(err)) => {
                warn!(error = %err, backend = %pending.kind, "Backend failed to start");
                self.emit(PlaybackEvent::error(err));
                if let Some(position) = self.pending_seek.take() {
                    self.parked_time = position;
                }
                if self.state.is_playing() {
                    self.set_state(TransportState::Paused);
                }
            }
            (LaunchPurpose::Migrate, Ok(backend)) => {
                if let Some(old) = self.backend.take() {
                    old.stop();
                }
                self.install(backend);
            }
            (LaunchPurpose::Migrate, Err(err)) => {
                let err = PlaybackError::BackendMigrationFailed {
                    target: pending.kind,
                    reason: err.to_string(),
                };
                warn!(error = %err, "Keeping previous backend");
                self.emit(PlaybackEvent::error(err));
                self.resume_current();
            }
        }
        self.publish_telemetry();
    }

    fn install(&mut self, mut backend: Backend) {
        if let Some(position) = self.pending_seek.take() {
            backend.seek(position);
        }
        if let Some(format) = backend.render_format() {
            if let Err(err) = self.equalizer.set_render_format(format) {
                warn!(error = %err, "Equalizer could not follow the engine format");
            }
        }
        self.stage_status = StageStatus::empty();
        if self.state.is_playing() {
            backend.play();
        }

        let kind = backend.kind();
        info!(backend = %kind, "Backend installed");
        self.backend = Some(backend);
        if self.reported_backend != Some(kind) {
            self.reported_backend = Some(kind);
            self.emit(PlaybackEvent::BackendChanged { backend: kind });
        }
    }

    /// Hand control back to the backend that was paused for a migration
    fn resume_current(&mut self) {
        let pending_seek = self.pending_seek.take();
        let playing = self.state.is_playing();
        if let Some(backend) = self.backend.as_mut() {
            if let Some(position) = pending_seek {
                backend.seek(position);
            }
            if playing {
                backend.play();
            }
        }
    }

    fn skip_entry(&mut self, err: PlaybackError) {
        let entry_id = self.current_entry_id().unwrap_or_default();
        warn!(entry_id = %entry_id, error = %err, "Skipping unplayable entry");
        self.emit(PlaybackEvent::error(err));
        self.emit(PlaybackEvent::EntrySkipped {
            entry_id: entry_id.clone(),
        });

        self.skip_streak += 1;
        if self.skip_streak >= self.queue.len() {
            warn!(skipped = self.skip_streak, "No playable entries left");
            if self.state.is_playing() {
                self.set_state(TransportState::Paused);
            }
            return;
        }

        let autoplay = self.state.is_playing();
        match self.queue.step_forward(&mut self.rng) {
            QueueStep::Moved(_) => self.load_current(autoplay, Some(entry_id)),
            QueueStep::AtBoundary => self.finish(),
            QueueStep::Empty => {}
        }
    }

    // Telemetry

    fn on_tick(&mut self) {
        self.poll_stage();
        if self.state.is_playing()
            && self.pending.is_none()
            && self.backend.as_ref().is_some_and(Backend::is_finished)
        {
            self.on_track_end();
        }
        self.publish_telemetry();
    }

    /// Turn flags raised by the engine's render thread into control-domain actions
    fn poll_stage(&mut self) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let (Some(stage), Some(format)) = (backend.stage(), backend.render_format()) else {
            return;
        };
        let status = stage.status();
        let raised = status.raised_since(self.stage_status);
        self.stage_status = status;

        if raised.contains(StageStatus::FORMAT_UNAVAILABLE) {
            warn!(
                sample_rate = format.sample_rate,
                channels = format.channels,
                "Equalizer bypassed, render format unavailable"
            );
            self.emit(PlaybackEvent::error(PlaybackError::Audio(
                AudioError::FormatUnavailable {
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                },
            )));
        }
        if status.contains(StageStatus::REBUILD_PENDING) {
            debug!("Republishing filter snapshot for the engine format");
            if let Err(err) = self.equalizer.set_render_format(format) {
                warn!(error = %err, "Equalizer could not follow the engine format");
            }
        }
    }

    fn current_time(&self) -> Duration {
        if let Some(position) = self.pending_seek {
            return position;
        }
        self.backend
            .as_ref()
            .map_or(self.parked_time, Backend::current_time)
    }

    fn build_telemetry(&self) -> Telemetry {
        let current_time = if self.scrubbing {
            self.telemetry.borrow().current_time
        } else {
            self.current_time()
        };
        Telemetry {
            current_time,
            duration: self
                .backend
                .as_ref()
                .and_then(Backend::duration)
                .unwrap_or_default(),
            buffered_time: self
                .backend
                .as_ref()
                .map(Backend::buffered)
                .unwrap_or_default(),
            is_playing: self.state.is_playing(),
            state: self.state,
            now_playing: self.queue.current().map(PlaybackEntry::now_playing),
            queue_index: self.queue.current_index(),
            backend: self.backend.as_ref().map(Backend::kind),
            repeat: self.queue.repeat_mode(),
            shuffle: self.queue.shuffle_on(),
        }
    }

    fn publish_telemetry(&self) {
        self.telemetry.send_replace(self.build_telemetry());
    }

    // Helpers

    fn current_entry_id(&self) -> Option<String> {
        self.queue.current().map(|entry| entry.id.clone())
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Transport state changed");
            self.state = state;
            self.emit(PlaybackEvent::StateChanged { state });
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn shutdown(&mut self) {
        self.cancel_pending();
        if let Some(backend) = self.backend.take() {
            backend.stop();
        }
        self.set_state(TransportState::Idle);
        self.publish_telemetry();
    }
}

/// Cloneable handle to a running [`PlaybackCoordinator`]
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
    telemetry: watch::Receiver<Telemetry>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PlaybackError::CoordinatorClosed)?;
        response
            .await
            .map_err(|_| PlaybackError::CoordinatorClosed)?
    }

    /// Replace the queue and select `start_at`
    ///
    /// An empty list stops playback and returns to idle.
    pub async fn set_queue(
        &self,
        entries: Vec<PlaybackEntry>,
        start_at: usize,
        autoplay: bool,
    ) -> Result<()> {
        self.request(|reply| Command::SetQueue {
            entries,
            start_at,
            autoplay,
            reply,
        })
        .await
    }

    pub async fn replace_with_single(&self, entry: PlaybackEntry, autoplay: bool) -> Result<()> {
        self.request(|reply| Command::ReplaceWithSingle {
            entry,
            autoplay,
            reply,
        })
        .await
    }

    /// Append to the queue; starts it when it was empty and `autoplay_if_idle` is set
    pub async fn enqueue(&self, entry: PlaybackEntry, autoplay_if_idle: bool) -> Result<()> {
        self.request(|reply| Command::Enqueue {
            entry,
            autoplay_if_idle,
            reply,
        })
        .await
    }

    pub async fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply }).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.request(|reply| Command::TogglePlay { reply }).await
    }

    /// Seek within the current entry, clamped to its duration
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::Seek { position, reply }).await
    }

    pub async fn next(&self) -> Result<()> {
        self.request(|reply| Command::Next { reply }).await
    }

    pub async fn prev(&self) -> Result<()> {
        self.request(|reply| Command::Prev { reply }).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.request(|reply| Command::SetRepeat { mode, reply }).await
    }

    pub async fn set_shuffle(&self, on: bool) -> Result<()> {
        self.request(|reply| Command::SetShuffle { on, reply }).await
    }

    /// Replace the equalizer settings, migrating backends if `is_on` changed
    pub async fn set_equalizer(&self, is_on: bool, bands: [BandSetting; BAND_COUNT]) -> Result<()> {
        self.request(|reply| Command::SetEqualizer {
            is_on,
            bands,
            reply,
        })
        .await
    }

    pub async fn set_equalizer_on(&self, is_on: bool) -> Result<()> {
        self.request(|reply| Command::SetEqualizerOn { is_on, reply })
            .await
    }

    pub async fn set_band_gain(&self, slot: usize, gain_db: f64) -> Result<()> {
        self.request(|reply| Command::SetBandGain {
            slot,
            gain_db,
            reply,
        })
        .await
    }

    pub async fn apply_preset(&self, preset: EqPreset) -> Result<()> {
        self.request(|reply| Command::ApplyPreset { preset, reply })
            .await
    }

    /// Freeze reported position while the user drags the seek bar
    pub async fn begin_scrubbing(&self) -> Result<()> {
        self.request(|reply| Command::BeginScrubbing { reply }).await
    }

    pub async fn end_scrubbing(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::EndScrubbing { position, reply })
            .await
    }

    /// Fresh telemetry, computed on request
    pub async fn status(&self) -> Result<Telemetry> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn equalizer(&self) -> Result<EqualizerSettings> {
        self.request(|reply| Command::Equalizer { reply }).await
    }

    /// Telemetry published on every tick and after every command
    pub fn telemetry(&self) -> watch::Receiver<Telemetry> {
        self.telemetry.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Stop the backend and end the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
