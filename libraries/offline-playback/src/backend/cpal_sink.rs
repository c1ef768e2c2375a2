//! Desktop output sink using CPAL
//!
//! `cpal::Stream` is not `Send`, so each sink owns a dedicated thread that
//! builds the stream, keeps it alive and applies pause/resume/stop commands
//! received over a crossbeam channel.

use super::host::{AudioSink, RenderCallback};
use crate::error::{PlaybackError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use offline_audio::StreamFormat;
use std::thread::JoinHandle;
use tracing::{error, warn};

/// Commands sent to the stream thread
#[derive(Debug, Clone, Copy)]
enum SinkCommand {
    Pause,
    Resume,
    Stop,
}

/// Output to the default device of the default host
#[derive(Default)]
pub struct CpalSink {
    commands: Option<Sender<SinkCommand>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&self, command: SinkCommand) {
        if let Some(tx) = &self.commands {
            if tx.send(command).is_err() {
                warn!(?command, "Audio stream thread is gone");
            }
        }
    }
}

impl AudioSink for CpalSink {
    fn start(&mut self, format: StreamFormat, mut render: RenderCallback) -> Result<()> {
        self.stop();

        let (command_tx, command_rx) = bounded::<SinkCommand>(8);
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);

        let thread = std::thread::Builder::new()
            .name("offline-player-output".to_string())
            .spawn(move || {
                let stream = (|| -> std::result::Result<cpal::Stream, String> {
                    let host = cpal::default_host();
                    let device = host
                        .default_output_device()
                        .ok_or_else(|| "no default output device".to_string())?;
                    let config = cpal::StreamConfig {
                        channels: format.channels,
                        sample_rate: format.sample_rate,
                        buffer_size: cpal::BufferSize::Default,
                    };
                    let stream = device
                        .build_output_stream(
                            &config,
                            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| render(data),
                            |err| error!(error = %err, "Audio stream error"),
                            None,
                        )
                        .map_err(|e| e.to_string())?;
                    stream.play().map_err(|e| e.to_string())?;
                    Ok(stream)
                })();

                let stream = match stream {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(command) = command_rx.recv() {
                    let result = match command {
                        SinkCommand::Pause => stream.pause().map_err(|e| e.to_string()),
                        SinkCommand::Resume => stream.play().map_err(|e| e.to_string()),
                        SinkCommand::Stop => break,
                    };
                    if let Err(e) = result {
                        warn!(?command, error = %e, "Audio stream command failed");
                    }
                }
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.commands = Some(command_tx);
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(PlaybackError::EngineStartFailed(e))
            }
            Err(_) => {
                let _ = thread.join();
                Err(PlaybackError::EngineStartFailed(
                    "audio stream thread exited".to_string(),
                ))
            }
        }
    }

    fn pause(&mut self) {
        self.send(SinkCommand::Pause);
    }

    fn resume(&mut self) {
        self.send(SinkCommand::Resume);
    }

    fn stop(&mut self) {
        self.send(SinkCommand::Stop);
        self.commands = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio stream thread panicked");
            }
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.stop();
    }
}
