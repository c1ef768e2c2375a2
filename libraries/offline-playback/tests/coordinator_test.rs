//! Transport, queue and backend migration through the coordinator handle

mod common;

use common::*;
use offline_audio::effects::{flat_bands, EqPreset};
use offline_playback::{BackendKind, PlaybackError, PlaybackEvent, RepeatMode, TransportState};
use std::sync::atomic::Ordering;
use std::time::Duration;

const TOLERANCE: Duration = Duration::from_millis(500);

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

async fn wait_for_backend(h: &Harness, backend: BackendKind, entry_id: &str) {
    wait_for(&h.handle, |t| {
        t.backend == Some(backend)
            && t.now_playing.as_ref().map(|m| m.entry_id.as_str()) == Some(entry_id)
    })
    .await;
}

#[tokio::test]
async fn autoplay_starts_the_direct_backend() {
    let h = harness();
    h.handle.set_queue(entries(3), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Playing);
    assert!(status.is_playing);
    assert_eq!(status.duration, TRACK_LENGTH);
    assert!(h.host.last_player().playing());
}

#[tokio::test]
async fn without_autoplay_the_entry_is_only_loaded() {
    let h = harness();
    h.handle.set_queue(entries(2), 1, false).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e1").await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Loaded);
    assert!(!h.host.last_player().playing());

    h.handle.toggle_play().await.unwrap();
    assert!(h.host.last_player().playing());
    h.handle.toggle_play().await.unwrap();
    assert_eq!(h.handle.status().await.unwrap().state, TransportState::Paused);
    assert!(!h.host.last_player().playing());
}

#[tokio::test]
async fn enabling_equalizer_migrates_at_the_same_position() {
    let h = harness();
    h.handle.set_queue(entries(3), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    h.handle.seek(secs(30)).await.unwrap();

    let mut events = h.handle.subscribe();
    h.handle.set_equalizer_on(true).await.unwrap();
    wait_for_event(&mut events, |e| {
        matches!(e, PlaybackEvent::BackendChanged { backend: BackendKind::Engine })
    })
    .await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.backend, Some(BackendKind::Engine));
    assert!(approx(status.current_time, secs(30), TOLERANCE), "{:?}", status.current_time);
    assert_eq!(status.state, TransportState::Playing);
    assert!(h.host.player(0).stopped());
    assert_eq!(h.host.sinks.started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn disabling_equalizer_migrates_back() {
    let h = harness();
    h.handle.set_equalizer_on(true).await.unwrap();
    h.handle.set_queue(entries(1), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::Engine, "e0").await;
    h.handle.seek(secs(50)).await.unwrap();

    h.handle.set_equalizer_on(false).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    let status = h.handle.status().await.unwrap();
    assert!(approx(status.current_time, secs(50), TOLERANCE));
    assert!(h.host.last_player().playing());
    assert_eq!(h.host.sinks.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn paused_transport_stays_paused_across_migration() {
    let h = harness();
    h.handle.set_queue(entries(1), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    h.handle.pause().await.unwrap();

    h.handle.set_equalizer_on(true).await.unwrap();
    wait_for_backend(&h, BackendKind::Engine, "e0").await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Paused);
    assert_eq!(h.host.sinks.resumed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn seek_during_migration_is_replayed_on_the_new_backend() {
    let h = harness();
    h.fetcher.close();
    h.handle.set_queue(entries(1), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    h.handle.seek(secs(30)).await.unwrap();

    h.handle.set_equalizer_on(true).await.unwrap();
    h.handle.seek(secs(45)).await.unwrap();

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.backend, Some(BackendKind::DirectStream));
    assert_eq!(status.current_time, secs(45));
    assert!(!h.host.player(0).playing(), "old backend must stay paused");

    h.fetcher.open();
    wait_for_backend(&h, BackendKind::Engine, "e0").await;
    let status = h.handle.status().await.unwrap();
    assert!(approx(status.current_time, secs(45), TOLERANCE), "{:?}", status.current_time);
}

#[tokio::test]
async fn failed_migration_keeps_the_previous_backend() {
    let h = harness();
    h.fetcher.fail_download("t0");
    h.fetcher.fail_fetch("t0");
    h.handle.set_queue(entries(2), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    h.handle.seek(secs(30)).await.unwrap();

    let mut events = h.handle.subscribe();
    h.handle.set_equalizer_on(true).await.unwrap();
    let event = wait_for_event(&mut events, |e| matches!(e, PlaybackEvent::Error { .. })).await;
    match event {
        PlaybackEvent::Error { error } => assert!(matches!(
            *error,
            PlaybackError::BackendMigrationFailed {
                target: BackendKind::Engine,
                ..
            }
        )),
        other => panic!("unexpected event {:?}", other),
    }

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.backend, Some(BackendKind::DirectStream));
    assert_eq!(status.state, TransportState::Playing);
    assert_eq!(status.queue_index, Some(0));
    assert_eq!(status.current_time, secs(30));
    assert!(h.host.player(0).playing());
}

#[tokio::test]
async fn toggling_back_before_migration_completes_resumes_the_old_backend() {
    let h = harness();
    h.fetcher.close();
    h.handle.set_queue(entries(1), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    h.handle.set_equalizer_on(true).await.unwrap();
    assert!(!h.host.player(0).playing());
    h.handle.set_equalizer_on(false).await.unwrap();
    assert!(h.host.player(0).playing());

    h.fetcher.open();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.backend, Some(BackendKind::DirectStream));
    assert_eq!(h.host.sinks.started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unavailable_entry_is_skipped() {
    let h = harness();
    h.fetcher.fail_download("t0");
    h.fetcher.fail_fetch("t0");
    h.handle.set_equalizer_on(true).await.unwrap();

    let mut events = h.handle.subscribe();
    h.handle.set_queue(entries(3), 0, true).await.unwrap();

    let skipped = wait_for_event(&mut events, |e| matches!(e, PlaybackEvent::EntrySkipped { .. })).await;
    assert!(matches!(skipped, PlaybackEvent::EntrySkipped { ref entry_id } if entry_id == "e0"));

    wait_for_backend(&h, BackendKind::Engine, "e1").await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.queue_index, Some(1));
    assert_eq!(status.state, TransportState::Playing);
}

#[tokio::test]
async fn fallback_fetch_still_plays_the_entry() {
    let h = harness();
    h.fetcher.fail_download("t0");
    h.handle.set_equalizer_on(true).await.unwrap();
    h.handle.set_queue(entries(2), 0, true).await.unwrap();

    wait_for_backend(&h, BackendKind::Engine, "e0").await;
    assert_eq!(h.fetcher.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn queue_of_unplayable_entries_pauses() {
    let h = harness();
    for id in ["t0", "t1"] {
        h.catalog.failing.lock().unwrap().insert(id.to_string());
    }
    let mut events = h.handle.subscribe();
    h.handle.set_queue(entries(2), 0, true).await.unwrap();

    wait_for_event(&mut events, |e| {
        matches!(e, PlaybackEvent::EntrySkipped { entry_id } if entry_id == "e1")
    })
    .await;
    let status = wait_for(&h.handle, |t| t.state == TransportState::Paused).await;
    assert_eq!(status.backend, None);
}

#[tokio::test]
async fn engine_start_failure_pauses_transport() {
    let h = harness();
    h.decoder.fail.store(true, Ordering::SeqCst);
    h.handle.set_equalizer_on(true).await.unwrap();

    let mut events = h.handle.subscribe();
    h.handle.set_queue(entries(2), 0, true).await.unwrap();
    let event = wait_for_event(&mut events, |e| matches!(e, PlaybackEvent::Error { .. })).await;
    assert!(matches!(
        event,
        PlaybackEvent::Error { ref error } if matches!(**error, PlaybackError::EngineStartFailed(_))
    ));

    let status = wait_for(&h.handle, |t| t.state == TransportState::Paused).await;
    assert_eq!(status.queue_index, Some(0));

    // Turning the equalizer off recovers on the direct backend
    h.handle.set_equalizer_on(false).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
}

#[tokio::test]
async fn play_after_engine_start_failure_relaunches() {
    let h = harness();
    h.decoder.fail.store(true, Ordering::SeqCst);
    h.handle.set_equalizer_on(true).await.unwrap();
    h.handle.set_queue(entries(2), 0, true).await.unwrap();
    let status = wait_for(&h.handle, |t| t.state == TransportState::Paused).await;
    assert_eq!(status.backend, None);

    h.decoder.fail.store(false, Ordering::SeqCst);
    h.handle.play().await.unwrap();
    wait_for_backend(&h, BackendKind::Engine, "e0").await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Playing);
    assert!(status.is_playing);
    assert_eq!(status.queue_index, Some(0));
    assert_eq!(h.host.sinks.started.load(Ordering::SeqCst), 1);
    assert!(h.host.sinks.resumed.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn play_after_last_entry_was_skipped_relaunches_it() {
    let h = harness();
    h.catalog.failing.lock().unwrap().insert("t1".to_string());
    h.handle.set_queue(entries(2), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    let mut events = h.handle.subscribe();
    h.handle.next().await.unwrap();
    wait_for_event(&mut events, |e| {
        matches!(e, PlaybackEvent::EntrySkipped { entry_id } if entry_id == "e1")
    })
    .await;
    let status = wait_for(&h.handle, |t| t.state == TransportState::Finished).await;
    assert_eq!(status.queue_index, Some(1));
    assert_eq!(status.backend, None);

    h.catalog.failing.lock().unwrap().clear();
    h.handle.play().await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e1").await;

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Playing);
    assert_eq!(status.current_time, Duration::ZERO);
    assert_eq!(h.host.player_count(), 2);
    assert!(h.host.last_player().playing());
}

#[tokio::test]
async fn next_at_end_with_repeat_off_finishes() {
    let h = harness();
    h.handle.set_queue(entries(3), 2, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e2").await;
    h.handle.seek(secs(40)).await.unwrap();

    h.handle.next().await.unwrap();

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Finished);
    assert_eq!(status.queue_index, Some(2));
    assert_eq!(status.current_time, Duration::ZERO);
    assert!(!h.host.last_player().playing());

    // Seeking is ignored once finished; play restarts the entry
    h.handle.seek(secs(10)).await.unwrap();
    assert_eq!(h.handle.status().await.unwrap().current_time, Duration::ZERO);
    h.handle.play().await.unwrap();
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Playing);
    assert_eq!(status.current_time, Duration::ZERO);
}

#[tokio::test]
async fn next_at_end_with_repeat_all_wraps() {
    let h = harness();
    h.handle.set_repeat(RepeatMode::All).await.unwrap();
    h.handle.set_queue(entries(3), 2, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e2").await;

    h.handle.next().await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.queue_index, Some(0));
    assert_eq!(status.state, TransportState::Playing);
    assert!(h.host.player(0).stopped());
}

#[tokio::test]
async fn prev_restarts_after_threshold_then_moves_back() {
    let h = harness();
    h.handle.set_queue(entries(3), 1, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e1").await;
    h.handle.seek(secs(10)).await.unwrap();

    h.handle.prev().await.unwrap();
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.queue_index, Some(1));
    assert_eq!(status.current_time, Duration::ZERO);

    h.handle.prev().await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    // At the first entry with repeat off, prev only rewinds
    h.handle.seek(secs(2)).await.unwrap();
    h.handle.prev().await.unwrap();
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.queue_index, Some(0));
    assert_eq!(status.current_time, Duration::ZERO);
    assert_eq!(status.state, TransportState::Playing);
}

#[tokio::test]
async fn seek_is_clamped_to_duration() {
    let h = harness();
    h.handle.set_queue(entries(1), 0, false).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    h.handle.seek(secs(500)).await.unwrap();
    assert_eq!(h.handle.status().await.unwrap().current_time, TRACK_LENGTH);
}

#[tokio::test]
async fn natural_end_advances_or_repeats() {
    let h = harness();
    h.handle.set_queue(entries(2), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    h.host.last_player().finish();
    wait_for_backend(&h, BackendKind::DirectStream, "e1").await;

    h.handle.set_repeat(RepeatMode::One).await.unwrap();
    let player = h.host.last_player();
    player.finish();
    wait_for(&h.handle, |t| t.current_time == Duration::ZERO).await;
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.queue_index, Some(1));
    assert!(player.playing());

    h.handle.set_repeat(RepeatMode::Off).await.unwrap();
    player.finish();
    let status = wait_for(&h.handle, |t| t.state == TransportState::Finished).await;
    assert_eq!(status.queue_index, Some(1));
}

#[tokio::test]
async fn superseded_load_never_starts() {
    let h = harness();
    h.fetcher.close();
    h.handle.set_equalizer_on(true).await.unwrap();
    h.handle.set_queue(entries(3), 0, true).await.unwrap();
    h.handle.next().await.unwrap();

    h.fetcher.open();
    wait_for_backend(&h, BackendKind::Engine, "e1").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.host.sinks.started.load(Ordering::SeqCst), 1);
    assert_eq!(h.handle.status().await.unwrap().queue_index, Some(1));
}

#[tokio::test]
async fn scrubbing_freezes_reported_position() {
    let h = harness();
    h.handle.set_queue(entries(1), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    h.handle.seek(secs(10)).await.unwrap();

    h.handle.begin_scrubbing().await.unwrap();
    h.host.last_player().advance_to(secs(50));
    assert_eq!(h.handle.status().await.unwrap().current_time, secs(10));

    h.handle.end_scrubbing(secs(70)).await.unwrap();
    assert_eq!(h.handle.status().await.unwrap().current_time, secs(70));
    assert_eq!(h.host.last_player().position(), secs(70));
}

#[tokio::test]
async fn enqueue_into_empty_queue_starts_playback() {
    let h = harness();
    h.handle
        .enqueue(entries(1).remove(0), true)
        .await
        .unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    assert_eq!(h.handle.status().await.unwrap().state, TransportState::Playing);

    h.handle.enqueue(entries(2).remove(1), true).await.unwrap();
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.queue_index, Some(0));
    assert_eq!(h.host.player_count(), 1);
}

#[tokio::test]
async fn empty_queue_is_idle() {
    let h = harness();
    assert!(matches!(h.handle.play().await, Err(PlaybackError::QueueEmpty)));
    assert!(matches!(h.handle.next().await, Err(PlaybackError::QueueEmpty)));
    assert!(matches!(
        h.handle.seek(secs(1)).await,
        Err(PlaybackError::NoTrackLoaded)
    ));

    h.handle.set_queue(entries(2), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;
    h.handle.set_queue(Vec::new(), 0, true).await.unwrap();

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.state, TransportState::Idle);
    assert_eq!(status.backend, None);
    assert!(h.host.player(0).stopped());
}

#[tokio::test]
async fn set_queue_rejects_out_of_range_start() {
    let h = harness();
    assert!(matches!(
        h.handle.set_queue(entries(2), 5, true).await,
        Err(PlaybackError::IndexOutOfBounds(5))
    ));
    assert_eq!(h.handle.status().await.unwrap().state, TransportState::Idle);
}

#[tokio::test]
async fn equalizer_changes_are_validated_and_broadcast() {
    let h = harness();
    let mut events = h.handle.subscribe();

    h.handle.apply_preset(EqPreset::find("rock").unwrap()).await.unwrap();
    let event = wait_for_event(&mut events, |e| matches!(e, PlaybackEvent::EqualizerChanged { .. })).await;
    match event {
        PlaybackEvent::EqualizerChanged { settings, .. } => {
            assert!(!settings.is_on);
            assert_eq!(settings.bands[0].gain_db, 3.0);
        }
        other => panic!("unexpected event {:?}", other),
    }

    assert!(matches!(
        h.handle.set_band_gain(2, 20.0).await,
        Err(PlaybackError::Audio(_))
    ));
    assert_eq!(h.handle.equalizer().await.unwrap().bands[2].gain_db, -2.0);

    let mut bands = flat_bands();
    bands[3] = bands[3].with_gain(6.0);
    h.handle.set_equalizer(true, bands).await.unwrap();
    let settings = h.handle.equalizer().await.unwrap();
    assert!(settings.is_on);
    assert_eq!(settings.bands[3].gain_db, 6.0);
}

#[tokio::test]
async fn shutdown_closes_the_handle() {
    let h = harness();
    h.handle.set_queue(entries(1), 0, true).await.unwrap();
    wait_for_backend(&h, BackendKind::DirectStream, "e0").await;

    h.handle.shutdown().await.unwrap();
    assert!(h.host.player(0).stopped());
    assert!(matches!(
        h.handle.play().await,
        Err(PlaybackError::CoordinatorClosed)
    ));
}
