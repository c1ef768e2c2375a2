//! Property tests for queue stepping

use offline_playback::{PlaybackEntry, PlaybackQueue, QueueStep, RepeatMode};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn entries(n: usize) -> Vec<PlaybackEntry> {
    (0..n)
        .map(|i| PlaybackEntry::remote(format!("e{}", i), format!("t{}", i), "Song", "Artist"))
        .collect()
}

fn repeat_mode() -> impl Strategy<Value = RepeatMode> {
    prop_oneof![
        Just(RepeatMode::Off),
        Just(RepeatMode::One),
        Just(RepeatMode::All)
    ]
}

proptest! {
    #[test]
    fn current_index_stays_in_bounds(
        len in 1usize..20,
        start in 0usize..20,
        shuffle in any::<bool>(),
        repeat in repeat_mode(),
        moves in prop::collection::vec(any::<bool>(), 0..64),
        seed in any::<u64>(),
    ) {
        let start = start % len;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut queue = PlaybackQueue::with_modes(shuffle, repeat);
        queue.set_entries(entries(len), start).unwrap();

        for forward in moves {
            let step = if forward {
                queue.step_forward(&mut rng)
            } else {
                queue.step_back(&mut rng)
            };
            prop_assert_ne!(step, QueueStep::Empty);
            let current = queue.current_index().unwrap();
            prop_assert!(current < len);
            if let QueueStep::Moved(index) = step {
                prop_assert_eq!(index, current);
            }
        }
    }

    #[test]
    fn repeat_all_never_hits_a_boundary(len in 1usize..20, start in 0usize..20, steps in 1usize..64) {
        let start = start % len;
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = PlaybackQueue::with_modes(false, RepeatMode::All);
        queue.set_entries(entries(len), start).unwrap();

        for i in 1..=steps {
            prop_assert_eq!(queue.step_forward(&mut rng), QueueStep::Moved((start + i) % len));
        }
    }

    #[test]
    fn repeat_off_stops_at_the_last_entry(len in 1usize..20, start in 0usize..20) {
        let start = start % len;
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = PlaybackQueue::new();
        queue.set_entries(entries(len), start).unwrap();

        for _ in start + 1..len {
            prop_assert!(matches!(queue.step_forward(&mut rng), QueueStep::Moved(_)));
        }
        prop_assert_eq!(queue.step_forward(&mut rng), QueueStep::AtBoundary);
        prop_assert_eq!(queue.current_index(), Some(len - 1));
    }
}
