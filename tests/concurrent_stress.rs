//! # Concurrent Stress Audit
//!
//! One producer pushes 5,000,000 fixed-length random values while one
//! consumer pops concurrently. Every value must arrive exactly once, in order.
//! The consumer regenerates the producer's seeded stream to check contents.

use lfq_core::{retry, retry_push, spawn_pinned, Bounded, NoAffinity, SpinYield};
use lfq_dsa::{split, BoundedChannel, CountedQueue, CursorQueue};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

const M: u64 = 5_000_000;
const CAPACITY: usize = 1024;
const SEED: u64 = 0x5EED_F00D;

/// Fixed-length payload: sequence number plus 24 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Packet {
    seq: u64,
    noise: [u64; 3],
}

fn next_packet(rng: &mut ChaCha8Rng, seq: u64) -> Packet {
    Packet {
        seq,
        noise: [rng.next_u64(), rng.next_u64(), rng.next_u64()],
    }
}

/// Generous enough to survive a loaded CI box, bounded so a lost element
/// fails the test instead of hanging it.
fn backoff() -> Bounded<SpinYield> {
    Bounded::new(SpinYield::new(128, 64, Duration::from_micros(200)), 2_000_000)
}

fn stress<C>(queue: C)
where
    C: BoundedChannel<Item = Packet> + 'static,
{
    let t = Instant::now();
    let (mut tx, mut rx) = split(queue);

    let producer = spawn_pinned("stress-producer", None, &NoAffinity, move || {
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let mut backoff = backoff();
        for seq in 0..M {
            retry_push(&mut backoff, next_packet(&mut rng, seq), |p| tx.push(p))?;
        }
        Ok::<_, lfq_core::LfqError>(())
    })
    .unwrap();

    let consumer = spawn_pinned("stress-consumer", None, &NoAffinity, move || {
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let mut backoff = backoff();
        for seq in 0..M {
            let got = retry(&mut backoff, || rx.pop())?;
            let expected = next_packet(&mut rng, seq);
            assert_eq!(got, expected, "element {} corrupted, duplicated or reordered", seq);
        }
        assert!(rx.pop().is_none(), "fabricated element after the last push");
        Ok::<_, lfq_core::LfqError>(())
    })
    .unwrap();

    producer.join().unwrap().unwrap();
    consumer.join().unwrap().unwrap();
    println!("Stress Audit: {} packets delivered in order in {:?}", M, t.elapsed());
}

#[test]
fn test_cursor_queue_five_million_in_order() {
    stress(CursorQueue::<Packet>::new(CAPACITY).unwrap());
}

#[test]
fn test_counted_queue_five_million_in_order() {
    stress(CountedQueue::<Packet>::new(CAPACITY).unwrap());
}

#[test]
fn test_heap_payloads_survive_handoff() {
    // Owned heap payloads catch use-after-move and double-drop bugs that
    // Copy payloads cannot.
    let (mut tx, mut rx) = split(CursorQueue::<String>::new(64).unwrap());
    let producer = std::thread::spawn(move || {
        let mut backoff = backoff();
        for i in 0..200_000u32 {
            retry_push(&mut backoff, format!("{:08}", i), |s| tx.push(s)).unwrap();
        }
    });

    let mut backoff = backoff();
    for i in 0..200_000u32 {
        let s = retry(&mut backoff, || rx.pop()).unwrap();
        assert_eq!(s, format!("{:08}", i));
    }
    producer.join().unwrap();
}
