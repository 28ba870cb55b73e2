//! Exhaustive interleaving checks.
//!
//! Run with `RUSTFLAGS="--cfg loom" cargo test -p lfq-dsa --release --test loom_models`.
#![cfg(loom)]

use lfq_dsa::{split, BoundedChannel, CountedQueue, CursorQueue, HeapStorage, RelaxedPeerLoad};
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::sync::Arc;
use loom::thread;

const ITEMS: u32 = 3;

/// Pushes `ITEMS` values through a capacity-2 engine, so the producer has to
/// observe at least one full queue and retry.
fn fifo_model<C>(make: fn() -> C)
where
    C: BoundedChannel<Item = u32> + 'static,
{
    loom::model(move || {
        let (mut tx, mut rx) = split(make());

        let producer = thread::spawn(move || {
            for i in 0..ITEMS {
                let mut pending = i;
                loop {
                    match tx.push(pending) {
                        Ok(()) => break,
                        Err(back) => {
                            pending = back;
                            thread::yield_now();
                        }
                    }
                }
            }
        });

        let mut received = Vec::new();
        while received.len() < ITEMS as usize {
            match rx.pop() {
                Some(v) => received.push(v),
                None => thread::yield_now(),
            }
        }

        producer.join().unwrap();
        assert_eq!(received, vec![0, 1, 2]);
        assert!(rx.is_empty());
    });
}

#[test]
fn loom_cursor_fifo_with_backpressure() {
    fifo_model(|| CursorQueue::<u32>::new(2).unwrap());
}

#[test]
fn loom_counted_fifo_with_backpressure() {
    fifo_model(|| CountedQueue::<u32>::new(2).unwrap());
}

struct Tracked(Arc<AtomicUsize>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn loom_cursor_teardown_races_with_consumer() {
    loom::model(|| {
        let drops = Arc::new(AtomicUsize::new(0));
        let (mut tx, mut rx) = split(CursorQueue::<Tracked>::new(2).unwrap());

        let producer = {
            let drops = drops.clone();
            thread::spawn(move || {
                assert!(tx.push(Tracked(drops.clone())).is_ok());
                assert!(tx.push(Tracked(drops)).is_ok());
            })
        };

        let popped = rx.pop().is_some();
        producer.join().unwrap();
        drop(rx);

        // Every constructed element is destroyed exactly once: by the
        // consumer (when popped) or by teardown.
        assert_eq!(drops.load(Ordering::Relaxed), 2, "popped: {}", popped);
    });
}

#[test]
#[should_panic(expected = "Causality violation")]
fn loom_relaxed_peer_load_is_flagged() {
    loom::model(|| {
        let queue: CursorQueue<String, HeapStorage, RelaxedPeerLoad> =
            CursorQueue::with_storage(1, HeapStorage).unwrap();
        let (mut tx, mut rx) = split(queue);

        let producer = thread::spawn(move || {
            tx.push("published".to_string()).unwrap();
        });

        // Seeing the new push cursor without Acquire does not order the
        // producer's payload write before this read.
        if let Some(value) = rx.pop() {
            assert_eq!(value, "published");
        }
        producer.join().unwrap();
    });
}
