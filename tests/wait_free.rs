//! Certifies that refused pushes and empty pops never park the calling thread.
#![cfg(target_os = "linux")]

use lfq_dsa::{BoundedChannel, CountedQueue, CursorQueue};
use perf_event::events::Software;
use perf_event::{Builder, Counter};

const CYCLES: usize = 1_000_000;

fn context_switch_counter() -> Option<Counter> {
    // Requires CAP_SYS_ADMIN or /proc/sys/kernel/perf_event_paranoid <= 2.
    match Builder::new().kind(Software::CONTEXT_SWITCHES).build() {
        Ok(counter) => Some(counter),
        Err(e) => {
            println!("Skipping wait-free certification: perf counter unavailable ({})", e);
            None
        }
    }
}

fn certify_non_blocking<C: BoundedChannel<Item = u64>>(label: &str, q: C) {
    for i in 0..q.capacity() as u64 {
        assert!(q.push(i).is_ok());
    }

    let Some(mut counter) = context_switch_counter() else {
        return;
    };
    counter.enable().unwrap();

    // 1. Saturated: every push is refused immediately.
    for i in 0..CYCLES as u64 {
        assert!(q.push(i).is_err());
    }

    // 2. Drained: every pop reports empty immediately.
    while q.pop().is_some() {}
    for _ in 0..CYCLES {
        assert!(q.pop().is_none());
    }

    counter.disable().unwrap();
    let switches = counter.read().unwrap();

    println!(
        "{}: context switches during {} refused pushes and empty pops: {}",
        label,
        2 * CYCLES,
        switches
    );
    // Small allowance for background kernel activity.
    assert!(switches < 50, "{} blocked: {} context switches detected", label, switches);
}

#[test]
fn test_cursor_queue_never_blocks() {
    certify_non_blocking("CursorQueue", CursorQueue::<u64>::new(1024).unwrap());
}

#[test]
fn test_counted_queue_never_blocks() {
    certify_non_blocking("CountedQueue", CountedQueue::<u64>::new(1024).unwrap());
}
