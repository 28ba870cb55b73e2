//! Producer/consumer drive loops and throughput reporting.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use lfq_core::{
    retry, retry_push, spawn_pinned, AffinityProvider, Backoff, BackoffStep, BenchConfig,
    EngineKind, LfqError, PlatformAffinity, Result, StorageKind,
};
#[cfg(unix)]
use lfq_dsa::MmapStorage;
use lfq_dsa::{
    split, BoundedChannel, Consumer, CountedQueue, CursorQueue, HeapStorage, Producer,
    StorageProvider,
};

use crate::payload::{payload_rng, random_string};
use crate::timer::Timer;

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub engine: EngineKind,
    pub storage: StorageKind,
    pub operations: usize,
    pub capacity: usize,
    pub payload_len: usize,
    pub elapsed: Duration,
    pub ops_per_sec: f64,
    pub delivered: usize,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} elapsed time: {:.6} s", self.engine, self.elapsed.as_secs_f64())?;
        write!(f, "Operations per second: {:.0}", self.ops_per_sec)
    }
}

/// Shared stop signal: whichever side fails first makes the other give up
/// instead of spinning on a queue nobody will ever service.
#[derive(Clone, Default)]
struct Abort(Arc<AtomicBool>);

impl Abort {
    fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Abortable<B> {
    inner: B,
    abort: Abort,
}

impl<B: Backoff> Backoff for Abortable<B> {
    #[inline(always)]
    fn snooze(&mut self) -> BackoffStep {
        if self.abort.raised() {
            return BackoffStep::GiveUp;
        }
        self.inner.snooze()
    }

    #[inline(always)]
    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Holds both sides until the driver has started its timer.
#[derive(Clone, Default)]
struct StartGate(Arc<AtomicBool>);

impl StartGate {
    fn open(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn wait(&self, abort: &Abort) -> Result<()> {
        while !self.0.load(Ordering::Acquire) {
            if abort.raised() {
                return Err(LfqError::RetriesExhausted { attempts: 0 });
            }
            std::thread::yield_now();
        }
        Ok(())
    }
}

/// Runs every engine listed in `config.engines`, in order.
pub fn run_all(config: &BenchConfig) -> Result<Vec<BenchReport>> {
    config.engines.iter().map(|&kind| run(kind, config)).collect()
}

pub fn run_counted(config: &BenchConfig) -> Result<BenchReport> {
    run(EngineKind::Counted, config)
}

pub fn run_cursor(config: &BenchConfig) -> Result<BenchReport> {
    run(EngineKind::Cursor, config)
}

/// Builds the requested engine over the configured storage and drives it.
pub fn run(kind: EngineKind, config: &BenchConfig) -> Result<BenchReport> {
    config.validate()?;
    let affinity = PlatformAffinity::default();

    match config.storage {
        StorageKind::Heap => run_on(kind, HeapStorage, config, &affinity),
        #[cfg(unix)]
        StorageKind::Mmap => run_on(kind, MmapStorage::new(), config, &affinity),
        #[cfg(unix)]
        StorageKind::HugeMmap => run_on(kind, MmapStorage::with_huge_pages(), config, &affinity),
        #[cfg(not(unix))]
        storage => Err(LfqError::Config(format!(
            "{:?} storage is not available on this platform",
            storage
        ))),
    }
}

fn run_on<S, A>(
    kind: EngineKind,
    storage: S,
    config: &BenchConfig,
    affinity: &A,
) -> Result<BenchReport>
where
    S: StorageProvider + Send + 'static,
    A: AffinityProvider,
{
    let capacity = config.capacity;
    match kind {
        EngineKind::Counted => {
            let queue: CountedQueue<String, S> = CountedQueue::with_storage(capacity, storage)?;
            drive(kind, queue, config, affinity)
        }
        EngineKind::CountedTwoPhase => {
            let queue: CountedQueue<String, S> = CountedQueue::with_storage(capacity, storage)?;
            drive_two_phase(queue, config, affinity)
        }
        EngineKind::Cursor => {
            let queue: CursorQueue<String, S> = CursorQueue::with_storage(capacity, storage)?;
            drive(kind, queue, config, affinity)
        }
    }
}

/// Spawns a producer pushing `config.operations` random strings and a
/// consumer popping as many, then times them from release to join.
pub fn drive<C, A>(
    kind: EngineKind,
    channel: C,
    config: &BenchConfig,
    affinity: &A,
) -> Result<BenchReport>
where
    C: BoundedChannel<Item = String> + 'static,
    A: AffinityProvider,
{
    drive_with(kind, channel, config, affinity, |tx, v| tx.push(v), |rx, out| rx.pop_into(out))
}

/// Drives a `CountedQueue` through its reserve/commit path.
///
/// The producer waits for `size() < capacity()`, constructs the payload in
/// the reserved slot and commits it. The consumer moves the payload out of
/// the readable slot and commits the read.
pub fn drive_two_phase<S, A>(
    channel: CountedQueue<String, S>,
    config: &BenchConfig,
    affinity: &A,
) -> Result<BenchReport>
where
    S: StorageProvider + Send + 'static,
    A: AffinityProvider,
{
    drive_with(
        EngineKind::CountedTwoPhase,
        channel,
        config,
        affinity,
        |tx, value| {
            if tx.is_full() {
                return Err(value);
            }
            // # Safety: the queue is not full and this is the only producer end.
            unsafe {
                tx.next_write_slot().write(value);
                tx.commit_write();
            }
            Ok(())
        },
        |rx, out| match rx.next_read_slot() {
            Some(slot) => {
                // # Safety: the slot is published and moved out exactly once.
                unsafe {
                    *out = slot.as_ptr().read();
                    rx.commit_read();
                }
                true
            }
            None => false,
        },
    )
}

fn drive_with<C, A, P, Q>(
    kind: EngineKind,
    channel: C,
    config: &BenchConfig,
    affinity: &A,
    mut send: P,
    mut recv: Q,
) -> Result<BenchReport>
where
    C: BoundedChannel<Item = String> + 'static,
    A: AffinityProvider,
    P: FnMut(&mut Producer<C>, String) -> core::result::Result<(), String> + Send + 'static,
    Q: FnMut(&mut Consumer<C>, &mut String) -> bool + Send + 'static,
{
    let operations = config.operations;
    let payload_len = config.payload_len;
    let capacity = channel.capacity();
    let seed = config.seed;

    tracing::info!(
        "--- Benchmarking {} engine ({} ops, capacity {}, {}-byte payloads) ---",
        kind,
        operations,
        capacity,
        payload_len
    );

    let (mut tx, mut rx) = split(channel);
    let abort = Abort::default();
    let gate = StartGate::default();

    let producer = {
        let abort = abort.clone();
        let gate = gate.clone();
        let mut backoff = Abortable { inner: config.backoff_policy(), abort: abort.clone() };
        spawn_pinned("producer", config.producer_pin(), affinity, move || -> Result<usize> {
            gate.wait(&abort)?;
            let mut rng = payload_rng(seed);
            for _ in 0..operations {
                let value = random_string(&mut rng, payload_len);
                if let Err(e) = retry_push(&mut backoff, value, |v| send(&mut tx, v)) {
                    abort.raise();
                    return Err(e);
                }
            }
            Ok(operations)
        })?
    };

    let consumer = {
        let abort = abort.clone();
        let gate = gate.clone();
        let mut backoff = Abortable { inner: config.backoff_policy(), abort: abort.clone() };
        let consumer_pin = config.consumer_pin();
        let thread_abort = abort.clone();
        let spawned = spawn_pinned("consumer", consumer_pin, affinity, move || -> Result<usize> {
            let abort = thread_abort;
            gate.wait(&abort)?;
            let mut value = String::new();
            let mut delivered = 0;
            for _ in 0..operations {
                if let Err(e) = retry(&mut backoff, || recv(&mut rx, &mut value).then_some(())) {
                    abort.raise();
                    return Err(e);
                }
                delivered += 1;
            }
            Ok(delivered)
        });
        match spawned {
            Ok(consumer) => consumer,
            Err(e) => {
                abort.raise();
                let _ = producer.join();
                return Err(e);
            }
        }
    };

    let timer = Timer::start();
    gate.open();
    let produced = producer.join().and_then(|r| r);
    if produced.is_err() {
        abort.raise();
    }
    let delivered = consumer.join().and_then(|r| r);
    let elapsed = timer.elapsed();

    produced?;
    let delivered = delivered?;

    let report = BenchReport {
        engine: kind,
        storage: config.storage,
        operations,
        capacity,
        payload_len,
        elapsed,
        ops_per_sec: operations as f64 / elapsed.as_secs_f64().max(f64::MIN_POSITIVE),
        delivered,
    };
    tracing::info!(
        "{} engine: {:.6} s, {:.0} ops/s",
        report.engine,
        report.elapsed.as_secs_f64(),
        report.ops_per_sec
    );
    Ok(report)
}
