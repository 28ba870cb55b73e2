//! Caller-side retry policies.
//!
//! The engines never wait. A caller that wants to wait for space or data
//! loops on `push`/`pop` and asks a [`Backoff`] what to do between attempts.

use std::thread;
use std::time::Duration;

use crate::error::{LfqError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    Retry,
    GiveUp,
}

pub trait Backoff {
    /// Waits between two failed attempts.
    fn snooze(&mut self) -> BackoffStep;

    /// Called after a successful attempt.
    fn reset(&mut self);
}

/// Pure busy-wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct Spin;

impl Backoff for Spin {
    #[inline(always)]
    fn snooze(&mut self) -> BackoffStep {
        core::hint::spin_loop();
        BackoffStep::Retry
    }

    #[inline(always)]
    fn reset(&mut self) {}
}

/// Spins, then yields the core, then sleeps with exponential growth.
#[derive(Debug, Clone)]
pub struct SpinYield {
    spin_limit: u32,
    yield_limit: u32,
    max_sleep: Duration,
    step: u32,
    sleep: Duration,
}

const MIN_SLEEP: Duration = Duration::from_micros(1);

impl SpinYield {
    pub fn new(spin_limit: u32, yield_limit: u32, max_sleep: Duration) -> Self {
        Self {
            spin_limit,
            yield_limit,
            max_sleep,
            step: 0,
            sleep: MIN_SLEEP,
        }
    }

    /// Current sleep interval once spinning and yielding are exhausted.
    pub fn current_sleep(&self) -> Duration {
        self.sleep
    }
}

impl Default for SpinYield {
    fn default() -> Self {
        Self::new(64, 16, Duration::from_millis(1))
    }
}

impl Backoff for SpinYield {
    fn snooze(&mut self) -> BackoffStep {
        if self.step < self.spin_limit {
            core::hint::spin_loop();
        } else if self.step < self.spin_limit.saturating_add(self.yield_limit) {
            thread::yield_now();
        } else {
            thread::sleep(self.sleep);
            self.sleep = (self.sleep * 2).min(self.max_sleep);
        }
        self.step = self.step.saturating_add(1);
        BackoffStep::Retry
    }

    fn reset(&mut self) {
        self.step = 0;
        self.sleep = MIN_SLEEP;
    }
}

/// Gives up after `limit` consecutive failed attempts.
#[derive(Debug, Clone)]
pub struct Bounded<B> {
    inner: B,
    limit: u64,
    attempts: u64,
}

impl<B: Backoff> Bounded<B> {
    pub fn new(inner: B, limit: u64) -> Self {
        Self { inner, limit, attempts: 0 }
    }

    pub fn unbounded(inner: B) -> Self {
        Self::new(inner, u64::MAX)
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl<B: Backoff> Backoff for Bounded<B> {
    #[inline(always)]
    fn snooze(&mut self) -> BackoffStep {
        if self.attempts >= self.limit {
            return BackoffStep::GiveUp;
        }
        self.attempts += 1;
        self.inner.snooze()
    }

    #[inline(always)]
    fn reset(&mut self) {
        self.attempts = 0;
        self.inner.reset();
    }
}

/// Retries `attempt` until it yields a value or the policy gives up.
pub fn retry<B, R>(backoff: &mut B, mut attempt: impl FnMut() -> Option<R>) -> Result<R>
where
    B: Backoff,
{
    let mut attempts = 0u64;
    loop {
        if let Some(value) = attempt() {
            backoff.reset();
            return Ok(value);
        }
        attempts += 1;
        if backoff.snooze() == BackoffStep::GiveUp {
            tracing::warn!("Backoff: giving up after {} attempts", attempts);
            return Err(LfqError::RetriesExhausted { attempts });
        }
    }
}

/// Retries a push that hands its value back on refusal.
///
/// The value is dropped if the policy gives up.
pub fn retry_push<B, V>(
    backoff: &mut B,
    value: V,
    mut push: impl FnMut(V) -> core::result::Result<(), V>,
) -> Result<()>
where
    B: Backoff,
{
    let mut pending = value;
    let mut attempts = 0u64;
    loop {
        match push(pending) {
            Ok(()) => {
                backoff.reset();
                return Ok(());
            }
            Err(back) => pending = back,
        }
        attempts += 1;
        if backoff.snooze() == BackoffStep::GiveUp {
            tracing::warn!("Backoff: push abandoned after {} attempts", attempts);
            return Err(LfqError::RetriesExhausted { attempts });
        }
    }
}
