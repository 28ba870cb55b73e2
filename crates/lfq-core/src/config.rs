use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::{Backoff, BackoffStep, Bounded, Spin, SpinYield};
use crate::error::{LfqError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Index/counter design driven through `push`/`pop`.
    Counted,
    /// Index/counter design driven through its reserve/commit slot API.
    CountedTwoPhase,
    /// Cursor-difference design.
    Cursor,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Counted => write!(f, "counted"),
            EngineKind::CountedTwoPhase => write!(f, "counted-two-phase"),
            EngineKind::Cursor => write!(f, "cursor"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Heap,
    Mmap,
    HugeMmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffConfig {
    Spin,
    SpinYield {
        spin_limit: u32,
        yield_limit: u32,
        max_sleep_us: u64,
    },
}

/// A backoff built from configuration.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    Spin(Spin),
    SpinYield(SpinYield),
}

impl Backoff for BackoffPolicy {
    #[inline(always)]
    fn snooze(&mut self) -> BackoffStep {
        match self {
            BackoffPolicy::Spin(b) => b.snooze(),
            BackoffPolicy::SpinYield(b) => b.snooze(),
        }
    }

    #[inline(always)]
    fn reset(&mut self) {
        match self {
            BackoffPolicy::Spin(b) => b.reset(),
            BackoffPolicy::SpinYield(b) => b.reset(),
        }
    }
}

impl BackoffConfig {
    pub fn build(&self, max_attempts: Option<u64>) -> Bounded<BackoffPolicy> {
        let policy = match *self {
            BackoffConfig::Spin => BackoffPolicy::Spin(Spin),
            BackoffConfig::SpinYield { spin_limit, yield_limit, max_sleep_us } => {
                let max_sleep = Duration::from_micros(max_sleep_us);
                BackoffPolicy::SpinYield(SpinYield::new(spin_limit, yield_limit, max_sleep))
            }
        };
        match max_attempts {
            Some(limit) => Bounded::new(policy, limit),
            None => Bounded::unbounded(policy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub operations: usize,
    pub capacity: usize,
    pub payload_len: usize,
    pub pin_threads: bool,
    pub producer_core: Option<usize>,
    pub consumer_core: Option<usize>,
    pub engines: Vec<EngineKind>,
    pub storage: StorageKind,
    pub backoff: BackoffConfig,
    /// Consecutive failed attempts after which a drive loop gives up.
    pub max_attempts: Option<u64>,
    pub report: ReportFormat,
    pub seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let (producer_core, consumer_core) = if num_cpus::get() >= 2 {
            (Some(0), Some(1))
        } else {
            (None, None)
        };

        Self {
            operations: 5_000_000,
            capacity: 1024,
            payload_len: 128,
            pin_threads: true,
            producer_core,
            consumer_core,
            engines: vec![EngineKind::Counted, EngineKind::Cursor],
            storage: StorageKind::Heap,
            backoff: BackoffConfig::Spin,
            max_attempts: None,
            report: ReportFormat::Text,
            seed: None,
        }
    }
}

impl BenchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: BenchConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        tracing::debug!("BenchConfig: loading {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(LfqError::Config("capacity must be positive".into()));
        }
        if self.operations == 0 {
            return Err(LfqError::Config("operations must be positive".into()));
        }
        if self.payload_len == 0 {
            return Err(LfqError::Config("payload_len must be positive".into()));
        }
        if self.engines.is_empty() {
            return Err(LfqError::Config("at least one engine must be selected".into()));
        }
        if self.max_attempts == Some(0) {
            return Err(LfqError::Config("max_attempts must be positive when set".into()));
        }
        Ok(())
    }

    /// Core for the producer thread, or `None` when pinning is disabled.
    pub fn producer_pin(&self) -> Option<usize> {
        self.producer_core.filter(|_| self.pin_threads)
    }

    pub fn consumer_pin(&self) -> Option<usize> {
        self.consumer_core.filter(|_| self.pin_threads)
    }

    pub fn backoff_policy(&self) -> Bounded<BackoffPolicy> {
        self.backoff.build(self.max_attempts)
    }
}
