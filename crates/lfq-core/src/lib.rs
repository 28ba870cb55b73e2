pub mod affinity;
pub mod backoff;
pub mod config;
pub mod error;
pub mod thread;

pub use affinity::{AffinityProvider, CoreAffinity, NoAffinity, PlatformAffinity};
pub use backoff::{retry, retry_push, Backoff, BackoffStep, Bounded, Spin, SpinYield};
pub use config::{BackoffConfig, BackoffPolicy, BenchConfig, EngineKind, ReportFormat, StorageKind};
pub use error::{LfqError, Result};
pub use thread::{spawn_pinned, PinnedThread};
