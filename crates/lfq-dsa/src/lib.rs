//! # lfq-dsa: Lock-free SPSC engines
//!
//! Two bounded single-producer/single-consumer rings sharing one slot arena:
//!
//! - [`CountedQueue`]: per-side indices reduced modulo capacity plus a shared
//!   element count, with a two-phase reserve/commit API.
//! - [`CursorQueue`]: two ever-growing, cache-line-separated cursors whose
//!   difference is the size.
//!
//! Both implement [`BoundedChannel`]; [`split`] hands one engine to exactly
//! one producer thread and one consumer thread. No operation blocks, sleeps,
//! or takes a lock.

pub mod arena;
pub mod channel;
pub mod counted;
pub mod cursor;
pub mod padded;
pub mod storage;
pub mod sync;

pub use arena::SlotArena;
pub use channel::{split, BoundedChannel, Consumer, Producer};
pub use counted::CountedQueue;
#[cfg(loom)]
pub use cursor::RelaxedPeerLoad;
pub use cursor::{AcquireRelease, CursorOrdering, CursorQueue};
pub use padded::CachePadded;
#[cfg(all(unix, feature = "mmap"))]
pub use storage::MmapStorage;
pub use storage::{HeapStorage, StorageError, StorageProvider};
