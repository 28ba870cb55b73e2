//! # lfq-harness
//!
//! Drives one engine with a pinned producer thread and a pinned consumer
//! thread over randomized fixed-length string payloads, and reports elapsed
//! wall-clock time and throughput.

pub mod driver;
pub mod payload;
pub mod timer;

pub use driver::{drive, drive_two_phase, run, run_all, run_counted, run_cursor, BenchReport};
pub use payload::{payload_rng, random_string};
pub use timer::Timer;
