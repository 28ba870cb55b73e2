use std::sync::mpsc;
use std::thread::{self, JoinHandle, Thread};

use crate::affinity::AffinityProvider;
use crate::error::{LfqError, Result};

/// A running thread started by [`spawn_pinned`].
#[derive(Debug)]
pub struct PinnedThread<R> {
    name: String,
    core: Option<usize>,
    handle: JoinHandle<Option<R>>,
}

impl<R> PinnedThread<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn core(&self) -> Option<usize> {
        self.core
    }

    pub fn thread(&self) -> &Thread {
        self.handle.thread()
    }

    pub fn join(self) -> Result<R> {
        match self.handle.join() {
            Ok(Some(value)) => Ok(value),
            // Only reachable if the thread bailed out before running `f`,
            // which `spawn_pinned` already reported.
            Ok(None) => Err(LfqError::Affinity {
                name: self.name,
                core: self.core.unwrap_or_default(),
            }),
            Err(_) => Err(LfqError::ThreadPanicked(self.name)),
        }
    }
}

/// Starts `f` on a new named thread pinned to `core`.
///
/// Blocks until the thread has either pinned itself and started running `f`,
/// or failed to pin. On failure the thread is joined before returning, so no
/// thread outlives the error. `core = None` skips pinning.
pub fn spawn_pinned<A, F, R>(
    name: &str,
    core: Option<usize>,
    affinity: &A,
    f: F,
) -> Result<PinnedThread<R>>
where
    A: AffinityProvider,
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::sync_channel::<bool>(1);
    let affinity = affinity.clone();
    let thread_name = name.to_string();

    let handle = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            if let Some(core) = core {
                if !affinity.pin_current(core) {
                    tracing::error!(
                        "Setting core affinity failed for {} to core {}",
                        thread_name,
                        core
                    );
                    let _ = ready_tx.send(false);
                    return None;
                }
                tracing::info!("Core affinity set for {} to core {}", thread_name, core);
            }
            let _ = ready_tx.send(true);
            drop(ready_tx);
            Some(f())
        })
        .map_err(LfqError::Spawn)?;

    match ready_rx.recv() {
        Ok(true) => Ok(PinnedThread {
            name: name.to_string(),
            core,
            handle,
        }),
        Ok(false) => {
            let _ = handle.join();
            Err(LfqError::Affinity {
                name: name.to_string(),
                core: core.unwrap_or_default(),
            })
        }
        Err(_) => {
            let _ = handle.join();
            Err(LfqError::ThreadPanicked(name.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::{CoreAffinity, NoAffinity};

    #[derive(Clone)]
    struct Refuse;

    impl AffinityProvider for Refuse {
        fn pin_current(&self, _core: usize) -> bool {
            false
        }
    }

    #[test]
    fn runs_closure_and_returns_its_value() {
        let t = spawn_pinned("worker", Some(3), &NoAffinity, || 6 * 7).unwrap();
        assert_eq!(t.name(), "worker");
        assert_eq!(t.thread().name(), Some("worker"));
        assert_eq!(t.join().unwrap(), 42);
    }

    #[test]
    fn affinity_failure_is_reported_without_running_closure() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = ran.clone();
        let err = spawn_pinned("pinned", Some(1), &Refuse, move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .unwrap_err();

        assert!(matches!(err, LfqError::Affinity { core: 1, .. }));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn unpinned_spawn_skips_affinity() {
        let t = spawn_pinned("free", None, &Refuse, || "ok").unwrap();
        assert_eq!(t.core(), None);
        assert_eq!(t.join().unwrap(), "ok");
    }

    #[test]
    fn pinning_to_core_zero_succeeds_where_supported() {
        let supported =
            core_affinity::get_core_ids().is_some_and(|ids| ids.iter().any(|id| id.id == 0));
        let result = spawn_pinned("core0", Some(0), &CoreAffinity, || ());
        if supported {
            result.unwrap().join().unwrap();
        }
    }

    #[test]
    fn panicking_closure_surfaces_on_join() {
        let t = spawn_pinned("boom", None, &NoAffinity, || -> u8 { panic!("boom") }).unwrap();
        assert!(matches!(t.join(), Err(LfqError::ThreadPanicked(_))));
    }
}
