//! CPU pinning as a swappable platform capability.

pub trait AffinityProvider: Clone + Send + 'static {
    /// Pins the calling thread to `core`. Returns `false` on failure.
    fn pin_current(&self, core: usize) -> bool;
}

/// Pins through the `core_affinity` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreAffinity;

impl AffinityProvider for CoreAffinity {
    fn pin_current(&self, core: usize) -> bool {
        let ids = core_affinity::get_core_ids().unwrap_or_default();
        match ids.into_iter().find(|id| id.id == core) {
            Some(id) => core_affinity::set_for_current(id),
            None => {
                tracing::debug!("CoreAffinity: core {} not present on this host", core);
                false
            }
        }
    }
}

/// Never pins and always reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAffinity;

impl AffinityProvider for NoAffinity {
    fn pin_current(&self, _core: usize) -> bool {
        true
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "windows",
    target_os = "macos",
    target_os = "freebsd"
))]
pub type PlatformAffinity = CoreAffinity;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "windows",
    target_os = "macos",
    target_os = "freebsd"
)))]
pub type PlatformAffinity = NoAffinity;
