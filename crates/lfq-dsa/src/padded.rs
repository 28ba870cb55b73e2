use core::fmt;
use core::ops::Deref;

/// Assumed destructive-interference size of the target.
pub const CACHE_LINE: usize = 64;

/// Pads and aligns a value to a full cache line.
///
/// ## Mechanical Sympathy
/// The push and pop cursors are written by different cores. Keeping each one
/// on its own line means a write to one never invalidates the line holding
/// the other.
#[derive(Default)]
#[repr(align(64))]
pub struct CachePadded<T>(T);

static_assertions::const_assert_eq!(core::mem::align_of::<CachePadded<u8>>(), CACHE_LINE);
static_assertions::const_assert_eq!(core::mem::size_of::<CachePadded<usize>>(), CACHE_LINE);

impl<T> CachePadded<T> {
    pub const fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachePadded").field(&self.0).finish()
    }
}
