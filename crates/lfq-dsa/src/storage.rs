//! Backing-block providers for the slot arena.
//!
//! The cursor protocol never cares where its slots live. A provider hands the
//! arena one uninitialised, correctly aligned block at construction and takes
//! it back at teardown.

use core::fmt;
use core::ptr::NonNull;
use std::alloc::{self, Layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// A queue needs at least one slot.
    ZeroCapacity,
    /// `capacity * size_of::<T>()` does not fit in the address space.
    CapacityOverflow,
    /// The provider could not obtain `bytes` of memory.
    AllocationFailed { bytes: usize },
    /// The element alignment exceeds what the provider can guarantee.
    UnsupportedAlignment { align: usize },
    /// The provider already backs a live block.
    AlreadyAllocated,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ZeroCapacity => write!(f, "capacity must be at least one slot"),
            StorageError::CapacityOverflow => {
                write!(f, "requested capacity overflows the address space")
            }
            StorageError::AllocationFailed { bytes } => {
                write!(f, "failed to allocate {} bytes of slot storage", bytes)
            }
            StorageError::UnsupportedAlignment { align } => {
                write!(f, "element alignment {} is not supported by this provider", align)
            }
            StorageError::AlreadyAllocated => {
                write!(f, "storage provider already backs a live block")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// A source of raw slot memory.
///
/// # Safety
/// A successful `allocate::<T>(n)` must return a pointer aligned for `T` and
/// valid for reads and writes of `n` contiguous `T`s until the matching
/// `deallocate::<T>(ptr, n)` call. The memory may be uninitialised.
pub unsafe trait StorageProvider {
    fn allocate<T>(&mut self, capacity: usize) -> Result<NonNull<T>, StorageError>;

    /// # Safety
    /// `ptr` and `capacity` must come from the most recent successful
    /// `allocate::<T>` on this provider, and no slot may be accessed afterwards.
    unsafe fn deallocate<T>(&mut self, ptr: NonNull<T>, capacity: usize);
}

/// Global-allocator backed storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapStorage;

unsafe impl StorageProvider for HeapStorage {
    fn allocate<T>(&mut self, capacity: usize) -> Result<NonNull<T>, StorageError> {
        if capacity == 0 {
            return Err(StorageError::ZeroCapacity);
        }
        let layout = Layout::array::<T>(capacity).map_err(|_| StorageError::CapacityOverflow)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        // # Safety: layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw.cast::<T>()).ok_or(StorageError::AllocationFailed { bytes: layout.size() })
    }

    unsafe fn deallocate<T>(&mut self, ptr: NonNull<T>, capacity: usize) {
        let Ok(layout) = Layout::array::<T>(capacity) else {
            return;
        };
        if layout.size() != 0 {
            alloc::dealloc(ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

#[cfg(all(unix, feature = "mmap"))]
pub use self::mmap::MmapStorage;

#[cfg(all(unix, feature = "mmap"))]
mod mmap {
    use super::{NonNull, StorageError, StorageProvider};
    use core::mem::{align_of, size_of};
    use nix::libc;

    #[cfg(target_os = "linux")]
    const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

    fn page_size() -> usize {
        // # Safety: sysconf has no memory-safety preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            4096
        } else {
            size as usize
        }
    }

    fn round_up(len: usize, to: usize) -> Option<usize> {
        len.checked_add(to - 1).map(|l| l & !(to - 1))
    }

    /// Anonymous-mapping backed storage.
    ///
    /// ## Mechanical Sympathy
    /// With `with_huge_pages()` the block is first requested from HugeTLB so
    /// the whole ring sits behind a single 2MB TLB entry. When the kernel has
    /// no huge pages reserved, the mapping falls back to standard pages.
    ///
    /// Backs one block at a time.
    #[derive(Debug, Default)]
    pub struct MmapStorage {
        huge_pages: bool,
        mapped_len: usize,
        huge_backed: bool,
    }

    impl MmapStorage {
        pub const fn new() -> Self {
            Self { huge_pages: false, mapped_len: 0, huge_backed: false }
        }

        pub const fn with_huge_pages() -> Self {
            Self { huge_pages: true, mapped_len: 0, huge_backed: false }
        }

        /// Whether the live block is backed by huge pages.
        pub fn is_huge_backed(&self) -> bool {
            self.huge_backed
        }

        /// Length of the live mapping in bytes (0 when nothing is mapped).
        pub fn mapped_len(&self) -> usize {
            self.mapped_len
        }

        #[cfg(target_os = "linux")]
        fn map_huge(bytes: usize) -> Option<(NonNull<libc::c_void>, usize)> {
            let len = round_up(bytes, HUGE_PAGE_SIZE)?;
            // # Safety: anonymous mapping with no address hint.
            let addr = unsafe {
                libc::mmap(
                    core::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_HUGETLB,
                    -1,
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return None;
            }
            NonNull::new(addr).map(|base| (base, len))
        }

        #[cfg(not(target_os = "linux"))]
        fn map_huge(_bytes: usize) -> Option<(NonNull<libc::c_void>, usize)> {
            None
        }

        fn map_standard(bytes: usize) -> Result<(NonNull<libc::c_void>, usize), StorageError> {
            let len = round_up(bytes, page_size()).ok_or(StorageError::CapacityOverflow)?;
            // # Safety: anonymous mapping with no address hint.
            let addr = unsafe {
                libc::mmap(
                    core::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if addr == libc::MAP_FAILED {
                return Err(StorageError::AllocationFailed { bytes: len });
            }
            NonNull::new(addr)
                .map(|base| (base, len))
                .ok_or(StorageError::AllocationFailed { bytes: len })
        }
    }

    unsafe impl StorageProvider for MmapStorage {
        fn allocate<T>(&mut self, capacity: usize) -> Result<NonNull<T>, StorageError> {
            if capacity == 0 {
                return Err(StorageError::ZeroCapacity);
            }
            if self.mapped_len != 0 {
                return Err(StorageError::AlreadyAllocated);
            }
            if align_of::<T>() > page_size() {
                return Err(StorageError::UnsupportedAlignment { align: align_of::<T>() });
            }
            let bytes = size_of::<T>()
                .checked_mul(capacity)
                .ok_or(StorageError::CapacityOverflow)?;
            if bytes == 0 {
                return Ok(NonNull::dangling());
            }

            let huge = if self.huge_pages { Self::map_huge(bytes) } else { None };
            let (base, len, huge_backed) = match huge {
                Some((base, len)) => (base, len, true),
                None => {
                    if self.huge_pages {
                        tracing::warn!(
                            "MmapStorage: HugeTLB unavailable, using standard pages ({} bytes)",
                            bytes
                        );
                    }
                    let (base, len) = Self::map_standard(bytes)?;
                    (base, len, false)
                }
            };

            tracing::debug!("MmapStorage: mapped {} bytes (huge: {})", len, huge_backed);
            self.mapped_len = len;
            self.huge_backed = huge_backed;
            Ok(base.cast::<T>())
        }

        unsafe fn deallocate<T>(&mut self, ptr: NonNull<T>, _capacity: usize) {
            if self.mapped_len == 0 {
                return;
            }
            libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), self.mapped_len);
            self.mapped_len = 0;
            self.huge_backed = false;
        }
    }

    impl Drop for MmapStorage {
        fn drop(&mut self) {
            if self.mapped_len != 0 {
                tracing::warn!("MmapStorage dropped with {} bytes still mapped", self.mapped_len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_rejects_zero_capacity() {
        let err = HeapStorage.allocate::<u64>(0).unwrap_err();
        assert_eq!(err, StorageError::ZeroCapacity);
    }

    #[test]
    fn heap_rejects_overflowing_capacity() {
        let err = HeapStorage.allocate::<u64>(usize::MAX).unwrap_err();
        assert_eq!(err, StorageError::CapacityOverflow);
    }

    #[test]
    fn heap_block_is_aligned_and_writable() {
        #[repr(align(32))]
        struct Wide([u8; 32]);

        let mut heap = HeapStorage;
        let ptr = heap.allocate::<Wide>(8).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 32, 0);
        unsafe {
            for i in 0..8 {
                ptr.as_ptr().add(i).write(Wide([i as u8; 32]));
            }
            assert_eq!((*ptr.as_ptr().add(7)).0[31], 7);
            heap.deallocate(ptr, 8);
        }
    }

    #[test]
    fn heap_zero_sized_elements_use_dangling_block() {
        let mut heap = HeapStorage;
        let ptr = heap.allocate::<()>(1024).unwrap();
        assert_eq!(ptr, NonNull::dangling());
        unsafe { heap.deallocate(ptr, 1024) };
    }

    #[cfg(all(unix, feature = "mmap"))]
    #[test]
    fn mmap_block_is_page_rounded_and_released() {
        let mut storage = MmapStorage::new();
        let ptr = storage.allocate::<u64>(10).unwrap();
        assert!(storage.mapped_len() >= 80);
        assert!(!storage.is_huge_backed());
        unsafe {
            ptr.as_ptr().add(9).write(0xDEAD_BEEF);
            assert_eq!(*ptr.as_ptr().add(9), 0xDEAD_BEEF);
            storage.deallocate(ptr, 10);
        }
        assert_eq!(storage.mapped_len(), 0);
    }

    #[cfg(all(unix, feature = "mmap"))]
    #[test]
    fn mmap_backs_one_block_at_a_time() {
        let mut storage = MmapStorage::new();
        let ptr = storage.allocate::<u32>(4).unwrap();
        assert_eq!(storage.allocate::<u32>(4).unwrap_err(), StorageError::AlreadyAllocated);
        unsafe { storage.deallocate(ptr, 4) };
    }

    #[cfg(all(unix, feature = "mmap"))]
    #[test]
    fn mmap_huge_request_always_yields_usable_block() {
        let mut storage = MmapStorage::with_huge_pages();
        let ptr = storage.allocate::<u8>(4096).unwrap();
        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), 0xAB, 4096);
            assert_eq!(*ptr.as_ptr().add(4095), 0xAB);
            storage.deallocate(ptr, 4096);
        }
    }
}
