use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use crate::storage::{HeapStorage, StorageError, StorageProvider};
use crate::sync::UnsafeCell;

type Slot<T> = UnsafeCell<MaybeUninit<T>>;

/// A fixed run of slots, each either uninitialised or holding one live `T`.
///
/// The arena keeps no per-slot liveness flag. Which slots are live is a
/// function of the owning engine's cursors, so the arena never drops a
/// payload on its own: the engine drains its live range before the arena is
/// released.
pub struct SlotArena<T, S: StorageProvider = HeapStorage> {
    base: NonNull<Slot<T>>,
    capacity: usize,
    storage: S,
    _marker: PhantomData<T>,
}

impl<T, S: StorageProvider> SlotArena<T, S> {
    pub fn new(capacity: usize, mut storage: S) -> Result<Self, StorageError> {
        let base = storage.allocate::<Slot<T>>(capacity)?;
        for i in 0..capacity {
            // # Safety: the provider guarantees `capacity` writable slots.
            unsafe { base.as_ptr().add(i).write(UnsafeCell::new(MaybeUninit::uninit())) };
        }

        Ok(Self {
            base,
            capacity,
            storage,
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[inline(always)]
    fn slot(&self, idx: usize) -> &Slot<T> {
        debug_assert!(idx < self.capacity, "slot {} out of bounds ({})", idx, self.capacity);
        // # Safety: idx < capacity and every slot was initialised in `new`.
        unsafe { &*self.base.as_ptr().add(idx) }
    }

    /// Constructs `value` in slot `idx`.
    ///
    /// # Safety
    /// Slot `idx` must hold no live element and no other thread may access it
    /// until the write is published.
    #[inline(always)]
    pub unsafe fn write(&self, idx: usize, value: T) {
        self.slot(idx).with_mut(|cell| cell.cast::<T>().write(value));
    }

    /// Moves the live element out of slot `idx`, leaving it uninitialised.
    ///
    /// # Safety
    /// Slot `idx` must hold a live element whose construction is visible to
    /// the calling thread, and the caller must be its only accessor.
    #[inline(always)]
    pub unsafe fn take(&self, idx: usize) -> T {
        self.slot(idx).with_mut(|cell| cell.cast::<T>().read())
    }

    /// Destroys the live element in slot `idx` in place.
    ///
    /// # Safety
    /// Same as [`SlotArena::take`].
    pub unsafe fn drop_in_place(&self, idx: usize) {
        self.slot(idx).with_mut(|cell| ptr::drop_in_place(cell.cast::<T>()));
    }

    /// Raw pointer to the payload storage of slot `idx`.
    ///
    /// # Safety
    /// The pointer must only be dereferenced while the caller owns the slot.
    #[inline(always)]
    pub unsafe fn slot_ptr(&self, idx: usize) -> *mut T {
        self.slot(idx).with_mut(|cell| cell.cast::<T>())
    }
}

impl<T, S: StorageProvider> Drop for SlotArena<T, S> {
    fn drop(&mut self) {
        // # Safety: drops the cell wrappers only; payloads were drained by the owner.
        unsafe {
            for i in 0..self.capacity {
                ptr::drop_in_place(self.base.as_ptr().add(i));
            }
            self.storage.deallocate(self.base, self.capacity);
        }
    }
}

impl<T, S: StorageProvider> fmt::Debug for SlotArena<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotArena")
            .field("base", &self.base)
            .field("capacity", &self.capacity)
            .finish()
    }
}

unsafe impl<T: Send, S: StorageProvider + Send> Send for SlotArena<T, S> {}
