use core::fmt;
use core::ptr::NonNull;

use crate::arena::SlotArena;
use crate::channel::{BoundedChannel, Consumer, Producer};
use crate::storage::{HeapStorage, StorageError, StorageProvider};
use crate::sync::{AtomicUsize, Ordering};

/// Index/counter ring: the baseline design.
///
/// Each side owns an index already reduced modulo capacity, and both sides
/// meet on a shared element count, which is the only source of truth for how
/// many elements are stored.
///
/// The low-level API is a two-phase reserve/commit: the producer writes its
/// payload directly into the slot returned by [`next_write_slot`] and then
/// calls [`commit_write`]; the consumer reads through [`next_read_slot`] and
/// then calls [`commit_read`]. Checking capacity before reserving, and never
/// skipping a commit, is the caller's responsibility. [`BoundedChannel`]
/// wraps both phases into checked `push`/`pop` calls.
///
/// [`next_write_slot`]: CountedQueue::next_write_slot
/// [`commit_write`]: CountedQueue::commit_write
/// [`next_read_slot`]: CountedQueue::next_read_slot
/// [`commit_read`]: CountedQueue::commit_read
pub struct CountedQueue<T, S: StorageProvider = HeapStorage> {
    slots: SlotArena<T, S>,
    next_write: AtomicUsize,
    next_read: AtomicUsize,
    count: AtomicUsize,
}

impl<T> CountedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, StorageError> {
        Self::with_storage(capacity, HeapStorage)
    }
}

impl<T, S: StorageProvider> CountedQueue<T, S> {
    pub fn with_storage(capacity: usize, storage: S) -> Result<Self, StorageError> {
        let slots = SlotArena::new(capacity, storage)?;
        tracing::debug!(
            "CountedQueue: {} slots of {} bytes",
            capacity,
            core::mem::size_of::<T>()
        );

        Ok(Self {
            slots,
            next_write: AtomicUsize::new(0),
            next_read: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        })
    }

    /// Pointer to the slot addressed by the producer index.
    ///
    /// Returned regardless of fullness. The slot holds no live element when
    /// `size() < capacity()`; write it with `ptr::write`, never assignment.
    #[inline(always)]
    pub fn next_write_slot(&self) -> *mut T {
        let idx = self.next_write.load(Ordering::Relaxed);
        // # Safety: producing a pointer is harmless; dereferencing it is the caller's contract.
        unsafe { self.slots.slot_ptr(idx) }
    }

    /// Publishes the slot returned by the last `next_write_slot`.
    ///
    /// # Safety
    /// Producer thread only. A value must have been constructed in the
    /// reserved slot, and the queue must not have been full when it was.
    #[inline(always)]
    pub unsafe fn commit_write(&self) {
        let idx = self.next_write.load(Ordering::Relaxed);
        self.next_write.store((idx + 1) % self.slots.capacity(), Ordering::Relaxed);
        // # Safety: Release pairs with the consumer's Acquire load of `count`,
        // making the payload written above visible before the slot is readable.
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Pointer to the next readable slot, or `None` while the queue is empty.
    #[inline(always)]
    pub fn next_read_slot(&self) -> Option<NonNull<T>> {
        if self.size() == 0 {
            return None;
        }
        let idx = self.next_read.load(Ordering::Relaxed);
        // # Safety: the Acquire load in `size` ordered the producer's write before us.
        NonNull::new(unsafe { self.slots.slot_ptr(idx) })
    }

    /// Retires the slot returned by the last `next_read_slot`.
    ///
    /// # Panics
    /// Panics when the count is already zero: under a single consumer that can
    /// only mean a read past what was ever written.
    ///
    /// # Safety
    /// Consumer thread only. The element in the slot must have been moved out
    /// (or dropped) exactly once.
    #[inline(always)]
    pub unsafe fn commit_read(&self) {
        let pending = self.count.load(Ordering::Acquire);
        assert!(pending != 0, "CountedQueue: commit_read with no element to read");

        let idx = self.next_read.load(Ordering::Relaxed);
        self.next_read.store((idx + 1) % self.slots.capacity(), Ordering::Relaxed);
        // # Safety: Release hands the emptied slot back to the producer.
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    /// Current element count. Advisory under concurrent use.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }

    pub fn storage(&self) -> &S {
        self.slots.storage()
    }

    #[inline(always)]
    fn enqueue(&self, value: T) -> Result<(), T> {
        if self.size() >= self.capacity() {
            return Err(value);
        }
        // # Safety: the count is below capacity, so the producer slot is vacant.
        unsafe {
            self.next_write_slot().write(value);
            self.commit_write();
        }
        Ok(())
    }

    #[inline(always)]
    fn dequeue(&self) -> Option<T> {
        let slot = self.next_read_slot()?;
        // # Safety: the slot is live and only the consumer touches it until commit.
        unsafe {
            let value = slot.as_ptr().read();
            self.commit_read();
            Some(value)
        }
    }
}

unsafe impl<T: Send, S: StorageProvider + Send> BoundedChannel for CountedQueue<T, S> {
    type Item = T;

    #[inline(always)]
    fn push(&self, value: T) -> Result<(), T> {
        self.enqueue(value)
    }

    #[inline(always)]
    fn pop(&self) -> Option<T> {
        self.dequeue()
    }

    fn size(&self) -> usize {
        CountedQueue::size(self)
    }

    fn capacity(&self) -> usize {
        CountedQueue::capacity(self)
    }
}

/// The reserve/commit path on the producer end of a split `CountedQueue`.
impl<T: Send, S: StorageProvider + Send> Producer<CountedQueue<T, S>> {
    /// See [`CountedQueue::next_write_slot`]. Check `is_full` first.
    #[inline(always)]
    pub fn next_write_slot(&mut self) -> *mut T {
        self.engine().next_write_slot()
    }

    /// See [`CountedQueue::commit_write`].
    ///
    /// # Safety
    /// A value must have been constructed in the slot returned by the last
    /// `next_write_slot`, and the queue must not have been full when it was.
    #[inline(always)]
    pub unsafe fn commit_write(&mut self) {
        self.engine().commit_write()
    }
}

/// The reserve/commit path on the consumer end of a split `CountedQueue`.
impl<T: Send, S: StorageProvider + Send> Consumer<CountedQueue<T, S>> {
    /// See [`CountedQueue::next_read_slot`].
    #[inline(always)]
    pub fn next_read_slot(&mut self) -> Option<NonNull<T>> {
        self.engine().next_read_slot()
    }

    /// See [`CountedQueue::commit_read`].
    ///
    /// # Safety
    /// The element in the slot returned by the last `next_read_slot` must
    /// have been moved out (or dropped) exactly once.
    #[inline(always)]
    pub unsafe fn commit_read(&mut self) {
        self.engine().commit_read()
    }
}

impl<T, S: StorageProvider> Drop for CountedQueue<T, S> {
    fn drop(&mut self) {
        let live = self.count.load(Ordering::Acquire);
        let first = self.next_read.load(Ordering::Relaxed);
        let capacity = self.slots.capacity();
        for i in 0..live {
            // # Safety: `live` slots starting at the read index hold elements.
            unsafe { self.slots.drop_in_place((first + i) % capacity) };
        }
    }
}

impl<T, S: StorageProvider> fmt::Debug for CountedQueue<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountedQueue")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .field("next_write", &self.next_write.load(Ordering::Relaxed))
            .field("next_read", &self.next_read.load(Ordering::Relaxed))
            .finish()
    }
}
