use core::fmt;
use core::marker::PhantomData;

use crate::arena::SlotArena;
use crate::channel::BoundedChannel;
use crate::padded::CachePadded;
use crate::storage::{HeapStorage, StorageError, StorageProvider};
use crate::sync::{AtomicUsize, Ordering};

mod sealed {
    pub trait Sealed {}
}

/// Memory ordering used when one side loads the *other* side's cursor.
pub trait CursorOrdering: sealed::Sealed + Send + Sync + 'static {
    const PEER_LOAD: Ordering;
}

/// Acquire on the peer's cursor, Release on our own: the only correct policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireRelease;

impl sealed::Sealed for AcquireRelease {}
impl CursorOrdering for AcquireRelease {
    const PEER_LOAD: Ordering = Ordering::Acquire;
}

/// Deliberately broken policy: loads the peer's cursor with `Relaxed`.
///
/// Exists only in loom builds, where the model checker must flag the
/// resulting unsynchronised payload access.
#[cfg(loom)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxedPeerLoad;

#[cfg(loom)]
impl sealed::Sealed for RelaxedPeerLoad {}
#[cfg(loom)]
impl CursorOrdering for RelaxedPeerLoad {
    const PEER_LOAD: Ordering = Ordering::Relaxed;
}

/// Cursor-difference ring.
///
/// ## Protocol
/// - Both cursors only ever grow (wrapping at `usize::MAX`); slot `c % capacity`
///   belongs to cursor value `c`. Size is `push - pop`, so no shared counter
///   is written by both sides.
/// - Each side loads its own cursor `Relaxed` (it is the sole writer) and the
///   peer's cursor with `Acquire`, and publishes its own advance with `Release`.
///   The producer's Release store of `push + 1` is what makes the constructed
///   element visible to the consumer; the consumer's Release store of
///   `pop + 1` is what hands the emptied slot back.
///
/// ## Mechanical Sympathy
/// - **Cache-Line Padding**: each cursor sits on its own 64-byte line, so the
///   producer's stores never invalidate the line the consumer reads its own
///   cursor from, and vice versa.
pub struct CursorQueue<T, S: StorageProvider = HeapStorage, O: CursorOrdering = AcquireRelease> {
    push_cursor: CachePadded<AtomicUsize>,
    pop_cursor: CachePadded<AtomicUsize>,
    slots: SlotArena<T, S>,
    _ordering: PhantomData<O>,
}

impl<T> CursorQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, StorageError> {
        Self::with_storage(capacity, HeapStorage)
    }
}

impl<T, S: StorageProvider, O: CursorOrdering> CursorQueue<T, S, O> {
    pub fn with_storage(capacity: usize, storage: S) -> Result<Self, StorageError> {
        let slots = SlotArena::new(capacity, storage)?;
        tracing::debug!(
            "CursorQueue: {} slots of {} bytes",
            capacity,
            core::mem::size_of::<T>()
        );

        Ok(Self {
            push_cursor: CachePadded::new(AtomicUsize::new(0)),
            pop_cursor: CachePadded::new(AtomicUsize::new(0)),
            slots,
            _ordering: PhantomData,
        })
    }

    #[inline(always)]
    fn index(&self, cursor: usize) -> usize {
        cursor % self.slots.capacity()
    }

    /// Constructs `value` in the next free slot, or hands it back when full.
    #[inline(always)]
    pub fn push(&self, value: T) -> Result<(), T> {
        let push = self.push_cursor.load(Ordering::Relaxed);
        let pop = self.pop_cursor.load(O::PEER_LOAD);

        if push.wrapping_sub(pop) >= self.slots.capacity() {
            return Err(value);
        }

        // # Safety: the slot lies outside [pop, push), so the consumer is done
        // with it, and we are the ONLY producer.
        unsafe { self.slots.write(self.index(push), value) };

        self.push_cursor.store(push.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Moves the oldest element out, or returns `None` when empty.
    #[inline(always)]
    pub fn pop(&self) -> Option<T> {
        let push = self.push_cursor.load(O::PEER_LOAD);
        let pop = self.pop_cursor.load(Ordering::Relaxed);

        if push == pop {
            return None;
        }

        // # Safety: the slot lies in [pop, push), and we are the ONLY consumer.
        let value = unsafe { self.slots.take(self.index(pop)) };

        self.pop_cursor.store(pop.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Out-parameter form of [`CursorQueue::pop`].
    #[inline(always)]
    pub fn pop_into(&self, out: &mut T) -> bool {
        match self.pop() {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Number of stored elements. Advisory under concurrent use.
    #[inline(always)]
    pub fn size(&self) -> usize {
        // Pop first: it can only be behind the push cursor loaded after it.
        let pop = self.pop_cursor.load(Ordering::Acquire);
        let push = self.push_cursor.load(Ordering::Acquire);
        push.wrapping_sub(pop).min(self.slots.capacity())
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }

    pub fn storage(&self) -> &S {
        self.slots.storage()
    }
}

unsafe impl<T, S, O> BoundedChannel for CursorQueue<T, S, O>
where
    T: Send,
    S: StorageProvider + Send,
    O: CursorOrdering,
{
    type Item = T;

    #[inline(always)]
    fn push(&self, value: T) -> Result<(), T> {
        CursorQueue::push(self, value)
    }

    #[inline(always)]
    fn pop(&self) -> Option<T> {
        CursorQueue::pop(self)
    }

    fn pop_into(&self, out: &mut T) -> bool {
        CursorQueue::pop_into(self, out)
    }

    fn size(&self) -> usize {
        CursorQueue::size(self)
    }

    fn capacity(&self) -> usize {
        CursorQueue::capacity(self)
    }
}

impl<T, S: StorageProvider, O: CursorOrdering> Drop for CursorQueue<T, S, O> {
    fn drop(&mut self) {
        let push = self.push_cursor.load(Ordering::Acquire);
        let mut pop = self.pop_cursor.load(Ordering::Acquire);
        while pop != push {
            // # Safety: every slot in [pop, push) holds a live element.
            unsafe { self.slots.drop_in_place(self.index(pop)) };
            pop = pop.wrapping_add(1);
        }
        self.pop_cursor.store(pop, Ordering::Relaxed);
    }
}

impl<T, S: StorageProvider, O: CursorOrdering> fmt::Debug for CursorQueue<T, S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorQueue")
            .field("capacity", &self.capacity())
            .field("push_cursor", &self.push_cursor.load(Ordering::Relaxed))
            .field("pop_cursor", &self.pop_cursor.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn cursors_do_not_share_a_cache_line() {
        let push = offset_of!(CursorQueue<u64>, push_cursor);
        let pop = offset_of!(CursorQueue<u64>, pop_cursor);
        assert!(push.abs_diff(pop) >= crate::padded::CACHE_LINE);
    }

    #[test]
    fn cursors_grow_without_wrapping_to_capacity() {
        let q = CursorQueue::<u32>::new(4).unwrap();
        for i in 0..9 {
            q.push(i).unwrap();
            assert_eq!(q.pop(), Some(i));
        }
        assert_eq!(q.push_cursor.load(Ordering::Relaxed), 9);
        assert_eq!(q.pop_cursor.load(Ordering::Relaxed), 9);
        assert!(q.is_empty());
    }

    #[test]
    fn cursor_arithmetic_survives_usize_wraparound() {
        let q = CursorQueue::<u8>::new(4).unwrap();
        // Start both cursors just below the wrap, on a slot boundary.
        let start = usize::MAX - 3;
        q.push_cursor.store(start, Ordering::Relaxed);
        q.pop_cursor.store(start, Ordering::Relaxed);

        for i in 0..4 {
            q.push(i).unwrap();
        }
        assert!(q.is_full());
        assert_eq!(q.push(9), Err(9));
        assert_eq!(q.push_cursor.load(Ordering::Relaxed), 0);
        for i in 0..4 {
            assert_eq!(q.pop(), Some(i));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn pop_into_replaces_the_output() {
        let q = CursorQueue::<String>::new(2).unwrap();
        q.push("fresh".to_string()).unwrap();
        let mut out = "stale".to_string();
        assert!(q.pop_into(&mut out));
        assert_eq!(out, "fresh");
        assert!(!q.pop_into(&mut out));
        assert_eq!(out, "fresh");
    }
}
