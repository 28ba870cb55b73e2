//! The operation set both engines expose, and the handles that hand one
//! engine to exactly one producer thread and one consumer thread.

use core::fmt;

use crate::sync::Arc;

/// A bounded, non-blocking SPSC queue.
///
/// Capacity pressure is never an error: a full queue refuses `push` by
/// handing the value back, an empty queue answers `pop` with `None`, and
/// neither call has side effects when it fails. Retrying is the caller's job.
///
/// `size`, `is_empty` and `is_full` are advisory. The other side may have
/// moved on by the time the caller acts on the answer.
///
/// # Safety
/// Implementors guarantee that `push` running on one thread concurrently
/// with `pop` running on one other thread (plus any number of observer calls)
/// is free of data races. Nothing is promised for two concurrent pushers or
/// two concurrent poppers; [`split`] makes those unrepresentable.
pub unsafe trait BoundedChannel: Send {
    type Item;

    fn push(&self, value: Self::Item) -> Result<(), Self::Item>;

    fn pop(&self) -> Option<Self::Item>;

    /// Out-parameter form of `pop`: on success the element is moved into
    /// `out` (dropping its previous value) and `true` is returned.
    fn pop_into(&self, out: &mut Self::Item) -> bool {
        match self.pop() {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    fn size(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }
}

struct Shared<C>(C);

// # Safety: `Shared` is only reachable through one `Producer` (push side) and
// one `Consumer` (pop side), which is exactly the concurrency `BoundedChannel`
// implementors promise to tolerate.
unsafe impl<C: BoundedChannel> Sync for Shared<C> where C::Item: Send {}

/// Splits an engine into its two thread-owned ends.
///
/// Neither end is `Clone`, mutating calls take `&mut self`, and neither end
/// exposes the engine itself, so a second producer or consumer cannot be
/// conjured from safe code. A shared `&Producer` only reaches observers.
///
/// ```compile_fail
/// use lfq_dsa::{split, CursorQueue};
///
/// let (tx, _rx) = split(CursorQueue::<u64>::new(4).unwrap());
/// let second = tx.clone();
/// ```
///
/// ```compile_fail
/// use lfq_dsa::{split, CursorQueue};
///
/// let (mut tx, _rx) = split(CursorQueue::<u64>::new(4).unwrap());
/// tx.push(1).unwrap();
/// let stolen = tx.pop();
/// ```
///
/// ```compile_fail
/// use lfq_dsa::{split, BoundedChannel, CursorQueue};
///
/// let (_tx, rx) = split(CursorQueue::<u64>::new(4).unwrap());
/// rx.channel().push(7).unwrap();
/// ```
///
/// ```compile_fail
/// use lfq_dsa::{split, CursorQueue};
///
/// let (_tx, rx) = split(CursorQueue::<u64>::new(4).unwrap());
/// let shared = &rx;
/// std::thread::scope(|s| {
///     s.spawn(|| shared.pop());
///     s.spawn(|| shared.pop());
/// });
/// ```
pub fn split<C: BoundedChannel>(channel: C) -> (Producer<C>, Consumer<C>)
where
    C::Item: Send,
{
    let shared = Arc::new(Shared(channel));
    (
        Producer { shared: shared.clone() },
        Consumer { shared },
    )
}

pub struct Producer<C: BoundedChannel> {
    shared: Arc<Shared<C>>,
}

impl<C: BoundedChannel> Producer<C> {
    #[inline(always)]
    pub fn push(&mut self, value: C::Item) -> Result<(), C::Item> {
        self.shared.0.push(value)
    }

    pub fn size(&self) -> usize {
        self.shared.0.size()
    }

    pub fn capacity(&self) -> usize {
        self.shared.0.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.shared.0.is_full()
    }

    /// The engine behind this end. Crate-internal: handing out `&C` would let
    /// safe code reach the `&self` push/pop of the other side.
    #[inline(always)]
    pub(crate) fn engine(&self) -> &C {
        &self.shared.0
    }
}

pub struct Consumer<C: BoundedChannel> {
    shared: Arc<Shared<C>>,
}

impl<C: BoundedChannel> Consumer<C> {
    #[inline(always)]
    pub fn pop(&mut self) -> Option<C::Item> {
        self.shared.0.pop()
    }

    #[inline(always)]
    pub fn pop_into(&mut self, out: &mut C::Item) -> bool {
        self.shared.0.pop_into(out)
    }

    /// Pops until the queue reports empty.
    pub fn drain(&mut self) -> impl Iterator<Item = C::Item> + '_ {
        core::iter::from_fn(move || self.pop())
    }

    pub fn size(&self) -> usize {
        self.shared.0.size()
    }

    pub fn capacity(&self) -> usize {
        self.shared.0.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.0.is_empty()
    }

    #[inline(always)]
    pub(crate) fn engine(&self) -> &C {
        &self.shared.0
    }
}

impl<C: BoundedChannel> fmt::Debug for Producer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<C: BoundedChannel> fmt::Debug for Consumer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .finish()
    }
}
