//! Bounded lock-free MPMC queue over sequenced ring cells.
//!
//! Each cell carries an atomic sequence counter that encodes both whether
//! the slot is ready to be written or read and which lap of the ring it
//! belongs to, so slots can be reused without tagged pointers or
//! double-width CAS. Producers and consumers claim logical positions with a
//! single-word CAS and publish the slot through the cell sequence.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::util::CachePadded;

/// One ring slot: the sequence counter gates access to the value storage.
///
/// At rest the sequence is either the next position for which the slot may
/// be written (slot empty) or that position plus one (slot filled, ready to
/// read).
struct Cell<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A bounded multi-producer multi-consumer FIFO queue.
///
/// The capacity must be a power of two and at least 2. Both [`push`] and
/// [`pop`] are non-blocking: they report a full or empty queue instead of
/// waiting. The queue is shared through an [`Arc`](std::sync::Arc); it is
/// destroyed when the last handle drops, and any elements still inside are
/// dropped with it.
///
/// Ordering guarantees: the element pushed at logical position `p` is the
/// one popped at logical position `p`, and everything a producer did before
/// a successful `push` is visible to the consumer that pops that element.
/// Which of two racing producers claims the earlier position is undefined.
///
/// [`push`]: MpmcQueue::push
/// [`pop`]: MpmcQueue::pop
pub struct MpmcQueue<T> {
    buffer: Box<[CachePadded<Cell<T>>]>,
    mask: usize,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

// The queue hands each element to exactly one consumer, so it only needs
// T: Send, not T: Sync.
unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    /// Create a queue holding up to `capacity` elements.
    ///
    /// Fails with [`Error::InvalidCapacity`] when `capacity` is below 2 or
    /// not a power of two.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(Error::InvalidCapacity(capacity));
        }

        let buffer = (0..capacity)
            .map(|i| {
                CachePadded::new(Cell {
                    sequence: AtomicUsize::new(i),
                    value: UnsafeCell::new(MaybeUninit::uninit()),
                })
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            buffer,
            mask: capacity - 1,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Maximum number of elements the queue can hold.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Attempt to move `value` into the queue.
    ///
    /// Returns `Err(value)` when the queue is full, handing the element
    /// back to the caller. Never blocks.
    pub fn push(&self, value: T) -> std::result::Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos) as isize;

            if diff == 0 {
                // The slot is writable at this position; race other
                // producers for the claim. The CAS is relaxed because the
                // sequence store below, not the position, publishes the
                // value.
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*cell.value.get()).write(value) };
                        cell.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // The consumer a full lap behind has not released this
                // slot yet.
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempt to take the oldest element out of the queue.
    ///
    /// Returns `None` when the queue is empty. Never blocks.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[pos & self.mask];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos.wrapping_add(1)) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Winning the CAS makes this thread the sole owner
                        // of the slot until the sequence store below.
                        let value = unsafe { (*cell.value.get()).assume_init_read() };
                        cell.sequence
                            .store(pos.wrapping_add(self.mask + 1), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        // &mut self means no concurrent operations; pop until empty so the
        // unconsumed elements run their destructors.
        while self.pop().is_some() {}
    }
}

impl<T> fmt::Debug for MpmcQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpmcQueue")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
