//! Lock-free single-producer / single-consumer ring buffer
//!
//! Moves fixed-size items (audio blocks, mostly) from the audio thread to the
//! observer thread. The buffer is split into a [`RingProducer`] and a
//! [`RingConsumer`] at construction, so "exactly one writer, exactly one
//! reader" is enforced by ownership rather than by convention.
//!
//! Slots are allocated once up front from a prototype value. Pushing and
//! popping copy through [`Clone::clone_from`], which for equally sized
//! `Vec<f32>` blocks reuses the existing allocation: steady state is
//! allocation-free on both sides.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of slots (one second of 512-sample blocks at ~15 kHz,
/// plenty for a 60 Hz observer)
pub const DEFAULT_CAPACITY: usize = 30;

struct Shared<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// Monotonic count of items popped. Written only by the consumer.
    read: AtomicUsize,
    /// Monotonic count of items pushed. Written only by the producer.
    write: AtomicUsize,
}

// SAFETY: a slot is only ever accessed by one side at a time. The producer
// touches slot `write % cap` only while it is outside the readable range
// `[read, write)`, the consumer touches slot `read % cap` only while it is
// inside it. Ownership of a slot is handed over by the Release store of the
// corresponding cursor and picked up by the Acquire load on the other side.
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    #[inline]
    fn slot(&self, cursor: usize) -> *mut T {
        self.slots[cursor % self.capacity()].get()
    }
}

/// Fixed-capacity SPSC ring buffer, not yet split into its two halves
pub struct RingBuffer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a ring buffer whose slots are all initialised from `prototype`
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize, prototype: &T) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| UnsafeCell::new(prototype.clone()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shared: Arc::new(Shared {
                slots,
                read: AtomicUsize::new(0),
                write: AtomicUsize::new(0),
            }),
        }
    }
}

impl<T> RingBuffer<T> {
    /// Split into the writer half and the reader half
    pub fn split(self) -> (RingProducer<T>, RingConsumer<T>) {
        (
            RingProducer {
                shared: Arc::clone(&self.shared),
            },
            RingConsumer {
                shared: self.shared,
            },
        )
    }
}

/// Writer half. Lives on the audio thread.
pub struct RingProducer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> RingProducer<T> {
    /// Copy `item` into the next free slot
    ///
    /// Returns `false` and leaves the buffer untouched when it is full. Never
    /// blocks.
    pub fn try_push(&mut self, item: &T) -> bool {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let read = shared.read.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= shared.capacity() {
            return false;
        }

        // SAFETY: `write` is outside `[read, write)`, so the consumer is not
        // reading this slot, and the Acquire load of `read` above ordered its
        // last read of it before this write.
        unsafe {
            (*shared.slot(write)).clone_from(item);
        }

        shared.write.store(write.wrapping_add(1), Ordering::Release);
        true
    }
}

impl<T> RingProducer<T> {
    /// Number of items waiting to be popped
    pub fn available_for_read(&self) -> usize {
        self.shared.len()
    }

    /// Number of items that can be pushed before the buffer is full
    pub fn free_space(&self) -> usize {
        self.shared.capacity() - self.shared.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Reader half. Lives on the observer thread.
pub struct RingConsumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> RingConsumer<T> {
    /// Copy the oldest item into `out` and release its slot
    ///
    /// Returns `false` and leaves `out` untouched when the buffer is empty.
    pub fn try_pop(&mut self, out: &mut T) -> bool {
        let shared = &*self.shared;
        let read = shared.read.load(Ordering::Relaxed);
        let write = shared.write.load(Ordering::Acquire);

        if read == write {
            return false;
        }

        // SAFETY: `read` is inside `[read, write)`; the producer published it
        // with the Release store we just acquired and will not touch it again
        // until `read` moves past it.
        unsafe {
            out.clone_from(&*shared.slot(read));
        }

        shared.read.store(read.wrapping_add(1), Ordering::Release);
        true
    }
}

impl<T> RingConsumer<T> {
    /// Number of items waiting to be popped
    pub fn available_for_read(&self) -> usize {
        self.shared.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_then_pop_round_trips() {
        let (mut tx, mut rx) = RingBuffer::new(4, &vec![0.0_f32; 3]).split();

        assert!(tx.try_push(&vec![1.0, 2.0, 3.0]));
        assert_eq!(rx.available_for_read(), 1);

        let mut out = vec![0.0; 3];
        assert!(rx.try_pop(&mut out));
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
        assert_eq!(rx.available_for_read(), 0);
    }

    #[test]
    fn test_pop_on_empty_leaves_output_alone() {
        let (_tx, mut rx) = RingBuffer::new(2, &0.0_f32).split();
        let mut out = 7.0;
        assert!(!rx.try_pop(&mut out));
        assert_eq!(out, 7.0);
    }

    #[test]
    fn test_full_buffer_rejects_push() {
        let (mut tx, mut rx) = RingBuffer::new(30, &0_u32).split();

        for i in 0..30 {
            assert!(tx.try_push(&i), "push {} should succeed", i);
        }
        assert_eq!(tx.free_space(), 0);
        assert!(!tx.try_push(&99));
        assert_eq!(rx.available_for_read(), 30);

        // The rejected item never made it in; the first item is still first
        let mut out = 0;
        assert!(rx.try_pop(&mut out));
        assert_eq!(out, 0);
    }

    #[test]
    fn test_fifo_order_across_wraparound() {
        let (mut tx, mut rx) = RingBuffer::new(3, &0_usize).split();
        let mut out = 0;

        for round in 0..10 {
            assert!(tx.try_push(&(round * 2)));
            assert!(tx.try_push(&(round * 2 + 1)));
            assert!(rx.try_pop(&mut out));
            assert_eq!(out, round * 2);
            assert!(rx.try_pop(&mut out));
            assert_eq!(out, round * 2 + 1);
        }
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let (tx, _rx) = RingBuffer::new(0, &0_u8).split();
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    fn test_cross_thread_transfer_preserves_order() {
        const COUNT: usize = 20_000;
        let (mut tx, mut rx) = RingBuffer::new(8, &[0_usize; 4]).split();

        let producer = thread::spawn(move || {
            for i in 0..COUNT {
                let item = [i, i + 1, i + 2, i + 3];
                while !tx.try_push(&item) {
                    thread::yield_now();
                }
            }
        });

        let mut expected = 0;
        let mut out = [0_usize; 4];
        while expected < COUNT {
            if rx.try_pop(&mut out) {
                assert_eq!(out, [expected, expected + 1, expected + 2, expected + 3]);
                expected += 1;
            } else {
                thread::yield_now();
            }
        }

        producer.join().expect("producer thread panicked");
        assert_eq!(rx.available_for_read(), 0);
    }
}
