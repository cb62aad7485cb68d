//! Block accumulation for the analyzer tap
//!
//! The audio thread hands over whatever block size the host gives it. The
//! analyzer wants fixed-size blocks. [`BlockAccumulator`] collects one
//! channel's samples into fixed-length blocks and pushes each completed block
//! into a ring buffer; [`BlockReceiver`] pops them on the observer side and
//! shifts them into a [`SlidingWindow`] holding the most recent N samples.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::ring_buffer::{RingBuffer, RingConsumer, RingProducer};

/// Channel of a stereo signal that a tap listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Left, Channel::Right];

    /// Index into a planar buffer
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
        }
    }
}

/// Build a matched accumulator / receiver pair for one channel
///
/// `block_len` is clamped to at least one sample.
pub fn channel_tap(
    channel: Channel,
    block_len: usize,
    capacity: usize,
) -> (BlockAccumulator, BlockReceiver) {
    let block_len = block_len.max(1);
    let prototype = vec![0.0_f32; block_len];
    let (producer, consumer) = RingBuffer::new(capacity, &prototype).split();
    let dropped = Arc::new(AtomicU64::new(0));

    (
        BlockAccumulator {
            channel,
            block: prototype.clone(),
            fill: 0,
            producer,
            dropped: Arc::clone(&dropped),
        },
        BlockReceiver {
            channel,
            consumer,
            scratch: prototype,
            dropped,
        },
    )
}

/// Audio-thread half of a channel tap
pub struct BlockAccumulator {
    channel: Channel,
    block: Vec<f32>,
    fill: usize,
    producer: RingProducer<Vec<f32>>,
    dropped: Arc<AtomicU64>,
}

impl BlockAccumulator {
    /// Append samples, pushing every block that fills up
    ///
    /// A block that finds the ring full is dropped and counted; the
    /// accumulator starts a fresh block either way.
    pub fn ingest(&mut self, samples: &[f32]) {
        let block_len = self.block.len();
        let mut remaining = samples;

        while !remaining.is_empty() {
            let take = (block_len - self.fill).min(remaining.len());
            self.block[self.fill..self.fill + take].copy_from_slice(&remaining[..take]);
            self.fill += take;
            remaining = &remaining[take..];

            if self.fill == block_len {
                if !self.producer.try_push(&self.block) {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                self.fill = 0;
            }
        }
    }

    /// Ingest this tap's channel out of a planar buffer
    ///
    /// Buffers that lack the channel are ignored.
    pub fn ingest_buffer(&mut self, buffer: &AudioBuffer) {
        if let Some(samples) = buffer.samples.get(self.channel.index()) {
            self.ingest(samples);
        }
    }

    /// Samples sitting in the partially filled block
    pub fn pending(&self) -> usize {
        self.fill
    }

    pub fn block_len(&self) -> usize {
        self.block.len()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Completed blocks waiting on the observer side
    pub fn blocks_ready(&self) -> usize {
        self.producer.available_for_read()
    }
}

/// Observer-thread half of a channel tap
pub struct BlockReceiver {
    channel: Channel,
    consumer: RingConsumer<Vec<f32>>,
    scratch: Vec<f32>,
    dropped: Arc<AtomicU64>,
}

impl BlockReceiver {
    /// Pop one block into `window`. Returns `false` if nothing was ready.
    pub fn pop_into(&mut self, window: &mut SlidingWindow) -> bool {
        if !self.consumer.try_pop(&mut self.scratch) {
            return false;
        }
        window.push_block(&self.scratch);
        true
    }

    /// Pop every ready block into `window`, oldest first
    ///
    /// Returns the number of blocks consumed. Zero is a normal outcome.
    pub fn drain_into(&mut self, window: &mut SlidingWindow) -> usize {
        let mut drained = 0;
        while self.pop_into(window) {
            drained += 1;
        }
        drained
    }

    /// Pop and discard every ready block
    pub fn discard_ready(&mut self) -> usize {
        let mut discarded = 0;
        while self.consumer.try_pop(&mut self.scratch) {
            discarded += 1;
        }
        discarded
    }

    pub fn blocks_ready(&self) -> usize {
        self.consumer.available_for_read()
    }

    /// Blocks lost because the ring was full when they completed
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn block_len(&self) -> usize {
        self.scratch.len()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// Fixed-length window that always holds the most recent samples, oldest
/// first
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: Vec<f32>,
}

impl SlidingWindow {
    /// Create a silent window of `len` samples
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    /// Shift left by `block.len()` and append `block` at the tail
    pub fn push_block(&mut self, block: &[f32]) {
        let len = self.samples.len();
        if block.len() >= len {
            self.samples
                .copy_from_slice(&block[block.len() - len..]);
            return;
        }

        let shift = block.len();
        self.samples.copy_within(shift.., 0);
        self.samples[len - shift..].copy_from_slice(block);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Back to silence
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}
