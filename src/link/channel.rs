//! # Byte Channel
//!
//! Bounded single-producer/single-consumer hand-off from the receive
//! (interrupt) side to the link's worker.
//!
//! The producer half never blocks and never allocates: each accepted chunk is
//! copied into a fixed-capacity [`Frame`] slot of a `heapless` SPSC queue, and
//! the worker is woken through a [`Notify`] permit. When the queue is full the
//! incoming chunk is dropped silently; a stale or torn frame is worse than a
//! missing one, and the loss surfaces later as a liveness timeout.

use std::sync::Arc;
use std::time::Duration;

use heapless::spsc::{Consumer, Producer, Queue};
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

/// One received chunk, at most `N` bytes.
pub type Frame<const N: usize> = heapless::Vec<u8, N>;

/// Create a byte channel carrying chunks of up to `N` bytes.
///
/// The queue holds `Q - 1` chunks. Channels are created once per link and
/// live for the rest of the process, so the backing queue is leaked to obtain
/// `'static` halves.
pub fn byte_channel<const N: usize, const Q: usize>() -> (ChannelSender<N, Q>, ChannelReceiver<N, Q>) {
    let queue: &'static mut Queue<Frame<N>, Q> = Box::leak(Box::new(Queue::new()));
    let (producer, consumer) = queue.split();
    let notify = Arc::new(Notify::new());

    (
        ChannelSender {
            producer,
            notify: Arc::clone(&notify),
            dropped: 0,
        },
        ChannelReceiver { consumer, notify },
    )
}

/// Receive-side (interrupt context) half of a byte channel.
pub struct ChannelSender<const N: usize, const Q: usize> {
    producer: Producer<'static, Frame<N>, Q>,
    notify: Arc<Notify>,
    dropped: u32,
}

impl<const N: usize, const Q: usize> ChannelSender<N, Q> {
    /// Enqueue a chunk without blocking.
    ///
    /// Returns `false` (and drops the chunk) if it is longer than `N` bytes or
    /// the queue is full.
    pub fn try_push(&mut self, bytes: &[u8]) -> bool {
        let Ok(frame) = Frame::<N>::from_slice(bytes) else {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        };

        if self.producer.enqueue(frame).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
            return false;
        }

        self.notify.notify_one();
        true
    }

    /// Number of chunks that can be queued right now.
    pub fn free(&self) -> usize {
        (Q - 1).saturating_sub(self.producer.len())
    }

    /// Count a chunk dropped by the caller without offering it.
    pub fn record_drop(&mut self) {
        self.dropped = self.dropped.wrapping_add(1);
    }

    /// Number of chunks dropped so far.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl<const N: usize, const Q: usize> std::fmt::Debug for ChannelSender<N, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSender")
            .field("capacity", &(Q - 1))
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

/// Worker-side half of a byte channel.
pub struct ChannelReceiver<const N: usize, const Q: usize> {
    consumer: Consumer<'static, Frame<N>, Q>,
    notify: Arc<Notify>,
}

impl<const N: usize, const Q: usize> ChannelReceiver<N, Q> {
    /// Wait for the next chunk, giving up after `timeout`.
    ///
    /// `None` means the timeout elapsed with nothing queued. That is not an
    /// error: it is how the worker detects a silent link.
    pub async fn pop_blocking(&mut self, timeout: Duration) -> Option<Frame<N>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(frame) = self.consumer.dequeue() {
                return Some(frame);
            }

            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                return self.consumer.dequeue();
            }
        }
    }

    /// Number of chunks currently queued.
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize, const Q: usize> std::fmt::Debug for ChannelReceiver<N, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReceiver")
            .field("queued", &self.len())
            .finish_non_exhaustive()
    }
}
