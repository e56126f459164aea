//! # Link Module
//!
//! Plumbing shared by every serial link, independent of its wire protocol.
//!
//! This module handles:
//! - Moving raw bytes out of the receive (interrupt) path through a bounded
//!   [`channel`]
//! - Cross-source priority [`arbitration`] between redundant radio receivers
//! - Online/offline [`liveness`] tracking
//! - The lock-guarded decoded-state [`store`]
//! - The per-link worker loop that ties them together
//!
//! A link is split into two halves. The receive half implements [`RxSink`]:
//! it runs in interrupt context, checks only cheap invariants and enqueues
//! bytes without blocking. The worker half ([`LinkWorker`]) owns the channel
//! consumer, a protocol-specific [`FrameHandler`] and the link's liveness.

pub mod arbitration;
pub mod channel;
pub mod liveness;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use channel::ChannelReceiver;
use liveness::LivenessTracker;

pub use arbitration::PrioritySequence;
pub use liveness::LinkStatus;
pub use store::StateStore;

/// Extra wait so an empty pop lands strictly past the liveness timeout
const POLL_MARGIN: Duration = Duration::from_millis(1);

/// Receive-side entry point of a link (interrupt context).
///
/// Implementations must not block, allocate or log above `trace` level.
pub trait RxSink: Send {
    /// Offer a received chunk. Returns `true` if it was accepted.
    fn on_receive(&mut self, buf: &[u8]) -> bool;
}

/// Protocol-specific decoding run by a link's worker.
pub trait FrameHandler: Send {
    /// Decode one received chunk and apply it to the link's state.
    ///
    /// Returns the number of valid frames found; any valid frame refreshes
    /// the link's liveness.
    fn handle(&mut self, chunk: &[u8], now_ms: u64) -> usize;
}

/// Dedicated worker of one link.
pub struct LinkWorker<H, const N: usize, const Q: usize> {
    rx: ChannelReceiver<N, Q>,
    handler: H,
    liveness: LivenessTracker,
    clock: Arc<dyn Clock>,
}

impl<H: FrameHandler, const N: usize, const Q: usize> LinkWorker<H, N, Q> {
    pub fn new(rx: ChannelReceiver<N, Q>, handler: H, liveness: LivenessTracker, clock: Arc<dyn Clock>) -> Self {
        Self {
            rx,
            handler,
            liveness,
            clock,
        }
    }

    /// One iteration: wait for the next chunk (just past the liveness
    /// timeout), decode it, then evaluate the timeout window.
    pub async fn step(&mut self) {
        let chunk = self.rx.pop_blocking(self.liveness.timeout() + POLL_MARGIN).await;
        let now = self.clock.now_ms();

        if let Some(chunk) = chunk {
            if self.handler.handle(&chunk, now) > 0 {
                self.liveness.mark_alive(now);
            }
        }

        self.liveness.evaluate(now);
    }

    /// Run until the task is dropped or aborted.
    pub async fn run(mut self) {
        loop {
            self.step().await;
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn status(&self) -> &Arc<LinkStatus> {
        self.liveness.status()
    }
}

impl<H, const N: usize, const Q: usize> std::fmt::Debug for LinkWorker<H, N, Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkWorker")
            .field("rx", &self.rx)
            .field("liveness", &self.liveness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;

    /// Accepts chunks starting with 0x01, counts everything it sees.
    struct Counting {
        seen: usize,
    }

    impl FrameHandler for Counting {
        fn handle(&mut self, chunk: &[u8], _now_ms: u64) -> usize {
            self.seen += 1;
            usize::from(chunk.first() == Some(&0x01))
        }
    }

    fn worker(timeout_ms: u64) -> (channel::ChannelSender<4, 4>, LinkWorker<Counting, 4, 4>) {
        let (tx, rx) = channel::byte_channel::<4, 4>();
        let liveness = LivenessTracker::new(Arc::new(LinkStatus::new("test")), Duration::from_millis(timeout_ms));
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        (tx, LinkWorker::new(rx, Counting { seen: 0 }, liveness, clock))
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_chunk_brings_link_online() {
        let (mut tx, mut w) = worker(100);
        assert!(tx.try_push(&[0x01]));

        w.step().await;
        assert!(w.status().is_online());
        assert_eq!(w.handler().seen, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_chunks_do_not_keep_link_alive() {
        let (mut tx, mut w) = worker(100);
        tx.try_push(&[0x01]);
        w.step().await;

        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tx.try_push(&[0xFF]);
            w.step().await;
        }

        assert_eq!(w.handler().seen, 6);
        assert!(!w.status().is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out() {
        let (mut tx, mut w) = worker(100);
        tx.try_push(&[0x01]);
        w.step().await;
        assert!(w.status().is_online());

        // Nothing queued: pop waits the full timeout
        w.step().await;
        assert!(!w.status().is_online());
    }
}
