//! # Liveness Tracking
//!
//! A link is online while valid frames keep arriving within its timeout
//! window; it goes offline once the silence exceeds the timeout. Consumers
//! must check [`LinkStatus::is_online`] before trusting a link's decoded
//! state; going offline is the only failure signal a link exposes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::arbitration::PrioritySequence;

/// Lock-free, consumer-readable online flag of one link.
#[derive(Debug)]
pub struct LinkStatus {
    name: &'static str,
    online: AtomicBool,
    last_alive_ms: AtomicU64,
}

impl LinkStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            online: AtomicBool::new(false),
            last_alive_ms: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a valid frame arrived within the timeout window.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Clock reading of the last valid frame.
    pub fn last_alive_ms(&self) -> u64 {
        self.last_alive_ms.load(Ordering::Acquire)
    }
}

/// Worker-owned liveness bookkeeping for one link.
///
/// Radio links also own a bit in the shared [`PrioritySequence`]; it is set on
/// every valid frame and cleared together with the online flag.
#[derive(Debug)]
pub struct LivenessTracker {
    status: Arc<LinkStatus>,
    timeout_ms: u64,
    arbitration: Option<(Arc<PrioritySequence>, u8)>,
}

impl LivenessTracker {
    pub fn new(status: Arc<LinkStatus>, timeout: Duration) -> Self {
        Self {
            status,
            timeout_ms: timeout.as_millis() as u64,
            arbitration: None,
        }
    }

    /// Tie this link's liveness to its arbitration bit.
    #[must_use]
    pub fn with_arbitration(mut self, sequence: Arc<PrioritySequence>, priority: u8) -> Self {
        self.arbitration = Some((sequence, priority));
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn status(&self) -> &Arc<LinkStatus> {
        &self.status
    }

    /// Record a successfully decoded frame.
    pub fn mark_alive(&self, now_ms: u64) {
        self.status.last_alive_ms.store(now_ms, Ordering::Release);

        if let Some((sequence, priority)) = &self.arbitration {
            sequence.mark_alive(*priority);
        }

        if !self.status.online.swap(true, Ordering::AcqRel) {
            info!("{} link online", self.status.name);
        }
    }

    /// Check the timeout window; returns `true` if the link just went offline.
    pub fn evaluate(&self, now_ms: u64) -> bool {
        if !self.status.is_online() {
            return false;
        }

        let silent_for = now_ms.saturating_sub(self.status.last_alive_ms());
        if silent_for <= self.timeout_ms {
            return false;
        }

        self.status.online.store(false, Ordering::Release);
        if let Some((sequence, priority)) = &self.arbitration {
            sequence.mark_timeout(*priority);
        }

        warn!(
            "{} link offline (no valid frame for {} ms)",
            self.status.name, silent_for
        );
        true
    }
}
