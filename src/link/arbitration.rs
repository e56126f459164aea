//! # Priority Arbitration
//!
//! One shared bitmask, one bit per redundant source. Lower index means higher
//! priority: a source is admitted only while no source with a strictly lower
//! index holds its bit, so the highest-priority live source exclusively owns
//! the shared outputs.
//!
//! The mask is read from the receive (interrupt) path, so it is a bare atomic
//! with no lock.

use std::sync::atomic::{AtomicU8, Ordering};

/// Highest priority index a source may use.
pub const MAX_PRIORITY: u8 = 6;

/// Sentinel bit that is always set, so `trailing_zeros` is bounded even when
/// no source is live.
const SENTINEL: u8 = 1 << 7;

/// Process-wide arbitration state shared by every redundant source.
#[derive(Debug)]
pub struct PrioritySequence {
    mask: AtomicU8,
}

impl PrioritySequence {
    /// No source live.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mask: AtomicU8::new(SENTINEL),
        }
    }

    /// Whether a frame from the source at `priority` may be enqueued.
    ///
    /// True iff no source with a lower index is currently live.
    pub fn admit(&self, priority: u8) -> bool {
        self.mask.load(Ordering::Acquire).trailing_zeros() >= u32::from(priority)
    }

    /// Record that the source at `priority` is live.
    pub fn mark_alive(&self, priority: u8) {
        self.mask.fetch_or(bit(priority), Ordering::AcqRel);
    }

    /// Record that the source at `priority` went silent.
    pub fn mark_timeout(&self, priority: u8) {
        self.mask.fetch_and(!bit(priority), Ordering::AcqRel);
    }

    /// Whether the source at `priority` currently holds its bit.
    pub fn is_live(&self, priority: u8) -> bool {
        self.mask.load(Ordering::Acquire) & bit(priority) != 0
    }

    /// The live source with the lowest index, if any.
    pub fn active(&self) -> Option<u8> {
        let index = self.mask.load(Ordering::Acquire).trailing_zeros() as u8;
        (index <= MAX_PRIORITY).then_some(index)
    }
}

impl Default for PrioritySequence {
    fn default() -> Self {
        Self::new()
    }
}

fn bit(priority: u8) -> u8 {
    debug_assert!(priority <= MAX_PRIORITY, "priority {priority} out of range");
    1 << priority.min(MAX_PRIORITY)
}
