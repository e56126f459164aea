//! # Referee-System Link
//!
//! Streaming decoder and transmit API for the referee-system uplink.
//!
//! This module handles:
//! - Locating and verifying frames in the byte stream ([`parser`])
//! - Dispatching verified payloads into fixed-size records ([`records`])
//! - Filtering by a command allow-list
//! - Building outbound frames ([`encoder`]) and sending them ([`tx`])
//!
//! Every verified frame refreshes the link's liveness, including frames whose
//! command is filtered out or has no record: liveness means "the link is
//! talking", not "it sent something we use".

pub mod encoder;
pub mod parser;
pub mod protocol;
pub mod records;
pub mod tx;

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::clock::{Clock, MonotonicClock};
use crate::link::channel::{byte_channel, ChannelSender};
use crate::link::liveness::LivenessTracker;
use crate::link::{FrameHandler, LinkStatus, LinkWorker, RxSink, StateStore};

pub use parser::{FrameSynchronizer, ParserStats, RefereeFrame};
pub use protocol::{CmdId, UiCmd};
pub use records::{CmdFilter, RefereeData};
pub use tx::RefereeTx;

/// Largest chunk a referee channel slot holds
pub const REFEREE_CHUNK_LEN: usize = 64;
/// Queue length of the referee byte channel (1 KiB of buffered stream)
pub const REFEREE_QUEUE_LEN: usize = 17;

/// Receive (interrupt) side of the referee link.
///
/// The stream has no per-event framing, so every burst is admitted. A burst
/// is queued whole or not at all: a partly queued burst would leave a torn
/// frame for the synchronizer to swallow the next one with.
#[derive(Debug)]
pub struct RefereeRx {
    tx: ChannelSender<REFEREE_CHUNK_LEN, REFEREE_QUEUE_LEN>,
}

impl RxSink for RefereeRx {
    fn on_receive(&mut self, buf: &[u8]) -> bool {
        if buf.len().div_ceil(REFEREE_CHUNK_LEN) > self.tx.free() {
            self.tx.record_drop();
            return false;
        }

        buf.chunks(REFEREE_CHUNK_LEN).all(|chunk| self.tx.try_push(chunk))
    }
}

/// Worker-side decoding of the referee stream.
#[derive(Debug)]
pub struct RefereeHandler {
    parser: FrameSynchronizer,
    filter: CmdFilter,
    data: StateStore<RefereeData>,
    stats: StateStore<ParserStats>,
}

impl RefereeHandler {
    pub fn new(filter: CmdFilter, data: StateStore<RefereeData>, stats: StateStore<ParserStats>) -> Self {
        Self {
            parser: FrameSynchronizer::new(),
            filter,
            data,
            stats,
        }
    }
}

impl FrameHandler for RefereeHandler {
    fn handle(&mut self, chunk: &[u8], _now_ms: u64) -> usize {
        let filter = &self.filter;
        let data = &self.data;

        let frames = self.parser.feed(chunk, |frame| dispatch(filter, data, frame));

        let stats = *self.parser.stats();
        self.stats.update(|s| *s = stats);
        frames
    }
}

/// Copy one verified frame into its record, if it is allowed and has one.
fn dispatch(filter: &CmdFilter, data: &StateStore<RefereeData>, frame: RefereeFrame<'_>) {
    if !filter.allows(frame.cmd_id) {
        trace!("Referee: command 0x{:04X} not subscribed", frame.cmd_id);
        return;
    }

    let Some(cmd) = CmdId::from_id(frame.cmd_id) else {
        trace!("Referee: unknown command 0x{:04X}", frame.cmd_id);
        return;
    };

    if data.update(|d| d.apply(cmd, frame.payload)).is_none() {
        trace!("Referee: {:?} carries no record", cmd);
    }
}

/// Worker of the referee link.
pub type RefereeWorker = LinkWorker<RefereeHandler, REFEREE_CHUNK_LEN, REFEREE_QUEUE_LEN>;

/// Consumer handle to the referee link's decoded state.
#[derive(Debug, Clone)]
pub struct RefereeHandle {
    data: StateStore<RefereeData>,
    stats: StateStore<ParserStats>,
    status: Arc<LinkStatus>,
}

impl RefereeHandle {
    /// Read the records under the store lock.
    pub fn read<R>(&self, f: impl FnOnce(&RefereeData) -> R) -> R {
        self.data.read(f)
    }

    pub fn snapshot(&self) -> RefereeData {
        self.data.snapshot()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats.snapshot()
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    pub fn status(&self) -> &Arc<LinkStatus> {
        &self.status
    }
}

/// Builder wiring the referee link.
pub struct RefereeLink {
    filter: CmdFilter,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for RefereeLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RefereeLink {
    /// All commands subscribed, 2 s timeout.
    pub fn new() -> Self {
        Self {
            filter: CmdFilter::all(),
            timeout: protocol::DEFAULT_TIMEOUT,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Restrict updates to `cmds` (empty = all).
    #[must_use]
    pub fn with_subscriptions(mut self, cmds: &[CmdId]) -> Self {
        self.filter = CmdFilter::from_cmds(cmds);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: CmdFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the receive half, the worker and the consumer handle.
    pub fn build(self) -> (RefereeRx, RefereeWorker, RefereeHandle) {
        let (tx, rx) = byte_channel::<REFEREE_CHUNK_LEN, REFEREE_QUEUE_LEN>();
        let data = StateStore::new(RefereeData::default());
        let stats = StateStore::new(ParserStats::default());
        let status = Arc::new(LinkStatus::new("referee"));
        let liveness = LivenessTracker::new(Arc::clone(&status), self.timeout);

        let handler = RefereeHandler::new(self.filter, data.clone(), stats.clone());
        let worker = LinkWorker::new(rx, handler, liveness, self.clock);
        let handle = RefereeHandle { data, stats, status };

        (RefereeRx { tx }, worker, handle)
    }
}
