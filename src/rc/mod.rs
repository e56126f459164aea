//! # Radio-Control Links
//!
//! Fixed-frame validation and unpacking for the two radio-control receivers.
//!
//! This module handles:
//! - The [`RcProtocol`] seam implemented by [`Dr16`] and [`Vt03`]
//! - Receive-side admission (length, magic prefix, priority arbitration)
//! - Channel normalisation and keyboard/mouse event extraction
//! - Wiring a protocol into a link with [`RcLink`]
//! - The consumer view over both receivers ([`RcHub`])
//!
//! Each receive event carries exactly one frame. A frame that fails validation
//! is discarded whole and the previous control state is kept.

pub mod dr16;
pub mod vt03;

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::{Clock, MonotonicClock};
use crate::error::FrameError;
use crate::input::{Button, ButtonTiming};
use crate::link::channel::{byte_channel, ChannelSender};
use crate::link::liveness::LivenessTracker;
use crate::link::{FrameHandler, LinkStatus, LinkWorker, PrioritySequence, RxSink, StateStore};

pub use dr16::{Dr16, Dr16Control, Dr16Frame, SwitchPosition};
pub use vt03::{GearPosition, Vt03, Vt03Control, Vt03Frame};

/// Lowest valid raw stick value
pub const CH_VALUE_MIN: u16 = 364;
/// Highest valid raw stick value
pub const CH_VALUE_MAX: u16 = 1684;
/// Raw stick centre
pub const CH_VALUE_OFFSET: u16 = 1024;
/// Raw distance from centre to full deflection
pub const CH_VALUE_SPAN: f32 = 660.0;
/// Divisor mapping raw mouse axes to [-1.0, 1.0)
pub const MOUSE_SCALE: f32 = 32768.0;

/// Largest chunk an RC channel slot holds (covers both frame sizes)
pub const RC_CHUNK_LEN: usize = 32;
/// Queue length of an RC byte channel (holds four frames)
pub const RC_QUEUE_LEN: usize = 5;

/// One radio-control wire protocol.
pub trait RcProtocol: Send + Sync + 'static {
    /// Short name used in logs
    const NAME: &'static str;
    /// Exact size of one frame on the wire
    const FRAME_LEN: usize;
    /// Arbitration index (0 pre-empts every other source)
    const PRIORITY: u8;
    /// Silence after which the link is considered lost
    const DEFAULT_TIMEOUT: Duration;

    /// Validated, still raw frame fields.
    type Frame: Debug;
    /// Decoded state exposed to consumers.
    type Control: Default + Clone + Debug + Send + Sync + 'static;

    /// Cheap receive-side check (length, magic prefix).
    fn admits(buf: &[u8]) -> bool {
        buf.len() == Self::FRAME_LEN
    }

    /// Extract and validate every field of one frame.
    fn decode(buf: &[u8]) -> Result<Self::Frame, FrameError>;

    /// Apply a validated frame to the control state.
    fn apply(control: &mut Self::Control, frame: &Self::Frame, now_ms: u64, timing: &ButtonTiming);

    /// Normalised stick view of the control state.
    fn sticks(control: &Self::Control) -> Sticks;
}

/// Normalised analog inputs common to every receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Sticks {
    pub lx: f32,
    pub ly: f32,
    pub rx: f32,
    pub ry: f32,
    pub wheel: f32,
}

/// Map a raw stick value to [-1.0, 1.0].
pub fn normalize_channel(raw: u16) -> f32 {
    (f32::from(raw) - f32::from(CH_VALUE_OFFSET)) / CH_VALUE_SPAN
}

/// Reject a raw stick value outside the calibrated range.
pub fn check_channel(name: &'static str, value: u16) -> Result<u16, FrameError> {
    if (CH_VALUE_MIN..=CH_VALUE_MAX).contains(&value) {
        Ok(value)
    } else {
        Err(FrameError::ChannelRange { name, value })
    }
}

/// Extract `width` bits starting at bit `offset` of a little-endian word.
pub(crate) fn bits(word: u64, offset: u32, width: u32) -> u16 {
    ((word >> offset) & ((1u64 << width) - 1)) as u16
}

/// Keyboard keys in wire bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    W,
    S,
    A,
    D,
    Shift,
    Ctrl,
    Q,
    E,
    R,
    F,
    G,
    Z,
    X,
    C,
    V,
    B,
}

impl Key {
    pub const ALL: [Key; 16] = [
        Key::W,
        Key::S,
        Key::A,
        Key::D,
        Key::Shift,
        Key::Ctrl,
        Key::Q,
        Key::E,
        Key::R,
        Key::F,
        Key::G,
        Key::Z,
        Key::X,
        Key::C,
        Key::V,
        Key::B,
    ];

    /// Mask of this key in the wire `key_code`.
    pub fn mask(self) -> u16 {
        1 << self as u16
    }
}

/// Logical state of the 16 keyboard keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keyboard {
    keys: [Button; 16],
}

impl Keyboard {
    /// Feed one `key_code` bitmask.
    pub fn update(&mut self, key_code: u16, now_ms: u64, timing: &ButtonTiming) {
        for (i, button) in self.keys.iter_mut().enumerate() {
            button.update((key_code >> i) & 1 != 0, now_ms, timing);
        }
    }

    pub fn key(&self, key: Key) -> &Button {
        &self.keys[key as usize]
    }

    /// Debounced key levels packed in wire bit order.
    pub fn down_mask(&self) -> u16 {
        Key::ALL
            .iter()
            .filter(|k| self.key(**k).is_down())
            .fold(0, |mask, k| mask | k.mask())
    }
}

/// Normalised mouse axes and logical button state.
///
/// `middle` stays idle on receivers that do not report it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mouse {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub left: Button,
    pub right: Button,
    pub middle: Button,
}

impl Mouse {
    pub(crate) fn set_axes(&mut self, axes: [i16; 3]) {
        self.x = f32::from(axes[0]) / MOUSE_SCALE;
        self.y = f32::from(axes[1]) / MOUSE_SCALE;
        self.z = f32::from(axes[2]) / MOUSE_SCALE;
    }
}

/// Receive (interrupt) side of a radio-control link.
pub struct RcRx<P> {
    tx: ChannelSender<RC_CHUNK_LEN, RC_QUEUE_LEN>,
    sequence: Arc<PrioritySequence>,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: RcProtocol> RxSink for RcRx<P> {
    fn on_receive(&mut self, buf: &[u8]) -> bool {
        if !P::admits(buf) {
            trace!("{}: chunk of {} bytes not admitted", P::NAME, buf.len());
            return false;
        }

        if !self.sequence.admit(P::PRIORITY) {
            return false;
        }

        self.tx.try_push(buf)
    }
}

impl<P> Debug for RcRx<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcRx").field("tx", &self.tx).finish_non_exhaustive()
    }
}

/// Worker-side decoding of a radio-control link.
pub struct RcHandler<P: RcProtocol> {
    store: StateStore<P::Control>,
    timing: ButtonTiming,
    rejected: u32,
}

impl<P: RcProtocol> RcHandler<P> {
    pub fn new(store: StateStore<P::Control>, timing: ButtonTiming) -> Self {
        Self {
            store,
            timing,
            rejected: 0,
        }
    }

    /// Frames discarded by validation so far.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }
}

impl<P: RcProtocol> FrameHandler for RcHandler<P> {
    fn handle(&mut self, chunk: &[u8], now_ms: u64) -> usize {
        match P::decode(chunk) {
            Ok(frame) => {
                self.store.update(|control| P::apply(control, &frame, now_ms, &self.timing));
                1
            }
            Err(e) => {
                self.rejected = self.rejected.wrapping_add(1);
                debug!("{}: frame discarded: {}", P::NAME, e);
                0
            }
        }
    }
}

/// Worker of a radio-control link.
pub type RcWorker<P> = LinkWorker<RcHandler<P>, RC_CHUNK_LEN, RC_QUEUE_LEN>;

/// Consumer handle to one receiver's decoded state.
pub struct RcHandle<P: RcProtocol> {
    store: StateStore<P::Control>,
    status: Arc<LinkStatus>,
}

impl<P: RcProtocol> Clone for RcHandle<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            status: Arc::clone(&self.status),
        }
    }
}

impl<P: RcProtocol> RcHandle<P> {
    /// Read the control state under the store lock.
    pub fn read<R>(&self, f: impl FnOnce(&P::Control) -> R) -> R {
        self.store.read(f)
    }

    pub fn snapshot(&self) -> P::Control {
        self.store.snapshot()
    }

    pub fn sticks(&self) -> Sticks {
        self.store.read(P::sticks)
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    pub fn status(&self) -> &Arc<LinkStatus> {
        &self.status
    }
}

impl<P: RcProtocol> Debug for RcHandle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcHandle").field("status", &self.status).finish_non_exhaustive()
    }
}

/// Builder wiring one radio-control protocol into a link.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use arena_link::link::PrioritySequence;
/// use arena_link::rc::{Dr16, RcLink};
///
/// # async fn run() {
/// let sequence = Arc::new(PrioritySequence::new());
/// let (rx, worker, handle) = RcLink::<Dr16>::new(sequence).build();
/// tokio::spawn(worker.run());
/// # }
/// ```
pub struct RcLink<P> {
    sequence: Arc<PrioritySequence>,
    timeout: Duration,
    timing: ButtonTiming,
    clock: Arc<dyn Clock>,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: RcProtocol> RcLink<P> {
    pub fn new(sequence: Arc<PrioritySequence>) -> Self {
        Self {
            sequence,
            timeout: P::DEFAULT_TIMEOUT,
            timing: ButtonTiming::default(),
            clock: Arc::new(MonotonicClock::new()),
            _protocol: PhantomData,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: ButtonTiming) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the receive half, the worker and the consumer handle.
    pub fn build(self) -> (RcRx<P>, RcWorker<P>, RcHandle<P>) {
        let (tx, rx) = byte_channel::<RC_CHUNK_LEN, RC_QUEUE_LEN>();
        let store = StateStore::new(P::Control::default());
        let status = Arc::new(LinkStatus::new(P::NAME));
        let liveness = LivenessTracker::new(Arc::clone(&status), self.timeout)
            .with_arbitration(Arc::clone(&self.sequence), P::PRIORITY);

        let sink = RcRx {
            tx,
            sequence: self.sequence,
            _protocol: PhantomData,
        };
        let worker = LinkWorker::new(rx, RcHandler::new(store.clone(), self.timing), liveness, self.clock);
        let handle = RcHandle { store, status };

        (sink, worker, handle)
    }
}

/// Which receiver currently owns the control outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RcSource {
    Vt03,
    Dr16,
}

/// Consumer view over both receivers.
#[derive(Debug, Clone)]
pub struct RcHub {
    sequence: Arc<PrioritySequence>,
    vt03: Option<RcHandle<Vt03>>,
    dr16: Option<RcHandle<Dr16>>,
}

impl RcHub {
    pub fn new(sequence: Arc<PrioritySequence>) -> Self {
        Self {
            sequence,
            vt03: None,
            dr16: None,
        }
    }

    #[must_use]
    pub fn with_vt03(mut self, handle: RcHandle<Vt03>) -> Self {
        self.vt03 = Some(handle);
        self
    }

    #[must_use]
    pub fn with_dr16(mut self, handle: RcHandle<Dr16>) -> Self {
        self.dr16 = Some(handle);
        self
    }

    pub fn vt03(&self) -> Option<&RcHandle<Vt03>> {
        self.vt03.as_ref()
    }

    pub fn dr16(&self) -> Option<&RcHandle<Dr16>> {
        self.dr16.as_ref()
    }

    /// The live registered receiver with the highest priority, if any.
    ///
    /// Live sources sharing the sequence but not registered here are skipped.
    pub fn active(&self) -> Option<RcSource> {
        if self.vt03.is_some() && self.sequence.is_live(Vt03::PRIORITY) {
            Some(RcSource::Vt03)
        } else if self.dr16.is_some() && self.sequence.is_live(Dr16::PRIORITY) {
            Some(RcSource::Dr16)
        } else {
            None
        }
    }

    /// Sticks of the active receiver.
    pub fn sticks(&self) -> Option<Sticks> {
        match self.active()? {
            RcSource::Vt03 => self.vt03.as_ref().map(RcHandle::sticks),
            RcSource::Dr16 => self.dr16.as_ref().map(RcHandle::sticks),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn dr16_frame(channels: [u16; 4], key_code: u16) -> [u8; dr16::FRAME_LEN] {
        dr16::encode(&Dr16Frame {
            channels,
            switch_r: SwitchPosition::Mid,
            switch_l: SwitchPosition::Mid,
            mouse: [0; 3],
            press_l: 0,
            press_r: 0,
            key_code,
            wheel: 0,
        })
    }

    fn vt03_frame() -> [u8; vt03::FRAME_LEN] {
        vt03::encode(&Vt03Frame {
            channels: [1684, 1024, 364, 1024],
            gear: GearPosition::Mid,
            pause: false,
            fn_l: false,
            fn_r: false,
            wheel: 1024,
            trigger: false,
            mouse: [0; 3],
            press_l: 0,
            press_r: 0,
            press_m: 0,
            key_code: 0,
        })
    }

    #[test]
    fn test_normalize_channel() {
        assert_eq!(normalize_channel(1024), 0.0);
        assert_eq!(normalize_channel(1684), 1.0);
        assert_eq!(normalize_channel(364), -1.0);
    }

    #[test]
    fn test_check_channel_bounds() {
        assert!(check_channel("ch0", 364).is_ok());
        assert!(check_channel("ch0", 1684).is_ok());
        assert_eq!(
            check_channel("ch0", 363),
            Err(FrameError::ChannelRange { name: "ch0", value: 363 })
        );
        assert!(check_channel("ch0", 1685).is_err());
    }

    #[test]
    fn test_keyboard_follows_wire_bit_order() {
        let timing = ButtonTiming::default();
        let mut kb = Keyboard::default();
        let code = Key::W.mask() | Key::Ctrl.mask() | Key::B.mask();

        kb.update(code, 0, &timing);
        kb.update(code, 20, &timing);

        assert!(kb.key(Key::W).is_down());
        assert!(kb.key(Key::Ctrl).is_down());
        assert!(kb.key(Key::B).is_down());
        assert!(!kb.key(Key::S).is_down());
        assert_eq!(kb.down_mask(), code);
        assert_eq!(Key::B.mask(), 0x8000);
    }

    #[test]
    fn test_mid_scale_frame_decodes_to_zero() {
        let store = StateStore::new(Dr16Control::default());
        let mut handler = RcHandler::<Dr16>::new(store.clone(), ButtonTiming::default());

        assert_eq!(handler.handle(&dr16_frame([1024; 4], 0), 0), 1);

        store.read(|c| {
            assert_eq!([c.ch_lx, c.ch_ly, c.ch_rx, c.ch_ry], [0.0; 4]);
            assert_eq!(c.wheel, 0.0);
            assert_eq!(c.switch_l.position(), SwitchPosition::Mid);
            assert_eq!(c.switch_r.position(), SwitchPosition::Mid);
            assert_eq!(c.switch_l.event(), crate::input::SwitchEvent::NoChange);
            assert_eq!(c.switch_r.event(), crate::input::SwitchEvent::NoChange);
            assert_eq!(c.keyboard.down_mask(), 0);
            assert_eq!([c.mouse.x, c.mouse.y, c.mouse.z], [0.0; 3]);
            assert!(!c.mouse.left.is_down());
            assert!(!c.mouse.right.is_down());
        });
    }

    #[test]
    fn test_replaying_a_frame_does_not_drift() {
        let store = StateStore::new(Dr16Control::default());
        let mut handler = RcHandler::<Dr16>::new(store.clone(), ButtonTiming::default());
        let frame = dr16_frame([1400, 700, 1024, 1600], 0);

        handler.handle(&frame, 0);
        let first = store.snapshot();

        for i in 1..50 {
            assert_eq!(handler.handle(&frame, i * 14), 1);
            assert_eq!(store.snapshot(), first);
        }
    }

    #[test]
    fn test_invalid_frame_keeps_last_known_good() {
        let store = StateStore::new(Dr16Control::default());
        let mut handler = RcHandler::<Dr16>::new(store.clone(), ButtonTiming::default());

        handler.handle(&dr16_frame([1684, 1024, 1024, 1024], 0), 0);
        let good = store.snapshot();

        let mut bad = dr16_frame([1024; 4], 0);
        bad[0] = 0x00;
        bad[1] &= 0xF8; // ch0 = 0
        assert_eq!(handler.handle(&bad, 14), 0);
        assert_eq!(handler.rejected(), 1);
        assert_eq!(store.snapshot(), good);
        assert_eq!(store.read(|c| c.ch_rx), 1.0);
    }

    #[test]
    fn test_rx_checks_length_and_magic() {
        let sequence = Arc::new(PrioritySequence::new());
        let (mut rx, _worker, _) = RcLink::<Vt03>::new(sequence).build();

        let frame = vt03_frame();
        assert!(!rx.on_receive(&frame[..20]));

        let mut wrong_magic = frame;
        wrong_magic[0] = 0xAA;
        assert!(!rx.on_receive(&wrong_magic));

        assert!(rx.on_receive(&frame));
    }

    #[tokio::test(start_paused = true)]
    async fn test_higher_priority_source_owns_outputs() {
        let sequence = Arc::new(PrioritySequence::new());
        let (mut vt03_rx, mut vt03_worker, vt03) = RcLink::<Vt03>::new(Arc::clone(&sequence)).build();
        let (mut dr16_rx, mut dr16_worker, dr16) = RcLink::<Dr16>::new(Arc::clone(&sequence)).build();
        let hub = RcHub::new(Arc::clone(&sequence))
            .with_vt03(vt03.clone())
            .with_dr16(dr16.clone());

        assert_eq!(hub.active(), None);

        assert!(vt03_rx.on_receive(&vt03_frame()));
        vt03_worker.step().await;
        assert!(vt03.is_online());
        assert_eq!(hub.active(), Some(RcSource::Vt03));
        assert_eq!(hub.sticks().map(|s| s.rx), Some(1.0));

        // VT03 live: DR16 bytes never reach its channel
        let dr16_bytes = dr16_frame([1200, 1024, 1024, 1024], 0);
        for _ in 0..3 {
            assert!(!dr16_rx.on_receive(&dr16_bytes));
        }

        // Silence on VT03 for its full timeout clears its bit
        vt03_worker.step().await;
        assert!(!vt03.is_online());
        assert_eq!(hub.active(), None);

        assert!(dr16_rx.on_receive(&dr16_bytes));
        dr16_worker.step().await;
        assert!(dr16.is_online());
        assert_eq!(hub.active(), Some(RcSource::Dr16));
        assert_eq!(dr16.read(|c| c.ch_rx), normalize_channel(1200));

        // VT03 returns and pre-empts on its next frame
        assert!(vt03_rx.on_receive(&vt03_frame()));
        vt03_worker.step().await;
        assert_eq!(hub.active(), Some(RcSource::Vt03));
        assert!(!dr16_rx.on_receive(&dr16_bytes));
    }

    #[test]
    fn test_hub_skips_unregistered_live_source() {
        let sequence = Arc::new(PrioritySequence::new());
        let (_rx, _worker, dr16) = RcLink::<Dr16>::new(Arc::clone(&sequence)).build();
        let hub = RcHub::new(Arc::clone(&sequence)).with_dr16(dr16);

        sequence.mark_alive(Vt03::PRIORITY);
        assert_eq!(hub.active(), None);

        sequence.mark_alive(Dr16::PRIORITY);
        assert_eq!(hub.active(), Some(RcSource::Dr16));
    }

    #[tokio::test]
    async fn test_worker_uses_injected_clock() {
        let mut clock = MockClock::new();
        clock.expect_now_ms().return_const(5_000u64);

        let sequence = Arc::new(PrioritySequence::new());
        let (mut rx, mut worker, handle) = RcLink::<Dr16>::new(sequence)
            .with_clock(Arc::new(clock))
            .build();

        assert!(rx.on_receive(&dr16_frame([1024; 4], 0)));
        worker.step().await;
        assert_eq!(handle.status().last_alive_ms(), 5_000);
    }
}
