//! # Momentary Button State Machine
//!
//! Turns a sampled raw level into logical events, layered as:
//!
//! 1. **Debounce**: a new raw level must persist for `debounce_ms` before it
//!    is accepted as the stable level.
//! 2. **Edges**: accepted level changes are reported as [`KeyEvent::Rising`]
//!    or [`KeyEvent::Falling`].
//! 3. **Hold**: once the stable level has been asserted for `hold_ms`, the
//!    button reports [`KeyEvent::Held`] once and then runs a hold-duration
//!    counter.
//! 4. **Click / repeat**: a release before the hold threshold leaves the press
//!    pending. A new press within `repeat_window_ms` of the release bumps the
//!    repeat counter; otherwise the pending press is confirmed as
//!    [`KeyEvent::Pressed`] when the window expires.
//!
//! Every threshold is measured on the monotonic millisecond clock passed to
//! [`Button::update`], so behaviour does not depend on the link frame rate.

use serde::Serialize;

use super::ButtonTiming;

/// What happened to a button during one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEvent {
    #[default]
    NoChange,
    /// Debounced press edge
    Rising,
    /// Debounced release edge
    Falling,
    /// A short press confirmed after the repeat window expired
    Pressed,
    /// Asserted beyond the hold threshold (reported once per press)
    Held,
}

/// Logical state of one physical button or key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Button {
    raw_state: bool,
    stable_state: bool,
    event: KeyEvent,
    held: bool,
    pending: bool,
    /// Start of an unconfirmed raw level change
    raw_since: Option<u64>,
    press_time: u64,
    release_time: u64,
    hold_time: u64,
    change_time: u64,
    repeat_count: u32,
}

impl Button {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw sample taken at `now_ms`.
    pub fn update(&mut self, raw: bool, now_ms: u64, timing: &ButtonTiming) -> KeyEvent {
        self.raw_state = raw;
        let mut event = KeyEvent::NoChange;

        if raw != self.stable_state {
            match self.raw_since {
                None => self.raw_since = Some(now_ms),
                Some(since) if now_ms.saturating_sub(since) >= timing.debounce_ms => {
                    self.stable_state = raw;
                    self.raw_since = None;
                    event = if raw { KeyEvent::Rising } else { KeyEvent::Falling };
                }
                Some(_) => {}
            }
        } else {
            self.raw_since = None;
        }

        match event {
            KeyEvent::Rising => {
                let in_window = now_ms.saturating_sub(self.release_time) < timing.repeat_window_ms;
                if self.pending && in_window {
                    self.repeat_count += 1;
                } else {
                    self.repeat_count = 1;
                }
                self.pending = false;
                self.held = false;
                self.hold_time = 0;
                self.press_time = now_ms;
            }
            KeyEvent::Falling => {
                if !self.held {
                    self.release_time = now_ms;
                    self.pending = true;
                }
                self.held = false;
            }
            _ => {}
        }

        if self.stable_state {
            let duration = now_ms.saturating_sub(self.press_time);

            if self.held {
                self.hold_time = duration.saturating_sub(timing.hold_ms);
            } else if duration >= timing.hold_ms {
                self.held = true;
                self.hold_time = 0;
                self.change_time = now_ms;
                self.pending = false;
                event = KeyEvent::Held;
            }
        }

        // An edge outranks confirmation; a due press is confirmed next sample
        if event == KeyEvent::NoChange
            && self.pending
            && now_ms.saturating_sub(self.release_time) >= timing.repeat_window_ms
        {
            self.pending = false;
            self.change_time = now_ms;
            event = KeyEvent::Pressed;
        }

        self.event = event;
        event
    }

    /// Event produced by the latest evaluation.
    pub fn event(&self) -> KeyEvent {
        self.event
    }

    /// Last raw sample.
    pub fn raw_state(&self) -> bool {
        self.raw_state
    }

    /// Debounced level.
    pub fn is_down(&self) -> bool {
        self.stable_state
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// A released short press still waiting for its repeat window.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Milliseconds held beyond the hold threshold.
    pub fn hold_time_ms(&self) -> u64 {
        self.hold_time
    }

    /// Presses counted in the current click burst (1 = single click).
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Clock reading of the last `Pressed` or `Held` transition.
    ///
    /// Consumers polling faster than the link frame rate can compare this
    /// against a stored value to act on each transition once.
    pub fn change_time_ms(&self) -> u64 {
        self.change_time
    }

    pub fn press_time_ms(&self) -> u64 {
        self.press_time
    }

    pub fn release_time_ms(&self) -> u64 {
        self.release_time
    }
}
