//! # Discrete-Position Switch
//!
//! Tracks a 2–3 position switch or gear lever and reports the transition
//! taken by each evaluation (for example "mid to down"), timestamped on the
//! monotonic clock.

use std::fmt::Debug;

use serde::Serialize;

/// A stable position decoded from a raw wire code.
pub trait Position: Copy + Eq + Debug + Default {
    /// Map a raw code to a position; `None` for codes that name no position.
    fn from_raw(code: u8) -> Option<Self>;
}

/// Transition reported by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchEvent<P> {
    #[default]
    NoChange,
    Changed { from: P, to: P },
}

/// Logical state of one discrete switch.
///
/// Starts at `P::default()`, so the first frame reports a transition unless
/// the switch already sits in its default position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Switch<P> {
    position: P,
    event: SwitchEvent<P>,
    change_time_ms: u64,
}

impl<P: Position> Switch<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the position decoded from the latest frame.
    pub fn update(&mut self, position: P, now_ms: u64) -> SwitchEvent<P> {
        self.event = if position == self.position {
            SwitchEvent::NoChange
        } else {
            self.change_time_ms = now_ms;
            SwitchEvent::Changed {
                from: self.position,
                to: position,
            }
        };

        self.position = position;
        self.event
    }

    pub fn position(&self) -> P {
        self.position
    }

    /// Transition produced by the latest evaluation.
    pub fn event(&self) -> SwitchEvent<P> {
        self.event
    }

    /// Whether the latest evaluation moved the switch from `from` to `to`.
    pub fn moved(&self, from: P, to: P) -> bool {
        self.event == SwitchEvent::Changed { from, to }
    }

    /// Clock reading of the last position change.
    pub fn change_time_ms(&self) -> u64 {
        self.change_time_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    enum Lever {
        Up,
        #[default]
        Mid,
        Down,
    }

    impl Position for Lever {
        fn from_raw(code: u8) -> Option<Self> {
            match code {
                0 => Some(Lever::Up),
                1 => Some(Lever::Mid),
                2 => Some(Lever::Down),
                _ => None,
            }
        }
    }

    #[test]
    fn test_first_frame_at_default_is_no_change() {
        let mut sw = Switch::<Lever>::new();
        assert_eq!(sw.update(Lever::Mid, 5), SwitchEvent::NoChange);
        assert_eq!(sw.change_time_ms(), 0);
    }

    #[test]
    fn test_first_frame_elsewhere_is_a_transition() {
        let mut sw = Switch::<Lever>::new();
        assert_eq!(
            sw.update(Lever::Down, 5),
            SwitchEvent::Changed { from: Lever::Mid, to: Lever::Down }
        );
        assert!(sw.moved(Lever::Mid, Lever::Down));
        assert_eq!(sw.change_time_ms(), 5);
    }

    #[test]
    fn test_transition_reported_for_one_evaluation() {
        let mut sw = Switch::<Lever>::new();
        sw.update(Lever::Up, 10);
        assert!(sw.moved(Lever::Mid, Lever::Up));

        assert_eq!(sw.update(Lever::Up, 24), SwitchEvent::NoChange);
        assert_eq!(sw.position(), Lever::Up);
        assert_eq!(sw.change_time_ms(), 10);
    }

    #[test]
    fn test_from_raw_rejects_unknown_codes() {
        assert_eq!(Lever::from_raw(1), Some(Lever::Mid));
        assert_eq!(Lever::from_raw(3), None);
    }
}
