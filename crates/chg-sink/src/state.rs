//! Connection state of the sink.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Where the sink is in its connection lifecycle.
///
/// `Uninitialized → Connecting → Ready ⇄ Degraded`. A failed connect falls
/// back to `Uninitialized`, or stays `Degraded` if the sink was degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkState {
    Uninitialized,
    Connecting,
    Ready,
    Degraded,
}

impl SinkState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
        }
    }

    /// Whether `emit` admits records in this state.
    #[must_use]
    pub const fn accepts_emits(self) -> bool {
        matches!(self, Self::Ready | Self::Connecting)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Connecting => 1,
            Self::Ready => 2,
            Self::Degraded => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::Degraded,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free holder for the current [`SinkState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new(state: SinkState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn get(&self) -> SinkState {
        SinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SinkState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Store `state` and return the previous one.
    pub(crate) fn swap(&self, state: SinkState) -> SinkState {
        SinkState::from_u8(self.0.swap(state.to_u8(), Ordering::AcqRel))
    }

    /// Move from `from` to `to`; returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: SinkState, to: SinkState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SinkState::Uninitialized, false)]
    #[case(SinkState::Connecting, true)]
    #[case(SinkState::Ready, true)]
    #[case(SinkState::Degraded, false)]
    fn emit_admission(#[case] state: SinkState, #[case] admits: bool) {
        assert_eq!(state.accepts_emits(), admits);
    }

    #[test]
    fn cell_round_trips_every_state() {
        let cell = StateCell::new(SinkState::Uninitialized);
        for state in [
            SinkState::Connecting,
            SinkState::Ready,
            SinkState::Degraded,
            SinkState::Uninitialized,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn transition_requires_expected_state() {
        let cell = StateCell::new(SinkState::Ready);
        assert!(!cell.transition(SinkState::Degraded, SinkState::Ready));
        assert!(cell.transition(SinkState::Ready, SinkState::Degraded));
        assert_eq!(cell.get(), SinkState::Degraded);
        assert_eq!(cell.swap(SinkState::Connecting), SinkState::Degraded);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SinkState::Degraded).unwrap(),
            "\"degraded\""
        );
    }
}
