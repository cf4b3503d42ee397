use std::time::{Duration, Instant};

/// Default quiet period before a coalesced signal fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Coalescing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DebounceState {
    /// No raw event since the last signal.
    Idle,
    /// Raw events seen; signal fires once `deadline` passes without new ones.
    Pending { deadline: Instant },
}

/// Pure debouncer: only timing, no filesystem access.
///
/// Any number of raw events recorded before the deadline collapse into
/// exactly one `fire`. Each event pushes the deadline out by `window`.
#[derive(Debug)]
pub(super) struct Debouncer {
    window: Duration,
    pub(super) state: DebounceState,
}

impl Debouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    /// Record a raw event observed at `now` (Idle -> Pending, or restart).
    pub(super) fn record(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.window,
        };
    }

    /// When the pending signal is due, if any.
    pub(super) fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    /// Returns true exactly once per pending window, when `now` reached the deadline.
    pub(super) fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    pub(super) fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }
}
