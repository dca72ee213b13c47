//! Redraw sessions
//!
//! There is no way to cancel a redraw that is parked at a suspension point.
//! Instead every redraw takes a session from a shared counter and, after each
//! suspension, compares it against the counter's current value. A mismatch
//! means a newer redraw started (or the layout was torn down) and the stale
//! one must stop before touching any shared state.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one redraw attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RedrawSession(u64);

impl RedrawSession {
    /// Get the raw session id
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Monotonic generation counter for redraw sessions
#[derive(Debug, Default)]
pub struct SessionCounter {
    current: AtomicU64,
}

impl SessionCounter {
    /// Create a counter; no session is current until [`begin`](Self::begin)
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// Start a new session, superseding every earlier one
    pub fn begin(&self) -> RedrawSession {
        RedrawSession(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `session` is still the most recently started one
    pub fn is_current(&self, session: RedrawSession) -> bool {
        self.current.load(Ordering::Acquire) == session.0
    }

    /// Raw id of the most recent session (0 before the first)
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Supersede every outstanding session without starting a new one
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_monotonic() {
        let counter = SessionCounter::new();
        assert_eq!(counter.current(), 0);

        let first = counter.begin();
        let second = counter.begin();
        assert!(second > first);
        assert_eq!(counter.current(), second.raw());
    }

    #[test]
    fn test_later_session_supersedes() {
        let counter = SessionCounter::new();
        let first = counter.begin();
        assert!(counter.is_current(first));

        let second = counter.begin();
        assert!(!counter.is_current(first));
        assert!(counter.is_current(second));
    }

    #[test]
    fn test_invalidate() {
        let counter = SessionCounter::new();
        let session = counter.begin();
        counter.invalidate();
        assert!(!counter.is_current(session));

        let next = counter.begin();
        assert!(counter.is_current(next));
    }
}
