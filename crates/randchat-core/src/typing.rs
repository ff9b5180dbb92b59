//! Typing indicator debouncing
//!
//! Collapses a burst of keystrokes into one `typing:true` and one
//! `typing:false`. Emitted states always alternate.

use crate::clock::Deadline;

/// Debounces local keystrokes into typing-state transitions
#[derive(Debug, Clone)]
pub struct TypingCoordinator {
    quiet_ms: u64,
    active: bool,
    deadline: Deadline,
}

impl TypingCoordinator {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            active: false,
            deadline: Deadline::default(),
        }
    }

    /// Register a keystroke; returns `Some(true)` on the first one of a burst
    pub fn on_keystroke(&mut self, now_ms: u64) -> Option<bool> {
        self.deadline.arm(now_ms, self.quiet_ms);
        if self.active {
            None
        } else {
            self.active = true;
            Some(true)
        }
    }

    /// Returns `Some(false)` once the quiet period has elapsed
    pub fn poll(&mut self, now_ms: u64) -> Option<bool> {
        if self.active && self.deadline.fire(now_ms) {
            self.active = false;
            Some(false)
        } else {
            None
        }
    }

    /// The composed message was sent; ends an active burst immediately
    pub fn on_send(&mut self) -> Option<bool> {
        self.deadline.cancel();
        if self.active {
            self.active = false;
            Some(false)
        } else {
            None
        }
    }

    /// Drop any burst without emitting anything
    pub fn reset(&mut self) {
        self.deadline.cancel();
        self.active = false;
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.deadline.at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: u64 = 1000;

    #[test]
    fn test_burst_emits_true_then_false() {
        let mut typing = TypingCoordinator::new(QUIET);
        let mut emitted = Vec::new();

        for t in [0, 100, 300, 700, 1200] {
            emitted.extend(typing.on_keystroke(t));
            emitted.extend(typing.poll(t));
        }
        assert_eq!(emitted, vec![true]);

        // Quiet period counts from the last keystroke
        assert_eq!(typing.poll(2199), None);
        assert_eq!(typing.poll(2200), Some(false));
        assert_eq!(typing.poll(5000), None);
    }

    #[test]
    fn test_send_ends_burst() {
        let mut typing = TypingCoordinator::new(QUIET);
        assert_eq!(typing.on_keystroke(0), Some(true));
        assert_eq!(typing.on_send(), Some(false));

        // No stray false after the quiet period
        assert_eq!(typing.poll(QUIET * 3), None);
        assert_eq!(typing.next_deadline(), None);
    }

    #[test]
    fn test_send_without_burst_emits_nothing() {
        let mut typing = TypingCoordinator::new(QUIET);
        assert_eq!(typing.on_send(), None);
    }

    #[test]
    fn test_reset_is_silent() {
        let mut typing = TypingCoordinator::new(QUIET);
        typing.on_keystroke(0);
        typing.reset();
        assert_eq!(typing.next_deadline(), None);
        assert_eq!(typing.poll(QUIET), None);
        assert_eq!(typing.on_send(), None);
    }

    #[test]
    fn test_states_alternate() {
        let mut typing = TypingCoordinator::new(QUIET);
        let mut emitted = Vec::new();
        let mut now = 0;

        for burst in 0..5u64 {
            for _ in 0..(burst + 1) {
                emitted.extend(typing.on_keystroke(now));
                now += 200;
            }
            if burst % 2 == 0 {
                emitted.extend(typing.on_send());
            } else {
                now += QUIET;
                emitted.extend(typing.poll(now));
            }
        }

        assert_eq!(emitted.len(), 10);
        for pair in emitted.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }
}
