//! Time sources and cancelable deadlines
//!
//! The state machine never reads the system clock directly. It is handed
//! a [`Clock`], and every timer it owns is a [`Deadline`] value that the
//! driver polls. Tests use [`ManualClock`] to advance virtual time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

/// Source of monotonic and wall-clock time
pub trait Clock: Send {
    /// Monotonic milliseconds since an arbitrary origin
    fn now_ms(&self) -> u64;

    /// Current wall-clock time, used to stamp chat messages
    fn wall(&self) -> DateTime<Utc>;
}

/// Real clock backed by tokio's instant, so paused test time applies
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual clock shared between a test and the code under test
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Wall time reported at virtual time zero (2024-01-01T00:00:00Z)
    const EPOCH_SECS: i64 = 1_704_067_200;

    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn wall(&self) -> DateTime<Utc> {
        let base = Utc
            .timestamp_opt(Self::EPOCH_SECS, 0)
            .single()
            .unwrap_or_default();
        base + ChronoDuration::milliseconds(self.now_ms() as i64)
    }
}

/// One-shot, cancelable timer expressed as an absolute deadline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at_ms: Option<u64>,
}

impl Deadline {
    /// (Re)arm the timer to expire `delay_ms` after `now_ms`
    pub fn arm(&mut self, now_ms: u64, delay_ms: u64) {
        self.at_ms = Some(now_ms.saturating_add(delay_ms));
    }

    pub fn cancel(&mut self) {
        self.at_ms = None;
    }

    /// Absolute expiry time, if armed
    pub fn at(&self) -> Option<u64> {
        self.at_ms
    }

    /// Returns true exactly once when the deadline has passed, then disarms
    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.at_ms {
            Some(at) if now_ms >= at => {
                self.at_ms = None;
                true
            }
            _ => false,
        }
    }
}

/// Earliest of two optional deadlines
pub(crate) fn earliest(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
