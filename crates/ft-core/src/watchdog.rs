//! Single-slot inactivity deadline.

/// Default inactivity limit before a running focus session freezes.
pub const DEFAULT_INACTIVITY_LIMIT_MS: u64 = 5_000;

/// One pending deadline at most. Arming replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityWatchdog {
    limit_ms: u64,
    deadline: Option<i64>,
}

impl Default for InactivityWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVITY_LIMIT_MS)
    }
}

impl InactivityWatchdog {
    #[must_use]
    pub const fn new(limit_ms: u64) -> Self {
        Self {
            limit_ms,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn limit_ms(&self) -> u64 {
        self.limit_ms
    }

    /// Sets the deadline to `now + limit`, discarding any earlier one.
    pub fn arm(&mut self, now: i64) {
        let limit = i64::try_from(self.limit_ms).unwrap_or(i64::MAX);
        self.deadline = Some(now.saturating_add(limit));
    }

    pub const fn disarm(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<i64> {
        self.deadline
    }

    /// Clears and reports the deadline if it has passed. One-shot.
    pub fn take_if_due(&mut self, now: i64) -> Option<i64> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.deadline.take(),
            _ => None,
        }
    }
}
