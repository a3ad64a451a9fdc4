//! Elapsed-time bookkeeping shared by focus and relax sessions.

/// Milliseconds between `start` and `now`, clamped at zero when the clock
/// stepped backwards so elapsed totals never shrink.
#[must_use]
pub fn delta_ms(start: i64, now: i64) -> u64 {
    u64::try_from(now.saturating_sub(start)).unwrap_or(0)
}

/// The `(elapsed, start, paused)` triple of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    /// Time accumulated while running, excluding the current run.
    pub elapsed_ms: u64,
    /// When the current run started; `None` while paused.
    pub start_time: Option<i64>,
    /// Paused flag as persisted.
    pub paused: bool,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::IDLE
    }
}

impl SessionTimer {
    /// A timer that has never run.
    pub const IDLE: Self = Self {
        elapsed_ms: 0,
        start_time: None,
        paused: true,
    };

    /// A session is running iff it is not paused and has a start time.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        !self.paused && self.start_time.is_some()
    }

    /// Stored elapsed plus the current run, if any.
    #[must_use]
    pub fn displayed_elapsed(&self, now: i64) -> u64 {
        match self.start_time {
            Some(start) if !self.paused => self.elapsed_ms.saturating_add(delta_ms(start, now)),
            _ => self.elapsed_ms,
        }
    }

    /// Folds the current run into `elapsed_ms` and pauses.
    pub fn pause(&mut self, now: i64) {
        self.elapsed_ms = self.displayed_elapsed(now);
        self.start_time = None;
        self.paused = true;
    }

    /// Starts a new run at `now`. A run already in progress is folded first,
    /// so resuming a running timer never loses time.
    pub fn resume(&mut self, now: i64) {
        self.elapsed_ms = self.displayed_elapsed(now);
        self.start_time = Some(now);
        self.paused = false;
    }
}
