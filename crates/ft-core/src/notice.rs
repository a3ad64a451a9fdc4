//! User-facing notices raised by the controller.

use std::fmt;

/// A notice for the user. Presentation is up to the [`Notifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Focus was paused by the inactivity watchdog.
    FocusFrozen { limit_ms: u64 },
    GoalCompleted,
}

impl Notice {
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::FocusFrozen { .. } => "Focus Timer Frozen",
            Self::GoalCompleted => "Focus Goal Completed",
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::FocusFrozen { limit_ms } => format!(
                "No activity detected for {} seconds. Click FOCUS to start again.",
                limit_ms / 1_000
            ),
            Self::GoalCompleted => "You reached your daily focus goal.".to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title(), self.message())
    }
}

/// Something that can show a notice to the user.
pub trait Notifier {
    fn notify(&mut self, notice: &Notice);
}

/// Collects notices in order. Handy for embedding and tests.
impl Notifier for Vec<Notice> {
    fn notify(&mut self, notice: &Notice) {
        self.push(*notice);
    }
}

/// Logs notices through `tracing` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notice: &Notice) {
        tracing::info!(title = notice.title(), "{}", notice.message());
    }
}
