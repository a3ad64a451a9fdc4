//! Text rendering for timers and progress.

/// Default daily focus goal.
pub const DEFAULT_DAILY_FOCUS_GOAL_MS: u64 = 10_000;

const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';

/// Formats milliseconds as `HH:MM:SS`. Hours are not wrapped.
#[must_use]
pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Fraction of the goal reached, capped at 1.0. A zero goal counts as reached.
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "durations stay far below 2^52 ms"
)]
pub fn progress(elapsed_ms: u64, goal_ms: u64) -> f64 {
    if goal_ms == 0 {
        return 1.0;
    }
    (elapsed_ms as f64 / goal_ms as f64).min(1.0)
}

/// Renders a fixed-width bar for a fraction in `[0, 1]`.
#[must_use]
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "fraction is clamped to [0, 1] and widths are small"
)]
pub fn render_progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    let mut bar = String::with_capacity(width * BAR_FILLED.len_utf8());
    bar.extend(std::iter::repeat_n(BAR_FILLED, filled));
    bar.extend(std::iter::repeat_n(BAR_EMPTY, width - filled));
    bar
}
