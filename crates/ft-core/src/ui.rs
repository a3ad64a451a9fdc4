//! Front-end session view.
//!
//! A [`SessionUi`] is short-lived: it rebuilds everything from storage when
//! opened, writes transitions before telling the controller about them, and
//! keeps only its one-shot goal flag locally.

use std::fmt;

use serde::Serialize;

use crate::clock::Clock;
use crate::display::{format_hms, progress, render_progress_bar};
use crate::message::{ControllerMessage, FocusCommand, RelaxCommand, UiMessage};
use crate::state::{SessionState, StatePatch};
use crate::store::{Store, StoreError, load_state};
use crate::types::{Mode, SessionKind};

const BAR_WIDTH: usize = 20;

/// Outbound channel from a UI to the controller. Fire-and-forget.
pub trait ControllerLink {
    fn send(&mut self, message: ControllerMessage);
}

impl ControllerLink for Vec<ControllerMessage> {
    fn send(&mut self, message: ControllerMessage) {
        self.push(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    /// Paused by the inactivity watchdog.
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    pub kind: SessionKind,
    pub status: TimerStatus,
    pub elapsed_ms: u64,
    pub progress: f64,
    pub label: &'static str,
}

impl TimerView {
    fn build(state: &SessionState, kind: SessionKind, now: i64, goal_ms: u64) -> Self {
        let timer = state.timer(kind);
        let frozen = kind.inactivity_guarded() && state.focus_frozen_by_inactivity;
        let status = if frozen {
            TimerStatus::Frozen
        } else if timer.is_running() {
            TimerStatus::Running
        } else {
            TimerStatus::Idle
        };
        let elapsed_ms = timer.displayed_elapsed(now);
        Self {
            kind,
            status,
            elapsed_ms,
            progress: progress(elapsed_ms, goal_ms),
            label: label(kind, status),
        }
    }
}

const fn label(kind: SessionKind, status: TimerStatus) -> &'static str {
    match (kind, status) {
        (SessionKind::Focus, TimerStatus::Frozen) => "START AGAIN",
        (SessionKind::Focus, TimerStatus::Running) => "FOCUSING",
        (SessionKind::Focus, TimerStatus::Idle) => "FOCUS",
        (SessionKind::Relax, TimerStatus::Running) => "RELAXING",
        (SessionKind::Relax, _) => "RELAX",
    }
}

/// Everything a front end needs to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiView {
    pub mode: Mode,
    pub focus: TimerView,
    pub relax: TimerView,
    pub goal_ms: u64,
}

impl UiView {
    #[must_use]
    pub fn from_state(state: &SessionState, now: i64, goal_ms: u64) -> Self {
        Self {
            mode: state.mode,
            focus: TimerView::build(state, SessionKind::Focus, now, goal_ms),
            relax: TimerView::build(state, SessionKind::Relax, now, goal_ms),
            goal_ms,
        }
    }
}

impl fmt::Display for UiView {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "progress is within [0, 1]"
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mode: {}", self.mode)?;
        for timer in [&self.focus, &self.relax] {
            writeln!(
                f,
                "{:<6}{}  {}  {:>3}%  {}",
                timer.kind.as_str(),
                format_hms(timer.elapsed_ms),
                render_progress_bar(timer.progress, BAR_WIDTH),
                (timer.progress * 100.0).round() as u64,
                timer.label
            )?;
        }
        Ok(())
    }
}

/// One open front end.
pub struct SessionUi<S, C, L> {
    store: S,
    clock: C,
    link: L,
    daily_goal_ms: u64,
    goal_sent: bool,
    view: UiView,
}

impl<S, C, L> SessionUi<S, C, L>
where
    S: Store,
    C: Clock,
    L: ControllerLink,
{
    /// Reads the full record and builds the initial view.
    pub fn open(store: S, clock: C, link: L, daily_goal_ms: u64) -> Result<Self, StoreError> {
        let state = load_state(&store)?;
        let view = UiView::from_state(&state, clock.now_ms(), daily_goal_ms);
        tracing::debug!(mode = %state.mode, focus = ?view.focus.status, "ui opened");
        Ok(Self {
            store,
            clock,
            link,
            daily_goal_ms,
            goal_sent: false,
            view,
        })
    }

    pub const fn view(&self) -> &UiView {
        &self.view
    }

    pub const fn link(&self) -> &L {
        &self.link
    }

    /// Toggles focus. A frozen session starts again with its elapsed kept.
    pub fn press_focus(&mut self) -> Result<&UiView, StoreError> {
        let now = self.clock.now_ms();
        let mut state = load_state(&self.store)?;
        let mut focus = state.timer(SessionKind::Focus);

        if focus.is_running() && !state.focus_frozen_by_inactivity {
            focus.pause(now);
            state.set_timer(SessionKind::Focus, focus);
            self.store
                .set(&StatePatch::default().with_timer(SessionKind::Focus, focus))?;
            self.link.send(ControllerMessage::Focus {
                state: FocusCommand::Stopped,
            });
        } else {
            if state.focus_frozen_by_inactivity {
                tracing::info!(elapsed_ms = focus.elapsed_ms, "starting focus again after freeze");
            }
            self.start(&mut state, SessionKind::Focus, now)?;
            self.link.send(ControllerMessage::Focus {
                state: FocusCommand::Focusing,
            });
        }

        Ok(self.rebuild(&state, now))
    }

    /// Toggles relax. Starting relax pauses focus.
    pub fn press_relax(&mut self) -> Result<&UiView, StoreError> {
        let now = self.clock.now_ms();
        let mut state = load_state(&self.store)?;
        let mut relax = state.timer(SessionKind::Relax);

        if relax.is_running() {
            relax.pause(now);
            state.set_timer(SessionKind::Relax, relax);
            self.store
                .set(&StatePatch::default().with_timer(SessionKind::Relax, relax))?;
            self.link.send(ControllerMessage::Relax {
                state: RelaxCommand::Stopped,
            });
        } else {
            self.start(&mut state, SessionKind::Relax, now)?;
            self.link.send(ControllerMessage::Relax {
                state: RelaxCommand::Relaxing,
            });
        }

        Ok(self.rebuild(&state, now))
    }

    pub fn reset_focus(&mut self) -> Result<&UiView, StoreError> {
        let patch = StatePatch {
            focus_elapsed: Some(0),
            focus_start_time: Some(None),
            focus_paused: Some(true),
            focus_frozen_by_inactivity: Some(false),
            ..StatePatch::default()
        };
        self.store.set(&patch)?;
        self.link.send(ControllerMessage::ResetFocus);
        self.reload()
    }

    pub fn reset_relax(&mut self) -> Result<&UiView, StoreError> {
        let patch = StatePatch {
            relax_elapsed: Some(0),
            relax_start_time: Some(None),
            relax_paused: Some(true),
            ..StatePatch::default()
        };
        self.store.set(&patch)?;
        self.reload()
    }

    /// Periodic tick. Sends the goal-completed message at most once.
    pub fn refresh(&mut self) -> Result<&UiView, StoreError> {
        self.reload()?;
        if !self.goal_sent && self.view.focus.progress >= 1.0 {
            self.goal_sent = true;
            tracing::info!(goal_ms = self.daily_goal_ms, "focus goal reached");
            self.link.send(ControllerMessage::FocusGoalCompleted);
        }
        Ok(&self.view)
    }

    pub fn on_message(&mut self, message: UiMessage) -> Result<&UiView, StoreError> {
        match message {
            UiMessage::FreezeFocusTimer => {
                tracing::debug!("focus frozen by controller");
                self.reload()
            }
        }
    }

    /// Resumes `kind` and pauses its partner, persisting both.
    fn start(&self, state: &mut SessionState, kind: SessionKind, now: i64) -> Result<(), StoreError> {
        let partner = kind.partner();
        let mut other = state.timer(partner);
        other.pause(now);
        let mut timer = state.timer(kind);
        timer.resume(now);

        state.set_timer(partner, other);
        state.set_timer(kind, timer);
        state.mode = kind.mode();
        state.focus_frozen_by_inactivity = false;

        self.store.set(
            &StatePatch::default()
                .with_mode(state.mode)
                .with_timer(partner, other)
                .with_timer(kind, timer)
                .with_frozen(false),
        )
    }

    fn reload(&mut self) -> Result<&UiView, StoreError> {
        let now = self.clock.now_ms();
        let state = load_state(&self.store)?;
        Ok(self.rebuild(&state, now))
    }

    fn rebuild(&mut self, state: &SessionState, now: i64) -> &UiView {
        self.view = UiView::from_state(state, now, self.daily_goal_ms);
        &self.view
    }
}
