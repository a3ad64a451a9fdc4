//! The session controller: sole authority over the session state machine.
//!
//! Every handler re-reads the persisted record before acting, so writes made
//! by front ends in between are never lost by the controller. The inactivity
//! watchdog is controller-local; the host loop asks [`SessionController::next_deadline`]
//! when to wake and calls [`SessionController::fire_due_watchdog`] then.

use thiserror::Error;

use crate::activity::ActivityReport;
use crate::clock::{Clock, local_time_of_day};
use crate::message::{ControllerMessage, FocusCommand, RelaxCommand, UiMessage};
use crate::notice::{Notice, Notifier};
use crate::page::{self, FanOut, PageHost, PageInfo};
use crate::session::delta_ms;
use crate::state::StatePatch;
use crate::store::{Store, StoreError, load_state};
use crate::types::{Mode, SessionKind};
use crate::watchdog::InactivityWatchdog;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to access session state: {0}")]
    Store(#[from] StoreError),
}

pub struct SessionController<S, P, N, C> {
    store: S,
    pages: P,
    notifier: N,
    clock: C,
    watchdog: InactivityWatchdog,
    ui_outbox: Vec<UiMessage>,
}

impl<S, P, N, C> SessionController<S, P, N, C>
where
    S: Store,
    P: PageHost,
    N: Notifier,
    C: Clock,
{
    pub fn new(store: S, pages: P, notifier: N, clock: C, inactivity_limit_ms: u64) -> Self {
        Self {
            store,
            pages,
            notifier,
            clock,
            watchdog: InactivityWatchdog::new(inactivity_limit_ms),
            ui_outbox: Vec::new(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn pages(&self) -> &P {
        &self.pages
    }

    pub const fn pages_mut(&mut self) -> &mut P {
        &mut self.pages
    }

    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn watchdog(&self) -> &InactivityWatchdog {
        &self.watchdog
    }

    /// When the watchdog wants to be checked next, if armed.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<i64> {
        self.watchdog.deadline()
    }

    /// UI messages queued since the last drain.
    pub fn drain_ui_messages(&mut self) -> Vec<UiMessage> {
        std::mem::take(&mut self.ui_outbox)
    }

    /// Dispatches one inbound message.
    pub fn handle(&mut self, message: ControllerMessage) -> Result<(), ControllerError> {
        match message {
            ControllerMessage::Activity(report) => self.report_activity(report),
            ControllerMessage::Focus {
                state: FocusCommand::Focusing,
            } => {
                self.start_focus()?;
            }
            ControllerMessage::Focus {
                state: FocusCommand::Stopped,
            } => {
                self.stop_focus()?;
            }
            ControllerMessage::Relax {
                state: RelaxCommand::Relaxing,
            } => {
                self.start_relax()?;
            }
            ControllerMessage::Relax {
                state: RelaxCommand::Stopped,
            } => self.stop_relax()?,
            ControllerMessage::ResetFocus => {
                self.reset_focus()?;
            }
            ControllerMessage::FocusGoalCompleted => self.goal_completed(),
        }
        Ok(())
    }

    /// Picks up a focus session that was already running when the controller
    /// started: monitoring is enabled and the watchdog armed from now.
    pub fn restore(&mut self) -> Result<bool, ControllerError> {
        let state = load_state(&self.store)?;
        if !state.is_running(SessionKind::Focus) || state.focus_frozen_by_inactivity {
            return Ok(false);
        }
        let fan_out = page::enable_monitoring(&mut self.pages);
        self.watchdog.arm(self.clock.now_ms());
        tracing::info!(pages = fan_out.delivered, "resumed watching running focus session");
        Ok(true)
    }

    /// Starts (or resumes) focus, pausing relax, and begins watching for
    /// inactivity. A run a front end already started keeps its start time.
    pub fn start_focus(&mut self) -> Result<FanOut, ControllerError> {
        let now = self.clock.now_ms();
        let state = load_state(&self.store)?;

        let mut relax = state.timer(SessionKind::Relax);
        relax.pause(now);
        let mut focus = state.timer(SessionKind::Focus);
        if !focus.is_running() {
            focus.resume(now);
        }

        self.store.set(
            &StatePatch::default()
                .with_mode(Mode::Focusing)
                .with_timer(SessionKind::Relax, relax)
                .with_timer(SessionKind::Focus, focus)
                .with_frozen(false),
        )?;

        let fan_out = page::enable_monitoring(&mut self.pages);
        self.watchdog.arm(now);
        tracing::info!(
            elapsed_ms = focus.elapsed_ms,
            pages = fan_out.delivered,
            skipped = fan_out.skipped,
            "focus started"
        );
        Ok(fan_out)
    }

    /// Pauses focus and stops watching. The mode is left as is.
    pub fn stop_focus(&mut self) -> Result<FanOut, ControllerError> {
        let now = self.clock.now_ms();
        let state = load_state(&self.store)?;

        let mut focus = state.timer(SessionKind::Focus);
        focus.pause(now);
        self.store.set(
            &StatePatch::default()
                .with_timer(SessionKind::Focus, focus)
                .with_frozen(false),
        )?;

        let fan_out = self.stop_guarding();
        tracing::info!(elapsed_ms = focus.elapsed_ms, "focus stopped");
        Ok(fan_out)
    }

    /// Starts relax. Focus is paused, which also stops inactivity watching.
    pub fn start_relax(&mut self) -> Result<FanOut, ControllerError> {
        let now = self.clock.now_ms();
        let state = load_state(&self.store)?;

        let mut focus = state.timer(SessionKind::Focus);
        focus.pause(now);
        let mut relax = state.timer(SessionKind::Relax);
        if !relax.is_running() {
            relax.resume(now);
        }

        self.store.set(
            &StatePatch::default()
                .with_mode(Mode::Relaxing)
                .with_timer(SessionKind::Focus, focus)
                .with_timer(SessionKind::Relax, relax)
                .with_frozen(false),
        )?;

        let fan_out = self.stop_guarding();
        tracing::info!(focus_elapsed_ms = focus.elapsed_ms, "relax started");
        Ok(fan_out)
    }

    pub fn stop_relax(&mut self) -> Result<(), ControllerError> {
        let now = self.clock.now_ms();
        let state = load_state(&self.store)?;

        let mut relax = state.timer(SessionKind::Relax);
        relax.pause(now);
        self.store
            .set(&StatePatch::default().with_timer(SessionKind::Relax, relax))?;

        tracing::info!(elapsed_ms = relax.elapsed_ms, "relax stopped");
        Ok(())
    }

    /// Records a liveness signal. Only pushes the deadline out while armed.
    pub fn report_activity(&mut self, report: ActivityReport) {
        tracing::debug!(
            kind = %report.kind,
            at = %local_time_of_day(report.timestamp),
            "activity"
        );
        if self.watchdog.is_armed() {
            self.watchdog.arm(self.clock.now_ms());
        }
    }

    /// Stops focus without touching its elapsed total.
    pub fn reset_focus(&mut self) -> Result<FanOut, ControllerError> {
        self.store.set(&StatePatch {
            focus_paused: Some(true),
            focus_start_time: Some(None),
            focus_frozen_by_inactivity: Some(false),
            ..StatePatch::default()
        })?;

        let fan_out = self.stop_guarding();
        tracing::info!("focus reset");
        Ok(fan_out)
    }

    pub fn goal_completed(&mut self) {
        tracing::info!("daily focus goal completed");
        self.notifier.notify(&Notice::GoalCompleted);
    }

    /// Brings a newly appeared page under monitoring if focus is running.
    /// Returns whether monitoring was enabled on it.
    pub fn page_attached(&mut self, page: &PageInfo) -> bool {
        if !self.watchdog.is_armed() || !page::is_monitorable(&page.url) {
            return false;
        }
        match page::enable_page(&mut self.pages, page) {
            Ok(()) => {
                tracing::debug!(page = %page.id, url = %page.url, "monitoring enabled on new page");
                true
            }
            Err(err) => {
                tracing::warn!(page = %page.id, error = %err, "could not monitor new page");
                false
            }
        }
    }

    /// Freezes focus if the inactivity deadline has passed. Returns whether a
    /// freeze happened. If the freeze cannot be stored the watchdog is armed
    /// again, so a running session is retried rather than left unguarded.
    pub fn fire_due_watchdog(&mut self) -> Result<bool, ControllerError> {
        let now = self.clock.now_ms();
        if self.watchdog.take_if_due(now).is_none() {
            return Ok(false);
        }
        self.freeze(now).inspect_err(|err| {
            tracing::warn!(error = %err, "focus freeze not stored, watching again");
            self.watchdog.arm(now);
        })
    }

    fn freeze(&mut self, now: i64) -> Result<bool, ControllerError> {
        let state = load_state(&self.store)?;
        if state.focus_frozen_by_inactivity {
            tracing::debug!("watchdog fired but focus already frozen");
            return Ok(false);
        }

        let elapsed = state
            .focus_start_time
            .map_or(state.focus_elapsed, |start| {
                state.focus_elapsed.saturating_add(delta_ms(start, now))
            });
        self.store.set(&StatePatch {
            focus_frozen_by_inactivity: Some(true),
            focus_paused: Some(true),
            focus_elapsed: Some(elapsed),
            focus_start_time: Some(None),
            ..StatePatch::default()
        })?;

        let fan_out = page::disable_monitoring(&mut self.pages);
        self.ui_outbox.push(UiMessage::FreezeFocusTimer);
        self.notifier.notify(&Notice::FocusFrozen {
            limit_ms: self.watchdog.limit_ms(),
        });
        tracing::info!(
            elapsed_ms = elapsed,
            pages = fan_out.delivered,
            "focus frozen after inactivity"
        );
        Ok(true)
    }

    fn stop_guarding(&mut self) -> FanOut {
        self.watchdog.disarm();
        page::disable_monitoring(&mut self.pages)
    }
}
