//! The persisted session record and partial updates to it.
//!
//! The record is stored flat, one value per key, using the key names from
//! [`StateKey`]. There is no schema version: absent keys read back as
//! defaults, unknown keys are ignored.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::SessionTimer;
use crate::types::{Mode, SessionKind};

/// Keys of the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Mode,
    FocusStartTime,
    RelaxStartTime,
    FocusElapsed,
    RelaxElapsed,
    FocusPaused,
    RelaxPaused,
    FocusFrozenByInactivity,
}

impl StateKey {
    pub const ALL: [Self; 8] = [
        Self::Mode,
        Self::FocusStartTime,
        Self::RelaxStartTime,
        Self::FocusElapsed,
        Self::RelaxElapsed,
        Self::FocusPaused,
        Self::RelaxPaused,
        Self::FocusFrozenByInactivity,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::FocusStartTime => "focusStartTime",
            Self::RelaxStartTime => "relaxStartTime",
            Self::FocusElapsed => "focusElapsed",
            Self::RelaxElapsed => "relaxElapsed",
            Self::FocusPaused => "focusPaused",
            Self::RelaxPaused => "relaxPaused",
            Self::FocusFrozenByInactivity => "focusFrozenByInactivity",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub mode: Mode,
    pub focus_elapsed: u64,
    pub relax_elapsed: u64,
    pub focus_start_time: Option<i64>,
    pub relax_start_time: Option<i64>,
    pub focus_paused: bool,
    pub relax_paused: bool,
    /// Set only while focus is paused because the inactivity watchdog fired.
    pub focus_frozen_by_inactivity: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: Mode::None,
            focus_elapsed: 0,
            relax_elapsed: 0,
            focus_start_time: None,
            relax_start_time: None,
            focus_paused: true,
            relax_paused: true,
            focus_frozen_by_inactivity: false,
        }
    }
}

impl SessionState {
    /// Builds a record from a partial one, filling gaps with defaults.
    #[must_use]
    pub fn from_patch(patch: &StatePatch) -> Self {
        let mut state = Self::default();
        state.apply(patch);
        state
    }

    /// Merges a partial record into this one.
    pub fn apply(&mut self, patch: &StatePatch) {
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(elapsed) = patch.focus_elapsed {
            self.focus_elapsed = elapsed;
        }
        if let Some(elapsed) = patch.relax_elapsed {
            self.relax_elapsed = elapsed;
        }
        if let Some(start) = patch.focus_start_time {
            self.focus_start_time = start;
        }
        if let Some(start) = patch.relax_start_time {
            self.relax_start_time = start;
        }
        if let Some(paused) = patch.focus_paused {
            self.focus_paused = paused;
        }
        if let Some(paused) = patch.relax_paused {
            self.relax_paused = paused;
        }
        if let Some(frozen) = patch.focus_frozen_by_inactivity {
            self.focus_frozen_by_inactivity = frozen;
        }
    }

    /// Timer triple for one session kind. A frozen focus timer always reads
    /// as paused at its stored elapsed, whatever the other focus flags say.
    #[must_use]
    pub const fn timer(&self, kind: SessionKind) -> SessionTimer {
        match kind {
            SessionKind::Focus if self.focus_frozen_by_inactivity => SessionTimer {
                elapsed_ms: self.focus_elapsed,
                start_time: None,
                paused: true,
            },
            SessionKind::Focus => SessionTimer {
                elapsed_ms: self.focus_elapsed,
                start_time: self.focus_start_time,
                paused: self.focus_paused,
            },
            SessionKind::Relax => SessionTimer {
                elapsed_ms: self.relax_elapsed,
                start_time: self.relax_start_time,
                paused: self.relax_paused,
            },
        }
    }

    pub const fn set_timer(&mut self, kind: SessionKind, timer: SessionTimer) {
        match kind {
            SessionKind::Focus => {
                self.focus_elapsed = timer.elapsed_ms;
                self.focus_start_time = timer.start_time;
                self.focus_paused = timer.paused;
            }
            SessionKind::Relax => {
                self.relax_elapsed = timer.elapsed_ms;
                self.relax_start_time = timer.start_time;
                self.relax_paused = timer.paused;
            }
        }
    }

    #[must_use]
    pub const fn is_running(&self, kind: SessionKind) -> bool {
        self.timer(kind).is_running()
    }

    /// Checks the record-level invariants: at most one session running, and a
    /// frozen focus session is paused with no start time.
    #[must_use]
    pub const fn invariants_hold(&self) -> bool {
        let both_running = self.is_running(SessionKind::Focus) && self.is_running(SessionKind::Relax);
        let frozen_ok = !self.focus_frozen_by_inactivity
            || (self.focus_paused && self.focus_start_time.is_none());
        !both_running && frozen_ok
    }
}

/// A partial record. `None` means "leave unchanged"; for start times,
/// `Some(None)` means "clear".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatePatch {
    pub mode: Option<Mode>,
    pub focus_elapsed: Option<u64>,
    pub relax_elapsed: Option<u64>,
    pub focus_start_time: Option<Option<i64>>,
    pub relax_start_time: Option<Option<i64>>,
    pub focus_paused: Option<bool>,
    pub relax_paused: Option<bool>,
    pub focus_frozen_by_inactivity: Option<bool>,
}

impl StatePatch {
    /// A patch that writes every field of `state`.
    #[must_use]
    pub const fn full(state: &SessionState) -> Self {
        Self {
            mode: Some(state.mode),
            focus_elapsed: Some(state.focus_elapsed),
            relax_elapsed: Some(state.relax_elapsed),
            focus_start_time: Some(state.focus_start_time),
            relax_start_time: Some(state.relax_start_time),
            focus_paused: Some(state.focus_paused),
            relax_paused: Some(state.relax_paused),
            focus_frozen_by_inactivity: Some(state.focus_frozen_by_inactivity),
        }
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Writes the whole `(elapsed, start, paused)` triple of one session.
    #[must_use]
    pub const fn with_timer(mut self, kind: SessionKind, timer: SessionTimer) -> Self {
        match kind {
            SessionKind::Focus => {
                self.focus_elapsed = Some(timer.elapsed_ms);
                self.focus_start_time = Some(timer.start_time);
                self.focus_paused = Some(timer.paused);
            }
            SessionKind::Relax => {
                self.relax_elapsed = Some(timer.elapsed_ms);
                self.relax_start_time = Some(timer.start_time);
                self.relax_paused = Some(timer.paused);
            }
        }
        self
    }

    #[must_use]
    pub const fn with_frozen(mut self, frozen: bool) -> Self {
        self.focus_frozen_by_inactivity = Some(frozen);
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.focus_elapsed.is_none()
            && self.relax_elapsed.is_none()
            && self.focus_start_time.is_none()
            && self.relax_start_time.is_none()
            && self.focus_paused.is_none()
            && self.relax_paused.is_none()
            && self.focus_frozen_by_inactivity.is_none()
    }

    /// Flattens the patch into `(key, value)` pairs for a key-value store.
    #[must_use]
    pub fn to_entries(&self) -> Vec<(StateKey, Value)> {
        let mut entries = Vec::new();
        if let Some(mode) = self.mode {
            entries.push((StateKey::Mode, Value::from(mode.as_str())));
        }
        if let Some(start) = self.focus_start_time {
            entries.push((StateKey::FocusStartTime, start.map_or(Value::Null, Value::from)));
        }
        if let Some(start) = self.relax_start_time {
            entries.push((StateKey::RelaxStartTime, start.map_or(Value::Null, Value::from)));
        }
        if let Some(elapsed) = self.focus_elapsed {
            entries.push((StateKey::FocusElapsed, Value::from(elapsed)));
        }
        if let Some(elapsed) = self.relax_elapsed {
            entries.push((StateKey::RelaxElapsed, Value::from(elapsed)));
        }
        if let Some(paused) = self.focus_paused {
            entries.push((StateKey::FocusPaused, Value::from(paused)));
        }
        if let Some(paused) = self.relax_paused {
            entries.push((StateKey::RelaxPaused, Value::from(paused)));
        }
        if let Some(frozen) = self.focus_frozen_by_inactivity {
            entries.push((StateKey::FocusFrozenByInactivity, Value::from(frozen)));
        }
        entries
    }

    /// Rebuilds a patch from stored values keyed by [`StateKey::as_str`].
    pub fn from_entries(values: &HashMap<String, Value>) -> Result<Self, serde_json::Error> {
        fn field<T: serde::de::DeserializeOwned>(
            values: &HashMap<String, Value>,
            key: StateKey,
        ) -> Result<Option<T>, serde_json::Error> {
            values
                .get(key.as_str())
                .map(|value| serde_json::from_value(value.clone()))
                .transpose()
        }

        Ok(Self {
            mode: field(values, StateKey::Mode)?,
            focus_elapsed: field(values, StateKey::FocusElapsed)?,
            relax_elapsed: field(values, StateKey::RelaxElapsed)?,
            focus_start_time: field(values, StateKey::FocusStartTime)?,
            relax_start_time: field(values, StateKey::RelaxStartTime)?,
            focus_paused: field(values, StateKey::FocusPaused)?,
            relax_paused: field(values, StateKey::RelaxPaused)?,
            focus_frozen_by_inactivity: field(values, StateKey::FocusFrozenByInactivity)?,
        })
    }
}
