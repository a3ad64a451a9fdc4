//! Core domain logic for the focus tracker.
//!
//! This crate contains:
//! - The persisted session record and the unified focus/relax timer
//! - The session controller with its inactivity watchdog and page fan-out
//! - The page-side activity reporter
//! - The front-end view model

pub mod activity;
pub mod clock;
pub mod controller;
pub mod display;
pub mod message;
pub mod notice;
pub mod page;
pub mod session;
pub mod state;
pub mod store;
pub mod types;
pub mod ui;
pub mod watchdog;

pub use activity::{ActivityKind, ActivityReport, ActivityReporter, InputEvent, ReporterConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{ControllerError, SessionController};
pub use message::{ControllerMessage, FocusCommand, PageMessage, RelaxCommand, UiMessage};
pub use notice::{LogNotifier, Notice, Notifier};
pub use page::{FanOut, InjectOutcome, LocalPages, PageError, PageHost, PageId, PageInfo};
pub use session::SessionTimer;
pub use state::{SessionState, StateKey, StatePatch};
pub use store::{MemoryStore, Store, StoreError, load_state};
pub use types::{Mode, ParseError, SessionKind};
pub use ui::{ControllerLink, SessionUi, TimerStatus, TimerView, UiView};
pub use watchdog::InactivityWatchdog;
