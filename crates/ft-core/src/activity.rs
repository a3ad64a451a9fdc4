//! Page-side activity detection.
//!
//! An [`ActivityReporter`] lives in each page context. It turns raw input
//! events into [`ActivityReport`]s while monitoring is enabled, debouncing
//! pointer movement and ignoring typing inside text fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::message::PageMessage;
use crate::types::ParseError;

/// Default minimum gap between two accepted pointer-move reports.
pub const DEFAULT_POINTER_DEBOUNCE_MS: u64 = 1_000;

/// Kinds of user input a page can report.
///
/// `KeyDown` ("keyboard") and `KeyPress`/`KeyUp` are separate signals and can
/// be enabled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    Click,
    KeyDown,
    KeyPress,
    KeyUp,
    Wheel,
    MouseDown,
    MouseUp,
    TabActive,
    TabInactive,
}

impl ActivityKind {
    pub const ALL: [Self; 10] = [
        Self::PointerMove,
        Self::Click,
        Self::KeyDown,
        Self::KeyPress,
        Self::KeyUp,
        Self::Wheel,
        Self::MouseDown,
        Self::MouseUp,
        Self::TabActive,
        Self::TabInactive,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PointerMove => "mouse",
            Self::Click => "click",
            Self::KeyDown => "keyboard",
            Self::KeyPress => "keypress",
            Self::KeyUp => "keyup",
            Self::Wheel => "wheel",
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::TabActive => "tab-active",
            Self::TabInactive => "tab-inactive",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = ParseError;

    /// Accepts the wire names plus the DOM event names they come from.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mouse" | "mousemove" => Ok(Self::PointerMove),
            "click" => Ok(Self::Click),
            "keyboard" | "keydown" => Ok(Self::KeyDown),
            "keypress" => Ok(Self::KeyPress),
            "keyup" => Ok(Self::KeyUp),
            "wheel" => Ok(Self::Wheel),
            "mousedown" => Ok(Self::MouseDown),
            "mouseup" => Ok(Self::MouseUp),
            "tab-active" | "visible" => Ok(Self::TabActive),
            "tab-inactive" | "hidden" => Ok(Self::TabInactive),
            _ => Err(ParseError::UnknownActivityKind(s.to_string())),
        }
    }
}

impl Serialize for ActivityKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A raw input event observed in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub kind: ActivityKind,
    /// Whether keyboard focus was inside a text input or textarea.
    pub in_text_input: bool,
}

impl InputEvent {
    #[must_use]
    pub const fn new(kind: ActivityKind) -> Self {
        Self {
            kind,
            in_text_input: false,
        }
    }

    #[must_use]
    pub const fn in_text_input(mut self) -> Self {
        self.in_text_input = true;
        self
    }
}

impl FromStr for InputEvent {
    type Err = ParseError;

    /// Parses `<kind> [input|textarea]`, e.g. `keydown input`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(kind) = parts.next() else {
            return Err(ParseError::InvalidInputEvent(s.to_string()));
        };
        let mut event = Self::new(kind.parse()?);
        match parts.next() {
            None => {}
            Some(target) if target.eq_ignore_ascii_case("input") || target.eq_ignore_ascii_case("textarea") => {
                event = event.in_text_input();
            }
            Some(_) => return Err(ParseError::InvalidInputEvent(s.to_string())),
        }
        if parts.next().is_some() {
            return Err(ParseError::InvalidInputEvent(s.to_string()));
        }
        Ok(event)
    }
}

/// An accepted activity signal sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityReport {
    #[serde(rename = "activityType")]
    pub kind: ActivityKind,
    /// Epoch milliseconds when the event was accepted.
    pub timestamp: i64,
}

/// Reporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    pub pointer_debounce_ms: u64,
    pub enabled_kinds: Vec<ActivityKind>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            pointer_debounce_ms: DEFAULT_POINTER_DEBOUNCE_MS,
            enabled_kinds: ActivityKind::ALL.to_vec(),
        }
    }
}

/// Per-page activity detector.
#[derive(Debug, Clone)]
pub struct ActivityReporter {
    config: ReporterConfig,
    monitoring: bool,
    last_pointer_report: Option<i64>,
}

impl ActivityReporter {
    #[must_use]
    pub const fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            monitoring: false,
            last_pointer_report: None,
        }
    }

    pub const fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Takes effect for subsequent events only.
    pub fn set_monitoring(&mut self, enabled: bool) {
        if self.monitoring != enabled {
            tracing::debug!(enabled, "page monitoring toggled");
        }
        self.monitoring = enabled;
    }

    pub fn handle(&mut self, message: PageMessage) {
        match message {
            PageMessage::EnableMonitoring => self.set_monitoring(true),
            PageMessage::DisableMonitoring => self.set_monitoring(false),
        }
    }

    /// Returns the report to send upstream, if the event is accepted.
    pub fn on_input_event(&mut self, event: InputEvent, now: i64) -> Option<ActivityReport> {
        if !self.monitoring || !self.config.enabled_kinds.contains(&event.kind) {
            return None;
        }

        match event.kind {
            ActivityKind::PointerMove => {
                let debounce = i64::try_from(self.config.pointer_debounce_ms).unwrap_or(i64::MAX);
                let too_soon = self
                    .last_pointer_report
                    .is_some_and(|last| now.saturating_sub(last) < debounce);
                if too_soon {
                    return None;
                }
                self.last_pointer_report = Some(now);
            }
            ActivityKind::KeyDown if event.in_text_input => return None,
            _ => {}
        }

        tracing::trace!(kind = %event.kind, timestamp = now, "activity accepted");
        Some(ActivityReport {
            kind: event.kind,
            timestamp: now,
        })
    }
}

impl Default for ActivityReporter {
    fn default() -> Self {
        Self::new(ReporterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring_reporter() -> ActivityReporter {
        let mut reporter = ActivityReporter::default();
        reporter.set_monitoring(true);
        reporter
    }

    #[test]
    fn silent_until_monitoring_enabled() {
        let mut reporter = ActivityReporter::default();
        assert!(reporter.on_input_event(InputEvent::new(ActivityKind::Click), 0).is_none());

        reporter.handle(PageMessage::EnableMonitoring);
        let report = reporter.on_input_event(InputEvent::new(ActivityKind::Click), 10);
        assert_eq!(
            report,
            Some(ActivityReport {
                kind: ActivityKind::Click,
                timestamp: 10
            })
        );

        reporter.handle(PageMessage::DisableMonitoring);
        assert!(reporter.on_input_event(InputEvent::new(ActivityKind::Click), 20).is_none());
    }

    #[test]
    fn pointer_moves_are_debounced_from_last_accepted() {
        let mut reporter = monitoring_reporter();
        let mv = InputEvent::new(ActivityKind::PointerMove);

        assert!(reporter.on_input_event(mv, 10_000).is_some());
        assert!(reporter.on_input_event(mv, 10_400).is_none());
        assert!(reporter.on_input_event(mv, 10_999).is_none());
        // Suppressed moves do not push the window forward.
        assert!(reporter.on_input_event(mv, 11_000).is_some());
        assert!(reporter.on_input_event(mv, 11_500).is_none());
    }

    #[test]
    fn other_kinds_are_never_debounced() {
        let mut reporter = monitoring_reporter();
        for now in [0, 1, 2] {
            assert!(reporter.on_input_event(InputEvent::new(ActivityKind::Wheel), now).is_some());
        }
    }

    #[test]
    fn keydown_in_text_field_is_ignored() {
        let mut reporter = monitoring_reporter();
        let typing = InputEvent::new(ActivityKind::KeyDown).in_text_input();
        assert!(reporter.on_input_event(typing, 0).is_none());
        assert!(reporter.on_input_event(InputEvent::new(ActivityKind::KeyDown), 0).is_some());
        // Only key-down is filtered; key-up in a field still counts.
        let key_up = InputEvent::new(ActivityKind::KeyUp).in_text_input();
        assert!(reporter.on_input_event(key_up, 0).is_some());
    }

    #[test]
    fn disabled_kinds_are_dropped() {
        let mut reporter = ActivityReporter::new(ReporterConfig {
            enabled_kinds: vec![ActivityKind::KeyDown],
            ..ReporterConfig::default()
        });
        reporter.set_monitoring(true);
        assert!(reporter.on_input_event(InputEvent::new(ActivityKind::KeyPress), 0).is_none());
        assert!(reporter.on_input_event(InputEvent::new(ActivityKind::KeyDown), 0).is_some());
    }

    #[test]
    fn parses_input_lines() {
        let event: InputEvent = "keydown input".parse().unwrap();
        assert_eq!(event.kind, ActivityKind::KeyDown);
        assert!(event.in_text_input);

        let event: InputEvent = "mousemove".parse().unwrap();
        assert_eq!(event, InputEvent::new(ActivityKind::PointerMove));

        assert!("".parse::<InputEvent>().is_err());
        assert!("click somewhere else".parse::<InputEvent>().is_err());
        assert!("scroll".parse::<InputEvent>().is_err());
    }

    #[test]
    fn report_uses_wire_field_names() {
        let report = ActivityReport {
            kind: ActivityKind::TabInactive,
            timestamp: 5,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"activityType":"tab-inactive","timestamp":5}"#);
    }

    #[test]
    fn kind_names_roundtrip() {
        for kind in ActivityKind::ALL {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
        }
    }
}
