//! Core enums shared by the controller, the UI and the wire format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing user-supplied or wire strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unrecognized session mode.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// Unrecognized session kind.
    #[error("unknown session kind: {0} (expected focus or relax)")]
    UnknownSessionKind(String),

    /// Unrecognized activity kind.
    #[error("unknown activity kind: {0}")]
    UnknownActivityKind(String),

    /// Input event line could not be understood.
    #[error("invalid input event: {0}")]
    InvalidInputEvent(String),
}

/// Which session (if any) the user last selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    None,
    Focusing,
    Relaxing,
}

impl Mode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Focusing => "FOCUSING",
            Self::Relaxing => "RELAXING",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "FOCUSING" => Ok(Self::Focusing),
            "RELAXING" => Ok(Self::Relaxing),
            _ => Err(ParseError::UnknownMode(s.to_string())),
        }
    }
}

/// The two session types. Both share one timer implementation; they differ
/// only in the flags below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Focus,
    Relax,
}

impl SessionKind {
    /// Whether a running session of this kind is guarded by the inactivity
    /// watchdog and page monitoring. Relax sessions are never frozen.
    #[must_use]
    pub const fn inactivity_guarded(self) -> bool {
        match self {
            Self::Focus => true,
            Self::Relax => false,
        }
    }

    /// The other session kind. Starting one pauses its partner.
    #[must_use]
    pub const fn partner(self) -> Self {
        match self {
            Self::Focus => Self::Relax,
            Self::Relax => Self::Focus,
        }
    }

    /// Mode entered when this session starts.
    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Focus => Mode::Focusing,
            Self::Relax => Mode::Relaxing,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Relax => "relax",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "focus" => Ok(Self::Focus),
            "relax" => Ok(Self::Relax),
            _ => Err(ParseError::UnknownSessionKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_uses_upper_case_wire_names() {
        assert_eq!(serde_json::to_string(&Mode::Focusing).unwrap(), "\"FOCUSING\"");
        let parsed: Mode = serde_json::from_str("\"RELAXING\"").unwrap();
        assert_eq!(parsed, Mode::Relaxing);
        assert_eq!("NONE".parse::<Mode>().unwrap(), Mode::None);
    }

    #[test]
    fn only_focus_is_inactivity_guarded() {
        assert!(SessionKind::Focus.inactivity_guarded());
        assert!(!SessionKind::Relax.inactivity_guarded());
        assert_eq!(SessionKind::Focus.partner(), SessionKind::Relax);
        assert_eq!(SessionKind::Relax.mode(), Mode::Relaxing);
    }

    #[test]
    fn session_kind_parse_is_case_insensitive() {
        assert_eq!("Focus".parse::<SessionKind>().unwrap(), SessionKind::Focus);
        let err = "nap".parse::<SessionKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown session kind: nap (expected focus or relax)");
    }
}
