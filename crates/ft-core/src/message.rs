//! Control messages exchanged between the UI, the controller and pages.
//!
//! Each direction has its own closed enum. The JSON form uses SCREAMING_SNAKE_CASE
//! `action` tags so browser-side front ends can speak the same protocol.

use serde::{Deserialize, Serialize};

use crate::activity::ActivityReport;

/// Requested focus transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusCommand {
    Focusing,
    Stopped,
}

/// Requested relax transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelaxCommand {
    Relaxing,
    Stopped,
}

/// Messages handled by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerMessage {
    /// Liveness signal from a page.
    Activity(ActivityReport),
    Focus { state: FocusCommand },
    Relax { state: RelaxCommand },
    ResetFocus,
    FocusGoalCompleted,
}

/// Messages from the controller to UI instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiMessage {
    FreezeFocusTimer,
}

/// Messages from the controller to page contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageMessage {
    EnableMonitoring,
    DisableMonitoring,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;

    #[test]
    fn controller_messages_use_action_tags() {
        let focus = ControllerMessage::Focus {
            state: FocusCommand::Focusing,
        };
        assert_eq!(
            serde_json::to_string(&focus).unwrap(),
            r#"{"action":"FOCUS","state":"FOCUSING"}"#
        );
        assert_eq!(
            serde_json::to_string(&ControllerMessage::ResetFocus).unwrap(),
            r#"{"action":"RESET_FOCUS"}"#
        );
        assert_eq!(
            serde_json::to_string(&ControllerMessage::FocusGoalCompleted).unwrap(),
            r#"{"action":"FOCUS_GOAL_COMPLETED"}"#
        );
    }

    #[test]
    fn activity_report_flattens_into_message() {
        let parsed: ControllerMessage =
            serde_json::from_str(r#"{"action":"ACTIVITY","activityType":"click","timestamp":7}"#).unwrap();
        assert_eq!(
            parsed,
            ControllerMessage::Activity(ActivityReport {
                kind: ActivityKind::Click,
                timestamp: 7
            })
        );
    }

    #[test]
    fn misspelled_actions_are_rejected() {
        assert!(serde_json::from_str::<ControllerMessage>(r#"{"action":"FOCUSS","state":"FOCUSING"}"#).is_err());
        assert!(serde_json::from_str::<ControllerMessage>(r#"{"action":"RELAX","state":"FOCUSING"}"#).is_err());
    }

    #[test]
    fn ui_and_page_messages_use_action_tags() {
        assert_eq!(
            serde_json::to_string(&UiMessage::FreezeFocusTimer).unwrap(),
            r#"{"action":"FREEZE_FOCUS_TIMER"}"#
        );
        assert_eq!(
            serde_json::to_string(&PageMessage::DisableMonitoring).unwrap(),
            r#"{"action":"DISABLE_MONITORING"}"#
        );
    }
}
