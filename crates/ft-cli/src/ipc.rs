//! Newline-delimited JSON over the daemon's Unix socket.
//!
//! Every connection opens with one [`Envelope`]. A `control` connection may
//! send any number of further envelopes. `attach_page` turns the connection
//! into a page context: the daemon writes [`ft_core::PageMessage`] lines back
//! and the page sends `control` envelopes carrying activity. `subscribe`
//! turns it into a UI listener receiving [`ft_core::UiMessage`] lines.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use ft_core::{ControllerLink, ControllerMessage};
use serde::{Deserialize, Serialize};

/// Write timeout for fire-and-forget control messages.
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Control { message: ControllerMessage },
    AttachPage { url: String },
    Subscribe,
}

/// Serializes one value as a single JSON line.
pub fn encode_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

/// Blocking link from a CLI front end to the daemon. A missing daemon is
/// logged and otherwise ignored: state was already persisted.
#[derive(Debug, Clone)]
pub struct SocketLink {
    path: PathBuf,
    sent: usize,
}

impl SocketLink {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path, sent: 0 }
    }

    /// Number of messages actually delivered to the daemon.
    pub const fn sent(&self) -> usize {
        self.sent
    }

    fn try_send(&self, message: ControllerMessage) -> anyhow::Result<()> {
        let line = encode_line(&Envelope::Control { message })?;
        let mut stream = UnixStream::connect(&self.path)?;
        stream.set_write_timeout(Some(SEND_TIMEOUT))?;
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        Ok(())
    }
}

impl ControllerLink for SocketLink {
    fn send(&mut self, message: ControllerMessage) {
        match self.try_send(message) {
            Ok(()) => {
                self.sent += 1;
                tracing::debug!(?message, "sent to daemon");
            }
            Err(err) => {
                tracing::warn!(
                    socket = %self.path.display(),
                    error = %err,
                    "daemon not reachable, message dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::os::unix::net::UnixListener;

    use super::*;
    use ft_core::FocusCommand;

    #[test]
    fn envelopes_are_tagged_by_type() {
        let line = encode_line(&Envelope::AttachPage {
            url: "https://example.com".to_string(),
        })
        .unwrap();
        assert_eq!(line, "{\"type\":\"attach_page\",\"url\":\"https://example.com\"}\n");

        let line = encode_line(&Envelope::Control {
            message: ControllerMessage::ResetFocus,
        })
        .unwrap();
        assert_eq!(
            line,
            "{\"type\":\"control\",\"message\":{\"action\":\"RESET_FOCUS\"}}\n"
        );

        let parsed: Envelope = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        assert_eq!(parsed, Envelope::Subscribe);
    }

    #[test]
    fn missing_daemon_is_not_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let mut link = SocketLink::new(temp.path().join("absent.sock"));
        link.send(ControllerMessage::FocusGoalCompleted);
        assert_eq!(link.sent(), 0);
    }

    #[test]
    fn delivers_one_control_line() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ft.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut link = SocketLink::new(path);
        link.send(ControllerMessage::Focus {
            state: FocusCommand::Focusing,
        });
        assert_eq!(link.sent(), 1);

        let (stream, _) = listener.accept().unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        let envelope: Envelope = serde_json::from_str(&line).unwrap();
        assert_eq!(
            envelope,
            Envelope::Control {
                message: ControllerMessage::Focus {
                    state: FocusCommand::Focusing
                }
            }
        );
    }
}
