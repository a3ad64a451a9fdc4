//! Page command: a page context fed by input events on stdin.
//!
//! The daemon decides when this page is monitored. Input lines are turned
//! into activity reports by a local [`ActivityReporter`], which stays silent
//! until the daemon enables monitoring.

use anyhow::{Context, Result};
use ft_core::{
    ActivityReporter, Clock, ControllerMessage, InputEvent, PageMessage, SystemClock,
    page::is_monitorable,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::Config;
use crate::ipc::{Envelope, encode_line};

pub async fn run(config: &Config, url: &str) -> Result<()> {
    if !is_monitorable(url) {
        tracing::warn!(url, "only http(s) pages are monitored; activity from this page is ignored");
    }

    let stream = UnixStream::connect(&config.socket_path)
        .await
        .with_context(|| format!("daemon not reachable at {}", config.socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    let attach = Envelope::AttachPage {
        url: url.to_string(),
    };
    write.write_all(encode_line(&attach)?.as_bytes()).await?;

    let mut from_daemon = BufReader::new(read).lines();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut reporter = ActivityReporter::new(config.reporter_config());
    let clock = SystemClock;

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    tracing::debug!("stdin closed, detaching page");
                    break;
                };
                if let Some(envelope) = input_line(&mut reporter, &line, clock.now_ms()) {
                    write.write_all(encode_line(&envelope)?.as_bytes()).await?;
                }
            }
            line = from_daemon.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("daemon closed the connection");
                    break;
                };
                match serde_json::from_str::<PageMessage>(&line) {
                    Ok(message) => reporter.handle(message),
                    Err(err) => tracing::warn!(error = %err, "ignoring malformed page message"),
                }
            }
        }
    }
    Ok(())
}

/// Turns one stdin line into the envelope to send, if the reporter accepts it.
pub fn input_line(reporter: &mut ActivityReporter, line: &str, now: i64) -> Option<Envelope> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.parse::<InputEvent>() {
        Ok(event) => reporter
            .on_input_event(event, now)
            .map(|report| Envelope::Control {
                message: ControllerMessage::Activity(report),
            }),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring input line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ft_core::{ActivityKind, ActivityReport};

    fn activity(kind: ActivityKind, timestamp: i64) -> Envelope {
        Envelope::Control {
            message: ControllerMessage::Activity(ActivityReport { kind, timestamp }),
        }
    }

    #[test]
    fn lines_are_silent_until_monitoring() {
        let mut reporter = ActivityReporter::default();
        assert_eq!(input_line(&mut reporter, "click", 0), None);

        reporter.handle(PageMessage::EnableMonitoring);
        assert_eq!(
            input_line(&mut reporter, "click", 10),
            Some(activity(ActivityKind::Click, 10))
        );
    }

    #[test]
    fn pointer_moves_and_typing_are_filtered() {
        let mut reporter = ActivityReporter::default();
        reporter.handle(PageMessage::EnableMonitoring);

        assert!(input_line(&mut reporter, "mousemove", 0).is_some());
        assert_eq!(input_line(&mut reporter, "mousemove", 500), None);
        assert_eq!(input_line(&mut reporter, "keydown textarea", 600), None);
        assert_eq!(
            input_line(&mut reporter, "  keydown  ", 700),
            Some(activity(ActivityKind::KeyDown, 700))
        );
    }

    #[test]
    fn bad_lines_are_skipped() {
        let mut reporter = ActivityReporter::default();
        reporter.handle(PageMessage::EnableMonitoring);
        assert_eq!(input_line(&mut reporter, "", 0), None);
        assert_eq!(input_line(&mut reporter, "teleport", 0), None);
    }
}
