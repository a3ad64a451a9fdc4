//! Status command: show both timers, once or continuously.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use ft_core::{Clock, ControllerLink, SessionUi, Store, UiMessage, UiView};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::UnixStream;

use crate::ipc::{Envelope, encode_line};

type UiUpdates = Lines<BufReader<UnixStream>>;

pub fn run<W: Write>(writer: &mut W, view: &UiView, json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string(view)?)?;
    } else {
        write!(writer, "{view}")?;
    }
    Ok(())
}

/// Redraws every `interval` and immediately on freeze notifications from the
/// daemon, until Ctrl-C. Works without a daemon, minus the notifications.
pub async fn watch<W, S, C, L>(
    writer: &mut W,
    ui: &mut SessionUi<S, C, L>,
    socket: &Path,
    interval: Duration,
    json: bool,
) -> Result<()>
where
    W: Write,
    S: Store,
    C: Clock,
    L: ControllerLink,
{
    let mut updates = subscribe(socket).await;
    let mut ticker = tokio::time::interval(interval);

    loop {
        let mut lost_daemon = false;
        tokio::select! {
            _ = ticker.tick() => {
                let view = ui.refresh().context("failed to read session state")?;
                draw(writer, view, json)?;
            }
            message = next_update(&mut updates) => {
                if let Some(message) = message {
                    let view = ui.on_message(message).context("failed to read session state")?;
                    draw(writer, view, json)?;
                } else {
                    lost_daemon = true;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        if lost_daemon {
            tracing::warn!("daemon connection closed, freeze notifications stopped");
            updates = None;
        }
    }
    Ok(())
}

fn draw<W: Write>(writer: &mut W, view: &UiView, json: bool) -> Result<()> {
    run(writer, view, json)?;
    if !json {
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

async fn subscribe(socket: &Path) -> Option<UiUpdates> {
    let mut stream = match UnixStream::connect(socket).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(socket = %socket.display(), error = %err, "daemon not reachable, watching storage only");
            return None;
        }
    };
    let line = encode_line(&Envelope::Subscribe).ok()?;
    if let Err(err) = stream.write_all(line.as_bytes()).await {
        tracing::warn!(error = %err, "subscription failed");
        return None;
    }
    Some(BufReader::new(stream).lines())
}

/// Next UI message, or `None` once the connection is gone. Pends forever
/// without a connection.
async fn next_update(updates: &mut Option<UiUpdates>) -> Option<UiMessage> {
    let Some(lines) = updates.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str(&line) {
                Ok(message) => return Some(message),
                Err(err) => tracing::warn!(error = %err, "ignoring malformed ui message"),
            },
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(error = %err, "daemon connection failed");
                return None;
            }
        }
    }
}
