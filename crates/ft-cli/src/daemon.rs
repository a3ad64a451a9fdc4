//! The controller daemon.
//!
//! A single loop owns the [`SessionController`] and waits on three things:
//! inbound events from socket connections, the watchdog deadline, and
//! shutdown. Connection tasks never touch session state; they only forward
//! events into the loop and write back whatever the loop sends them.
//!
//! The controller runs on the same wall clock as the front ends. Deadlines
//! are wall times, so the loop sleeps in bounded steps and re-reads the clock
//! after each one; a suspend or clock step is noticed within a step.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use ft_core::session::delta_ms;
use ft_core::{
    Clock, ControllerMessage, InjectOutcome, Notice, Notifier, PageError, PageHost, PageId,
    PageInfo, PageMessage, SessionController, Store, SystemClock, UiMessage,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};

use crate::Config;
use crate::ipc::{Envelope, encode_line};

const UI_CHANNEL_CAPACITY: usize = 16;

/// Longest single sleep while a watchdog deadline is pending.
const WATCHDOG_POLL: Duration = Duration::from_secs(1);

/// The controller as wired up by the daemon.
pub type DaemonController<S, C> = SessionController<S, SocketPages, CommandNotifier, C>;

#[derive(Debug)]
struct PageConn {
    url: String,
    outbox: mpsc::UnboundedSender<PageMessage>,
    /// Set once the controller has bound a reporter to this connection.
    loaded: bool,
}

/// Page contexts attached over the socket.
#[derive(Debug, Default)]
pub struct SocketPages {
    pages: HashMap<PageId, PageConn>,
}

impl SocketPages {
    pub fn attach(&mut self, page: &PageInfo, outbox: mpsc::UnboundedSender<PageMessage>) {
        self.pages.insert(
            page.id,
            PageConn {
                url: page.url.clone(),
                outbox,
                loaded: false,
            },
        );
    }

    pub fn detach(&mut self, page: PageId) {
        self.pages.remove(&page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageHost for SocketPages {
    fn pages(&self) -> Vec<PageInfo> {
        self.pages
            .iter()
            .map(|(id, conn)| PageInfo {
                id: *id,
                url: conn.url.clone(),
            })
            .collect()
    }

    fn inject(&mut self, page: PageId) -> Result<InjectOutcome, PageError> {
        let conn = self.pages.get_mut(&page).ok_or(PageError::Unknown(page))?;
        if conn.outbox.is_closed() {
            return Err(PageError::Closed(page));
        }
        if conn.loaded {
            return Ok(InjectOutcome::AlreadyLoaded);
        }
        conn.loaded = true;
        Ok(InjectOutcome::Loaded)
    }

    fn send(&mut self, page: PageId, message: PageMessage) -> Result<(), PageError> {
        let conn = self.pages.get(&page).ok_or(PageError::Unknown(page))?;
        if !conn.loaded {
            return Err(PageError::Delivery {
                page,
                reason: "no reporter listening".to_string(),
            });
        }
        conn.outbox.send(message).map_err(|_| PageError::Closed(page))
    }
}

/// Logs every notice and optionally hands it to an external program as
/// `<command> <title> <message>`.
#[derive(Debug, Clone, Default)]
pub struct CommandNotifier {
    command: Option<String>,
}

impl CommandNotifier {
    #[must_use]
    pub const fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl Notifier for CommandNotifier {
    fn notify(&mut self, notice: &Notice) {
        tracing::info!(title = notice.title(), "{}", notice.message());
        let Some(command) = &self.command else {
            return;
        };
        match Command::new(command)
            .arg(notice.title())
            .arg(notice.message())
            .spawn()
        {
            Ok(mut child) => {
                // Reap in the background so the loop never blocks on it.
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(err) => tracing::warn!(command = %command, error = %err, "notify command failed"),
        }
    }
}

/// Events forwarded from connections into the controller loop.
#[derive(Debug)]
pub enum DaemonEvent {
    Control(ControllerMessage),
    PageOpened {
        page: PageInfo,
        outbox: mpsc::UnboundedSender<PageMessage>,
    },
    PageClosed(PageId),
}

/// Runs the daemon until Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    let db = ft_db::Database::open(&config.database_path).with_context(|| {
        format!("failed to open database {}", config.database_path.display())
    })?;
    let listener = bind(&config.socket_path)?;
    let mut controller = SessionController::new(
        db,
        SocketPages::default(),
        CommandNotifier::new(config.notify_command.clone()),
        SystemClock,
        config.inactivity_limit_ms,
    );
    controller
        .restore()
        .context("failed to read session state")?;

    tracing::info!(
        socket = %config.socket_path.display(),
        inactivity_limit_ms = config.inactivity_limit_ms,
        "daemon listening"
    );

    let result = serve(listener, controller, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    })
    .await;

    if let Err(err) = std::fs::remove_file(&config.socket_path) {
        tracing::debug!(error = %err, "socket file not removed");
    }
    result
}

/// Binds the socket, replacing a stale file left by a previous daemon.
fn bind(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            bail!("another daemon is already listening on {}", path.display());
        }
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("failed to bind {}", path.display()))
}

/// The controller loop. Returns when `shutdown` completes.
pub async fn serve<S, C, F>(
    listener: UnixListener,
    mut controller: DaemonController<S, C>,
    shutdown: F,
) -> Result<()>
where
    S: Store,
    C: Clock,
    F: Future<Output = ()>,
{
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (ui_tx, _) = broadcast::channel(UI_CHANNEL_CAPACITY);
    let acceptor = tokio::spawn(accept_loop(listener, events_tx, ui_tx.clone()));
    tokio::pin!(shutdown);

    loop {
        let wake = watchdog_sleep(&controller);
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("daemon stopping");
                break;
            }
            event = events_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("daemon stopping (connection listener ended)");
                    break;
                };
                handle_event(&mut controller, event);
            }
            () = sleep_for(wake) => {
                if let Err(err) = controller.fire_due_watchdog() {
                    tracing::error!(error = %err, "inactivity check failed");
                }
            }
        }

        for message in controller.drain_ui_messages() {
            // Having no UI attached is normal.
            let _ = ui_tx.send(message);
        }
    }

    acceptor.abort();
    Ok(())
}

/// How long to sleep before checking the watchdog again, if it is armed.
fn watchdog_sleep<S: Store, C: Clock>(controller: &DaemonController<S, C>) -> Option<Duration> {
    let deadline = controller.next_deadline()?;
    let remaining = delta_ms(controller.clock().now_ms(), deadline);
    Some(Duration::from_millis(remaining).min(WATCHDOG_POLL))
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Applies one event to the controller. Failures are logged, never fatal.
pub fn handle_event<S, C>(controller: &mut DaemonController<S, C>, event: DaemonEvent)
where
    S: Store,
    C: Clock,
{
    match event {
        DaemonEvent::Control(message) => {
            if let Err(err) = controller.handle(message) {
                tracing::error!(?message, error = %err, "control message failed");
            }
        }
        DaemonEvent::PageOpened { page, outbox } => {
            tracing::debug!(page = %page.id, url = %page.url, "page attached");
            controller.pages_mut().attach(&page, outbox);
            controller.page_attached(&page);
        }
        DaemonEvent::PageClosed(page) => {
            tracing::debug!(%page, "page detached");
            controller.pages_mut().detach(page);
        }
    }
}

async fn accept_loop(
    listener: UnixListener,
    events: mpsc::UnboundedSender<DaemonEvent>,
    ui: broadcast::Sender<UiMessage>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let events = events.clone();
                let ui = ui.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, events, ui).await {
                        tracing::debug!(error = %err, "connection ended with error");
                    }
                });
            }
            Err(err) => tracing::warn!(error = %err, "failed to accept connection"),
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    events: mpsc::UnboundedSender<DaemonEvent>,
    ui: broadcast::Sender<UiMessage>,
) -> Result<()> {
    let (read, write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_envelope(&line) {
            Some(Envelope::Control { message }) => forward(&events, message)?,
            Some(Envelope::AttachPage { url }) => return serve_page(url, lines, write, &events).await,
            Some(Envelope::Subscribe) => return serve_subscriber(ui.subscribe(), write).await,
            None => {}
        }
    }
    Ok(())
}

fn parse_envelope(line: &str) -> Option<Envelope> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(envelope) => Some(envelope),
        Err(err) => {
            tracing::warn!(error = %err, line, "ignoring malformed message");
            None
        }
    }
}

fn forward(events: &mpsc::UnboundedSender<DaemonEvent>, message: ControllerMessage) -> Result<()> {
    events
        .send(DaemonEvent::Control(message))
        .map_err(|_| anyhow!("controller loop has stopped"))
}

async fn serve_page(
    url: String,
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    mut writer: OwnedWriteHalf,
    events: &mpsc::UnboundedSender<DaemonEvent>,
) -> Result<()> {
    let page = PageInfo {
        id: PageId::new(),
        url,
    };
    let id = page.id;
    let (outbox, mut inbox) = mpsc::unbounded_channel();
    events
        .send(DaemonEvent::PageOpened { page, outbox })
        .map_err(|_| anyhow!("controller loop has stopped"))?;

    let result = pump_page(&mut lines, &mut writer, &mut inbox, events).await;
    let _ = events.send(DaemonEvent::PageClosed(id));
    result
}

async fn pump_page(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    writer: &mut OwnedWriteHalf,
    inbox: &mut mpsc::UnboundedReceiver<PageMessage>,
    events: &mpsc::UnboundedSender<DaemonEvent>,
) -> Result<()> {
    loop {
        tokio::select! {
            message = inbox.recv() => {
                let Some(message) = message else {
                    return Ok(());
                };
                writer.write_all(encode_line(&message)?.as_bytes()).await?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match parse_envelope(&line) {
                    Some(Envelope::Control { message }) => forward(events, message)?,
                    Some(other) => tracing::warn!(?other, "unexpected message on page connection"),
                    None => {}
                }
            }
        }
    }
}

async fn serve_subscriber(
    mut updates: broadcast::Receiver<UiMessage>,
    mut writer: OwnedWriteHalf,
) -> Result<()> {
    loop {
        match updates.recv().await {
            Ok(message) => writer.write_all(encode_line(&message)?.as_bytes()).await?,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "ui subscriber fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ipc::SocketLink;
    use ft_core::{
        ActivityKind, ActivityReport, ControllerLink, FocusCommand, ManualClock, MemoryStore,
        SessionKind, load_state,
    };
    use tokio::sync::oneshot;

    fn manual_controller(
        clock: &ManualClock,
    ) -> (DaemonController<Arc<MemoryStore>, ManualClock>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let controller = SessionController::new(
            Arc::clone(&store),
            SocketPages::default(),
            CommandNotifier::default(),
            clock.clone(),
            5_000,
        );
        (controller, store)
    }

    fn focusing() -> ControllerMessage {
        ControllerMessage::Focus {
            state: FocusCommand::Focusing,
        }
    }

    #[test]
    fn pages_get_monitoring_messages_through_their_outbox() {
        let clock = ManualClock::starting_at(0);
        let (mut controller, _store) = manual_controller(&clock);

        let (outbox, mut inbox) = mpsc::unbounded_channel();
        let page = PageInfo {
            id: PageId::new(),
            url: "https://example.com".to_string(),
        };
        handle_event(&mut controller, DaemonEvent::PageOpened { page, outbox });
        assert!(inbox.try_recv().is_err());

        handle_event(&mut controller, DaemonEvent::Control(focusing()));
        assert_eq!(inbox.try_recv().unwrap(), PageMessage::EnableMonitoring);

        clock.set(5_000);
        controller.fire_due_watchdog().unwrap();
        assert_eq!(inbox.try_recv().unwrap(), PageMessage::DisableMonitoring);
    }

    #[test]
    fn page_opened_during_focus_is_enabled_immediately() {
        let clock = ManualClock::starting_at(0);
        let (mut controller, _store) = manual_controller(&clock);
        handle_event(&mut controller, DaemonEvent::Control(focusing()));

        let (outbox, mut inbox) = mpsc::unbounded_channel();
        let page = PageInfo {
            id: PageId::new(),
            url: "http://localhost:3000".to_string(),
        };
        let id = page.id;
        handle_event(&mut controller, DaemonEvent::PageOpened { page, outbox });
        assert_eq!(inbox.try_recv().unwrap(), PageMessage::EnableMonitoring);

        handle_event(&mut controller, DaemonEvent::PageClosed(id));
        assert!(controller.pages().is_empty());
    }

    #[test]
    fn closed_page_is_skipped() {
        let mut pages = SocketPages::default();
        let (outbox, inbox) = mpsc::unbounded_channel();
        let page = PageInfo {
            id: PageId::new(),
            url: "https://example.com".to_string(),
        };
        pages.attach(&page, outbox);
        drop(inbox);

        assert_eq!(pages.inject(page.id), Err(PageError::Closed(page.id)));
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn activity_event_rearms_watchdog() {
        let clock = ManualClock::starting_at(0);
        let (mut controller, store) = manual_controller(&clock);
        handle_event(&mut controller, DaemonEvent::Control(focusing()));

        clock.set(3_000);
        let report = ActivityReport {
            kind: ActivityKind::Wheel,
            timestamp: 3_000,
        };
        handle_event(
            &mut controller,
            DaemonEvent::Control(ControllerMessage::Activity(report)),
        );
        assert_eq!(controller.next_deadline(), Some(8_000));

        clock.set(8_000);
        assert!(controller.fire_due_watchdog().unwrap());
        assert_eq!(load_state(&store).unwrap().focus_elapsed, 8_000);
    }

    #[test]
    fn watchdog_sleep_is_bounded_and_follows_the_wall_clock() {
        let clock = ManualClock::starting_at(0);
        let (mut controller, store) = manual_controller(&clock);
        assert_eq!(watchdog_sleep(&controller), None);

        handle_event(&mut controller, DaemonEvent::Control(focusing()));
        assert_eq!(watchdog_sleep(&controller), Some(WATCHDOG_POLL));

        clock.set(4_500);
        assert_eq!(watchdog_sleep(&controller), Some(Duration::from_millis(500)));

        // A suspend moves the wall clock past the deadline in one step.
        clock.set(3_600_000);
        assert_eq!(watchdog_sleep(&controller), Some(Duration::ZERO));
        assert!(controller.fire_due_watchdog().unwrap());
        assert_eq!(load_state(&store).unwrap().focus_start_time, None);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_freezes_focus_and_tells_subscribers() {
        let temp = tempfile::tempdir().unwrap();
        let socket = temp.path().join("ft.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::starting_at(1_000_000);
        let controller = SessionController::new(
            Arc::clone(&store),
            SocketPages::default(),
            CommandNotifier::default(),
            clock.clone(),
            5_000,
        );
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let daemon = tokio::spawn(serve(listener, controller, async {
            let _ = stop_rx.await;
        }));

        let subscriber = UnixStream::connect(&socket).await.unwrap();
        let (read, mut write) = subscriber.into_split();
        write
            .write_all(encode_line(&Envelope::Subscribe).unwrap().as_bytes())
            .await
            .unwrap();
        let mut updates = BufReader::new(read).lines();
        tokio::time::sleep(Duration::from_millis(100)).await;

        SocketLink::new(socket.clone()).send(focusing());
        while !load_state(&store).unwrap().is_running(SessionKind::Focus) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(load_state(&store).unwrap().focus_start_time, Some(1_000_000));
        clock.advance(5_000);

        let line = updates.next_line().await.unwrap().unwrap();
        let message: UiMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(message, UiMessage::FreezeFocusTimer);

        let state = load_state(&store).unwrap();
        assert!(state.focus_frozen_by_inactivity);
        assert_eq!(state.focus_elapsed, 5_000);
        assert!(state.invariants_hold());

        stop_tx.send(()).unwrap();
        daemon.await.unwrap().unwrap();
    }
}
