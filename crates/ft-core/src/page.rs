//! Page contexts and best-effort monitoring fan-out.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::activity::{ActivityReport, ActivityReporter, InputEvent, ReporterConfig};
use crate::message::PageMessage;

/// Only web origins can host an activity reporter.
static MONITORABLE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("static regex is valid"));

/// Whether a reporter can be attached to a page at this URL.
#[must_use]
pub fn is_monitorable(url: &str) -> bool {
    MONITORABLE_URL_RE.is_match(url)
}

/// Identifier of one page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(Uuid);

impl PageId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page context visible to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageId,
    pub url: String,
}

/// Failures talking to a single page. Never fatal to a fan-out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("page {0} does not allow reporters")]
    Restricted(PageId),

    #[error("page {0} is closed")]
    Closed(PageId),

    #[error("page {0} is unknown")]
    Unknown(PageId),

    #[error("delivery to page {page} failed: {reason}")]
    Delivery { page: PageId, reason: String },
}

/// Result of attaching a reporter to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectOutcome {
    Loaded,
    /// The load guard found an existing reporter; nothing new was attached.
    AlreadyLoaded,
}

/// The set of page contexts the controller can reach.
pub trait PageHost {
    fn pages(&self) -> Vec<PageInfo>;

    fn inject(&mut self, page: PageId) -> Result<InjectOutcome, PageError>;

    fn send(&mut self, page: PageId, message: PageMessage) -> Result<(), PageError>;
}

/// Outcome of a fan-out over all pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub skipped: usize,
}

/// Injects a reporter into one page and turns its monitoring on.
pub fn enable_page<P: PageHost + ?Sized>(host: &mut P, page: &PageInfo) -> Result<(), PageError> {
    if !is_monitorable(&page.url) {
        return Err(PageError::Restricted(page.id));
    }
    if host.inject(page.id)? == InjectOutcome::AlreadyLoaded {
        tracing::debug!(page = %page.id, "reporter already loaded");
    }
    host.send(page.id, PageMessage::EnableMonitoring)
}

/// Enables monitoring on every eligible page. Failures are logged and skipped.
pub fn enable_monitoring<P: PageHost + ?Sized>(host: &mut P) -> FanOut {
    let mut fan_out = FanOut::default();
    for page in host.pages().iter().filter(|p| is_monitorable(&p.url)) {
        match enable_page(host, page) {
            Ok(()) => fan_out.delivered += 1,
            Err(err) => {
                tracing::warn!(page = %page.id, url = %page.url, error = %err, "reporter inject failed or already injected");
                fan_out.skipped += 1;
            }
        }
    }
    fan_out
}

/// Disables monitoring on every eligible page. Failures are logged and skipped.
pub fn disable_monitoring<P: PageHost + ?Sized>(host: &mut P) -> FanOut {
    let mut fan_out = FanOut::default();
    for page in host.pages().iter().filter(|p| is_monitorable(&p.url)) {
        match host.send(page.id, PageMessage::DisableMonitoring) {
            Ok(()) => fan_out.delivered += 1,
            Err(err) => {
                tracing::warn!(page = %page.id, error = %err, "disable monitoring not delivered");
                fan_out.skipped += 1;
            }
        }
    }
    fan_out
}

#[derive(Debug)]
struct LocalPage {
    info: PageInfo,
    reporter: Option<ActivityReporter>,
    closed: bool,
}

/// Page contexts living in the current process, each with its own reporter.
#[derive(Debug, Default)]
pub struct LocalPages {
    pages: Vec<LocalPage>,
    reporter_config: ReporterConfig,
}

impl LocalPages {
    #[must_use]
    pub const fn new(reporter_config: ReporterConfig) -> Self {
        Self {
            pages: Vec::new(),
            reporter_config,
        }
    }

    /// Opens a page. No reporter is attached until the controller injects one.
    pub fn open(&mut self, url: impl Into<String>) -> PageId {
        let id = PageId::new();
        self.pages.push(LocalPage {
            info: PageInfo { id, url: url.into() },
            reporter: None,
            closed: false,
        });
        id
    }

    /// Marks a page closed. It stays listed so in-flight fan-outs hit it.
    pub fn close(&mut self, page: PageId) {
        if let Some(entry) = self.find_mut(page) {
            entry.closed = true;
        }
    }

    pub fn reporter(&self, page: PageId) -> Option<&ActivityReporter> {
        self.pages
            .iter()
            .find(|p| p.info.id == page)
            .and_then(|p| p.reporter.as_ref())
    }

    /// Feeds an input event to a page's reporter.
    pub fn input(&mut self, page: PageId, event: InputEvent, now: i64) -> Option<ActivityReport> {
        let entry = self.find_mut(page)?;
        if entry.closed {
            return None;
        }
        entry.reporter.as_mut()?.on_input_event(event, now)
    }

    fn find_mut(&mut self, page: PageId) -> Option<&mut LocalPage> {
        self.pages.iter_mut().find(|p| p.info.id == page)
    }
}

impl PageHost for LocalPages {
    fn pages(&self) -> Vec<PageInfo> {
        self.pages.iter().map(|p| p.info.clone()).collect()
    }

    fn inject(&mut self, page: PageId) -> Result<InjectOutcome, PageError> {
        let config = self.reporter_config.clone();
        let entry = self.find_mut(page).ok_or(PageError::Unknown(page))?;
        if entry.closed {
            return Err(PageError::Closed(page));
        }
        if !is_monitorable(&entry.info.url) {
            return Err(PageError::Restricted(page));
        }
        if entry.reporter.is_some() {
            return Ok(InjectOutcome::AlreadyLoaded);
        }
        entry.reporter = Some(ActivityReporter::new(config));
        Ok(InjectOutcome::Loaded)
    }

    fn send(&mut self, page: PageId, message: PageMessage) -> Result<(), PageError> {
        let entry = self.find_mut(page).ok_or(PageError::Unknown(page))?;
        if entry.closed {
            return Err(PageError::Closed(page));
        }
        let reporter = entry.reporter.as_mut().ok_or_else(|| PageError::Delivery {
            page,
            reason: "no reporter listening".to_string(),
        })?;
        reporter.handle(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;

    #[test]
    fn only_web_urls_are_monitorable() {
        assert!(is_monitorable("https://example.com/a"));
        assert!(is_monitorable("http://localhost:8080"));
        assert!(!is_monitorable("chrome://extensions"));
        assert!(!is_monitorable("file:///tmp/x.html"));
        assert!(!is_monitorable("about:blank"));
    }

    #[test]
    fn enable_skips_failures_and_covers_every_page() {
        let mut host = LocalPages::default();
        let good = host.open("https://example.com");
        let closed = host.open("https://closed.example.com");
        let system = host.open("chrome://settings");
        let other = host.open("http://other.example.com");
        host.close(closed);

        let fan_out = enable_monitoring(&mut host);
        assert_eq!(fan_out, FanOut { delivered: 2, skipped: 1 });

        assert!(host.reporter(good).unwrap().is_monitoring());
        assert!(host.reporter(other).unwrap().is_monitoring());
        assert!(host.reporter(system).is_none());
        assert!(host.reporter(closed).is_none());
    }

    #[test]
    fn second_injection_reuses_the_reporter() {
        let mut host = LocalPages::default();
        let page = host.open("https://example.com");
        assert_eq!(host.inject(page), Ok(InjectOutcome::Loaded));

        enable_monitoring(&mut host);
        let now = 1_000;
        assert!(host.input(page, InputEvent::new(ActivityKind::PointerMove), now).is_some());

        // Re-enabling must not replace the reporter and reset its debounce.
        enable_monitoring(&mut host);
        assert!(host.input(page, InputEvent::new(ActivityKind::PointerMove), now + 10).is_none());
    }

    #[test]
    fn disable_reaches_injected_pages_and_skips_the_rest() {
        let mut host = LocalPages::default();
        let injected = host.open("https://a.example.com");
        host.open("https://never-injected.example.com");
        host.inject(injected).unwrap();
        host.send(injected, PageMessage::EnableMonitoring).unwrap();

        let fan_out = disable_monitoring(&mut host);
        assert_eq!(fan_out, FanOut { delivered: 1, skipped: 1 });
        assert!(!host.reporter(injected).unwrap().is_monitoring());
    }

    #[test]
    fn restricted_page_rejects_injection() {
        let mut host = LocalPages::default();
        let page = host.open("edge://newtab");
        assert_eq!(host.inject(page), Err(PageError::Restricted(page)));
    }
}
