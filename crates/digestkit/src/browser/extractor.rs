//! Content extraction on top of [`BrowserSession`]

use super::{BrowserSession, ClickMode, ElementRef, ElementValue, Locator, WindowHandle};
use crate::error::BrowserError;
use crate::identity::mark_uncertain;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

/// Waits and fixed settle times used while scripting pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Bound of every wait-for-element or wait-for-window
    pub wait_timeout: Duration,
    /// Interval between polls within a bounded wait
    pub poll_interval: Duration,
    /// Settle time after opening a heavy page
    pub page_load: Duration,
    /// Settle time after each scroll round
    pub scroll_settle: Duration,
    /// Settle time after a click
    pub click_settle: Duration,
    /// Settle time after switching to a new window
    pub window_settle: Duration,
    /// Pause between consecutive items
    pub between_items: Duration,
    /// Settle time after navigating between wallet pages
    pub navigation_settle: Duration,
    /// Settle time after clicking a wallet tile
    pub tile_settle: Duration,
    /// Settle time after submitting a login form
    pub login_settle: Duration,
    /// How long an optional popup (cookie banner) is waited for
    pub popup_wait: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
            page_load: Duration::from_secs(15),
            scroll_settle: Duration::from_secs(2),
            click_settle: Duration::from_secs(1),
            window_settle: Duration::from_secs(6),
            between_items: Duration::from_secs(2),
            navigation_settle: Duration::from_secs(4),
            tile_settle: Duration::from_secs(3),
            login_settle: Duration::from_secs(5),
            popup_wait: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    /// No sleeps, short bounded waits
    pub fn instant() -> Self {
        Self {
            wait_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
            page_load: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            click_settle: Duration::ZERO,
            window_settle: Duration::ZERO,
            between_items: Duration::ZERO,
            navigation_settle: Duration::ZERO,
            tile_settle: Duration::ZERO,
            login_settle: Duration::ZERO,
            popup_wait: Duration::from_millis(20),
        }
    }
}

/// Markup captured from a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Inner markup of the content region, or the whole document
    pub html: String,
    /// True when no content region was found and the whole document was taken
    pub uncertain: bool,
}

impl Capture {
    /// Artifact name for this capture, marked when uncertain
    pub fn file_name(&self, name: &str) -> String {
        mark_uncertain(name, self.uncertain)
    }
}

/// Locates and captures content through a browser session
pub struct ContentExtractor<'a> {
    session: &'a dyn BrowserSession,
    pacing: Pacing,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(session: &'a dyn BrowserSession, pacing: Pacing) -> Self {
        Self { session, pacing }
    }

    pub fn session(&self) -> &'a dyn BrowserSession {
        self.session
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Sleep for a fixed settle time
    pub async fn settle(&self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration).await;
        }
    }

    /// Poll until one of `locators` matches, returning the first that does
    pub async fn wait_for_any<'l>(
        &self,
        window: &WindowHandle,
        locators: &'l [Locator],
        timeout: Duration,
    ) -> Result<&'l Locator, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            for locator in locators {
                if self.session.count(window, locator).await? > 0 {
                    return Ok(locator);
                }
            }
            if Instant::now() >= deadline {
                let what = locators
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ");
                return Err(BrowserError::Timeout {
                    what,
                    waited: timeout,
                });
            }
            sleep(self.pacing.poll_interval).await;
        }
    }

    /// Poll until `locator` matches, within the default bound
    pub async fn wait_for(
        &self,
        window: &WindowHandle,
        locator: &Locator,
    ) -> Result<(), BrowserError> {
        self.wait_for_any(window, std::slice::from_ref(locator), self.pacing.wait_timeout)
            .await
            .map(|_| ())
    }

    /// Poll until a window not in `known` appears
    pub async fn wait_for_new_window(
        &self,
        known: &[WindowHandle],
    ) -> Result<WindowHandle, BrowserError> {
        let deadline = Instant::now() + self.pacing.wait_timeout;
        loop {
            let current = self.session.windows().await?;
            if let Some(fresh) = current.into_iter().find(|w| !known.contains(w)) {
                return Ok(fresh);
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: "new window".to_string(),
                    waited: self.pacing.wait_timeout,
                });
            }
            sleep(self.pacing.poll_interval).await;
        }
    }

    /// Capture the first content region found, else the whole document
    ///
    /// A missing region is not an error: the document is returned with
    /// [`Capture::uncertain`] set.
    #[instrument(skip(self, window), fields(window = %window))]
    pub async fn capture(
        &self,
        window: &WindowHandle,
        regions: &[Locator],
    ) -> Result<Capture, BrowserError> {
        match self
            .wait_for_any(window, regions, self.pacing.wait_timeout)
            .await
        {
            Ok(locator) => {
                let html = self
                    .session
                    .read(window, &locator.first(), ElementValue::InnerHtml)
                    .await?;
                if let Some(html) = html {
                    debug!(region = %locator, bytes = html.len(), "Captured content region");
                    return Ok(Capture {
                        html,
                        uncertain: false,
                    });
                }
                warn!(region = %locator, "Content region vanished, capturing full page");
            }
            Err(BrowserError::Timeout { what, .. }) => {
                warn!(regions = %what, "Content region not found, capturing full page");
            }
            Err(e) => return Err(e),
        }

        Ok(Capture {
            html: self.session.page_source(window).await?,
            uncertain: true,
        })
    }

    /// Click, re-querying the element and retrying once from script
    ///
    /// Covers overlays intercepting the pointer and elements re-rendered
    /// between lookup and click.
    pub async fn click(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
    ) -> Result<(), BrowserError> {
        match self
            .session
            .click(window, element, ClickMode::Native)
            .await
        {
            Ok(()) => Ok(()),
            Err(e @ BrowserError::ClickIntercepted(_)) | Err(e @ BrowserError::StaleElement(_)) => {
                debug!(element = %element, error = %e, "Click failed, retrying from script");
                if self.session.count(window, &element.locator).await? <= element.index {
                    return Err(e);
                }
                self.session
                    .click(window, element, ClickMode::Script)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Click `trigger`, capture the window it opens, then restore `origin`
    ///
    /// Returns the capture and the URL shown in the new window. Whatever
    /// happens after the new window opens, it is closed (an already closed
    /// window is fine) and `origin` is brought back to the front.
    pub async fn capture_in_new_window(
        &self,
        origin: &WindowHandle,
        trigger: &ElementRef,
        regions: &[Locator],
    ) -> Result<(Capture, String), BrowserError> {
        let known = self.session.windows().await?;
        self.click(origin, trigger).await?;
        let opened = match self.wait_for_new_window(&known).await {
            Ok(opened) => opened,
            Err(e) => {
                if let Err(restore_err) = self.close_strays(origin, &known).await {
                    warn!(error = %restore_err, "Failed to restore original window");
                }
                return Err(e);
            }
        };

        let result = self.capture_window(&opened, regions).await;
        let restored = self.restore(origin, &opened).await;

        match (result, restored) {
            (Ok(captured), Ok(())) => Ok(captured),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), restored) => {
                if let Err(restore_err) = restored {
                    warn!(error = %restore_err, "Failed to restore original window");
                }
                Err(e)
            }
        }
    }

    async fn capture_window(
        &self,
        window: &WindowHandle,
        regions: &[Locator],
    ) -> Result<(Capture, String), BrowserError> {
        self.session.activate(window).await?;
        self.settle(self.pacing.window_settle).await;
        let url = self.session.current_url(window).await?;
        let capture = self.capture(window, regions).await?;
        Ok((capture, url))
    }

    async fn restore(&self, origin: &WindowHandle, opened: &WindowHandle) -> Result<(), BrowserError> {
        self.close_quietly(opened).await;
        self.session.activate(origin).await
    }

    /// Close windows that appeared since `known`, then bring `origin` back
    async fn close_strays(
        &self,
        origin: &WindowHandle,
        known: &[WindowHandle],
    ) -> Result<(), BrowserError> {
        for window in self.session.windows().await? {
            if !known.contains(&window) {
                debug!(window = %window, "Closing late window");
                self.close_quietly(&window).await;
            }
        }
        self.session.activate(origin).await
    }

    async fn close_quietly(&self, window: &WindowHandle) {
        match self.session.close(window).await {
            Ok(()) => {}
            Err(BrowserError::NoSuchWindow(_)) => {
                debug!(window = %window, "Secondary window already closed");
            }
            Err(e) => warn!(window = %window, error = %e, "Failed to close secondary window"),
        }
    }

    /// Scroll a lazily loading container until its height stops growing
    ///
    /// Returns the number of rounds performed.
    pub async fn scroll_to_load(
        &self,
        window: &WindowHandle,
        container: &ElementRef,
        max_rounds: usize,
    ) -> Result<usize, BrowserError> {
        let mut last_height = None;
        for round in 1..=max_rounds {
            let height = self.session.scroll_to_end(window, container).await?;
            self.settle(self.pacing.scroll_settle).await;
            if last_height == Some(height) {
                debug!(rounds = round, height, "Container stopped growing");
                return Ok(round);
            }
            last_height = Some(height);
        }
        Ok(max_rounds)
    }
}
