//! In-memory browser for routine tests

use super::{BrowserSession, ClickMode, ElementRef, ElementValue, Locator, WindowHandle};
use crate::error::BrowserError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// What a click does
#[derive(Debug, Clone)]
pub(crate) enum OnClick {
    /// Open a new window showing this page
    OpenWindow(FakePage),
    /// Open the window only after this many more window listings
    OpenWindowLate(FakePage, usize),
    /// Replace the clicked window's page
    Navigate(FakePage),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeElement {
    inner_html: String,
    outer_html: Option<String>,
    attributes: HashMap<String, String>,
    on_click: Option<OnClick>,
    reject_native: usize,
    stale_native: usize,
}

impl FakeElement {
    pub(crate) fn html(inner: &str) -> Self {
        Self {
            inner_html: inner.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn outer(mut self, outer: &str) -> Self {
        self.outer_html = Some(outer.to_string());
        self
    }

    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub(crate) fn on_click(mut self, effect: OnClick) -> Self {
        self.on_click = Some(effect);
        self
    }

    /// Reject the next `n` native clicks as intercepted
    pub(crate) fn reject_native(mut self, n: usize) -> Self {
        self.reject_native = n;
        self
    }

    /// Fail the next `n` native clicks as if the node was re-rendered
    pub(crate) fn stale_native(mut self, n: usize) -> Self {
        self.stale_native = n;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    url: String,
    source: String,
    elements: HashMap<String, Vec<FakeElement>>,
    ready_after: HashMap<String, usize>,
    scroll_heights: Vec<u64>,
    scrolls: usize,
    self_closing: bool,
    crashed: bool,
}

impl FakePage {
    pub(crate) fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            source: format!("<html><body>{}</body></html>", url),
            ..Default::default()
        }
    }

    pub(crate) fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub(crate) fn element(mut self, locator: &Locator, element: FakeElement) -> Self {
        self.elements
            .entry(locator.to_string())
            .or_default()
            .push(element);
        self
    }

    /// Report zero matches for the first `polls` lookups of `locator`
    pub(crate) fn ready_after(mut self, locator: &Locator, polls: usize) -> Self {
        self.ready_after.insert(locator.to_string(), polls);
        self
    }

    pub(crate) fn scroll_heights(mut self, heights: &[u64]) -> Self {
        self.scroll_heights = heights.to_vec();
        self
    }

    /// Window disappears on its own once content has been read from it
    pub(crate) fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    /// Document can no longer be read
    pub(crate) fn crashed(mut self) -> Self {
        self.crashed = true;
        self
    }
}

#[derive(Debug)]
struct State {
    windows: Vec<(WindowHandle, FakePage)>,
    pending: Vec<(usize, FakePage)>,
    sites: HashMap<String, FakePage>,
    next_tab: usize,
    active: WindowHandle,
    log: Vec<String>,
}

impl State {
    fn open(&mut self, page: FakePage) {
        let handle = WindowHandle(format!("tab-{}", self.next_tab));
        self.next_tab += 1;
        self.log.push(format!("open {}", handle));
        self.windows.push((handle, page));
    }

    fn page(&mut self, window: &WindowHandle) -> Result<&mut FakePage, BrowserError> {
        self.windows
            .iter_mut()
            .find(|(h, _)| h == window)
            .map(|(_, p)| p)
            .ok_or_else(|| BrowserError::NoSuchWindow(window.to_string()))
    }

    fn element(
        &mut self,
        window: &WindowHandle,
        element: &ElementRef,
    ) -> Result<&mut FakeElement, BrowserError> {
        self.page(window)?
            .elements
            .get_mut(&element.locator.to_string())
            .and_then(|list| list.get_mut(element.index))
            .ok_or_else(|| BrowserError::StaleElement(element.to_string()))
    }
}

/// Scriptable [`BrowserSession`] keeping an action log
pub(crate) struct FakeBrowser {
    main: WindowHandle,
    state: Mutex<State>,
}

impl FakeBrowser {
    pub(crate) fn new(start: FakePage) -> Self {
        let main = WindowHandle("main".to_string());
        Self {
            main: main.clone(),
            state: Mutex::new(State {
                windows: vec![(main.clone(), start)],
                pending: Vec::new(),
                sites: HashMap::new(),
                next_tab: 1,
                active: main,
                log: Vec::new(),
            }),
        }
    }

    /// Page served when a window navigates to its URL
    pub(crate) fn site(self, page: FakePage) -> Self {
        self.lock().sites.insert(page.url.clone(), page);
        self
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub(crate) fn active(&self) -> WindowHandle {
        self.lock().active.clone()
    }

    pub(crate) fn open_windows(&self) -> usize {
        self.lock().windows.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    fn main_window(&self) -> WindowHandle {
        self.main.clone()
    }

    async fn windows(&self) -> Result<Vec<WindowHandle>, BrowserError> {
        let mut state = self.lock();
        let mut waiting = Vec::new();
        for (polls, page) in std::mem::take(&mut state.pending) {
            if polls == 0 {
                state.open(page);
            } else {
                waiting.push((polls - 1, page));
            }
        }
        state.pending = waiting;
        Ok(state.windows.iter().map(|(h, _)| h.clone()).collect())
    }

    async fn activate(&self, window: &WindowHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.page(window)?;
        state.active = window.clone();
        state.log.push(format!("activate {}", window));
        Ok(())
    }

    async fn close(&self, window: &WindowHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let before = state.windows.len();
        state.windows.retain(|(h, _)| h != window);
        if state.windows.len() == before {
            return Err(BrowserError::NoSuchWindow(window.to_string()));
        }
        state.log.push(format!("close {}", window));
        Ok(())
    }

    async fn navigate(&self, window: &WindowHandle, url: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let page = state
            .sites
            .get(url)
            .cloned()
            .unwrap_or_else(|| FakePage::new(url));
        *state.page(window)? = page;
        state.log.push(format!("navigate {}", url));
        Ok(())
    }

    async fn current_url(&self, window: &WindowHandle) -> Result<String, BrowserError> {
        Ok(self.lock().page(window)?.url.clone())
    }

    async fn page_source(&self, window: &WindowHandle) -> Result<String, BrowserError> {
        let mut state = self.lock();
        let page = state.page(window)?;
        if page.crashed {
            return Err(BrowserError::Script(format!("{} crashed", page.url)));
        }
        Ok(page.source.clone())
    }

    async fn count(
        &self,
        window: &WindowHandle,
        locator: &Locator,
    ) -> Result<usize, BrowserError> {
        let mut state = self.lock();
        let page = state.page(window)?;
        let key = locator.to_string();
        if let Some(pending) = page.ready_after.get_mut(&key) {
            if *pending > 0 {
                *pending -= 1;
                return Ok(0);
            }
        }
        Ok(page.elements.get(&key).map(Vec::len).unwrap_or(0))
    }

    async fn read(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        value: ElementValue,
    ) -> Result<Option<String>, BrowserError> {
        let mut state = self.lock();
        let self_closing = state.page(window)?.self_closing;
        let found = match state.element(window, element) {
            Ok(el) => el,
            Err(_) => return Ok(None),
        };
        let result = match value {
            ElementValue::InnerHtml => Some(found.inner_html.clone()),
            ElementValue::OuterHtml => Some(
                found
                    .outer_html
                    .clone()
                    .unwrap_or_else(|| format!("<div>{}</div>", found.inner_html)),
            ),
            ElementValue::Attribute(name) => found.attributes.get(&name).cloned(),
        };
        if self_closing {
            state.windows.retain(|(h, _)| h != window);
        }
        Ok(result)
    }

    async fn click(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        mode: ClickMode,
    ) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let target = state.element(window, element)?;
        if mode == ClickMode::Native && target.reject_native > 0 {
            target.reject_native -= 1;
            return Err(BrowserError::ClickIntercepted(element.to_string()));
        }
        if mode == ClickMode::Native && target.stale_native > 0 {
            target.stale_native -= 1;
            return Err(BrowserError::StaleElement(element.to_string()));
        }
        let effect = target.on_click.clone();
        state.log.push(format!("click {} {:?}", element, mode));

        match effect {
            Some(OnClick::OpenWindow(page)) => state.open(page),
            Some(OnClick::OpenWindowLate(page, polls)) => state.pending.push((polls, page)),
            Some(OnClick::Navigate(page)) => {
                *state.page(window)? = page;
            }
            None => {}
        }
        Ok(())
    }

    async fn fill(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.element(window, element)?;
        state.log.push(format!("fill {}={}", element, text));
        Ok(())
    }

    async fn scroll_into_view(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
    ) -> Result<(), BrowserError> {
        self.lock().element(window, element)?;
        Ok(())
    }

    async fn scroll_to_end(
        &self,
        window: &WindowHandle,
        container: &ElementRef,
    ) -> Result<u64, BrowserError> {
        let mut state = self.lock();
        state.element(window, container)?;
        let page = state.page(window)?;
        let height = match page.scroll_heights.len() {
            0 => 0,
            n => page.scroll_heights[page.scrolls.min(n - 1)],
        };
        page.scrolls += 1;
        state.log.push(format!("scroll {}", container));
        Ok(height)
    }
}
