//! Browser session abstraction
//!
//! Design: every primitive takes the [`WindowHandle`] it acts on, so no
//! routine depends on an implicit "current window". Elements are addressed
//! by [`ElementRef`] (locator + index) and re-resolved against the live DOM
//! on every call; a retry after a stale reference is just a second call.

mod chrome;
mod extractor;

#[cfg(test)]
pub(crate) mod fake;

pub use chrome::ChromeSession;
pub use extractor::{Capture, ContentExtractor, Pacing};

use crate::error::BrowserError;
use async_trait::async_trait;
use std::fmt;

/// Opaque identifier of a browser window or tab
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to find elements in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }

    /// First match
    pub fn first(&self) -> ElementRef {
        self.nth(0)
    }

    /// Match at `index`, in document order
    pub fn nth(&self, index: usize) -> ElementRef {
        ElementRef {
            locator: self.clone(),
            index,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{}", s),
            Locator::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// One element, resolved lazily
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub locator: Locator,
    pub index: usize,
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.locator, self.index)
    }
}

/// Element property to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    InnerHtml,
    OuterHtml,
    Attribute(String),
}

/// How to deliver a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Simulated pointer events at the element's position
    Native,
    /// `element.click()` from script, immune to overlays
    Script,
}

/// Browser primitives used by the site routines
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Window the session started with
    fn main_window(&self) -> WindowHandle;

    /// All open windows
    async fn windows(&self) -> Result<Vec<WindowHandle>, BrowserError>;

    /// Bring a window to the front
    async fn activate(&self, window: &WindowHandle) -> Result<(), BrowserError>;

    /// Close a window; [`BrowserError::NoSuchWindow`] if it is already gone
    async fn close(&self, window: &WindowHandle) -> Result<(), BrowserError>;

    /// Load `url` in a window
    async fn navigate(&self, window: &WindowHandle, url: &str) -> Result<(), BrowserError>;

    /// URL currently shown in a window
    async fn current_url(&self, window: &WindowHandle) -> Result<String, BrowserError>;

    /// Full document markup of a window
    async fn page_source(&self, window: &WindowHandle) -> Result<String, BrowserError>;

    /// Number of elements matching `locator`
    async fn count(&self, window: &WindowHandle, locator: &Locator)
        -> Result<usize, BrowserError>;

    /// Read a property; `None` if the element or attribute is absent
    async fn read(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        value: ElementValue,
    ) -> Result<Option<String>, BrowserError>;

    /// Click an element
    async fn click(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        mode: ClickMode,
    ) -> Result<(), BrowserError>;

    /// Replace an input's value with `text`
    async fn fill(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), BrowserError>;

    /// Scroll an element into the middle of the viewport
    async fn scroll_into_view(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
    ) -> Result<(), BrowserError>;

    /// Scroll a container to its end, returning its scroll height
    async fn scroll_to_end(
        &self,
        window: &WindowHandle,
        container: &ElementRef,
    ) -> Result<u64, BrowserError>;
}
