//! Chrome adapter over the DevTools protocol

use super::{BrowserSession, ClickMode, ElementRef, ElementValue, Locator, WindowHandle};
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// [`BrowserSession`] driving a local Chrome or Chromium
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    main: WindowHandle,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    found: bool,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ClickTarget {
    x: f64,
    y: f64,
    clear: bool,
}

impl ChromeSession {
    /// Launch a browser with one blank window
    pub async fn launch(headless: bool) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let main = handle_of(&page);
        info!(headless, window = %main, "Browser launched");

        Ok(Self {
            browser,
            handler,
            main,
        })
    }

    /// Close the browser and stop its event loop
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "Browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }

    async fn page(&self, window: &WindowHandle) -> Result<Page, BrowserError> {
        let pages = self.browser.pages().await.map_err(script_error)?;
        pages
            .into_iter()
            .find(|p| p.target_id().inner() == &window.0)
            .ok_or_else(|| BrowserError::NoSuchWindow(window.to_string()))
    }

    async fn eval<T: DeserializeOwned>(
        &self,
        window: &WindowHandle,
        script: String,
    ) -> Result<T, BrowserError> {
        let page = self.page(window).await?;
        let json: String = page
            .evaluate(script.as_str())
            .await
            .map_err(script_error)?
            .into_value()
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| BrowserError::Script(e.to_string()))
    }

    /// Run `body` against an element; `None` when the element is absent
    async fn on_element<T: DeserializeOwned>(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        body: &str,
    ) -> Result<Option<T>, BrowserError> {
        let script = format!(
            "(() => {{ const el = {nodes}[{index}]; \
             if (!el) return JSON.stringify({{found: false, value: null}}); \
             const value = (() => {{ {body} }})(); \
             return JSON.stringify({{found: true, value: value === undefined ? null : value}}); }})()",
            nodes = resolve_all(&element.locator),
            index = element.index,
            body = body,
        );
        let outcome: Outcome = self.eval(window, script).await?;
        if !outcome.found {
            return Ok(None);
        }
        serde_json::from_value(outcome.value)
            .map(Some)
            .map_err(|e| BrowserError::Script(format!("{}: {}", element, e)))
    }

    async fn on_present_element<T: DeserializeOwned>(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        body: &str,
    ) -> Result<T, BrowserError> {
        self.on_element(window, element, body)
            .await?
            .ok_or_else(|| BrowserError::StaleElement(element.to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn main_window(&self) -> WindowHandle {
        self.main.clone()
    }

    async fn windows(&self) -> Result<Vec<WindowHandle>, BrowserError> {
        let pages = self.browser.pages().await.map_err(script_error)?;
        Ok(pages.iter().map(handle_of).collect())
    }

    async fn activate(&self, window: &WindowHandle) -> Result<(), BrowserError> {
        self.page(window)
            .await?
            .bring_to_front()
            .await
            .map_err(script_error)?;
        Ok(())
    }

    async fn close(&self, window: &WindowHandle) -> Result<(), BrowserError> {
        self.page(window).await?.close().await.map_err(script_error)
    }

    async fn navigate(&self, window: &WindowHandle, url: &str) -> Result<(), BrowserError> {
        debug!(window = %window, url, "Navigating");
        self.page(window)
            .await?
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn current_url(&self, window: &WindowHandle) -> Result<String, BrowserError> {
        let url = self
            .page(window)
            .await?
            .url()
            .await
            .map_err(script_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn page_source(&self, window: &WindowHandle) -> Result<String, BrowserError> {
        self.page(window).await?.content().await.map_err(script_error)
    }

    async fn count(
        &self,
        window: &WindowHandle,
        locator: &Locator,
    ) -> Result<usize, BrowserError> {
        let script = format!("JSON.stringify({}.length)", resolve_all(locator));
        self.eval(window, script).await
    }

    async fn read(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        value: ElementValue,
    ) -> Result<Option<String>, BrowserError> {
        let body = match value {
            ElementValue::InnerHtml => "return el.innerHTML;".to_string(),
            ElementValue::OuterHtml => "return el.outerHTML;".to_string(),
            ElementValue::Attribute(name) => format!(
                "const v = el.getAttribute({}); return v === null ? undefined : v;",
                js_string(&name)
            ),
        };
        let value = self
            .on_element::<Option<String>>(window, element, &body)
            .await?;
        Ok(value.flatten())
    }

    async fn click(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        mode: ClickMode,
    ) -> Result<(), BrowserError> {
        match mode {
            ClickMode::Script => {
                self.on_present_element::<bool>(window, element, "el.click(); return true;")
                    .await?;
            }
            ClickMode::Native => {
                let target: ClickTarget = self
                    .on_present_element(
                        window,
                        element,
                        "el.scrollIntoView({block: 'center'}); \
                         const r = el.getBoundingClientRect(); \
                         const x = r.left + r.width / 2; const y = r.top + r.height / 2; \
                         const hit = document.elementFromPoint(x, y); \
                         return {x: x, y: y, clear: !!hit && (hit === el || el.contains(hit))};",
                    )
                    .await?;
                if !target.clear {
                    return Err(BrowserError::ClickIntercepted(element.to_string()));
                }
                self.page(window)
                    .await?
                    .click(Point {
                        x: target.x,
                        y: target.y,
                    })
                    .await
                    .map_err(script_error)?;
            }
        }
        Ok(())
    }

    async fn fill(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), BrowserError> {
        let body = format!(
            "el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); return true;",
            js_string(text)
        );
        self.on_present_element::<bool>(window, element, &body)
            .await
            .map(|_| ())
    }

    async fn scroll_into_view(
        &self,
        window: &WindowHandle,
        element: &ElementRef,
    ) -> Result<(), BrowserError> {
        self.on_present_element::<bool>(
            window,
            element,
            "el.scrollIntoView({block: 'center'}); return true;",
        )
        .await
        .map(|_| ())
    }

    async fn scroll_to_end(
        &self,
        window: &WindowHandle,
        container: &ElementRef,
    ) -> Result<u64, BrowserError> {
        self.on_present_element(
            window,
            container,
            "el.scrollTop = el.scrollHeight; return el.scrollHeight;",
        )
        .await
    }
}

fn handle_of(page: &Page) -> WindowHandle {
    WindowHandle(page.target_id().inner().clone())
}

fn script_error(err: CdpError) -> BrowserError {
    BrowserError::Script(err.to_string())
}

/// JavaScript string literal for `s`
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// JavaScript expression evaluating to an array of all matches of `locator`
fn resolve_all(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => {
            format!("Array.from(document.querySelectorAll({}))", js_string(selector))
        }
        Locator::XPath(expression) => format!(
            "(() => {{ const r = document.evaluate({}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); \
             return out; }})()",
            js_string(expression)
        ),
    }
}
