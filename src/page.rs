use std::path::Path;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::Page as CrPage;
use chromiumoxide::page::ScreenshotParams;
use tracing::debug;

use crate::element::Element;
use crate::error::{Error, Result};

/// Wrapper around a chromiumoxide Page with the operations the fill engine
/// needs: navigation, bounded waits, JS evaluation, trusted input dispatch,
/// and audit capture.
pub struct Page {
    inner: CrPage,
    selector_timeout: Duration,
    viewport: (u32, u32),
}

impl Page {
    pub(crate) fn new(inner: CrPage, selector_timeout: Duration, viewport: (u32, u32)) -> Self {
        Self {
            inner,
            selector_timeout,
            viewport,
        }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    /// Viewport dimensions the page was launched with.
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate to the given URL and wait for the load to commit.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Wait for the document to reach `readyState === "complete"` plus a short
    /// quiet window, bounded by `timeout`. Timing out is not an error; the
    /// page is simply used as-is.
    pub async fn wait_for_settle(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self
                .evaluate_string("document.readyState")
                .await
                .unwrap_or_default();
            if state == "complete" {
                break;
            }
            if Instant::now() >= deadline {
                debug!("settle wait hit the deadline before readyState=complete");
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let quiet = Duration::from_millis(500).min(deadline.saturating_duration_since(Instant::now()));
        tokio::time::sleep(quiet).await;
        Ok(())
    }

    /// Wait for an element matching the given CSS selector to appear in the
    /// DOM. Polls every 100ms up to the configured selector timeout.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<Element> {
        let interval = Duration::from_millis(100);
        let start = Instant::now();

        loop {
            match self.find_element(selector).await {
                Ok(el) => return Ok(el),
                Err(_) if start.elapsed() < self.selector_timeout => {
                    tokio::time::sleep(interval).await;
                }
                Err(_) => {
                    return Err(Error::Timeout(format!(
                        "Timed out waiting for selector: {selector}"
                    )));
                }
            }
        }
    }

    // ── JS evaluation ───────────────────────────────────────────────

    /// Evaluate a JS expression and deserialize its result.
    pub async fn evaluate_string(&self, expression: &str) -> Result<String> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    /// Evaluate a JS expression expected to yield a boolean.
    pub async fn evaluate_bool(&self, expression: &str) -> Result<bool> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    /// Evaluate a JS expression without caring about the return value.
    pub async fn evaluate_void(&self, expression: &str) -> Result<()> {
        self.inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(())
    }

    // ── Scrolling ───────────────────────────────────────────────────

    pub async fn scroll_y(&self) -> Result<f64> {
        let result = self
            .inner
            .evaluate("window.scrollY")
            .await
            .map_err(|e| Error::JsError(e.to_string()))?;
        Ok(result.into_value::<f64>().unwrap_or(0.0))
    }

    pub async fn scroll_to(&self, y: f64) -> Result<()> {
        self.evaluate_void(&format!("window.scrollTo(0, {y})")).await
    }

    // ── Trusted input ───────────────────────────────────────────────

    /// Dispatch a raw mouse-move to viewport coordinates.
    pub async fn mouse_move(&self, x: f64, y: f64) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(|e| Error::JsError(format!("mouse event: {e}")))?;
        self.inner.execute(params).await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Dispatch a full press/release click at viewport coordinates.
    pub async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        for kind in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let params = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(x)
                .y(y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(|e| Error::JsError(format!("mouse event: {e}")))?;
            self.inner.execute(params).await.map_err(Error::CdpError)?;
        }
        Ok(())
    }

    /// Attach a file to a file input without any typing simulation.
    pub async fn set_input_files(&self, element: &Element, path: impl AsRef<Path>) -> Result<()> {
        let file = path.as_ref().to_string_lossy().into_owned();
        let mut params = SetFileInputFilesParams::new(vec![file]);
        params.backend_node_id = Some(element.inner().backend_node_id.clone());
        self.inner.execute(params).await.map_err(Error::CdpError)?;
        Ok(())
    }

    // ── Capture ─────────────────────────────────────────────────────

    /// Take a full-page screenshot (PNG format).
    pub async fn screenshot_full_page(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.inner
            .screenshot(params)
            .await
            .map_err(|e| Error::ScreenshotError(e.to_string()))
    }

    /// Get the full HTML content of the page.
    pub async fn html(&self) -> Result<String> {
        self.inner
            .content()
            .await
            .map_err(|e| Error::JsError(e.to_string()))
    }

    /// Rendered text of the whole document, used for outcome classification.
    pub async fn body_text(&self) -> Result<String> {
        self.evaluate_string("document.body ? document.body.innerText : ''")
            .await
    }

    // ── Element queries ─────────────────────────────────────────────

    /// Find an element matching the given CSS selector.
    pub async fn find_element(&self, selector: &str) -> Result<Element> {
        let el = self
            .inner
            .find_element(selector)
            .await
            .map_err(|e| Error::ElementNotFound(e.to_string()))?;
        Ok(Element::new(el))
    }

    /// Find all elements matching the given CSS selector.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<Element>> {
        let els = self
            .inner
            .find_elements(selector)
            .await
            .map_err(|e| Error::ElementNotFound(e.to_string()))?;
        Ok(els.into_iter().map(Element::new).collect())
    }
}
