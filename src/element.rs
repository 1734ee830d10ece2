use chromiumoxide::element::Element as CrElement;

use crate::error::{Error, Result};

/// The control actually rendered for a select-style field. The declared field
/// kind does not determine this; it is probed from the live element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Radio,
    Checkbox,
    Dropdown,
}

/// Wrapper around a chromiumoxide Element, providing a simplified API.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    /// Returns a reference to the underlying chromiumoxide Element.
    pub fn inner(&self) -> &CrElement {
        &self.inner
    }

    /// Click this element (scrolls into view first).
    pub async fn click(&self) -> Result<()> {
        self.inner.click().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Type text into this element via synthesized key events.
    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.inner.type_str(text).await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Press a key on this element (e.g. "Enter", "Backspace").
    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.inner.press_key(key).await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Focus this element.
    pub async fn focus(&self) -> Result<()> {
        self.inner.focus().await.map_err(Error::CdpError)?;
        Ok(())
    }

    /// Scroll this element into view.
    pub async fn scroll_into_view(&self) -> Result<()> {
        self.inner
            .scroll_into_view()
            .await
            .map_err(Error::CdpError)?;
        Ok(())
    }

    /// Get the inner text of this element, empty if none.
    pub async fn inner_text(&self) -> Result<String> {
        Ok(self
            .inner
            .inner_text()
            .await
            .map_err(Error::CdpError)?
            .unwrap_or_default())
    }

    /// Get the value of an attribute on this element.
    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        self.inner.attribute(name).await.map_err(Error::CdpError)
    }

    /// Run a JS function with `this` bound to the element and return the
    /// result as a string, empty when the function yields null/undefined.
    pub async fn js_string(&self, function: &str) -> Result<String> {
        let ret = self
            .inner
            .call_js_fn(function, false)
            .await
            .map_err(Error::CdpError)?;
        if let Some(details) = ret.exception_details {
            return Err(Error::JsError(details.text));
        }
        Ok(match ret.result.value {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
    }

    /// Run a JS function with `this` bound to the element, ignoring the result.
    pub async fn js_void(&self, function: &str) -> Result<()> {
        let ret = self
            .inner
            .call_js_fn(function, false)
            .await
            .map_err(Error::CdpError)?;
        if let Some(details) = ret.exception_details {
            return Err(Error::JsError(details.text));
        }
        Ok(())
    }

    /// Current `value` of the control, empty for controls without one.
    pub async fn value(&self) -> Result<String> {
        self.js_string("function() { return this.value === undefined ? '' : String(this.value); }")
            .await
    }

    /// Replace the control's value wholesale and fire the input/change events
    /// frameworks listen for. Bulk fallback when synthesized typing is eaten.
    pub async fn set_value(&self, value: &str) -> Result<()> {
        let value_js = serde_json::to_string(value).map_err(|e| Error::JsError(e.to_string()))?;
        self.js_void(&format!(
            r#"function() {{
                this.value = {value_js};
                this.dispatchEvent(new Event('input', {{ bubbles: true }}));
                this.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }}"#
        ))
        .await
    }

    /// Clear the control's value.
    pub async fn clear(&self) -> Result<()> {
        self.set_value("").await
    }

    /// Lower-cased tag name.
    pub async fn tag_name(&self) -> Result<String> {
        self.js_string("function() { return this.tagName.toLowerCase(); }")
            .await
    }

    /// The `type` of an input element, empty for non-inputs.
    pub async fn input_type(&self) -> Result<String> {
        self.js_string(
            "function() { return this.tagName === 'INPUT' ? (this.type || 'text') : ''; }",
        )
        .await
    }

    pub async fn is_checked(&self) -> Result<bool> {
        let s = self
            .js_string("function() { return this.checked ? 'true' : 'false'; }")
            .await?;
        Ok(s == "true")
    }

    /// Uncheck a checkbox, firing the change event.
    pub async fn uncheck(&self) -> Result<()> {
        if self.is_checked().await? {
            return self.click().await;
        }
        Ok(())
    }

    /// Probe how a select-style field is actually rendered.
    pub async fn control_kind(&self) -> Result<ControlKind> {
        Ok(match self.input_type().await?.as_str() {
            "radio" => ControlKind::Radio,
            "checkbox" => ControlKind::Checkbox,
            _ => ControlKind::Dropdown,
        })
    }

    /// Find a child element matching the given CSS selector.
    pub async fn find_element(&self, selector: &str) -> Result<Element> {
        let el = self
            .inner
            .find_element(selector)
            .await
            .map_err(Error::CdpError)?;
        Ok(Element::new(el))
    }

    /// Find all child elements matching the given CSS selector.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<Element>> {
        let els = self
            .inner
            .find_elements(selector)
            .await
            .map_err(Error::CdpError)?;
        Ok(els.into_iter().map(Element::new).collect())
    }
}
