use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::behavior::BehaviorSimulator;
use crate::element::{ControlKind, Element};
use crate::error::{Error, Result};
use crate::model::{AnswerValue, FieldDescriptor, FieldKind, FillResult, FillStatus};
use crate::page::Page;

/// Attribute used to hand a candidate picked by an element-scoped probe back
/// to the CDP side.
const PICK_ATTR: &str = "data-formpilot-pick";

/// Read-back may legally fall a little short of what was typed (trimming,
/// masked characters); anything within this slack verifies.
const VERIFY_SLACK: usize = 10;

/// Fills located elements according to their declared field kind, refined at
/// runtime by probing the rendered control. One filler lives for the duration
/// of one attempt; it carries the per-form running counters the boolean
/// fallback needs.
pub struct FieldFiller<'a> {
    page: &'a Page,
    resume_path: Option<PathBuf>,
    yes_clicks: usize,
    no_clicks: usize,
}

impl<'a> FieldFiller<'a> {
    pub fn new(page: &'a Page, resume_path: Option<PathBuf>) -> Self {
        Self {
            page,
            resume_path,
            yes_clicks: 0,
            no_clicks: 0,
        }
    }

    /// Fill one located field. Every failure is caught here and folded into
    /// the returned [`FillResult`]; errors never abort later fields.
    pub async fn fill(
        &mut self,
        behavior: &mut BehaviorSimulator,
        field: &FieldDescriptor,
        element: &Element,
        answer: &AnswerValue,
    ) -> FillResult {
        if let Err(e) = element.scroll_into_view().await {
            return FillResult::error(&field.path, format!("scroll into view: {e}"));
        }

        let outcome = match field.kind {
            FieldKind::Text | FieldKind::LongText | FieldKind::Date => {
                match answer.as_text() {
                    Some(text) => self.fill_text(behavior, field, element, text).await,
                    None => Err(Error::JsError("answer is not text".into())),
                }
            }
            FieldKind::Boolean => match answer.as_flag() {
                Some(flag) => self.fill_boolean(field, element, flag).await,
                None => Err(Error::JsError("answer is not a flag".into())),
            },
            FieldKind::File => self.fill_file(element, answer).await,
            FieldKind::Location => match answer.as_text() {
                Some(text) => self.fill_location(behavior, element, text).await,
                None => Err(Error::JsError("answer is not text".into())),
            },
            FieldKind::ValueSelect | FieldKind::MultiValueSelect => {
                self.fill_select(behavior, field, element, answer).await
            }
        };

        match outcome {
            Ok(detail) => {
                info!(path = %field.path, "filled");
                FillResult {
                    path: field.path.clone(),
                    status: FillStatus::Filled,
                    detail,
                }
            }
            Err(e) => {
                warn!(path = %field.path, error = %e, "fill failed");
                FillResult::error(&field.path, e.to_string())
            }
        }
    }

    // ── Text ────────────────────────────────────────────────────────

    /// Click, clear, type with human cadence, then verify the read-back. A
    /// short read-back gets one chunked retype, then a plain sequential pass.
    /// The best-effort value is retained either way.
    async fn fill_text(
        &mut self,
        behavior: &mut BehaviorSimulator,
        field: &FieldDescriptor,
        element: &Element,
        text: &str,
    ) -> Result<Option<String>> {
        element.click().await?;
        element.clear().await?;
        behavior.human_type(element, text).await?;

        if self.verify_length(element, text.chars().count()).await? {
            return Ok(None);
        }

        debug!(path = %field.path, "read-back short, retrying with chunked typing");
        element.clear().await?;
        for chunk in chunked(text, 100) {
            element.type_text(chunk).await?;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if self.verify_length(element, text.chars().count()).await? {
            return Ok(Some("chunked retry".into()));
        }

        element.clear().await?;
        element.type_text(text).await?;
        let got = element.value().await?.chars().count();
        let mismatch = Error::FillVerificationMismatch {
            path: field.path.clone(),
            expected: text.chars().count(),
            actual: got,
        };
        if got + VERIFY_SLACK >= text.chars().count() {
            Ok(Some("sequential retry".into()))
        } else {
            // Non-fatal: keep whatever landed, surface the mismatch in the detail.
            warn!(path = %field.path, "{mismatch}");
            Ok(Some(mismatch.to_string()))
        }
    }

    async fn verify_length(&self, element: &Element, expected: usize) -> Result<bool> {
        let actual = element.value().await?.chars().count();
        Ok(actual + VERIFY_SLACK >= expected)
    }

    // ── Boolean ─────────────────────────────────────────────────────

    /// `true` selects exactly one "Yes" affordance, `false` exactly one "No".
    /// Primary: the caption button inside the field's nearest container.
    /// Fallback: the Nth matching button across the whole form, where N is a
    /// per-form running counter for that caption.
    async fn fill_boolean(
        &mut self,
        field: &FieldDescriptor,
        element: &Element,
        flag: bool,
    ) -> Result<Option<String>> {
        let caption = if flag { "Yes" } else { "No" };

        // A bare checkbox needs no caption hunt: align its state with the flag.
        if element.control_kind().await? == ControlKind::Checkbox {
            if element.is_checked().await? != flag {
                element.click().await?;
            }
            return Ok(None);
        }

        let picked = self
            .pick_via_element(
                element,
                &format!(
                    r#"function() {{
                        const wanted = '{caption}'.toLowerCase();
                        let scope = this.parentElement;
                        for (let depth = 0; depth < 6 && scope; depth++) {{
                            const buttons = scope.querySelectorAll('button, [role="radio"], label');
                            for (const b of buttons) {{
                                if ((b.innerText || '').trim().toLowerCase() === wanted) {{
                                    b.setAttribute('{PICK_ATTR}', '1');
                                    return true;
                                }}
                            }}
                            scope = scope.parentElement;
                        }}
                        return false;
                    }}"#
                ),
            )
            .await?;

        if let Some(button) = picked {
            button.click().await?;
            debug!(path = %field.path, caption, "clicked caption in container");
            return Ok(None);
        }

        // Global-occurrence fallback.
        let index = if flag { self.yes_clicks } else { self.no_clicks };
        let picked = self.pick_nth_caption(caption, index).await?;
        match picked {
            Some(button) => {
                button.click().await?;
                if flag {
                    self.yes_clicks += 1;
                } else {
                    self.no_clicks += 1;
                }
                debug!(path = %field.path, caption, index, "clicked global caption occurrence");
                Ok(Some(format!("global {caption} #{index}")))
            }
            None => Err(Error::ElementNotFound(format!(
                "no '{caption}' affordance for '{}'",
                field.title
            ))),
        }
    }

    // ── File ────────────────────────────────────────────────────────

    /// Attach the resolved document directly; no typing simulation.
    async fn fill_file(&self, element: &Element, answer: &AnswerValue) -> Result<Option<String>> {
        let path: &Path = match answer {
            AnswerValue::FilePath(p) => p.as_path(),
            _ => self
                .resume_path
                .as_deref()
                .ok_or_else(|| Error::ElementNotFound("no resume path configured".into()))?,
        };
        if !path.exists() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("upload source missing: {}", path.display()),
            )));
        }
        self.page.set_input_files(element, path).await?;
        Ok(None)
    }

    // ── Location ────────────────────────────────────────────────────

    /// Click, clear, then escalate through typing methods until the control
    /// holds something non-trivial; prefer the first autocomplete option if
    /// one shows up in time, else keep the typed text.
    async fn fill_location(
        &mut self,
        behavior: &mut BehaviorSimulator,
        element: &Element,
        text: &str,
    ) -> Result<Option<String>> {
        element.click().await?;
        element.clear().await?;

        behavior.human_type(element, text).await?;
        if element.value().await?.chars().count() < 3 {
            element.clear().await?;
            element.type_text(text).await?;
        }
        if element.value().await?.chars().count() < 3 {
            element.set_value(text).await?;
        }

        if let Some(option) = self
            .wait_for_any("[role=\"option\"]", Duration::from_millis(800))
            .await
        {
            option.click().await?;
            return Ok(Some("autocomplete".into()));
        }
        Ok(None)
    }

    // ── Selects ─────────────────────────────────────────────────────

    async fn fill_select(
        &mut self,
        behavior: &mut BehaviorSimulator,
        field: &FieldDescriptor,
        element: &Element,
        answer: &AnswerValue,
    ) -> Result<Option<String>> {
        let wants = answer.choice_list();
        if wants.is_empty() {
            return Err(Error::JsError("answer holds no options".into()));
        }

        match element.control_kind().await? {
            ControlKind::Radio => self.fill_radio(field, element, wants[0]).await,
            ControlKind::Checkbox => self.fill_checkboxes(field, element, &wants).await,
            ControlKind::Dropdown => {
                if element.tag_name().await? == "select" {
                    return self.fill_native_select(element, wants[0]).await;
                }
                let mut details = Vec::new();
                for want in &wants {
                    if let Some(d) = self.fill_combobox(behavior, element, want).await? {
                        details.push(d);
                    }
                }
                Ok(if details.is_empty() {
                    None
                } else {
                    Some(details.join("; "))
                })
            }
        }
    }

    /// Enumerate the labels of the containing group and click the exact
    /// case-insensitive match. No match leaves the group unset.
    async fn fill_radio(
        &mut self,
        field: &FieldDescriptor,
        element: &Element,
        want: &str,
    ) -> Result<Option<String>> {
        let want_js = serde_json::to_string(&want.to_lowercase())
            .map_err(|e| Error::JsError(e.to_string()))?;
        let picked = self
            .pick_via_element(
                element,
                &format!(
                    r#"function() {{
                        const wanted = {want_js};
                        const scope = this.closest('fieldset')
                            || this.closest('[role="radiogroup"]')
                            || this.parentElement && this.parentElement.parentElement
                            || this.parentElement;
                        if (!scope) return false;
                        for (const label of scope.querySelectorAll('label')) {{
                            if ((label.innerText || '').trim().toLowerCase() === wanted) {{
                                label.setAttribute('{PICK_ATTR}', '1');
                                return true;
                            }}
                        }}
                        return false;
                    }}"#
                ),
            )
            .await?;
        match picked {
            Some(label) => {
                label.click().await?;
                Ok(None)
            }
            None => Err(Error::ElementNotFound(format!(
                "no option matching '{want}' for '{}'",
                field.title
            ))),
        }
    }

    /// Uncheck everything in the group, then check exactly the requested
    /// subset. Unmatched requested items are reported without aborting.
    async fn fill_checkboxes(
        &mut self,
        field: &FieldDescriptor,
        element: &Element,
        wants: &[&str],
    ) -> Result<Option<String>> {
        element
            .js_void(
                r#"function() {
                    const scope = this.closest('fieldset')
                        || (this.parentElement && this.parentElement.parentElement)
                        || this.parentElement;
                    if (!scope) return;
                    for (const box of scope.querySelectorAll('input[type="checkbox"]')) {
                        if (box.checked) box.click();
                    }
                }"#,
            )
            .await?;

        let mut unmatched = Vec::new();
        for want in wants {
            let want_js = serde_json::to_string(&want.to_lowercase())
                .map_err(|e| Error::JsError(e.to_string()))?;
            let picked = self
                .pick_via_element(
                    element,
                    &format!(
                        r#"function() {{
                            const wanted = {want_js};
                            const scope = this.closest('fieldset')
                        || (this.parentElement && this.parentElement.parentElement)
                        || this.parentElement;
                            if (!scope) return false;
                            for (const label of scope.querySelectorAll('label')) {{
                                if ((label.innerText || '').trim().toLowerCase() === wanted) {{
                                    label.setAttribute('{PICK_ATTR}', '1');
                                    return true;
                                }}
                            }}
                            return false;
                        }}"#
                    ),
                )
                .await?;
            match picked {
                Some(label) => label.click().await?,
                None => unmatched.push((*want).to_string()),
            }
        }

        if unmatched.is_empty() {
            Ok(None)
        } else {
            Err(Error::ElementNotFound(format!(
                "options not found for '{}': {}",
                field.title,
                unmatched.join(", ")
            )))
        }
    }

    /// Native `<select>`: pick the case-insensitive text match, else the
    /// first option.
    async fn fill_native_select(
        &self,
        element: &Element,
        want: &str,
    ) -> Result<Option<String>> {
        let want_js = serde_json::to_string(&want.to_lowercase())
            .map_err(|e| Error::JsError(e.to_string()))?;
        let hit = element
            .js_string(&format!(
                r#"function() {{
                    const wanted = {want_js};
                    const opts = Array.from(this.options);
                    let pick = opts.find(o => (o.text || '').trim().toLowerCase() === wanted);
                    let fallback = false;
                    if (!pick && opts.length) {{ pick = opts[0]; fallback = true; }}
                    if (!pick) return 'none';
                    this.value = pick.value;
                    this.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return fallback ? 'fallback' : 'match';
                }}"#
            ))
            .await?;
        match hit.as_str() {
            "match" => Ok(None),
            "fallback" => Ok(Some(format!("'{want}' absent, took first option"))),
            _ => Err(Error::ElementNotFound("select has no options".into())),
        }
    }

    /// Free-form dropdown: open, type to filter, click the matching ARIA
    /// option; none matching but options rendered → accept the top result;
    /// nothing rendered → error.
    async fn fill_combobox(
        &mut self,
        behavior: &mut BehaviorSimulator,
        element: &Element,
        want: &str,
    ) -> Result<Option<String>> {
        element.click().await?;
        behavior.human_type(element, want).await?;

        if self
            .wait_for_any("[role=\"option\"]", Duration::from_secs(2))
            .await
            .is_none()
        {
            return Err(Error::ElementNotFound(format!(
                "no options rendered for '{want}'"
            )));
        }

        let options = self.page.find_elements("[role=\"option\"]").await?;
        let want_lower = want.to_lowercase();
        for option in &options {
            let text = option.inner_text().await.unwrap_or_default();
            if text.trim().to_lowercase() == want_lower {
                option.click().await?;
                return Ok(None);
            }
        }
        // Top filtered result via Enter.
        element.press_key("Enter").await?;
        Ok(Some(format!("'{want}' not listed, accepted top result")))
    }

    // ── Probe plumbing ──────────────────────────────────────────────

    /// Run an element-scoped JS probe that marks its pick with [`PICK_ATTR`],
    /// then resolve the mark to a live handle and clear it.
    async fn pick_via_element(
        &self,
        element: &Element,
        function: &str,
    ) -> Result<Option<Element>> {
        if element.js_string(function).await? != "true" {
            return Ok(None);
        }
        self.grab_pick().await
    }

    /// Mark the Nth visible caption match across the whole document.
    async fn pick_nth_caption(&self, caption: &str, index: usize) -> Result<Option<Element>> {
        let caption_js = serde_json::to_string(&caption.to_lowercase())
            .map_err(|e| Error::JsError(e.to_string()))?;
        let script = format!(
            r#"(() => {{
                const wanted = {caption_js};
                let seen = 0;
                for (const b of document.querySelectorAll('button')) {{
                    if ((b.innerText || '').trim().toLowerCase() !== wanted) continue;
                    if (seen === {index}) {{
                        b.setAttribute('{PICK_ATTR}', '1');
                        return true;
                    }}
                    seen++;
                }}
                return false;
            }})()"#
        );
        if !self.page.evaluate_bool(&script).await? {
            return Ok(None);
        }
        self.grab_pick().await
    }

    async fn grab_pick(&self) -> Result<Option<Element>> {
        match self.page.find_element(&format!("[{PICK_ATTR}]")).await {
            Ok(el) => {
                el.js_void(&format!(
                    "function() {{ this.removeAttribute('{PICK_ATTR}'); }}"
                ))
                .await?;
                Ok(Some(el))
            }
            Err(_) => Ok(None),
        }
    }

    /// Poll for any element matching `selector` within `timeout`.
    async fn wait_for_any(&self, selector: &str, timeout: Duration) -> Option<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(el) = self.page.find_element(selector).await {
                return Some(el);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Split into chunks of roughly `size` bytes, never inside a char.
fn chunked(text: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(size);
        while !rest.is_char_boundary(end) {
            end += 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_respects_char_boundaries() {
        let text = "héllo wörld, this is a lönger string";
        let chunks = chunked(text, 10);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 12));
    }

    #[test]
    fn chunked_handles_short_input() {
        assert_eq!(chunked("abc", 100), vec!["abc"]);
        assert!(chunked("", 100).is_empty());
    }
}
