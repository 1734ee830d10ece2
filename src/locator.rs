use tracing::{debug, trace};

use crate::element::Element;
use crate::error::Result;
use crate::model::{FieldDescriptor, FieldKind};
use crate::page::Page;

/// Attribute used to hand a DOM-side match back to the CDP side. Set by the
/// probe scripts, resolved to a live handle, then removed.
const MARK_ATTR: &str = "data-formpilot-hit";

/// One strategy in the resolution cascade. Strategies are tried in the order
/// of [`TIERS`]; the first non-empty match wins and preempts everything after
/// it, even when a later tier would also match a different element. New
/// heuristics are added by appending a variant here and an entry to `TIERS`,
/// never by branching elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// `id`/`name` equal to the field's logical path, case-normalized.
    ExactAttr,
    /// `placeholder`/`aria-label` containing the title, restricted to control
    /// kinds valid for the declared field kind.
    ScopedAttr,
    /// Text node equal to the title, up to its ancestor, down to a control.
    LabelAssociation,
    /// Title tokens >3 chars matched against label text; resolve via `for`
    /// attribute or a nearby control.
    FuzzyLabel,
    /// Any text node containing the title; first control following it in
    /// document order.
    Positional,
}

pub const TIERS: &[Tier] = &[
    Tier::ExactAttr,
    Tier::ScopedAttr,
    Tier::LabelAssociation,
    Tier::FuzzyLabel,
    Tier::Positional,
];

/// Resolve a field descriptor to a live element. `Ok(None)` means the cascade
/// was exhausted; the caller records the field as skipped rather than failing.
pub async fn locate(page: &Page, field: &FieldDescriptor) -> Result<Option<Element>> {
    for tier in TIERS {
        if let Some(el) = tier.try_locate(page, field).await? {
            debug!(path = %field.path, tier = ?tier, "field resolved");
            return Ok(Some(el));
        }
        trace!(path = %field.path, tier = ?tier, "no match, falling through");
    }
    Ok(None)
}

impl Tier {
    async fn try_locate(&self, page: &Page, field: &FieldDescriptor) -> Result<Option<Element>> {
        match self {
            Tier::ExactAttr => {
                let path = css_escape(&field.path);
                try_selectors(
                    page,
                    &[
                        format!("[id=\"{path}\" i]"),
                        format!("[name=\"{path}\" i]"),
                    ],
                )
                .await
            }
            Tier::ScopedAttr => try_selectors(page, &scoped_selectors(field)).await,
            Tier::LabelAssociation => {
                mark_and_grab(page, &label_association_js(&field.title)).await
            }
            Tier::FuzzyLabel => {
                if meaningful_words(&field.title).is_empty() {
                    return Ok(None);
                }
                mark_and_grab(page, &fuzzy_label_js(&field.title)).await
            }
            Tier::Positional => mark_and_grab(page, &positional_js(&field.title)).await,
        }
    }
}

/// Selectors for the type-scoped attribute tier, narrowed to the control kinds
/// a field of this declared kind can legitimately render as.
fn scoped_selectors(field: &FieldDescriptor) -> Vec<String> {
    let title = css_escape(&field.title);
    let path = css_escape(&field.path);
    match field.kind {
        FieldKind::File => vec![
            "input[type=\"file\"]".into(),
            "[data-testid*=\"resume\" i]".into(),
            "[data-testid*=\"upload\" i]".into(),
        ],
        FieldKind::Boolean => vec![
            format!("input[type=\"checkbox\"][name=\"{path}\" i]"),
            format!("input[type=\"checkbox\"][id*=\"{path}\" i]"),
            format!("input[type=\"radio\"][name=\"{path}\" i]"),
        ],
        FieldKind::Location => vec![
            "input[placeholder=\"Start typing...\"]".into(),
            "input[placeholder*=\"Start typing\" i]".into(),
            "input[placeholder*=\"location\" i]".into(),
            "input[placeholder*=\"city\" i]".into(),
            "input[aria-label*=\"location\" i]".into(),
            format!("input[placeholder*=\"{title}\" i]"),
        ],
        FieldKind::LongText => vec![
            format!("textarea[placeholder*=\"{title}\" i]"),
            format!("textarea[aria-label*=\"{title}\" i]"),
        ],
        FieldKind::ValueSelect | FieldKind::MultiValueSelect => vec![
            format!("select[aria-label*=\"{title}\" i]"),
            format!("input[role=\"combobox\"][aria-label*=\"{title}\" i]"),
            format!("input[placeholder*=\"{title}\" i]"),
        ],
        FieldKind::Text | FieldKind::Date => vec![
            format!("input[placeholder*=\"{title}\" i]"),
            format!("input[aria-label*=\"{title}\" i]"),
            format!("textarea[placeholder*=\"{title}\" i]"),
            format!("textarea[aria-label*=\"{title}\" i]"),
        ],
    }
}

async fn try_selectors(page: &Page, selectors: &[String]) -> Result<Option<Element>> {
    for selector in selectors {
        if let Ok(el) = page.find_element(selector).await {
            trace!(%selector, "selector matched");
            return Ok(Some(el));
        }
    }
    Ok(None)
}

/// Run a probe script that marks its candidate with [`MARK_ATTR`], then
/// resolve the mark to a live handle and remove it.
async fn mark_and_grab(page: &Page, script: &str) -> Result<Option<Element>> {
    if !page.evaluate_bool(script).await? {
        return Ok(None);
    }
    let selector = format!("[{MARK_ATTR}]");
    match page.find_element(&selector).await {
        Ok(el) => {
            el.js_void(&format!(
                "function() {{ this.removeAttribute('{MARK_ATTR}'); }}"
            ))
            .await?;
            Ok(Some(el))
        }
        Err(_) => Ok(None),
    }
}

fn label_association_js(title: &str) -> String {
    let title_js = js_string(title);
    format!(
        r#"(() => {{
            const wanted = {title_js}.trim().toLowerCase();
            const nodes = document.querySelectorAll('label, span, div, p, legend, h1, h2, h3, h4');
            for (const node of nodes) {{
                if ((node.textContent || '').trim().toLowerCase() !== wanted) continue;
                let scope = node;
                for (let depth = 0; depth < 4 && scope; depth++) {{
                    const control = scope.querySelector('input, textarea, select');
                    if (control) {{
                        control.setAttribute('{MARK_ATTR}', '1');
                        return true;
                    }}
                    scope = scope.parentElement;
                }}
            }}
            return false;
        }})()"#
    )
}

fn fuzzy_label_js(title: &str) -> String {
    let words_js = serde_json::to_string(&meaningful_words(title)).unwrap_or_else(|_| "[]".into());
    format!(
        r#"(() => {{
            const words = {words_js};
            const labels = document.querySelectorAll('label');
            for (const word of words) {{
                for (const label of labels) {{
                    if (!(label.textContent || '').toLowerCase().includes(word)) continue;
                    let control = null;
                    if (label.htmlFor) {{
                        control = document.getElementById(label.htmlFor);
                    }}
                    if (!control) {{
                        control = label.querySelector('input, textarea, select');
                    }}
                    if (!control && label.parentElement) {{
                        control = label.parentElement.querySelector('input, textarea, select');
                    }}
                    if (control) {{
                        control.setAttribute('{MARK_ATTR}', '1');
                        return true;
                    }}
                }}
            }}
            return false;
        }})()"#
    )
}

fn positional_js(title: &str) -> String {
    let title_js = js_string(title);
    format!(
        r#"(() => {{
            if (!document.body) return false;
            const wanted = {title_js}.toLowerCase();
            const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
            let anchor = null;
            while (walker.nextNode()) {{
                const node = walker.currentNode;
                const parentTag = node.parentElement ? node.parentElement.tagName : '';
                if (parentTag === 'SCRIPT' || parentTag === 'STYLE') continue;
                if ((node.textContent || '').toLowerCase().includes(wanted)) {{
                    anchor = node.parentElement;
                    break;
                }}
            }}
            if (!anchor) return false;
            const controls = document.querySelectorAll('input, textarea, select');
            for (const control of controls) {{
                const pos = anchor.compareDocumentPosition(control);
                if (pos & Node.DOCUMENT_POSITION_FOLLOWING) {{
                    control.setAttribute('{MARK_ATTR}', '1');
                    return true;
                }}
            }}
            return false;
        }})()"#
    )
}

/// Title tokens worth fuzzy-matching: lowercased words longer than 3 chars.
fn meaningful_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.len() > 3)
        .collect()
}

fn css_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn js_string(raw: &str) -> String {
    serde_json::to_string(raw).unwrap_or_else(|_| "\"\"".into())
}

// ── Affordance cascades ─────────────────────────────────────────────

/// One way of finding a page-level affordance (apply button, submit button).
/// Same contract as [`Tier`]: ordered, first hit wins, extend by appending.
pub enum Probe {
    Css(&'static str),
    /// Case-insensitive caption match over clickable elements.
    Caption(&'static str),
}

impl Probe {
    pub async fn try_locate(&self, page: &Page) -> Result<Option<Element>> {
        match self {
            Probe::Css(selector) => Ok(page.find_element(selector).await.ok()),
            Probe::Caption(caption) => {
                let caption_js = js_string(caption);
                let script = format!(
                    r#"(() => {{
                        const wanted = {caption_js}.toLowerCase();
                        const candidates = document.querySelectorAll(
                            'button, a, input[type="submit"], input[type="button"]');
                        for (const el of candidates) {{
                            const text = (el.innerText || el.value || '').trim().toLowerCase();
                            if (text.includes(wanted)) {{
                                el.setAttribute('{MARK_ATTR}', '1');
                                return true;
                            }}
                        }}
                        return false;
                    }})()"#
                );
                mark_and_grab(page, &script).await
            }
        }
    }
}

/// Affordances that reveal the application form on a posting page.
pub const APPLY_CASCADE: &[Probe] = &[
    Probe::Css("[data-testid=\"apply-button\"]"),
    Probe::Css("[data-testid*=\"apply\" i]"),
    Probe::Css(".apply-button"),
    Probe::Css("#apply-button"),
    Probe::Caption("Apply for this job"),
    Probe::Caption("Apply"),
];

/// Affordances that submit the filled form.
pub const SUBMIT_CASCADE: &[Probe] = &[
    Probe::Caption("Submit Application"),
    Probe::Caption("Submit"),
    Probe::Css("input[type=\"submit\"]"),
    Probe::Css("button[type=\"submit\"]"),
    Probe::Caption("Apply"),
];

/// Walk a cascade, returning the first match.
pub async fn first_match(page: &Page, cascade: &[Probe]) -> Result<Option<Element>> {
    for probe in cascade {
        if let Some(el) = probe.try_locate(page).await? {
            return Ok(Some(el));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: FieldKind, title: &str, path: &str) -> FieldDescriptor {
        FieldDescriptor {
            title: title.into(),
            path: path.into(),
            kind,
            required: true,
            description: None,
            options: None,
        }
    }

    #[test]
    fn tier_order_is_fixed() {
        assert_eq!(
            TIERS,
            &[
                Tier::ExactAttr,
                Tier::ScopedAttr,
                Tier::LabelAssociation,
                Tier::FuzzyLabel,
                Tier::Positional,
            ]
        );
    }

    #[test]
    fn scoped_selectors_respect_declared_kind() {
        let long = field(FieldKind::LongText, "Why this role?", "why_role");
        assert!(scoped_selectors(&long)
            .iter()
            .all(|s| s.starts_with("textarea")));

        let file = field(FieldKind::File, "Resume", "resume");
        assert!(scoped_selectors(&file)[0].contains("type=\"file\""));

        let text = field(FieldKind::Text, "First name", "first_name");
        assert!(scoped_selectors(&text)
            .iter()
            .any(|s| s.contains("placeholder*=\"First name\"")));
    }

    #[test]
    fn meaningful_words_drop_short_tokens() {
        let words = meaningful_words("Are you authorized to work in the US?");
        assert_eq!(words, vec!["authorized", "work"]);
        assert!(meaningful_words("a an it").is_empty());
    }

    #[test]
    fn css_escape_neutralizes_quotes() {
        assert_eq!(css_escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn probe_scripts_embed_title_safely() {
        let js = label_association_js("He said \"hi\"");
        assert!(js.contains(r#""He said \"hi\"""#));
    }
}
