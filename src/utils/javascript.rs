//! Scripts evaluated in the page by the Chrome backend.
//!
//! Every script is a self-invoking function returning a JSON string of the
//! form `{"ok": true, "value": ...}` or `{"ok": false, "error": "..."}`, so
//! the result survives CDP's by-reference object handling.

use crate::errors::{HarnessError, Result};
use crate::locator::Selector;
use serde::Deserialize;
use serde_json::{json, Value};

const PRELUDE: &str = r#"
    function __find(root, sel) {
        if (sel.css !== undefined) {
            return root.querySelector(sel.css);
        }
        return root.evaluate(sel.xpath, root, null,
            XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    }
    function __document(frames) {
        let doc = document;
        for (const frame of frames) {
            const el = __find(doc, frame);
            if (!el || !el.contentDocument) {
                return null;
            }
            doc = el.contentDocument;
        }
        return doc;
    }
    function __visible(el) {
        if (!el) return false;
        const style = el.ownerDocument.defaultView.getComputedStyle(el);
        return el.getClientRects().length > 0
            && style.visibility !== 'hidden'
            && style.display !== 'none';
    }
"#;

/// What to do with the located element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementScript {
    /// `value`: whether the element exists and is displayed
    IsVisible,
    Click,
    /// Focus the element and empty its value; typing follows via CDP input
    ClearAndFocus,
    /// `value`: the element's rendered text
    Text,
    /// `value`: whether the element is a same-origin frame we can enter
    IsFrame,
}

impl ElementScript {
    fn body(&self) -> &'static str {
        match self {
            ElementScript::IsVisible => "return { ok: true, value: __visible(el) };",
            ElementScript::Click => {
                "if (!el) return { ok: false, error: 'element not found' };
                 el.scrollIntoView({ block: 'center' });
                 el.click();
                 return { ok: true, value: null };"
            }
            ElementScript::ClearAndFocus => {
                "if (!el) return { ok: false, error: 'element not found' };
                 el.focus();
                 if ('value' in el) {
                     el.value = '';
                     el.dispatchEvent(new Event('input', { bubbles: true }));
                 }
                 return { ok: true, value: null };"
            }
            ElementScript::Text => {
                "if (!el) return { ok: false, error: 'element not found' };
                 return { ok: true, value: el.innerText ?? el.textContent ?? '' };"
            }
            ElementScript::IsFrame => {
                "return { ok: true, value: !!el && !!el.contentDocument };"
            }
        }
    }
}

fn selector_json(selector: &Selector) -> Value {
    match selector {
        Selector::Css(css) => json!({ "css": css }),
        Selector::XPath(xpath) => json!({ "xpath": xpath }),
    }
}

/// Build the script that runs `script` against `target`, inside the frame
/// path `frames` (outermost first).
pub fn element_script(frames: &[Selector], target: &Selector, script: ElementScript) -> String {
    let frames: Vec<Value> = frames.iter().map(selector_json).collect();
    format!(
        r#"(function() {{
    {PRELUDE}
    const result = (function() {{
        try {{
            const doc = __document({frames});
            if (!doc) return {{ ok: false, error: 'frame is no longer available' }};
            const el = __find(doc, {target});
            {body}
        }} catch (e) {{
            return {{ ok: false, error: String(e && e.message || e) }};
        }}
    }})();
    return JSON.stringify(result);
}})()"#,
        frames = Value::Array(frames),
        target = selector_json(target),
        body = script.body(),
    )
}

#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Decode the JSON string an [`element_script`] returns.
pub fn decode_outcome(raw: &Value) -> Result<Value> {
    let text = raw.as_str().ok_or_else(|| {
        HarnessError::Driver(format!("unexpected script result: {raw}"))
    })?;
    let outcome: ScriptOutcome = serde_json::from_str(text)?;
    if outcome.ok {
        Ok(outcome.value)
    } else {
        Err(HarnessError::Driver(
            outcome.error.unwrap_or_else(|| "script failed".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_embeds_selectors_as_json() {
        let script = element_script(
            &[Selector::Css("iframe#editor".into())],
            &Selector::XPath("//a[text()='it\"s']".into()),
            ElementScript::Click,
        );
        assert!(script.contains(r#"__document([{"css":"iframe#editor"}])"#));
        assert!(script.contains(r#"{"xpath":"//a[text()='it\"s']"}"#));
        assert!(script.contains("el.click()"));
    }

    #[test]
    fn test_decode_outcome() {
        let ok = Value::String(r#"{"ok":true,"value":"Rust"}"#.into());
        assert_eq!(decode_outcome(&ok).unwrap(), Value::from("Rust"));

        let failed = Value::String(r#"{"ok":false,"error":"element not found"}"#.into());
        let err = decode_outcome(&failed).unwrap_err();
        assert!(err.to_string().contains("element not found"));

        assert!(decode_outcome(&Value::Bool(true)).is_err());
    }
}
