//! `${name}` token replacement for data-driven cases.
//!
//! Token names match case-insensitively. All tokens are replaced in one
//! pass over the input, so text introduced by a value is never scanned for
//! further tokens. When two dataset keys differ only by case, the first
//! declared wins.

use crate::engine::case::{Case, Dataset};
use crate::errors::{HarnessError, Result};
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionMode {
    /// Replace tokens inside every string leaf of the case.
    #[default]
    TreeWalk,
    /// Replace tokens in the case's JSON text and parse it back. A value
    /// containing JSON syntax can break the document.
    Textual,
}

/// Produce a copy of `case` with the dataset's values substituted.
pub fn substitute(case: &Case, dataset: &Dataset, mode: SubstitutionMode) -> Result<Case> {
    let tokens = Tokens::new(case, dataset)?;
    match mode {
        SubstitutionMode::TreeWalk => {
            let mut tree = serde_json::to_value(case)?;
            tokens.replace_leaves(&mut tree);
            serde_json::from_value(tree).map_err(|e| tokens.error(format!("substituted case is invalid: {e}")))
        }
        SubstitutionMode::Textual => {
            let text = serde_json::to_string(case)?;
            let replaced = tokens.replace(&text);
            serde_json::from_str(&replaced)
                .map_err(|e| tokens.error(format!("substituted case no longer parses: {e}")))
        }
    }
}

/// String form of a dataset value: strings as-is, anything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn valid_token_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, '$' | '{' | '}') || c.is_whitespace())
}

struct Tokens<'a> {
    case: &'a Case,
    dataset: &'a Dataset,
    pattern: Option<Regex>,
    values: HashMap<String, String>,
}

impl<'a> Tokens<'a> {
    fn new(case: &'a Case, dataset: &'a Dataset) -> Result<Self> {
        let mut tokens = Tokens {
            case,
            dataset,
            pattern: None,
            values: HashMap::new(),
        };

        let mut alternatives = Vec::with_capacity(dataset.len());
        for (name, value) in dataset {
            if !valid_token_name(name) {
                return Err(tokens.error(format!("invalid token name [{name}]")));
            }
            let key = name.to_lowercase();
            if !tokens.values.contains_key(&key) {
                tokens.values.insert(key, value_text(value));
                alternatives.push(regex::escape(name));
            }
        }

        if !alternatives.is_empty() {
            let pattern = RegexBuilder::new(&format!(r"\$\{{({})\}}", alternatives.join("|")))
                .case_insensitive(true)
                .build()
                .map_err(|e| tokens.error(format!("cannot build token pattern: {e}")))?;
            tokens.pattern = Some(pattern);
        }
        Ok(tokens)
    }

    fn replace(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        pattern
            .replace_all(text, |caps: &Captures| {
                self.values
                    .get(&caps[1].to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    fn replace_leaves(&self, node: &mut Value) {
        match node {
            Value::String(s) => {
                if s.contains("${") {
                    *s = self.replace(s);
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.replace_leaves(item)),
            Value::Object(map) => map.values_mut().for_each(|item| self.replace_leaves(item)),
            _ => {}
        }
    }

    fn error(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::Substitution {
            case_id: self.case.case_id.clone(),
            dataset: Value::Object(self.dataset.clone()).to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::case::Step;
    use crate::locator::Locator;
    use serde_json::json;

    fn dataset(value: Value) -> Dataset {
        value.as_object().cloned().unwrap()
    }

    fn search_case() -> Case {
        Case::new("search_001")
            .with_step(Step::new("inputText").with_param("text", "${kw}"))
    }

    #[test]
    fn test_param_becomes_literal_value() {
        for mode in [SubstitutionMode::TreeWalk, SubstitutionMode::Textual] {
            let out = substitute(&search_case(), &dataset(json!({"kw": "Python"})), mode).unwrap();
            let params = out.steps[0].params.as_ref().unwrap();
            assert_eq!(params["text"], json!("Python"));
        }
    }

    #[test]
    fn test_tokens_match_case_insensitively_everywhere() {
        let case = Case::new("c")
            .with_step(
                Step::new("${ACTION}")
                    .with_locator(Locator::tagged("id", "${Field}"))
                    .with_param("text", "a ${kw} and ${KW}"),
            );
        let out = substitute(
            &case,
            &dataset(json!({"action": "input_text", "field": "kw", "kw": "x"})),
            SubstitutionMode::TreeWalk,
        )
        .unwrap();

        let step = &out.steps[0];
        assert_eq!(step.action, "input_text");
        assert_eq!(step.locator, Some(Locator::tagged("id", "kw")));
        assert_eq!(step.params.as_ref().unwrap()["text"], json!("a x and x"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let case = Case::new("c").with_step(Step::new("a").with_param("text", "${one}"));
        let out = substitute(
            &case,
            &dataset(json!({"one": "${two}", "two": "2"})),
            SubstitutionMode::TreeWalk,
        )
        .unwrap();
        assert_eq!(out.steps[0].params.as_ref().unwrap()["text"], json!("${two}"));
    }

    #[test]
    fn test_non_string_values_use_json_text() {
        let case = Case::new("c").with_step(Step::new("a").with_param("text", "n=${n} ok=${ok}"));
        let out = substitute(&case, &dataset(json!({"n": 3, "ok": true})), SubstitutionMode::TreeWalk)
            .unwrap();
        assert_eq!(out.steps[0].params.as_ref().unwrap()["text"], json!("n=3 ok=true"));
    }

    #[test]
    fn test_invalid_token_name_is_rejected() {
        let err = substitute(
            &search_case(),
            &dataset(json!({"bad name": "x"})),
            SubstitutionMode::TreeWalk,
        )
        .unwrap_err();
        match err {
            HarnessError::Substitution { case_id, dataset, .. } => {
                assert_eq!(case_id, "search_001");
                assert!(dataset.contains("bad name"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_textual_mode_fails_when_value_breaks_document() {
        let data = dataset(json!({"kw": "say \"hi\""}));
        let err = substitute(&search_case(), &data, SubstitutionMode::Textual).unwrap_err();
        assert!(matches!(err, HarnessError::Substitution { .. }));

        // The tree walk keeps the value intact.
        let out = substitute(&search_case(), &data, SubstitutionMode::TreeWalk).unwrap();
        assert_eq!(out.steps[0].params.as_ref().unwrap()["text"], json!("say \"hi\""));
    }

    #[test]
    fn test_empty_dataset_is_identity() {
        let out = substitute(&search_case(), &Dataset::new(), SubstitutionMode::Textual).unwrap();
        assert_eq!(out, search_case());
    }
}
