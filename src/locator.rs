//! Element locators.
//!
//! A locator can be written four ways in case files and page objects:
//!
//! 1. tagged map: `{strategy: id, value: kw}` (`type` is accepted for `strategy`)
//! 2. compact string: `"id=kw"`
//! 3. positional pair, built in code with [`Locator::pair`]
//! 4. a list of any of the above, tried in order until one parses
//!
//! [`parse`] normalizes any of them into a [`ResolvedLocator`]; [`describe`]
//! renders one for log lines and never fails.

use crate::errors::{HarnessError, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Technique the driver uses to find an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Id,
    XPath,
    CssSelector,
    Name,
    ClassName,
    TagName,
    LinkText,
    PartialLinkText,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::Id,
        Strategy::XPath,
        Strategy::CssSelector,
        Strategy::Name,
        Strategy::ClassName,
        Strategy::TagName,
        Strategy::LinkText,
        Strategy::PartialLinkText,
    ];

    /// Selenium-style name, e.g. `css selector`.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::XPath => "xpath",
            Strategy::CssSelector => "css selector",
            Strategy::Name => "name",
            Strategy::ClassName => "class name",
            Strategy::TagName => "tag name",
            Strategy::LinkText => "link text",
            Strategy::PartialLinkText => "partial link text",
        }
    }

    /// Upper-snake label used in log lines, e.g. `CSS_SELECTOR`.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Id => "ID",
            Strategy::XPath => "XPATH",
            Strategy::CssSelector => "CSS_SELECTOR",
            Strategy::Name => "NAME",
            Strategy::ClassName => "CLASS_NAME",
            Strategy::TagName => "TAG_NAME",
            Strategy::LinkText => "LINK_TEXT",
            Strategy::PartialLinkText => "PARTIAL_LINK_TEXT",
        }
    }

    /// Case-insensitive lookup; `_` and `-` may stand in for the space.
    pub fn lookup(name: &str) -> Option<Strategy> {
        let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
        Strategy::ALL.into_iter().find(|s| s.name() == normalized)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map form of a locator. Fields stay optional so a missing key is reported
/// by [`parse`] rather than rejected while loading the case file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaggedLocator {
    #[serde(alias = "type", default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A polymorphic description of how to find one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    /// Degrade chain: the first entry that parses wins.
    Chain(Vec<Locator>),
    /// `"strategy=value"`
    Compact(String),
    Tagged(TaggedLocator),
    /// `(strategy, value)`. Written out as the tagged form so that a
    /// serialized case reads back with the same meaning.
    #[serde(skip_deserializing, serialize_with = "serialize_pair")]
    Pair(String, String),
    /// Any other shape found in a case file; always fails to parse.
    Unsupported(Value),
}

fn serialize_pair<S: Serializer>(
    strategy: &String,
    value: &String,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    TaggedLocator {
        strategy: Some(strategy.clone()),
        value: Some(Value::String(value.clone())),
    }
    .serialize(serializer)
}

impl Locator {
    pub fn tagged(strategy: impl Into<String>, value: impl Into<String>) -> Self {
        Locator::Tagged(TaggedLocator {
            strategy: Some(strategy.into()),
            value: Some(Value::String(value.into())),
        })
    }

    pub fn compact(spec: impl Into<String>) -> Self {
        Locator::Compact(spec.into())
    }

    pub fn pair(strategy: impl Into<String>, value: impl Into<String>) -> Self {
        Locator::Pair(strategy.into(), value.into())
    }

    pub fn chain(entries: impl IntoIterator<Item = Locator>) -> Self {
        Locator::Chain(entries.into_iter().collect())
    }

    /// Shorthand for `Locator::tagged("id", value)`.
    pub fn id(value: impl Into<String>) -> Self {
        Locator::tagged("id", value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::tagged("xpath", value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Locator::tagged("css selector", value)
    }

    pub fn parse(&self) -> Result<ResolvedLocator> {
        parse(self)
    }

    pub fn describe(&self) -> String {
        describe(self)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Compact(s) => write!(f, "\"{s}\""),
            Locator::Pair(strategy, value) => write!(f, "(\"{strategy}\", \"{value}\")"),
            Locator::Unsupported(value) => write!(f, "{value}"),
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => write!(f, "{other:?}"),
            },
        }
    }
}

impl From<&str> for Locator {
    fn from(spec: &str) -> Self {
        Locator::Compact(spec.to_string())
    }
}

/// A locator reduced to exactly one `(strategy, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedLocator {
    pub strategy: Strategy,
    pub value: String,
}

impl ResolvedLocator {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Query the CDP backend can evaluate in the page.
    pub fn selector(&self) -> Selector {
        let v = &self.value;
        match self.strategy {
            Strategy::CssSelector => Selector::Css(v.clone()),
            Strategy::XPath => Selector::XPath(v.clone()),
            Strategy::Id => Selector::Css(format!("[id={}]", css_string(v))),
            Strategy::Name => Selector::Css(format!("[name={}]", css_string(v))),
            Strategy::ClassName => Selector::Css(format!("[class~={}]", css_string(v))),
            Strategy::TagName => Selector::Css(v.clone()),
            Strategy::LinkText => {
                Selector::XPath(format!("//a[normalize-space(.)={}]", xpath_literal(v.trim())))
            }
            Strategy::PartialLinkText => {
                Selector::XPath(format!("//a[contains(., {})]", xpath_literal(v)))
            }
        }
    }
}

impl fmt::Display for ResolvedLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.label(), self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    XPath(String),
}

fn css_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

// XPath 1.0 has no escape sequences; mixed quotes need concat().
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

fn parse_error(locator: &Locator, reason: impl Into<String>) -> HarnessError {
    HarnessError::LocatorParse {
        locator: locator.to_string(),
        reason: reason.into(),
    }
}

fn lookup_strategy(locator: &Locator, name: &str) -> Result<Strategy> {
    Strategy::lookup(name).ok_or_else(|| {
        let supported: Vec<&str> = Strategy::ALL.iter().map(|s| s.name()).collect();
        parse_error(
            locator,
            format!("unknown strategy '{name}', supported: {}", supported.join(", ")),
        )
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Normalize a locator into one `(strategy, value)` pair.
pub fn parse(locator: &Locator) -> Result<ResolvedLocator> {
    match locator {
        Locator::Chain(entries) => entries
            .iter()
            .find_map(|entry| parse(entry).ok())
            .ok_or_else(|| parse_error(locator, "no entry of the fallback chain is resolvable")),
        Locator::Tagged(tagged) => {
            let (Some(strategy), Some(value)) = (&tagged.strategy, &tagged.value) else {
                return Err(parse_error(
                    locator,
                    "map form requires both 'strategy' and 'value'",
                ));
            };
            let value = scalar_to_string(value)
                .ok_or_else(|| parse_error(locator, "'value' must be a scalar"))?;
            Ok(ResolvedLocator::new(lookup_strategy(locator, strategy)?, value))
        }
        Locator::Pair(strategy, value) => Ok(ResolvedLocator::new(
            lookup_strategy(locator, strategy)?,
            value.clone(),
        )),
        Locator::Compact(spec) => {
            let Some((strategy, value)) = spec.split_once('=') else {
                return Err(parse_error(
                    locator,
                    "string form must contain '=', e.g. id=kw",
                ));
            };
            Ok(ResolvedLocator::new(lookup_strategy(locator, strategy)?, value))
        }
        Locator::Unsupported(value) => Err(parse_error(
            locator,
            format!("unsupported locator shape: {}", json_shape(value)),
        )),
    }
}

/// Human-readable rendering for diagnostics; never fails.
pub fn describe(locator: &Locator) -> String {
    match parse(locator) {
        Ok(resolved) => resolved.to_string(),
        Err(HarnessError::LocatorParse { reason, .. }) => {
            format!("unresolvable locator {locator} ({reason})")
        }
        Err(other) => format!("unresolvable locator {locator} ({other})"),
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
