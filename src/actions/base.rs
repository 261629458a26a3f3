use crate::errors::{HarnessError, Result};
use crate::locator::Locator;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Result of an action execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    pub execution_time_ms: u64,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            execution_time_ms: 0,
        }
    }

    pub fn success_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            execution_time_ms: 0,
        }
    }

    /// A check that came back negative. The step itself still passes.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            execution_time_ms: 0,
        }
    }

    pub fn with_execution_time(mut self, time_ms: u64) -> Self {
        self.execution_time_ms = time_ms;
        self
    }
}

/// Which of `(locator, params)` a step supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConvention {
    LocatorAndParams,
    LocatorOnly,
    ParamsOnly,
    NoArguments,
}

impl fmt::Display for CallConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallConvention::LocatorAndParams => "locator + params",
            CallConvention::LocatorOnly => "locator",
            CallConvention::ParamsOnly => "params",
            CallConvention::NoArguments => "no arguments",
        };
        f.write_str(s)
    }
}

/// Whether an action takes a locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorUse {
    Required,
    Optional,
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Declared call signature of an action.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub locator: LocatorUse,
    pub params: Vec<ParamSpec>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            locator: LocatorUse::Forbidden,
            params: Vec::new(),
        }
    }

    pub fn with_locator(mut self) -> Self {
        self.locator = LocatorUse::Required;
        self
    }

    pub fn with_optional_locator(mut self) -> Self {
        self.locator = LocatorUse::Optional;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Reject arguments the action cannot take: a missing or unexpected
    /// locator, unknown parameter names, missing required parameters.
    pub fn validate(&self, args: &ActionArgs) -> Result<()> {
        match (self.locator, args.locator.is_some()) {
            (LocatorUse::Required, false) => return Err(self.invalid("a locator is required")),
            (LocatorUse::Forbidden, true) => {
                return Err(self.invalid("this action does not take a locator"))
            }
            _ => {}
        }

        for key in args.params.keys() {
            if !self.params.iter().any(|p| p.name == key) {
                let accepted: Vec<&str> = self.params.iter().map(|p| p.name).collect();
                return Err(self.invalid(format!(
                    "unexpected parameter [{key}], accepted: [{}]",
                    accepted.join(", ")
                )));
            }
        }

        for param in self.params.iter().filter(|p| p.required) {
            if !args.params.contains_key(param.name) {
                return Err(self.invalid(format!("missing parameter [{}]", param.name)));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::InvalidArguments {
            action: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Arguments of one step, as written in the case file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionArgs {
    pub locator: Option<Locator>,
    pub params: Map<String, Value>,
}

impl ActionArgs {
    pub fn new(locator: Option<Locator>, params: Option<Map<String, Value>>) -> Self {
        Self {
            locator,
            params: params.unwrap_or_default(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_locator(mut self, locator: impl Into<Locator>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn convention(&self) -> CallConvention {
        match (self.locator.is_some(), !self.params.is_empty()) {
            (true, true) => CallConvention::LocatorAndParams,
            (true, false) => CallConvention::LocatorOnly,
            (false, true) => CallConvention::ParamsOnly,
            (false, false) => CallConvention::NoArguments,
        }
    }

    pub fn locator(&self, action: &str) -> Result<&Locator> {
        self.locator
            .as_ref()
            .ok_or_else(|| HarnessError::InvalidArguments {
                action: action.to_string(),
                reason: "a locator is required".to_string(),
            })
    }

    pub fn required<T: DeserializeOwned>(&self, action: &str, name: &str) -> Result<T> {
        self.optional(action, name)?
            .ok_or_else(|| HarnessError::InvalidArguments {
                action: action.to_string(),
                reason: format!("missing parameter [{name}]"),
            })
    }

    pub fn optional<T: DeserializeOwned>(&self, action: &str, name: &str) -> Result<Option<T>> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| HarnessError::InvalidArguments {
                    action: action.to_string(),
                    reason: format!("parameter [{name}] has the wrong type: {e}"),
                }),
        }
    }

    /// Text parameter; numbers and booleans are accepted in their printed form
    /// so that `text: 2024` in YAML types "2024".
    pub fn text(&self, action: &str, name: &str) -> Result<String> {
        match self.params.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
            _ => self.required(action, name),
        }
    }
}

/// A named operation a case step can invoke on the page object `P`.
#[async_trait]
pub trait Action<P>: Send + Sync {
    fn spec(&self) -> &ActionSpec;

    fn name(&self) -> &str {
        &self.spec().name
    }

    fn description(&self) -> &str {
        &self.spec().description
    }

    /// Execute the action
    async fn invoke(&self, page: &P, args: ActionArgs) -> Result<ActionResult>;
}
