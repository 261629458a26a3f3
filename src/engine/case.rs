use crate::errors::{HarnessError, Result};
use crate::locator::Locator;
use crate::types::Priority;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// Named substitution values for one run of a case, in declared order.
pub type Dataset = Map<String, Value>;

fn default_case_id() -> String {
    "UNKNOWN".to_string()
}

/// One declarative test scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(default = "default_case_id")]
    pub case_id: String,
    #[serde(default)]
    pub case_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Dataset>>,
}

/// One instruction: an action name plus optional locator and parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Empty when the case file omits it; reported when the step runs.
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    #[serde(
        default,
        deserialize_with = "non_empty_params",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<Map<String, Value>>,
}

// `params: {}` and `params: ~` both mean "no parameters".
fn non_empty_params<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Map<String, Value>>, D::Error> {
    let params = Option::<Map<String, Value>>::deserialize(deserializer)?;
    Ok(params.filter(|p| !p.is_empty()))
}

impl Case {
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            case_name: String::new(),
            tags: Vec::new(),
            priority: Priority::default(),
            steps: Vec::new(),
            data: None,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.data.get_or_insert_with(Vec::new).push(dataset);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Datasets to run, or an empty slice for a plain case.
    pub fn datasets(&self) -> &[Dataset] {
        self.data.as_deref().unwrap_or_default()
    }
}

impl Step {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            locator: None,
            params: None,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<Locator>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), value.into());
        self
    }
}

#[derive(Deserialize)]
struct Suite {
    cases: Vec<Case>,
}

/// Read a single case document.
pub fn load(path: impl AsRef<Path>) -> Result<Case> {
    let path = path.as_ref();
    let content = read(path)?;
    let case: Case = serde_yaml::from_str(&content).map_err(|e| load_error(path, e))?;
    info!("Loaded case [{}] from {}", case.case_id, path.display());
    Ok(case)
}

/// Read a case file holding either one case or `cases: [...]`.
pub fn load_suite(path: impl AsRef<Path>) -> Result<Vec<Case>> {
    let path = path.as_ref();
    let content = read(path)?;
    let document: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| load_error(path, e))?;

    let cases = if document.get("cases").is_some() {
        serde_yaml::from_value::<Suite>(document)
            .map_err(|e| load_error(path, e))?
            .cases
    } else if document.is_mapping() {
        vec![serde_yaml::from_value::<Case>(document).map_err(|e| load_error(path, e))?]
    } else {
        return Err(load_error(path, "expected a case mapping or a `cases` list"));
    };

    info!("Loaded {} case(s) from {}", cases.len(), path.display());
    Ok(cases)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| load_error(path, e))
}

fn load_error(path: &Path, reason: impl std::fmt::Display) -> HarnessError {
    HarnessError::CaseLoad {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
