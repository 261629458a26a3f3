use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`HarnessError`], used by the retry policy to
/// decide which failures are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    LocatorParse,
    ElementOperation,
    CaseExecution,
    CaseLoad,
    EnvironmentConfig,
    Assertion,
    Driver,
    Io,
    Serialization,
    Http,
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Locator parse failed for {locator}: {reason}")]
    LocatorParse { locator: String, reason: String },

    #[error("Element [{locator}] {operation} failed: {cause}")]
    ElementOperation {
        locator: String,
        operation: String,
        cause: String,
    },

    #[error("{}", case_failure_message(.case_id, .step, .message))]
    CaseExecution {
        case_id: String,
        step: Option<usize>,
        message: String,
        #[source]
        source: Option<Box<HarnessError>>,
    },

    #[error("Case [{case_id}] substitution failed: {reason} (dataset: {dataset})")]
    Substitution {
        case_id: String,
        dataset: String,
        reason: String,
    },

    #[error("Failed to load cases from {}: {reason}", .path.display())]
    CaseLoad { path: PathBuf, reason: String },

    #[error("Environment [{env}] configuration error: {message}")]
    EnvConfig { env: String, message: String },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Invalid arguments for action [{action}]: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn case_failure_message(case_id: &str, step: &Option<usize>, message: &str) -> String {
    match step {
        Some(step) => format!("Case [{case_id}] step {step} failed: {message}"),
        None => format!("Case [{case_id}] failed: {message}"),
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::LocatorParse { .. } => ErrorKind::LocatorParse,
            HarnessError::ElementOperation { .. } => ErrorKind::ElementOperation,
            HarnessError::CaseExecution { .. }
            | HarnessError::Substitution { .. }
            | HarnessError::InvalidArguments { .. } => ErrorKind::CaseExecution,
            HarnessError::CaseLoad { .. } => ErrorKind::CaseLoad,
            HarnessError::EnvConfig { .. } => ErrorKind::EnvironmentConfig,
            HarnessError::Assertion(_) => ErrorKind::Assertion,
            HarnessError::Driver(_) => ErrorKind::Driver,
            HarnessError::Io(_) => ErrorKind::Io,
            HarnessError::Serialization(_) | HarnessError::Yaml(_) => ErrorKind::Serialization,
            HarnessError::Http(_) => ErrorKind::Http,
        }
    }

    pub fn element_operation(
        locator: impl Into<String>,
        operation: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        HarnessError::ElementOperation {
            locator: locator.into(),
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    pub fn env_config(env: impl Into<String>, message: impl Into<String>) -> Self {
        HarnessError::EnvConfig {
            env: env.into(),
            message: message.into(),
        }
    }

    // Helper function to convert any driver-side error to HarnessError
    pub fn from_driver_error<E: std::fmt::Display>(err: E) -> Self {
        HarnessError::Driver(err.to_string())
    }

    /// Full cause chain, outermost first, joined for one-line reporting.
    pub fn chain(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(err) = current {
            parts.push(err.to_string());
            current = err.source();
        }
        parts.join(" <- ")
    }
}
