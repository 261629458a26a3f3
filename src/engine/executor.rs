use crate::actions::{ActionArgs, ActionRegistry, ActionResult};
use crate::engine::case::Case;
use crate::engine::substitute::{substitute, SubstitutionMode};
use crate::errors::{HarnessError, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Results of one pass over a case's steps.
#[derive(Debug, Clone)]
pub struct CaseRun {
    pub case_id: String,
    /// Index into the case's datasets, `None` for a plain run
    pub dataset: Option<usize>,
    pub results: Vec<ActionResult>,
}

/// Dataset runs that completed, plus the error that stopped the case.
#[derive(Debug)]
pub struct DataRuns {
    pub runs: Vec<CaseRun>,
    pub error: Option<HarnessError>,
}

impl DataRuns {
    pub fn into_result(self) -> Result<Vec<CaseRun>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.runs),
        }
    }
}

/// Runs cases against a page object through an action registry.
pub struct CaseEngine<P> {
    registry: Arc<ActionRegistry<P>>,
    mode: SubstitutionMode,
}

impl<P: Send + Sync + 'static> CaseEngine<P> {
    pub fn new(registry: Arc<ActionRegistry<P>>) -> Self {
        Self {
            registry,
            mode: SubstitutionMode::default(),
        }
    }

    pub fn with_substitution_mode(mut self, mode: SubstitutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn registry(&self) -> &ActionRegistry<P> {
        &self.registry
    }

    /// Run every step in order, stopping at the first failure.
    pub async fn execute(&self, page: &P, case: &Case) -> Result<CaseRun> {
        self.run_steps(page, case, None).await
    }

    /// Run the case once per dataset, or once as-is when it has none. The
    /// first failing dataset ends the case.
    pub async fn execute_with_data(&self, page: &P, case: &Case) -> Result<Vec<CaseRun>> {
        self.run_datasets(page, case).await.into_result()
    }

    /// Like [`execute_with_data`](Self::execute_with_data), but keeps the
    /// runs that completed before a failure.
    pub async fn run_datasets(&self, page: &P, case: &Case) -> DataRuns {
        let datasets = case.datasets();
        if datasets.is_empty() {
            return match self.run_steps(page, case, None).await {
                Ok(run) => DataRuns { runs: vec![run], error: None },
                Err(e) => DataRuns { runs: Vec::new(), error: Some(e) },
            };
        }

        let mut runs = Vec::with_capacity(datasets.len());
        for (index, dataset) in datasets.iter().enumerate() {
            info!(
                "Case [{}] dataset {}/{}: {}",
                case.case_id,
                index + 1,
                datasets.len(),
                serde_json::Value::Object(dataset.clone())
            );
            let outcome = match substitute(case, dataset, self.mode) {
                Ok(substituted) => self.run_steps(page, &substituted, Some(index)).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(run) => runs.push(run),
                Err(e) => return DataRuns { runs, error: Some(e) },
            }
        }
        DataRuns { runs, error: None }
    }

    async fn run_steps(&self, page: &P, case: &Case, dataset: Option<usize>) -> Result<CaseRun> {
        info!("Case [{}] {} started", case.case_id, case.case_name);
        let mut results = Vec::with_capacity(case.steps.len());

        for (index, step) in case.steps.iter().enumerate() {
            let number = index + 1;
            let fail = |message: String, source: Option<HarnessError>| {
                error!("Case [{}] step {} failed: {}", case.case_id, number, message);
                HarnessError::CaseExecution {
                    case_id: case.case_id.clone(),
                    step: Some(number),
                    message,
                    source: source.map(Box::new),
                }
            };

            if step.action.trim().is_empty() {
                return Err(fail("step is missing an action".to_string(), None));
            }
            if !self.registry.contains(&step.action) {
                return Err(fail(
                    format!("step references unknown action [{}]", step.action),
                    None,
                ));
            }

            let args = ActionArgs::new(step.locator.clone(), step.params.clone());
            info!(
                "Case [{}] step {}: {} ({})",
                case.case_id,
                number,
                step.action,
                args.convention()
            );

            match self.registry.execute(&step.action, page, args).await {
                Ok(result) => {
                    if !result.success {
                        warn!(
                            "Case [{}] step {} check failed: {}",
                            case.case_id, number, result.message
                        );
                    }
                    results.push(result);
                }
                Err(e) => {
                    return Err(fail(format!("action [{}] failed", step.action), Some(e)))
                }
            }
        }

        info!("Case [{}] passed", case.case_id);
        Ok(CaseRun {
            case_id: case.case_id.clone(),
            dataset,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{builtin_registry, ActionSpec};
    use crate::browser::BasePage;
    use crate::engine::case::Step;
    use crate::errors::ErrorKind;
    use crate::retry::RetryPolicy;
    use crate::testing::{DriverCall, RecordingDriver};
    use serde_json::json;

    fn setup() -> (Arc<RecordingDriver>, BasePage<RecordingDriver>, CaseEngine<BasePage<RecordingDriver>>) {
        let driver = Arc::new(RecordingDriver::new());
        let page = BasePage::new(driver.clone()).with_retry(RetryPolicy::none());
        let engine = CaseEngine::new(Arc::new(builtin_registry()));
        (driver, page, engine)
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let (driver, page, engine) = setup();
        let case = Case::new("order")
            .with_step(Step::new("open_url").with_param("url", "https://example.com"))
            .with_step(Step::new("input_text").with_locator("id=kw").with_param("text", "Rust"))
            .with_step(Step::new("click").with_locator("id=su"));

        let run = engine.execute(&page, &case).await.unwrap();
        assert_eq!(run.results.len(), 3);
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Open("https://example.com".into()),
                DriverCall::WaitVisible("ID=kw".into()),
                DriverCall::Type("ID=kw".into(), "Rust".into()),
                DriverCall::WaitVisible("ID=su".into()),
                DriverCall::Click("ID=su".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_case_and_keeps_cause() {
        let (driver, page, engine) = setup();
        driver.fail_next("click", 1);
        let case = Case::new("ff")
            .with_step(Step::new("click").with_locator("id=su"))
            .with_step(Step::new("refresh_page"));

        let err = engine.execute(&page, &case).await.unwrap_err();
        match &err {
            HarnessError::CaseExecution { case_id, step, source, .. } => {
                assert_eq!(case_id, "ff");
                assert_eq!(*step, Some(1));
                let source = source.as_deref().unwrap();
                assert_eq!(source.kind(), ErrorKind::ElementOperation);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!driver.calls().contains(&DriverCall::Refresh));
    }

    #[tokio::test]
    async fn test_missing_action_is_reported() {
        let (_, page, engine) = setup();
        let case = Case::new("m").with_step(Step::new(""));
        let err = engine.execute(&page, &case).await.unwrap_err();
        assert!(err.to_string().contains("missing an action"));
    }

    #[tokio::test]
    async fn test_failing_dataset_stops_remaining_datasets() {
        let (driver, page, engine) = setup();
        driver.fail_next("clear_and_type", 1);
        let case = Case::new("d")
            .with_step(Step::new("input_text").with_locator("id=kw").with_param("text", "${kw}"))
            .with_dataset(json!({"kw": "a"}).as_object().cloned().unwrap())
            .with_dataset(json!({"kw": "b"}).as_object().cloned().unwrap());

        assert!(engine.execute_with_data(&page, &case).await.is_err());
        let typed: Vec<DriverCall> = driver
            .calls()
            .into_iter()
            .filter(|c| matches!(c, DriverCall::Type(..)))
            .collect();
        assert_eq!(typed, vec![DriverCall::Type("ID=kw".into(), "a".into())]);
    }

    #[tokio::test]
    async fn test_completed_datasets_survive_a_later_failure() {
        let (driver, page, engine) = setup();
        driver.set_text("ID=title", "Rust in Action");
        let case = Case::new("partial")
            .with_step(
                Step::new("assert_element_contains_text")
                    .with_locator("id=title")
                    .with_param("expected", "${word}"),
            )
            .with_dataset(json!({"word": "Rust"}).as_object().cloned().unwrap())
            .with_dataset(json!({"word": "Go"}).as_object().cloned().unwrap())
            .with_dataset(json!({"word": "Action"}).as_object().cloned().unwrap());

        let outcome = engine.run_datasets(&page, &case).await;
        assert_eq!(outcome.runs.len(), 1);
        assert_eq!(outcome.runs[0].dataset, Some(0));
        let err = outcome.error.unwrap();
        assert_eq!(err.kind(), ErrorKind::CaseExecution);
        assert!(err.chain().contains("Assertion failed"));
    }

    #[tokio::test]
    async fn test_step_error_is_reported_once_in_chain() {
        let (driver, page, engine) = setup();
        driver.fail_next("click", 1);
        let case = Case::new("once").with_step(Step::new("click").with_locator("id=su"));

        let err = engine.execute(&page, &case).await.unwrap_err();
        let chain = err.chain();
        assert!(chain.starts_with("Case [once] step 1 failed: action [click] failed"));
        assert_eq!(chain.matches("Element [ID=su] click failed").count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_arguments_are_step_failures() {
        let (_, page, engine) = setup();
        let case = Case::new("args").with_step(Step::new("click"));
        let err = engine.execute(&page, &case).await.unwrap_err();
        assert!(err.to_string().contains("step 1"));
        assert!(err.chain().contains("a locator is required"));
    }

    #[tokio::test]
    async fn test_negative_check_does_not_fail_step() {
        let (driver, page, engine) = setup();
        driver.set_text("ID=title", "Rust");
        let case = Case::new("v").with_step(
            Step::new("verify_element_contains_text")
                .with_locator("id=title")
                .with_param("expected", "Go"),
        );
        let run = engine.execute(&page, &case).await.unwrap();
        assert!(!run.results[0].success);
        assert!(engine.registry().specs().iter().any(|s: &ActionSpec| s.name == "click"));
    }
}
