use crate::browser::PageObject;
use crate::engine::{self, Case, CaseEngine};
use crate::errors::{HarnessError, Result};
use crate::report::{CaseOutcome, RunReport};
use crate::retry::RerunPolicy;
use crate::types::EnvType;
use crate::utils::screenshot::ScreenshotManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Resolve case file arguments. A bare file name is looked up in
/// `<data_dir>/<env>/`; a path with a directory part is used as given.
pub fn resolve_case_paths(data_dir: &Path, env: EnvType, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|path| resolve_case_path(data_dir, env, path))
        .collect()
}

fn resolve_case_path(data_dir: &Path, env: EnvType, path: &Path) -> Result<PathBuf> {
    let bare = !path.is_absolute() && path.components().count() == 1;
    if !bare {
        return Ok(path.to_path_buf());
    }

    let resolved = data_dir.join(env.as_str()).join(path);
    if !resolved.is_file() {
        return Err(HarnessError::CaseLoad {
            path: resolved,
            reason: format!("no such case file for the [{env}] environment"),
        });
    }
    Ok(resolved)
}

/// Load every case file, in order.
pub fn load_cases(paths: &[PathBuf]) -> Result<Vec<Case>> {
    let mut cases = Vec::new();
    for path in paths {
        cases.extend(engine::load_suite(path)?);
    }
    Ok(cases)
}

/// Cases carrying `tag`, or all of them without a tag filter.
pub fn select<'a>(cases: &'a [Case], tag: Option<&str>) -> Vec<&'a Case> {
    cases
        .iter()
        .filter(|case| tag.map_or(true, |tag| case.has_tag(tag)))
        .collect()
}

/// Runs a suite case by case. A failed case is rerun per the
/// [`RerunPolicy`], then recorded, and the suite moves on.
pub struct SuiteRunner<P> {
    engine: CaseEngine<P>,
    screenshots: Arc<ScreenshotManager>,
    env: EnvType,
    rerun: RerunPolicy,
}

impl<P: PageObject + 'static> SuiteRunner<P> {
    pub fn new(engine: CaseEngine<P>, screenshots: Arc<ScreenshotManager>, env: EnvType) -> Self {
        Self {
            engine,
            screenshots,
            env,
            rerun: RerunPolicy::none(),
        }
    }

    pub fn with_rerun(mut self, rerun: RerunPolicy) -> Self {
        self.rerun = rerun;
        self
    }

    pub async fn run(&self, page: &P, cases: &[&Case]) -> RunReport {
        let mut report = RunReport::new(self.env);
        info!(
            "Running {} case(s) in [{}] environment, run {}",
            cases.len(),
            self.env,
            report.run_id
        );

        for case in cases {
            let outcome = self.run_case(page, case).await;
            report.record(outcome);
        }

        report.finish();
        let summary = report.summary();
        info!(
            "Run finished: {} passed, {} failed, {} total",
            summary.passed, summary.failed, summary.total
        );
        report
    }

    async fn run_case(&self, page: &P, case: &Case) -> CaseOutcome {
        let started = Instant::now();
        let mut attempt = 1;
        let outcome = loop {
            let data_runs = self.engine.run_datasets(page, case).await;
            let Some(err) = data_runs.error else {
                break CaseOutcome::passed(case, data_runs.runs.len(), started.elapsed());
            };

            error!("{}", err.chain());
            page.base()
                .capture(&format!("case {} failed", case.case_id))
                .await;
            if attempt > self.rerun.reruns {
                break CaseOutcome::failed(case, data_runs.runs.len(), &err, started.elapsed());
            }

            warn!(
                "Rerunning case [{}] in {:?} ({}/{})",
                case.case_id, self.rerun.delay, attempt, self.rerun.reruns
            );
            tokio::time::sleep(self.rerun.delay).await;
            attempt += 1;
        };
        outcome
            .with_attempts(attempt)
            .with_attachments(self.screenshots.take_attachments())
    }
}
