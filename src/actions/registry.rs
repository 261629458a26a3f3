use crate::actions::base::{Action, ActionArgs, ActionResult, ActionSpec};
use crate::errors::{HarnessError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Future returned by closures passed to [`ActionRegistry::register_fn`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<ActionResult>> + Send + 'a>>;

/// Registry for the actions case steps can name
pub struct ActionRegistry<P> {
    actions: BTreeMap<String, Arc<dyn Action<P>>>,
}

struct FnAction<F> {
    spec: ActionSpec,
    handler: F,
}

#[async_trait]
impl<P, F> Action<P> for FnAction<F>
where
    P: Send + Sync + 'static,
    F: for<'a> Fn(&'a P, ActionArgs) -> ActionFuture<'a> + Send + Sync,
{
    fn spec(&self) -> &ActionSpec {
        &self.spec
    }

    async fn invoke(&self, page: &P, args: ActionArgs) -> Result<ActionResult> {
        (self.handler)(page, args).await
    }
}

impl<P: Send + Sync + 'static> ActionRegistry<P> {
    pub fn new() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Register a new action, replacing any action of the same name
    pub fn register<A: Action<P> + 'static>(&mut self, action: A) -> &mut Self {
        let name = action.name().to_string();
        self.actions.insert(name, Arc::new(action));
        self
    }

    /// Register an async closure under `spec`.
    pub fn register_fn<F>(&mut self, spec: ActionSpec, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a P, ActionArgs) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        self.register(FnAction { spec, handler })
    }

    /// Get an action by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action<P>>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn list(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    pub fn specs(&self) -> Vec<ActionSpec> {
        self.actions.values().map(|a| a.spec().clone()).collect()
    }

    /// Validate `args` against the action's signature, then run it.
    pub async fn execute(&self, name: &str, page: &P, args: ActionArgs) -> Result<ActionResult> {
        let action = self.get(name).ok_or_else(|| HarnessError::InvalidArguments {
            action: name.to_string(),
            reason: "no such action is registered".to_string(),
        })?;

        action.spec().validate(&args)?;

        let start_time = std::time::Instant::now();
        let result = action.invoke(page, args).await?;
        let execution_time = start_time.elapsed().as_millis() as u64;
        debug!("Action [{}] finished in {} ms", name, execution_time);

        Ok(result.with_execution_time(execution_time))
    }
}

impl<P: Send + Sync + 'static> Default for ActionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::base::ParamSpec;
    use crate::errors::ErrorKind;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Notebook {
        lines: Mutex<Vec<String>>,
    }

    async fn write(page: &Notebook, args: ActionArgs) -> Result<ActionResult> {
        let line = args.text("write", "line")?;
        page.lines.lock().unwrap().push(line);
        Ok(ActionResult::success("written"))
    }

    fn registry() -> ActionRegistry<Notebook> {
        let mut registry = ActionRegistry::<Notebook>::new();
        registry.register_fn(
            ActionSpec::new("write", "Append a line").param(ParamSpec::required("line")),
            |page, args| Box::pin(write(page, args)),
        );
        registry
    }

    #[tokio::test]
    async fn test_execute_runs_registered_closure() {
        let registry = registry();
        let page = Notebook::default();

        let result = registry
            .execute("write", &page, ActionArgs::none().with_param("line", "hello"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(*page.lines.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(registry.list(), vec!["write".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_parameter_is_rejected_before_invocation() {
        let registry = registry();
        let page = Notebook::default();

        let err = registry
            .execute(
                "write",
                &page,
                ActionArgs::none().with_param("line", "a").with_param("colour", "red"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaseExecution);
        assert!(page.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_action() {
        let registry = registry();
        let err = registry
            .execute("erase", &Notebook::default(), ActionArgs::none())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("erase"));
    }
}
