//! Page operations every case file can name.

use crate::actions::base::{ActionArgs, ActionResult, ActionSpec, ParamSpec};
use crate::actions::registry::ActionRegistry;
use crate::browser::PageObject;
use crate::errors::{HarnessError, Result};
use serde_json::Value;
use std::time::Duration;

/// Registry with every [`BasePage`](crate::browser::BasePage) operation
/// registered under its case-file name. Page types add their own composite
/// actions on top.
pub fn builtin_registry<P: PageObject + 'static>() -> ActionRegistry<P> {
    let mut registry = ActionRegistry::<P>::new();
    registry
        .register_fn(
            ActionSpec::new("open_url", "Navigate to a URL").param(ParamSpec::required("url")),
            |page, args| Box::pin(open_url(page, args)),
        )
        .register_fn(
            ActionSpec::new("get_current_url", "Read the current URL"),
            |page, _| Box::pin(get_current_url(page)),
        )
        .register_fn(
            ActionSpec::new("refresh_page", "Reload the current page"),
            |page, _| Box::pin(refresh_page(page)),
        )
        .register_fn(
            ActionSpec::new("wait_element_visible", "Wait until an element is displayed")
                .with_locator()
                .param(ParamSpec::optional("timeout")),
            |page, args| Box::pin(wait_element_visible(page, args)),
        )
        .register_fn(
            ActionSpec::new("wait_element_invisible", "Wait until an element is hidden or gone")
                .with_locator()
                .param(ParamSpec::optional("timeout")),
            |page, args| Box::pin(wait_element_invisible(page, args)),
        )
        .register_fn(
            ActionSpec::new("click", "Click an element").with_locator(),
            |page, args| Box::pin(click(page, args)),
        )
        .register_fn(
            ActionSpec::new("input_text", "Clear a field and type into it")
                .with_locator()
                .param(ParamSpec::required("text")),
            |page, args| Box::pin(input_text(page, args)),
        )
        .register_fn(
            ActionSpec::new("get_element_text", "Read an element's text").with_locator(),
            |page, args| Box::pin(get_element_text(page, args)),
        )
        .register_fn(
            ActionSpec::new(
                "verify_element_contains_text",
                "Check an element's text; a mismatch is reported, not fatal",
            )
            .with_locator()
            .param(ParamSpec::required("expected")),
            |page, args| Box::pin(verify_element_contains_text(page, args)),
        )
        .register_fn(
            ActionSpec::new(
                "assert_element_contains_text",
                "Fail the step unless an element's text contains the expected value",
            )
            .with_locator()
            .param(ParamSpec::required("expected")),
            |page, args| Box::pin(assert_element_contains_text(page, args)),
        )
        .register_fn(
            ActionSpec::new("switch_to_iframe", "Enter a frame, or the top document without a locator")
                .with_optional_locator(),
            |page, args| Box::pin(switch_to_iframe(page, args)),
        )
        .register_fn(
            ActionSpec::new("switch_to_new_window", "Focus the most recently opened window"),
            |page, _| Box::pin(switch_to_new_window(page)),
        )
        .register_fn(
            ActionSpec::new("sleep", "Pause for a number of seconds")
                .param(ParamSpec::required("seconds")),
            |page, args| Box::pin(sleep(page, args)),
        );
    registry
}

fn seconds(action: &str, name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| HarnessError::InvalidArguments {
        action: action.to_string(),
        reason: format!("parameter [{name}] must be a non-negative number of seconds: {e}"),
    })
}

fn timeout(action: &str, args: &ActionArgs) -> Result<Option<Duration>> {
    args.optional::<f64>(action, "timeout")?
        .map(|secs| seconds(action, "timeout", secs))
        .transpose()
}

async fn open_url<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let url = args.text("open_url", "url")?;
    page.base().open_url(&url).await?;
    Ok(ActionResult::success(format!("opened {url}")))
}

async fn get_current_url<P: PageObject>(page: &P) -> Result<ActionResult> {
    let url = page.base().get_current_url().await?;
    Ok(ActionResult::success_with_data("current url", Value::String(url)))
}

async fn refresh_page<P: PageObject>(page: &P) -> Result<ActionResult> {
    page.base().refresh_page().await?;
    Ok(ActionResult::success("page refreshed"))
}

async fn wait_element_visible<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let name = "wait_element_visible";
    let timeout = timeout(name, &args)?;
    let locator = args.locator(name)?;
    page.base().wait_element_visible(locator, timeout).await?;
    Ok(ActionResult::success(format!("{} visible", locator.describe())))
}

async fn wait_element_invisible<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let name = "wait_element_invisible";
    let timeout = timeout(name, &args)?;
    let locator = args.locator(name)?;
    page.base().wait_element_invisible(locator, timeout).await?;
    Ok(ActionResult::success(format!("{} hidden", locator.describe())))
}

async fn click<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let locator = args.locator("click")?;
    page.base().click(locator).await?;
    Ok(ActionResult::success(format!("clicked {}", locator.describe())))
}

async fn input_text<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let text = args.text("input_text", "text")?;
    let locator = args.locator("input_text")?;
    page.base().input_text(locator, &text).await?;
    Ok(ActionResult::success(format!("typed into {}", locator.describe())))
}

async fn get_element_text<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let locator = args.locator("get_element_text")?;
    let text = page.base().get_element_text(locator).await?;
    Ok(ActionResult::success_with_data(
        format!("text of {}", locator.describe()),
        Value::String(text),
    ))
}

async fn verify_element_contains_text<P: PageObject>(
    page: &P,
    args: ActionArgs,
) -> Result<ActionResult> {
    let name = "verify_element_contains_text";
    let expected = args.text(name, "expected")?;
    let locator = args.locator(name)?;
    let found = page
        .base()
        .verify_element_contains_text(locator, &expected)
        .await?;
    let message = format!("{} contains [{}]: {}", locator.describe(), expected, found);
    let result = if found {
        ActionResult::success(message)
    } else {
        ActionResult::failure(message)
    };
    Ok(ActionResult {
        data: Some(Value::Bool(found)),
        ..result
    })
}

async fn assert_element_contains_text<P: PageObject>(
    page: &P,
    args: ActionArgs,
) -> Result<ActionResult> {
    let name = "assert_element_contains_text";
    let expected = args.text(name, "expected")?;
    let locator = args.locator(name)?;
    page.base()
        .assert_element_contains_text(locator, &expected)
        .await?;
    Ok(ActionResult::success(format!(
        "{} contains [{}]",
        locator.describe(),
        expected
    )))
}

async fn switch_to_iframe<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    page.base().switch_to_iframe(args.locator.as_ref()).await?;
    Ok(ActionResult::success(match &args.locator {
        Some(locator) => format!("entered frame {}", locator.describe()),
        None => "returned to top document".to_string(),
    }))
}

async fn switch_to_new_window<P: PageObject>(page: &P) -> Result<ActionResult> {
    let url = page.base().switch_to_new_window().await?;
    Ok(ActionResult::success_with_data("switched window", Value::String(url)))
}

async fn sleep<P: PageObject>(page: &P, args: ActionArgs) -> Result<ActionResult> {
    let secs = args.required::<f64>("sleep", "seconds")?;
    let duration = seconds("sleep", "seconds", secs)?;
    page.base().sleep(duration).await;
    Ok(ActionResult::success(format!("slept {duration:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BasePage;
    use crate::errors::ErrorKind;
    use crate::retry::RetryPolicy;
    use crate::testing::{DriverCall, RecordingDriver};
    use std::sync::Arc;

    fn page(driver: &Arc<RecordingDriver>) -> BasePage<RecordingDriver> {
        BasePage::new(driver.clone()).with_retry(RetryPolicy::none())
    }

    #[test]
    fn test_every_page_operation_is_registered() {
        let registry = builtin_registry::<BasePage<RecordingDriver>>();
        for name in [
            "open_url",
            "get_current_url",
            "refresh_page",
            "wait_element_visible",
            "wait_element_invisible",
            "click",
            "input_text",
            "get_element_text",
            "verify_element_contains_text",
            "assert_element_contains_text",
            "switch_to_iframe",
            "switch_to_new_window",
            "sleep",
        ] {
            assert!(registry.contains(name), "{name} not registered");
        }
    }

    #[tokio::test]
    async fn test_input_text_dispatches_to_page() {
        let driver = Arc::new(RecordingDriver::new());
        let registry = builtin_registry::<BasePage<RecordingDriver>>();
        let args = ActionArgs::none()
            .with_locator("id=kw")
            .with_param("text", "Python");

        registry.execute("input_text", &page(&driver), args).await.unwrap();
        assert!(driver
            .calls()
            .contains(&DriverCall::Type("ID=kw".into(), "Python".into())));
    }

    #[tokio::test]
    async fn test_verify_mismatch_is_reported_not_raised() {
        let driver = Arc::new(RecordingDriver::new());
        driver.set_text("ID=title", "Rust");
        let registry = builtin_registry::<BasePage<RecordingDriver>>();
        let args = ActionArgs::none()
            .with_locator("id=title")
            .with_param("expected", "Go");

        let result = registry
            .execute("verify_element_contains_text", &page(&driver), args)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.data, Some(Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_assert_mismatch_fails() {
        let driver = Arc::new(RecordingDriver::new());
        driver.set_text("ID=title", "Rust");
        let registry = builtin_registry::<BasePage<RecordingDriver>>();
        let args = ActionArgs::none()
            .with_locator("id=title")
            .with_param("expected", "Go");

        let err = registry
            .execute("assert_element_contains_text", &page(&driver), args)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assertion);
    }

    #[tokio::test]
    async fn test_get_current_url_returns_data() {
        let driver = Arc::new(RecordingDriver::new());
        let page = page(&driver);
        let registry = builtin_registry::<BasePage<RecordingDriver>>();

        registry
            .execute(
                "open_url",
                &page,
                ActionArgs::none().with_param("url", "https://www.example.com"),
            )
            .await
            .unwrap();
        let result = registry
            .execute("get_current_url", &page, ActionArgs::none())
            .await
            .unwrap();
        assert_eq!(result.data, Some(Value::from("https://www.example.com")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_sleep_is_invalid() {
        let driver = Arc::new(RecordingDriver::new());
        let registry = builtin_registry::<BasePage<RecordingDriver>>();
        let err = registry
            .execute("sleep", &page(&driver), ActionArgs::none().with_param("seconds", -1))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidArguments { .. }));
    }
}
