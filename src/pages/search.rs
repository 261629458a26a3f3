use crate::actions::{ActionArgs, ActionRegistry, ActionResult, ActionSpec, ParamSpec};
use crate::browser::{BasePage, PageObject};
use crate::core::WebDriver;
use crate::errors::Result;
use crate::locator::Locator;
use std::time::Duration;
use tracing::info;

/// Search home page of the site under test.
pub struct SearchHomePage<D: WebDriver> {
    base: BasePage<D>,
    home_url: String,
}

impl<D: WebDriver> PageObject for SearchHomePage<D> {
    type Driver = D;

    fn base(&self) -> &BasePage<D> {
        &self.base
    }
}

const RESULTS_TIMEOUT: Duration = Duration::from_secs(15);

impl<D: WebDriver> SearchHomePage<D> {
    pub fn new(base: BasePage<D>, home_url: impl Into<String>) -> Self {
        Self {
            base,
            home_url: home_url.into(),
        }
    }

    /// Search box: id first, then the form field name, then CSS.
    pub fn search_input() -> Locator {
        Locator::chain([
            Locator::tagged("id", "kw"),
            Locator::tagged("xpath", "//input[@name='wd']"),
            Locator::tagged("css selector", "#kw"),
        ])
    }

    pub fn search_button() -> Locator {
        Locator::chain([
            Locator::tagged("id", "su"),
            Locator::tagged("xpath", "//input[@type='submit']"),
        ])
    }

    pub fn logo() -> Locator {
        Locator::xpath("//div[@id='lg']/img")
    }

    pub async fn open_home(&self) -> Result<()> {
        self.base.open_url(&self.home_url).await?;
        self.base.wait_element_visible(&Self::logo(), None).await?;
        info!("Search home page opened: {}", self.home_url);
        Ok(())
    }

    /// Type the keyword, submit, and wait for the home page logo to go away.
    pub async fn search(&self, keyword: &str) -> Result<()> {
        self.base.input_text(&Self::search_input(), keyword).await?;
        self.base.click(&Self::search_button()).await?;
        self.base
            .wait_element_invisible(&Self::logo(), Some(RESULTS_TIMEOUT))
            .await
    }
}

impl<D: WebDriver + 'static> SearchHomePage<D> {
    /// Add `open_home` and `search` to a registry for this page.
    pub fn register_actions(registry: &mut ActionRegistry<Self>) {
        registry
            .register_fn(
                ActionSpec::new("open_home", "Open the search home page"),
                |page, _| Box::pin(open_home(page)),
            )
            .register_fn(
                ActionSpec::new("search", "Search for a keyword")
                    .param(ParamSpec::required("keyword")),
                |page, args| Box::pin(search(page, args)),
            );
    }
}

async fn open_home<D: WebDriver>(page: &SearchHomePage<D>) -> Result<ActionResult> {
    page.open_home().await?;
    Ok(ActionResult::success("home page opened"))
}

async fn search<D: WebDriver>(page: &SearchHomePage<D>, args: ActionArgs) -> Result<ActionResult> {
    let keyword = args.text("search", "keyword")?;
    page.search(&keyword).await?;
    Ok(ActionResult::success(format!("searched for {keyword}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::builtin_registry;
    use crate::retry::RetryPolicy;
    use crate::testing::{DriverCall, RecordingDriver};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_search_composite_drives_first_chain_entries() {
        let driver = Arc::new(RecordingDriver::new());
        let page = SearchHomePage::new(
            BasePage::new(driver.clone()).with_retry(RetryPolicy::none()),
            "https://www.example.com",
        );
        let mut registry = builtin_registry::<SearchHomePage<RecordingDriver>>();
        SearchHomePage::register_actions(&mut registry);

        registry
            .execute("search", &page, ActionArgs::none().with_param("keyword", "Rust"))
            .await
            .unwrap();

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::WaitVisible("ID=kw".into()),
                DriverCall::Type("ID=kw".into(), "Rust".into()),
                DriverCall::WaitVisible("ID=su".into()),
                DriverCall::Click("ID=su".into()),
                DriverCall::WaitInvisible("XPATH=//div[@id='lg']/img".into()),
            ]
        );
        assert!(registry.contains("click"));
    }
}
