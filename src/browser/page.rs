//! Page action layer.
//!
//! [`BasePage`] wraps a [`WebDriver`] with locator resolution, explicit
//! waits, retry on transient element failures and screenshots on failure.
//! Every driver failure leaves this layer as an `ElementOperation` error
//! naming the locator and the operation.

use crate::core::{Settings, WebDriver};
use crate::errors::{HarnessError, Result};
use crate::locator::{Locator, ResolvedLocator};
use crate::retry::RetryPolicy;
use crate::utils::screenshot::ScreenshotManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_EXPLICIT_WAIT: Duration = Duration::from_secs(20);

/// Anything the case engine can drive: a page type that exposes its
/// [`BasePage`].
pub trait PageObject: Send + Sync {
    type Driver: WebDriver;

    fn base(&self) -> &BasePage<Self::Driver>;
}

pub struct BasePage<D: WebDriver> {
    driver: Arc<D>,
    explicit_wait: Duration,
    retry: RetryPolicy,
    screenshots: Option<Arc<ScreenshotManager>>,
}

impl<D: WebDriver> PageObject for BasePage<D> {
    type Driver = D;

    fn base(&self) -> &BasePage<D> {
        self
    }
}

impl<D: WebDriver> BasePage<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            explicit_wait: DEFAULT_EXPLICIT_WAIT,
            retry: RetryPolicy::default(),
            screenshots: None,
        }
    }

    pub fn from_settings(
        driver: Arc<D>,
        settings: &Settings,
        screenshots: Arc<ScreenshotManager>,
    ) -> Self {
        Self::new(driver)
            .with_explicit_wait(settings.browser.explicit_wait())
            .with_retry(settings.retry.clone())
            .with_screenshots(screenshots)
    }

    pub fn with_explicit_wait(mut self, timeout: Duration) -> Self {
        self.explicit_wait = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_screenshots(mut self, screenshots: Arc<ScreenshotManager>) -> Self {
        self.screenshots = Some(screenshots);
        self
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Best-effort screenshot; a capture failure is logged, never returned.
    pub async fn capture(&self, description: &str) -> Option<PathBuf> {
        let manager = self.screenshots.as_ref()?;
        match manager.capture(self.driver.as_ref(), description).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Screenshot for [{}] failed: {}", description, e);
                None
            }
        }
    }

    async fn failure(
        &self,
        target: &str,
        operation: &str,
        cause: impl std::fmt::Display,
    ) -> HarnessError {
        error!("{} [{}] failed: {}", operation, target, cause);
        self.capture(&format!("{operation} [{target}] failed")).await;
        HarnessError::element_operation(target, operation, cause)
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.explicit_wait)
    }

    // ==================== waits ====================

    pub async fn wait_element_visible(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<D::Element> {
        let resolved = locator.parse()?;
        self.visible(&resolved, self.timeout_or_default(timeout)).await
    }

    async fn visible(&self, resolved: &ResolvedLocator, timeout: Duration) -> Result<D::Element> {
        let target = resolved.to_string();
        match self.driver.wait_visible(resolved, timeout).await {
            Ok(element) => {
                info!("Element [{}] visible within {:?}", target, timeout);
                Ok(element)
            }
            Err(e) => Err(self
                .failure(&target, "wait visible", format!("not visible after {timeout:?}: {e}"))
                .await),
        }
    }

    pub async fn wait_element_invisible(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let resolved = locator.parse()?;
        let timeout = self.timeout_or_default(timeout);
        let target = resolved.to_string();
        match self.driver.wait_invisible(&resolved, timeout).await {
            Ok(()) => {
                info!("Element [{}] no longer visible", target);
                Ok(())
            }
            Err(e) => Err(self
                .failure(&target, "wait invisible", format!("still visible after {timeout:?}: {e}"))
                .await),
        }
    }

    // ==================== element operations ====================

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        let resolved = &locator.parse()?;
        self.retry
            .run("click", move || self.click_once(resolved))
            .await
    }

    async fn click_once(&self, resolved: &ResolvedLocator) -> Result<()> {
        let element = self.visible(resolved, self.explicit_wait).await?;
        let target = resolved.to_string();
        match self.driver.click(&element).await {
            Ok(()) => {
                info!("Clicked [{}]", target);
                Ok(())
            }
            Err(e) => Err(self.failure(&target, "click", e).await),
        }
    }

    /// Clear the field, then type `text`.
    pub async fn input_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let resolved = &locator.parse()?;
        self.retry
            .run("input_text", move || self.input_once(resolved, text))
            .await
    }

    async fn input_once(&self, resolved: &ResolvedLocator, text: &str) -> Result<()> {
        let element = self.visible(resolved, self.explicit_wait).await?;
        let target = resolved.to_string();
        match self.driver.clear_and_type(&element, text).await {
            Ok(()) => {
                info!("Typed [{}] into [{}]", text, target);
                Ok(())
            }
            Err(e) => Err(self.failure(&target, "input", e).await),
        }
    }

    /// Visible text of the element, trimmed.
    pub async fn get_element_text(&self, locator: &Locator) -> Result<String> {
        let resolved = locator.parse()?;
        let element = self.visible(&resolved, self.explicit_wait).await?;
        let target = resolved.to_string();
        match self.driver.text(&element).await {
            Ok(text) => {
                let text = text.trim().to_string();
                info!("Element [{}] text: {}", target, text);
                Ok(text)
            }
            Err(e) => Err(self.failure(&target, "get text", e).await),
        }
    }

    pub async fn verify_element_contains_text(
        &self,
        locator: &Locator,
        expected: &str,
    ) -> Result<bool> {
        let actual = self.get_element_text(locator).await?;
        let found = actual.contains(expected);
        let target = locator.describe();
        if found {
            info!("Element [{}] contains [{}]", target, expected);
        } else {
            error!(
                "Element [{}] does not contain [{}], actual text: {}",
                target, expected, actual
            );
        }
        Ok(found)
    }

    /// Like [`verify_element_contains_text`](Self::verify_element_contains_text)
    /// but a mismatch is an `Assertion` error.
    pub async fn assert_element_contains_text(&self, locator: &Locator, expected: &str) -> Result<()> {
        if self.verify_element_contains_text(locator, expected).await? {
            return Ok(());
        }
        let target = locator.describe();
        self.capture(&format!("assert text [{target}] failed")).await;
        Err(HarnessError::Assertion(format!(
            "element [{target}] does not contain [{expected}]"
        )))
    }

    // ==================== frames and windows ====================

    /// Enter the frame matched by `locator`, or return to the top document.
    pub async fn switch_to_iframe(&self, locator: Option<&Locator>) -> Result<()> {
        let Some(locator) = locator else {
            return match self.driver.switch_to_frame(None).await {
                Ok(()) => {
                    info!("Switched to top document");
                    Ok(())
                }
                Err(e) => Err(self.failure("top document", "switch iframe", e).await),
            };
        };

        let resolved = locator.parse()?;
        let frame = self.visible(&resolved, self.explicit_wait).await?;
        let target = resolved.to_string();
        match self.driver.switch_to_frame(Some(&frame)).await {
            Ok(()) => {
                info!("Switched to iframe [{}]", target);
                Ok(())
            }
            Err(e) => Err(self.failure(&target, "switch iframe", e).await),
        }
    }

    pub async fn switch_to_new_window(&self) -> Result<String> {
        match self.driver.switch_to_newest_window().await {
            Ok(url) => {
                info!("Switched to newest window at {}", url);
                Ok(url)
            }
            Err(e) => Err(self.failure("window", "switch window", e).await),
        }
    }

    // ==================== page operations ====================

    pub async fn open_url(&self, url: &str) -> Result<()> {
        match self.driver.open(url).await {
            Ok(()) => {
                info!("Opened {}", url);
                Ok(())
            }
            Err(e) => Err(self.failure(url, "open url", e).await),
        }
    }

    pub async fn get_current_url(&self) -> Result<String> {
        match self.driver.current_url().await {
            Ok(url) => {
                info!("Current URL: {}", url);
                Ok(url)
            }
            Err(e) => Err(self.failure("page", "current url", e).await),
        }
    }

    pub async fn refresh_page(&self) -> Result<()> {
        match self.driver.refresh().await {
            Ok(()) => {
                info!("Page refreshed");
                Ok(())
            }
            Err(e) => Err(self.failure("page", "refresh", e).await),
        }
    }

    pub async fn sleep(&self, duration: Duration) {
        info!("Pausing for {:?}", duration);
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{DriverCall, RecordingDriver};

    fn page(driver: &Arc<RecordingDriver>) -> BasePage<RecordingDriver> {
        BasePage::new(driver.clone())
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
            .with_explicit_wait(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_retries_transient_failures() {
        let driver = Arc::new(RecordingDriver::new());
        driver.fail_next("click", 2);
        let page = page(&driver);

        page.click(&Locator::id("su")).await.unwrap();

        let clicks = driver
            .calls()
            .into_iter()
            .filter(|c| matches!(c, DriverCall::Click(_)))
            .count();
        assert_eq!(clicks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_gives_up_with_element_operation_error() {
        let driver = Arc::new(RecordingDriver::new());
        driver.fail_next("click", 10);
        let err = page(&driver).click(&Locator::id("su")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ElementOperation);
        match err {
            HarnessError::ElementOperation { locator, operation, .. } => {
                assert_eq!(locator, "ID=su");
                assert_eq!(operation, "click");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_locator_is_not_retried() {
        let driver = Arc::new(RecordingDriver::new());
        let err = page(&driver)
            .click(&Locator::compact("su"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LocatorParse);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_input_text_clears_and_types() {
        let driver = Arc::new(RecordingDriver::new());
        page(&driver)
            .input_text(&Locator::compact("id=kw"), "Rust")
            .await
            .unwrap();
        assert!(driver
            .calls()
            .contains(&DriverCall::Type("ID=kw".into(), "Rust".into())));
    }

    #[tokio::test]
    async fn test_verify_and_assert_text() {
        let driver = Arc::new(RecordingDriver::new());
        driver.set_text("XPATH=//h3", "  Rust Programming Language  ");
        let page = page(&driver);
        let title = Locator::xpath("//h3");

        assert_eq!(page.get_element_text(&title).await.unwrap(), "Rust Programming Language");
        assert!(page.verify_element_contains_text(&title, "Rust").await.unwrap());
        assert!(!page.verify_element_contains_text(&title, "Python").await.unwrap());

        let err = page
            .assert_element_contains_text(&title, "Python")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assertion);
    }

    #[tokio::test]
    async fn test_failure_captures_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let screenshots = Arc::new(ScreenshotManager::new(dir.path(), "test"));
        let driver = Arc::new(RecordingDriver::new());
        driver.fail_next("wait_visible", 1);
        let page = page(&driver)
            .with_retry(RetryPolicy::none())
            .with_screenshots(screenshots.clone());

        assert!(page.wait_element_visible(&Locator::id("lg"), None).await.is_err());
        let attachments = screenshots.take_attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].name, "wait visible [ID=lg] failed");
    }

    #[tokio::test]
    async fn test_frames_and_windows() {
        let driver = Arc::new(RecordingDriver::new());
        let page = page(&driver);

        page.switch_to_iframe(Some(&Locator::id("editor"))).await.unwrap();
        page.switch_to_iframe(None).await.unwrap();
        page.switch_to_new_window().await.unwrap();

        let calls = driver.calls();
        assert!(calls.contains(&DriverCall::SwitchFrame(Some("ID=editor".into()))));
        assert!(calls.contains(&DriverCall::SwitchFrame(None)));
        assert!(calls.contains(&DriverCall::SwitchWindow));
    }
}
