use crate::core::config::BrowserSettings;
use crate::core::WebDriver;
use crate::errors::{HarnessError, Result};
use crate::locator::{ResolvedLocator, Selector};
use crate::utils::javascript::{decode_outcome, element_script, ElementScript};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn deadline_after(timeout: Duration) -> Result<Instant> {
    Instant::now().checked_add(timeout).ok_or_else(|| {
        HarnessError::Driver(format!("wait timeout {timeout:?} is out of range"))
    })
}

/// Element handle: the selector plus the frame path it was found in.
#[derive(Debug, Clone)]
pub struct ChromeElement {
    frames: Vec<Selector>,
    selector: Selector,
}

/// [`WebDriver`] over a local Chrome/Chromium driven through CDP.
///
/// Elements are located by evaluating CSS or XPath queries in the page, so
/// frame switching only reaches same-origin frames.
pub struct ChromeDriver {
    browser: Browser,
    tab: Mutex<Arc<Tab>>,
    frames: Mutex<Vec<Selector>>,
}

impl ChromeDriver {
    pub fn launch(settings: &BrowserSettings) -> Result<Self> {
        if !settings.browser_type.is_chromium() {
            return Err(HarnessError::Driver(format!(
                "browser type [{:?}] is not supported by the Chrome backend",
                settings.browser_type
            )));
        }

        let window_size_arg = format!(
            "--window-size={},{}",
            settings.viewport.width, settings.viewport.height
        );

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        for arg in &settings.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .path(settings.executable.clone())
            .args(args)
            .build()
            .map_err(|e| HarnessError::Driver(format!("invalid launch options: {e}")))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| HarnessError::Driver(format!("failed to launch Chrome: {e}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| HarnessError::Driver(format!("failed to open a tab: {e}")))?;
        tab.set_default_timeout(Duration::from_secs(settings.implicitly_wait.max(1)));

        info!(
            "Chrome launched (headless: {}, viewport: {}x{})",
            settings.headless, settings.viewport.width, settings.viewport.height
        );

        Ok(Self {
            browser,
            tab: Mutex::new(tab),
            frames: Mutex::new(Vec::new()),
        })
    }

    fn tab(&self) -> Arc<Tab> {
        self.tab
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn frames(&self) -> MutexGuard<'_, Vec<Selector>> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn execute_script(&self, script: &str) -> Result<Value> {
        let result = self
            .tab()
            .evaluate(script, false)
            .map_err(HarnessError::from_driver_error)?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn run_on(&self, frames: &[Selector], selector: &Selector, script: ElementScript) -> Result<Value> {
        let raw = self.execute_script(&element_script(frames, selector, script))?;
        decode_outcome(&raw)
    }

    fn run_on_element(&self, element: &ChromeElement, script: ElementScript) -> Result<Value> {
        self.run_on(&element.frames, &element.selector, script)
    }

    /// Poll the visibility of `selector` until it equals `expected`.
    async fn wait_for_visibility(
        &self,
        selector: &Selector,
        expected: bool,
        timeout: Duration,
    ) -> Result<()> {
        let frames = self.frames().clone();
        let deadline = deadline_after(timeout)?;
        loop {
            // A frame that is still loading reports an error; keep polling.
            let visible = match self.run_on(&frames, selector, ElementScript::IsVisible) {
                Ok(value) => value.as_bool().unwrap_or(false),
                Err(e) => {
                    debug!("visibility probe failed: {}", e);
                    false
                }
            };
            if visible == expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let state = if expected { "visible" } else { "hidden" };
                return Err(HarnessError::Driver(format!(
                    "element did not become {state} within {timeout:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl WebDriver for ChromeDriver {
    type Element = ChromeElement;

    async fn open(&self, url: &str) -> Result<()> {
        let tab = self.tab();
        tab.navigate_to(url)
            .map_err(HarnessError::from_driver_error)?;
        tab.wait_until_navigated()
            .map_err(HarnessError::from_driver_error)?;
        self.frames().clear();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab().get_url())
    }

    async fn refresh(&self) -> Result<()> {
        let tab = self.tab();
        tab.reload(false, None)
            .map_err(HarnessError::from_driver_error)?;
        tab.wait_until_navigated()
            .map_err(HarnessError::from_driver_error)?;
        self.frames().clear();
        Ok(())
    }

    async fn wait_visible(
        &self,
        locator: &ResolvedLocator,
        timeout: Duration,
    ) -> Result<Self::Element> {
        let selector = locator.selector();
        self.wait_for_visibility(&selector, true, timeout).await?;
        Ok(ChromeElement {
            frames: self.frames().clone(),
            selector,
        })
    }

    async fn wait_invisible(&self, locator: &ResolvedLocator, timeout: Duration) -> Result<()> {
        self.wait_for_visibility(&locator.selector(), false, timeout)
            .await
    }

    async fn click(&self, element: &Self::Element) -> Result<()> {
        self.run_on_element(element, ElementScript::Click)?;
        Ok(())
    }

    async fn clear_and_type(&self, element: &Self::Element, text: &str) -> Result<()> {
        self.run_on_element(element, ElementScript::ClearAndFocus)?;
        self.tab()
            .type_str(text)
            .map_err(HarnessError::from_driver_error)?;
        Ok(())
    }

    async fn text(&self, element: &Self::Element) -> Result<String> {
        let value = self.run_on_element(element, ElementScript::Text)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn switch_to_frame(&self, frame: Option<&Self::Element>) -> Result<()> {
        let Some(frame) = frame else {
            self.frames().clear();
            return Ok(());
        };

        let enterable = self
            .run_on_element(frame, ElementScript::IsFrame)?
            .as_bool()
            .unwrap_or(false);
        if !enterable {
            return Err(HarnessError::Driver(
                "element is not a same-origin frame".to_string(),
            ));
        }

        let mut path = frame.frames.clone();
        path.push(frame.selector.clone());
        *self.frames() = path;
        Ok(())
    }

    async fn switch_to_newest_window(&self) -> Result<String> {
        let newest = {
            let tabs = self.browser.get_tabs().lock().map_err(|_| {
                HarnessError::Driver("tab list lock poisoned".to_string())
            })?;
            tabs.last()
                .cloned()
                .ok_or_else(|| HarnessError::Driver("no open windows".to_string()))?
        };
        newest
            .activate()
            .map_err(HarnessError::from_driver_error)?;
        let url = newest.get_url();
        *self
            .tab
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = newest;
        self.frames().clear();
        Ok(url)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab()
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(HarnessError::from_driver_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_rejects_overflowing_timeout() {
        assert!(deadline_after(Duration::from_secs(5)).is_ok());
        let err = deadline_after(Duration::from_secs_f64(1e19)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
