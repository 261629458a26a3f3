//! In-memory [`WebDriver`] that records every call.
//!
//! Used by the test suites and by `caseflow run --dry-run`, which walks a
//! suite end to end without launching a browser.

use crate::core::WebDriver;
use crate::errors::{HarnessError, Result};
use crate::locator::ResolvedLocator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One recorded driver invocation. Element targets are rendered as
/// `STRATEGY=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Open(String),
    CurrentUrl,
    Refresh,
    WaitVisible(String),
    WaitInvisible(String),
    Click(String),
    Type(String, String),
    Text(String),
    SwitchFrame(Option<String>),
    SwitchWindow,
    Screenshot,
}

#[derive(Debug, Clone)]
pub struct RecordedElement {
    pub target: String,
}

#[derive(Default)]
struct DriverState {
    calls: Vec<DriverCall>,
    failures: HashMap<String, u32>,
    texts: HashMap<String, String>,
    url: String,
}

#[derive(Default)]
pub struct RecordingDriver {
    state: Mutex<DriverState>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` invocations of `operation` fail. Operation
    /// names match the trait methods, e.g. `click`, `wait_visible`.
    pub fn fail_next(&self, operation: &str, times: u32) {
        self.lock().failures.insert(operation.to_string(), times);
    }

    /// Text returned for the element rendered as `target`.
    pub fn set_text(&self, target: &str, text: &str) {
        self.lock().texts.insert(target.to_string(), text.to_string());
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, operation: &str, call: DriverCall) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(HarnessError::Driver(format!("injected {operation} failure")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl WebDriver for RecordingDriver {
    type Element = RecordedElement;

    async fn open(&self, url: &str) -> Result<()> {
        self.record("open", DriverCall::Open(url.to_string()))?;
        self.lock().url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.record("current_url", DriverCall::CurrentUrl)?;
        Ok(self.lock().url.clone())
    }

    async fn refresh(&self) -> Result<()> {
        self.record("refresh", DriverCall::Refresh)
    }

    async fn wait_visible(
        &self,
        locator: &ResolvedLocator,
        _timeout: Duration,
    ) -> Result<Self::Element> {
        let target = locator.to_string();
        self.record("wait_visible", DriverCall::WaitVisible(target.clone()))?;
        Ok(RecordedElement { target })
    }

    async fn wait_invisible(&self, locator: &ResolvedLocator, _timeout: Duration) -> Result<()> {
        self.record("wait_invisible", DriverCall::WaitInvisible(locator.to_string()))
    }

    async fn click(&self, element: &Self::Element) -> Result<()> {
        self.record("click", DriverCall::Click(element.target.clone()))
    }

    async fn clear_and_type(&self, element: &Self::Element, text: &str) -> Result<()> {
        self.record(
            "clear_and_type",
            DriverCall::Type(element.target.clone(), text.to_string()),
        )
    }

    async fn text(&self, element: &Self::Element) -> Result<String> {
        self.record("text", DriverCall::Text(element.target.clone()))?;
        Ok(self
            .lock()
            .texts
            .get(&element.target)
            .cloned()
            .unwrap_or_default())
    }

    async fn switch_to_frame(&self, frame: Option<&Self::Element>) -> Result<()> {
        self.record(
            "switch_to_frame",
            DriverCall::SwitchFrame(frame.map(|f| f.target.clone())),
        )
    }

    async fn switch_to_newest_window(&self) -> Result<String> {
        self.record("switch_to_newest_window", DriverCall::SwitchWindow)?;
        Ok(self.lock().url.clone())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.record("screenshot", DriverCall::Screenshot)?;
        // 1x1 transparent PNG
        Ok(vec![
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78,
            0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00,
            0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
        ])
    }
}
