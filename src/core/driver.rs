use crate::errors::Result;
use crate::locator::ResolvedLocator;
use async_trait::async_trait;
use std::time::Duration;

/// Capability contract the page layer drives.
///
/// Implementations report failures as plain driver errors; [`BasePage`]
/// attaches the locator and operation name before they reach the engine.
///
/// [`BasePage`]: crate::browser::BasePage
#[async_trait]
pub trait WebDriver: Send + Sync {
    /// Handle to an element located by `wait_visible`.
    type Element: Send + Sync;

    /// Navigate the current window to a URL
    async fn open(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn refresh(&self) -> Result<()>;

    /// Wait until the element exists and is displayed
    async fn wait_visible(
        &self,
        locator: &ResolvedLocator,
        timeout: Duration,
    ) -> Result<Self::Element>;

    /// Wait until the element is absent or hidden
    async fn wait_invisible(&self, locator: &ResolvedLocator, timeout: Duration) -> Result<()>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Clear the element's current value, then type `text` into it
    async fn clear_and_type(&self, element: &Self::Element, text: &str) -> Result<()>;

    async fn text(&self, element: &Self::Element) -> Result<String>;

    /// Enter a frame, or return to the top document with `None`
    async fn switch_to_frame(&self, frame: Option<&Self::Element>) -> Result<()>;

    /// Focus the most recently opened window and return its URL
    async fn switch_to_newest_window(&self) -> Result<String>;

    /// Capture the viewport as PNG
    async fn screenshot(&self) -> Result<Vec<u8>>;
}
