//! Declarative, data-driven browser UI test cases.
//!
//! Case files name actions, locators and parameters; the [`engine`] runs
//! them against a page object through an explicit [`actions`] registry, and
//! the [`browser`] layer drives Chrome with waits, retries and failure
//! screenshots.

pub mod actions;
pub mod browser;
pub mod core;
pub mod engine;
pub mod errors;
pub mod locator;
pub mod pages;
pub mod report;
pub mod retry;
pub mod runner;
pub mod testing;
pub mod types;
pub mod utils;

pub use actions::{builtin_registry, ActionRegistry};
pub use browser::{BasePage, ChromeDriver, PageObject};
pub use crate::core::{Settings, WebDriver};
pub use engine::{Case, CaseEngine, Step, SubstitutionMode};
pub use errors::{ErrorKind, HarnessError, Result};
pub use locator::{Locator, ResolvedLocator, Strategy};
pub use retry::RetryPolicy;
pub use types::*;
