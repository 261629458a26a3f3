pub mod chrome;
pub mod page;

pub use chrome::{ChromeDriver, ChromeElement};
pub use page::{BasePage, PageObject};
