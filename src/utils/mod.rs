pub mod health;
pub mod javascript;
pub mod logging;
pub mod screenshot;

pub use health::check_env_health;
pub use screenshot::{Attachment, ScreenshotManager};
