pub mod config;
pub mod driver;
pub mod env;
pub mod secrets;

pub use config::Settings;
pub use driver::WebDriver;
pub use env::EnvSwitcher;
pub use secrets::SecretCipher;
