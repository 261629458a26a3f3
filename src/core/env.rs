use crate::browser::page::BasePage;
use crate::core::{Settings, WebDriver};
use crate::errors::{HarnessError, Result};
use crate::types::EnvType;
use tracing::info;

/// Moves a running session between environments without restarting the
/// browser.
pub struct EnvSwitcher;

impl EnvSwitcher {
    /// Load `target`'s settings from the same configuration directory as
    /// `current`. When a page is given, its base URL is opened and the
    /// landing URL checked against it.
    pub async fn switch<D: WebDriver>(
        current: &Settings,
        target: EnvType,
        page: Option<&BasePage<D>>,
    ) -> Result<Settings> {
        if current.env == target {
            info!("Already in [{}] environment, nothing to switch", target);
            return Ok(current.clone());
        }

        info!("Switching from [{}] to [{}] environment", current.env, target);
        let settings = Settings::load(&current.config_dir, target)?;

        if let Some(page) = page {
            Self::verify_landing(&settings, page).await?;
        }

        info!("Switched to [{}] environment", target);
        Ok(settings)
    }

    /// Switch back after a cross-environment check.
    pub async fn switch_back<D: WebDriver>(
        current: &Settings,
        original: EnvType,
        page: Option<&BasePage<D>>,
    ) -> Result<Settings> {
        Self::switch(current, original, page).await
    }

    async fn verify_landing<D: WebDriver>(settings: &Settings, page: &BasePage<D>) -> Result<()> {
        let base_url = &settings.server.base_url;
        page.open_url(base_url).await?;
        let landed = page.get_current_url().await?;
        if !landed.contains(base_url.as_str()) {
            return Err(HarnessError::env_config(
                settings.env.as_str(),
                format!("expected to land on [{base_url}], browser is at [{landed}]"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DriverCall, RecordingDriver};
    use std::fs;
    use std::sync::Arc;

    fn write_env(root: &std::path::Path, env: &str, base_url: &str) {
        let dir = root.join("env").join(env);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("env_config.yaml"),
            format!("server:\n  base_url: {base_url}\n"),
        )
        .unwrap();
    }

    fn layout() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("global_config.yaml"),
            "browser:\n  type: chrome\nlog:\n  dir: logs\nscreenshot:\n  dir: shots\n",
        )
        .unwrap();
        write_env(dir.path(), "test", "https://test.example.com");
        write_env(dir.path(), "dev", "https://dev.example.com");
        dir
    }

    #[tokio::test]
    async fn test_switch_opens_target_base_url() {
        let dir = layout();
        let current = Settings::load(dir.path(), EnvType::Test).unwrap();
        let driver = Arc::new(RecordingDriver::new());
        let page = BasePage::new(driver.clone());

        let switched = EnvSwitcher::switch(&current, EnvType::Dev, Some(&page))
            .await
            .unwrap();

        assert_eq!(switched.env, EnvType::Dev);
        assert_eq!(switched.server.base_url, "https://dev.example.com");
        assert_eq!(
            driver.calls()[0],
            DriverCall::Open("https://dev.example.com".into())
        );

        let back = EnvSwitcher::switch_back(&switched, EnvType::Test, None::<&BasePage<RecordingDriver>>)
            .await
            .unwrap();
        assert_eq!(back.env, EnvType::Test);
    }

    #[tokio::test]
    async fn test_switch_to_same_env_is_noop() {
        let dir = layout();
        let current = Settings::load(dir.path(), EnvType::Test).unwrap();
        let driver = Arc::new(RecordingDriver::new());
        let page = BasePage::new(driver.clone());

        let same = EnvSwitcher::switch(&current, EnvType::Test, Some(&page))
            .await
            .unwrap();
        assert_eq!(same.env, EnvType::Test);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_switch_to_unconfigured_env_fails() {
        let dir = layout();
        let current = Settings::load(dir.path(), EnvType::Test).unwrap();
        let err = EnvSwitcher::switch(&current, EnvType::Prod, None::<&BasePage<RecordingDriver>>)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::EnvConfig { .. }));
    }
}
