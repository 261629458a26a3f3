use crate::core::{Settings, WebDriver};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// A file attached to the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

/// Saves failure screenshots under `<screenshot.dir>/<env>/` and remembers
/// them until the runner collects them for the report.
pub struct ScreenshotManager {
    dir: PathBuf,
    env: String,
    attachments: Mutex<Vec<Attachment>>,
}

impl ScreenshotManager {
    pub fn new(dir: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            env: env.into(),
            attachments: Mutex::new(Vec::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let env = settings.env.as_str();
        Self::new(settings.screenshot.dir.join(env), env)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Take a screenshot through the driver and store it.
    pub async fn capture<D: WebDriver + ?Sized>(
        &self,
        driver: &D,
        description: &str,
    ) -> Result<PathBuf> {
        let png = driver.screenshot().await?;
        self.save(description, &png).await
    }

    pub async fn save(&self, description: &str, png: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let captured_at = Utc::now();
        let file_name = format!(
            "{}_{}_{}.png",
            self.env,
            sanitize(description),
            captured_at.format("%Y%m%d_%H%M%S_%3f")
        );
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, png).await?;
        info!("Screenshot saved to {}", path.display());

        self.lock().push(Attachment {
            name: description.to_string(),
            path: path.clone(),
            captured_at,
        });
        Ok(path)
    }

    /// Drain the attachments recorded since the last call.
    pub fn take_attachments(&self) -> Vec<Attachment> {
        std::mem::take(&mut *self.lock())
    }

    /// Remove screenshots left over from a previous run.
    pub fn clear_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            warn!("Screenshot directory {} does not exist, nothing to clear", self.dir.display());
            return Ok(());
        }
        std::fs::remove_dir_all(&self.dir)?;
        std::fs::create_dir_all(&self.dir)?;
        info!("Cleared screenshot directory {}", self.dir.display());
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Attachment>> {
        self.attachments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sanitize(description: &str) -> String {
    let cleaned: String = description
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    let mut name: String = trimmed.chars().take(60).collect();
    if name.is_empty() {
        name.push_str("screenshot");
    }
    name
}
