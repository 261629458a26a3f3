use crate::core::Settings;
use crate::errors::{HarnessError, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `<log.dir>/<env>/caseflow_<env>_<YYYYMMDD>.log`
pub fn log_file_path(settings: &Settings) -> PathBuf {
    let env = settings.env.as_str();
    settings.log.dir.join(env).join(format!(
        "caseflow_{}_{}.log",
        env,
        Local::now().format("%Y%m%d")
    ))
}

/// Install the global subscriber: console plus an append-only log file.
/// `RUST_LOG` overrides `log.level`.
pub fn init(settings: &Settings) -> Result<PathBuf> {
    let path = log_file_path(settings);
    let file = open_log_file(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| {
            HarnessError::env_config(settings.env.as_str(), format!("logging already initialised: {e}"))
        })?;

    info!("Logging to {}", path.display());
    Ok(path)
}

/// Console-only logging for commands that run before configuration exists.
pub fn init_console(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvType;

    #[test]
    fn test_log_file_path_layout() {
        let raw: serde_yaml::Value = serde_yaml::from_str(
            "server:\n  base_url: https://x.example.com\nbrowser:\n  type: chrome\nlog:\n  dir: /var/log/caseflow\nscreenshot:\n  dir: shots\n",
        )
        .unwrap();
        let settings = Settings::from_value(EnvType::Dev, PathBuf::from("config"), raw).unwrap();

        let path = log_file_path(&settings);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(path.starts_with("/var/log/caseflow/dev"));
        assert!(name.starts_with("caseflow_dev_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "caseflow_dev_20260101.log".len());
    }

    #[test]
    fn test_console_init_is_idempotent() {
        init_console("warn");
        init_console("info");
        tracing::warn!("console logging installed");
    }
}
