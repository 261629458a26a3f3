use crate::core::Settings;
use crate::errors::{HarnessError, Result};
use std::time::Duration;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Make sure the environment under test answers before any case runs.
///
/// The base URL must return a success status; the optional health path is
/// only reported.
pub async fn check_env_health(settings: &Settings) -> Result<()> {
    let env = settings.env.as_str();
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let base_url = &settings.server.base_url;
    let response = client.get(base_url).send().await.map_err(|e| {
        HarnessError::env_config(env, format!("base url {base_url} unreachable: {e}"))
    })?;
    if !response.status().is_success() {
        return Err(HarnessError::env_config(
            env,
            format!("base url {base_url} answered {}", response.status()),
        ));
    }
    info!("[{}] base url {} reachable", env, base_url);

    if let Some(path) = &settings.server.health_path {
        let url = url::Url::parse(base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| HarnessError::env_config(env, format!("invalid health path {path}: {e}")))?;
        match client.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("[{}] health check {} passed", env, url)
            }
            Ok(resp) => warn!("[{}] health check {} answered {}", env, url, resp.status()),
            Err(e) => warn!("[{}] health check {} failed: {}", env, url, e),
        }
    }

    Ok(())
}
