use crate::core::secrets::{self, SecretCipher};
use crate::errors::{HarnessError, Result};
use crate::retry::{RerunPolicy, RetryPolicy};
use crate::types::{BrowserType, EnvType, Viewport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Variable consulted when no environment is passed explicitly.
pub const ENV_VAR: &str = "TEST_ENV";

const REQUIRED_KEYS: [&str; 4] = ["server.base_url", "browser.type", "log.dir", "screenshot.dir"];

/// Run configuration, built once per process and shared as `Arc<Settings>`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub env: EnvType,
    pub config_dir: PathBuf,
    pub browser: BrowserSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
    pub screenshot: ScreenshotSettings,
    pub report: ReportSettings,
    pub retry: RetryPolicy,
    pub rerun: RerunPolicy,
    pub data: DataSettings,
    raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    #[serde(rename = "type")]
    pub browser_type: BrowserType,
    pub headless: bool,
    pub viewport: Viewport,
    pub args: Vec<String>,
    /// Seconds
    pub implicitly_wait: u64,
    /// Seconds; default timeout for explicit waits
    pub explicit_wait: u64,
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub base_url: String,
    #[serde(default)]
    pub health_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    pub dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotSettings {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    pub dir: PathBuf,
}

/// Case files live under `<dir>/<env>/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            browser_type: BrowserType::Chrome,
            headless: true,
            viewport: Viewport::default(),
            args: vec![],
            implicitly_wait: 10,
            explicit_wait: 20,
            executable: None,
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reports"),
        }
    }
}

impl BrowserSettings {
    pub fn explicit_wait(&self) -> Duration {
        Duration::from_secs(self.explicit_wait)
    }
}

impl Settings {
    /// Pick the environment: explicit value, then `TEST_ENV`, then `test`.
    pub fn resolve_env(explicit: Option<&str>) -> Result<EnvType> {
        let name = match explicit {
            Some(name) => name.to_string(),
            None => std::env::var(ENV_VAR).unwrap_or_else(|_| EnvType::default().to_string()),
        };
        name.parse::<EnvType>()
            .map_err(|message| HarnessError::env_config(name.clone(), message))
    }

    /// Load and validate `<config_dir>/global_config.yaml`, the environment's
    /// `env_config.yaml` and, when present, its `secret_config.yaml`.
    /// Sections from later files replace earlier ones wholesale.
    pub fn load(config_dir: impl AsRef<Path>, env: EnvType) -> Result<Self> {
        let cipher = SecretCipher::from_env();
        Self::load_with_cipher(config_dir, env, cipher.as_ref())
    }

    pub fn load_with_cipher(
        config_dir: impl AsRef<Path>,
        env: EnvType,
        cipher: Option<&SecretCipher>,
    ) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();
        let env_dir = config_dir.join("env").join(env.as_str());

        let global = read_yaml(env, &config_dir.join("global_config.yaml"), "global")?;
        let core = read_yaml(env, &env_dir.join("env_config.yaml"), "environment")?;

        let secret_path = env_dir.join("secret_config.yaml");
        let secret = if secret_path.exists() {
            let mut secret = read_yaml(env, &secret_path, "secret")?;
            secrets::decrypt_tree(env.as_str(), cipher, &mut secret, "")?;
            secret
        } else {
            Value::Mapping(Mapping::new())
        };

        let mut merged = Mapping::new();
        for layer in [global, core, secret] {
            if let Value::Mapping(map) = layer {
                merged.extend(map);
            }
        }
        merged.insert("env".into(), env.as_str().into());

        let settings = Self::from_value(env, config_dir, Value::Mapping(merged))?;
        info!("Loaded [{}] environment configuration", env);
        Ok(settings)
    }

    /// Build settings from an already merged document.
    pub fn from_value(env: EnvType, config_dir: PathBuf, raw: Value) -> Result<Self> {
        for key in REQUIRED_KEYS {
            let present = lookup(&raw, key).map_or(false, |v| !v.is_null());
            if !present {
                return Err(HarnessError::env_config(
                    env.as_str(),
                    format!("missing required configuration key: {key}"),
                ));
            }
        }

        let browser: BrowserSettings = section(env, &raw, "browser")?;
        let server: ServerSettings = section(env, &raw, "server")?;
        url::Url::parse(&server.base_url).map_err(|e| {
            HarnessError::env_config(
                env.as_str(),
                format!("server.base_url '{}' is not a valid URL: {e}", server.base_url),
            )
        })?;

        let settings = Self {
            env,
            config_dir,
            browser,
            server,
            log: section(env, &raw, "log")?,
            screenshot: section(env, &raw, "screenshot")?,
            report: optional_section(env, &raw, "report")?,
            retry: optional_section(env, &raw, "retry")?,
            rerun: optional_section(env, &raw, "rerun")?,
            data: optional_section(env, &raw, "data")?,
            raw,
        };
        info!("[{}] configuration validated", env);
        Ok(settings)
    }

    /// Dotted-path lookup into the merged document, e.g. `server.base_url`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.raw, key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// `<data.dir>/<env>`
    pub fn env_data_dir(&self) -> PathBuf {
        self.data.dir.join(self.env.as_str())
    }
}

fn read_yaml(env: EnvType, path: &Path, description: &str) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        HarnessError::env_config(
            env.as_str(),
            format!("{description} configuration file {} unavailable: {e}", path.display()),
        )
    })?;
    info!("Loading {} configuration file {}", description, path.display());
    let value: Value = serde_yaml::from_str(&content).map_err(|e| {
        HarnessError::env_config(
            env.as_str(),
            format!("{description} configuration file {} is malformed: {e}", path.display()),
        )
    })?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |node, part| node.get(part))
}

fn section<T: DeserializeOwned>(env: EnvType, raw: &Value, name: &str) -> Result<T> {
    let value = raw.get(name).cloned().unwrap_or(Value::Null);
    serde_yaml::from_value(value).map_err(|e| {
        HarnessError::env_config(env.as_str(), format!("invalid [{name}] section: {e}"))
    })
}

fn optional_section<T: DeserializeOwned + Default>(
    env: EnvType,
    raw: &Value,
    name: &str,
) -> Result<T> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(_) => section(env, raw, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const GLOBAL: &str = r#"
browser:
  type: chrome
  headless: true
  explicit_wait: 15
log:
  dir: ./logs
  level: debug
screenshot:
  dir: ./screenshots
retry:
  max_attempts: 4
  delay_ms: 200
"#;

    fn write_layout(global: &str, env_config: &str, secret: Option<&str>) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("global_config.yaml"), global).unwrap();
        let env_dir = dir.path().join("env").join("test");
        fs::create_dir_all(&env_dir).unwrap();
        fs::write(env_dir.join("env_config.yaml"), env_config).unwrap();
        if let Some(secret) = secret {
            fs::write(env_dir.join("secret_config.yaml"), secret).unwrap();
        }
        dir
    }

    #[test]
    fn test_load_merges_layers() {
        let dir = write_layout(
            GLOBAL,
            "server:\n  base_url: https://test.example.com\n",
            None,
        );
        let settings = Settings::load_with_cipher(dir.path(), EnvType::Test, None).unwrap();

        assert_eq!(settings.env, EnvType::Test);
        assert_eq!(settings.server.base_url, "https://test.example.com");
        assert_eq!(settings.browser.explicit_wait(), Duration::from_secs(15));
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.retry.max_attempts, 4);
        assert_eq!(settings.get_str("env"), Some("test"));
        assert_eq!(settings.get_str("browser.type"), Some("chrome"));
        assert!(settings.get("browser.missing").is_none());
        assert_eq!(settings.report.dir, PathBuf::from("reports"));
        assert_eq!(settings.rerun, RerunPolicy::default());
        assert_eq!(settings.env_data_dir(), PathBuf::from("data/test"));
    }

    #[test]
    fn test_rerun_and_data_sections() {
        let dir = write_layout(
            GLOBAL,
            "server:\n  base_url: https://test.example.com\nrerun:\n  reruns: 0\ndata:\n  dir: /srv/cases\n",
            None,
        );
        let settings = Settings::load_with_cipher(dir.path(), EnvType::Test, None).unwrap();
        assert_eq!(settings.rerun.reruns, 0);
        assert_eq!(settings.env_data_dir(), PathBuf::from("/srv/cases/test"));
    }

    #[test]
    fn test_environment_section_replaces_global_section() {
        let dir = write_layout(
            GLOBAL,
            "server:\n  base_url: https://test.example.com\nlog:\n  dir: /tmp/test-logs\n",
            None,
        );
        let settings = Settings::load_with_cipher(dir.path(), EnvType::Test, None).unwrap();
        assert_eq!(settings.log.dir, PathBuf::from("/tmp/test-logs"));
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn test_secret_layer_is_decrypted() {
        let cipher = SecretCipher::new(&SecretCipher::generate_key()).unwrap();
        let secret = format!("account:\n  password: {}\n", cipher.encrypt("hunter2"));
        let dir = write_layout(
            GLOBAL,
            "server:\n  base_url: https://test.example.com\n",
            Some(&secret),
        );
        let settings =
            Settings::load_with_cipher(dir.path(), EnvType::Test, Some(&cipher)).unwrap();
        assert_eq!(settings.get_str("account.password"), Some("hunter2"));
    }

    #[test]
    fn test_missing_required_key_fails() {
        let dir = write_layout(GLOBAL, "server:\n  health_path: /s\n", None);
        let err = Settings::load_with_cipher(dir.path(), EnvType::Test, None).unwrap_err();
        match err {
            HarnessError::EnvConfig { env, message } => {
                assert_eq!(env, "test");
                assert!(message.contains("server.base_url"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_env_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("global_config.yaml"), GLOBAL).unwrap();
        let err = Settings::load_with_cipher(dir.path(), EnvType::Dev, None).unwrap_err();
        assert!(matches!(err, HarnessError::EnvConfig { .. }));
    }

    #[test]
    fn test_invalid_base_url_fails() {
        let dir = write_layout(GLOBAL, "server:\n  base_url: not a url\n", None);
        assert!(Settings::load_with_cipher(dir.path(), EnvType::Test, None).is_err());
    }

    #[test]
    fn test_resolve_env_explicit_wins() {
        assert_eq!(Settings::resolve_env(Some("prod")).unwrap(), EnvType::Prod);
        assert!(Settings::resolve_env(Some("qa")).is_err());
    }
}
