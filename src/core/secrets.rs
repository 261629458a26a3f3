use crate::errors::{HarnessError, Result};
use fernet::Fernet;
use serde_yaml::Value;
use tracing::debug;

/// Environment variable holding the Fernet key for `ENC(...)` values.
pub const ENCRYPT_KEY_VAR: &str = "ENCRYPT_KEY";

/// Decrypts `ENC(<token>)` values in secret configuration files.
pub struct SecretCipher {
    fernet: Fernet,
}

impl SecretCipher {
    pub fn new(key: &str) -> Option<Self> {
        Fernet::new(key.trim()).map(|fernet| Self { fernet })
    }

    pub fn from_env() -> Option<Self> {
        std::env::var(ENCRYPT_KEY_VAR)
            .ok()
            .and_then(|key| Self::new(&key))
    }

    pub fn generate_key() -> String {
        Fernet::generate_key()
    }

    /// Produce the `ENC(...)` form of a plaintext secret.
    pub fn encrypt(&self, plaintext: &str) -> String {
        format!("ENC({})", self.fernet.encrypt(plaintext.as_bytes()))
    }

    pub fn decrypt_token(&self, token: &str) -> Option<String> {
        let bytes = self.fernet.decrypt(token).ok()?;
        String::from_utf8(bytes).ok()
    }
}

fn encrypted_token(value: &str) -> Option<&str> {
    value.strip_prefix("ENC(")?.strip_suffix(')')
}

/// Whether any string in the tree is in `ENC(...)` form.
pub fn contains_encrypted(value: &Value) -> bool {
    match value {
        Value::String(s) => encrypted_token(s).is_some(),
        Value::Mapping(map) => map.values().any(contains_encrypted),
        Value::Sequence(items) => items.iter().any(contains_encrypted),
        _ => false,
    }
}

/// Decrypt every `ENC(...)` string in place. `path` names the current key
/// for error messages.
pub fn decrypt_tree(
    env: &str,
    cipher: Option<&SecretCipher>,
    value: &mut Value,
    path: &str,
) -> Result<()> {
    match value {
        Value::String(s) => {
            let Some(token) = encrypted_token(s) else {
                return Ok(());
            };
            let cipher = cipher.ok_or_else(|| {
                HarnessError::env_config(
                    env,
                    format!("secret [{path}] is encrypted but {ENCRYPT_KEY_VAR} is not set or invalid"),
                )
            })?;
            let plain = cipher.decrypt_token(token).ok_or_else(|| {
                HarnessError::env_config(env, format!("failed to decrypt secret [{path}]"))
            })?;
            debug!("Decrypted secret [{}]", path);
            *s = plain;
        }
        Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                let key = key.as_str().unwrap_or("?");
                let child_path = if path.is_empty() {
                    key.to_string()
                } else {
                    format!("{path}.{key}")
                };
                decrypt_tree(env, cipher, child, &child_path)?;
            }
        }
        Value::Sequence(items) => {
            for (i, child) in items.iter_mut().enumerate() {
                decrypt_tree(env, cipher, child, &format!("{path}[{i}]"))?;
            }
        }
        _ => {}
    }
    Ok(())
}
