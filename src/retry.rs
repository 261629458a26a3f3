//! Bounded retry for transient element failures.

use crate::errors::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "delay_ms", rename = "delay_ms")]
    pub delay: Duration,
    #[serde(skip, default = "default_retryable")]
    pub retryable: Vec<ErrorKind>,
}

fn default_retryable() -> Vec<ErrorKind> {
    vec![ErrorKind::ElementOperation]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            retryable: default_retryable(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            ..Default::default()
        }
    }

    /// A policy that invokes the operation exactly once.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable.contains(&kind)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable kind, or
    /// `max_attempts` failures have been seen. The final error is returned
    /// as produced by the operation.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0u32;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.is_retryable(err.kind()) {
                return Err(err);
            }

            attempts += 1;
            warn!(
                operation = operation_name,
                attempt = attempts,
                max_attempts = self.max_attempts,
                "Operation failed: {}",
                err
            );

            if attempts >= self.max_attempts {
                error!(
                    operation = operation_name,
                    "Giving up after {} attempts", attempts
                );
                return Err(err);
            }

            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Case-level reruns: a failed case runs again up to `reruns` more times,
/// `delay` apart. Configured by the `rerun` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerunPolicy {
    pub reruns: u32,
    #[serde(with = "delay_ms", rename = "delay_ms")]
    pub delay: Duration,
}

impl Default for RerunPolicy {
    fn default() -> Self {
        Self {
            reruns: 1,
            delay: Duration::from_secs(2),
        }
    }
}

impl RerunPolicy {
    pub fn new(reruns: u32, delay: Duration) -> Self {
        Self { reruns, delay }
    }

    /// Every case runs exactly once.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

mod delay_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(delay: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(delay.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
