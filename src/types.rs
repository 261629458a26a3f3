use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvType {
    Dev,
    Test,
    Prod,
}

impl EnvType {
    pub const ALL: [EnvType; 3] = [EnvType::Dev, EnvType::Test, EnvType::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvType::Dev => "dev",
            EnvType::Test => "test",
            EnvType::Prod => "prod",
        }
    }
}

impl Default for EnvType {
    fn default() -> Self {
        EnvType::Test
    }
}

impl fmt::Display for EnvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" => Ok(EnvType::Dev),
            "test" => Ok(EnvType::Test),
            "prod" => Ok(EnvType::Prod),
            other => Err(format!(
                "invalid environment '{other}', supported: dev, test, prod"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    Chrome,
    Firefox,
    Edge,
    Safari,
}

impl BrowserType {
    /// Browsers the CDP backend can drive.
    pub fn is_chromium(&self) -> bool {
        matches!(self, BrowserType::Chrome | BrowserType::Edge)
    }
}

impl FromStr for BrowserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(BrowserType::Chrome),
            "firefox" => Ok(BrowserType::Firefox),
            "edge" => Ok(BrowserType::Edge),
            "safari" => Ok(BrowserType::Safari),
            other => Err(format!("unsupported browser type '{other}'")),
        }
    }
}

/// Case priority, mirrored into the report. Labels outside the known set
/// are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    Blocker,
    Critical,
    High,
    Normal,
    Minor,
    Low,
    Trivial,
    Other(String),
}

impl Priority {
    pub fn as_str(&self) -> &str {
        match self {
            Priority::Blocker => "blocker",
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Minor => "minor",
            Priority::Low => "low",
            Priority::Trivial => "trivial",
            Priority::Other(label) => label,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl From<String> for Priority {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "blocker" => Priority::Blocker,
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "normal" => Priority::Normal,
            "minor" => Priority::Minor,
            "low" => Priority::Low,
            "trivial" => Priority::Trivial,
            _ => Priority::Other(label),
        }
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_type_parsing() {
        assert_eq!("DEV".parse::<EnvType>().unwrap(), EnvType::Dev);
        assert_eq!(" prod ".parse::<EnvType>().unwrap(), EnvType::Prod);
        assert!("staging".parse::<EnvType>().is_err());
        assert_eq!(EnvType::default().to_string(), "test");
    }

    #[test]
    fn test_priority_deserializes_lowercase() {
        let p: Priority = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(p, Priority::Critical);
        let p: Priority = serde_json::from_str("\"Minor\"").unwrap();
        assert_eq!(p, Priority::Minor);
    }

    #[test]
    fn test_unknown_priority_label_is_kept() {
        let p: Priority = serde_json::from_str("\"P1\"").unwrap();
        assert_eq!(p, Priority::Other("P1".into()));
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"P1\"");
        assert_eq!(Priority::Blocker.to_string(), "blocker");
    }
}
