//! Connection and sweep configuration

use crate::error::{ReaperError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Seconds to wait between stopping and deleting a machine.
pub const DEFAULT_PAUSE_SECS: u64 = 3;

/// Everything needed to talk to one account, passed explicitly to the
/// client and engine instead of being read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaperConfig {
    pub sdc_url: String,
    pub account: String,
    pub key_id: String,
    pub key_path: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_pause_secs")]
    pub pause_secs: u64,
}

fn default_pause_secs() -> u64 {
    DEFAULT_PAUSE_SECS
}

impl ReaperConfig {
    pub fn new(
        sdc_url: impl Into<String>,
        account: impl Into<String>,
        key_id: impl Into<String>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sdc_url: sdc_url.into(),
            account: account.into(),
            key_id: key_id.into(),
            key_path: key_path.into(),
            dry_run: false,
            verbose: false,
            pause_secs: DEFAULT_PAUSE_SECS,
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.sdc_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sdc_url.starts_with("https://") || self.sdc_url.starts_with("http://")) {
            return Err(ReaperError::InvalidConfig {
                reason: format!("sdc_url must be an http(s) URL, got {:?}", self.sdc_url),
            });
        }
        if self.account.trim().is_empty() {
            return Err(ReaperError::InvalidConfig {
                reason: "account is required".to_string(),
            });
        }
        if self.key_id.trim().is_empty() {
            return Err(ReaperError::InvalidConfig {
                reason: "key_id is required".to_string(),
            });
        }
        if self.key_path.as_os_str().is_empty() {
            return Err(ReaperError::InvalidConfig {
                reason: "key_path is required".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaperConfig::new("sdc_url", "account", "key_id", "./key");
        assert_eq!(config.sdc_url, "sdc_url");
        assert_eq!(config.account, "account");
        assert_eq!(config.key_id, "key_id");
        assert_eq!(config.key_path, PathBuf::from("./key"));
        assert_eq!(config.pause(), Duration::from_secs(3));
        assert!(!config.dry_run);
        assert!(!config.verbose);
    }

    #[test]
    fn test_validate() {
        let config = ReaperConfig::new("https://cloudapi.example.com/", "ci", "aa:bb", "./key");
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "https://cloudapi.example.com");

        let bad_url = ReaperConfig::new("cloudapi.example.com", "ci", "aa:bb", "./key");
        assert!(matches!(
            bad_url.validate(),
            Err(ReaperError::InvalidConfig { .. })
        ));

        let no_account = ReaperConfig::new("https://cloudapi.example.com", " ", "aa:bb", "./key");
        let error = no_account.validate().unwrap_err();
        assert!(error.to_string().contains("account"));
    }

    #[test]
    fn test_pause_defaults_when_missing_from_json() {
        let config: ReaperConfig = serde_json::from_str(
            r#"{"sdc_url": "https://x", "account": "a", "key_id": "k", "key_path": "/k"}"#,
        )
        .unwrap();
        assert_eq!(config.pause_secs, DEFAULT_PAUSE_SECS);
        assert!(!config.dry_run);
    }
}
