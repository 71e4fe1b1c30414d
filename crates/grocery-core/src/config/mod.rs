//! Engine configuration.
//!
//! [`EngineConfigFile`] is the on-disk form with every field optional.
//! [`EngineConfig`] is the validated form the engine runs with.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::DEFAULT_USER_ID;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MIN_SYNC_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_MIRROR_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_MIRROR_ATTEMPTS: u32 = 10;
/// Confirmation token the backend expects for a full wipe
pub const DEFAULT_CLEAR_ALL_TOKEN: &str = "CLEAR_GROCERY_DATA_2025";

pub const ENV_API_BASE_URL: &str = "GROCERY_API_BASE_URL";
pub const ENV_USER_ID: &str = "GROCERY_USER_ID";

/// Validated engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Backend base URL without trailing slash
    pub api_base_url: String,
    /// Owner stamped on new lists and used for snapshot pulls
    pub user_id: String,
    /// Connect and overall timeout of one backend call
    pub request_timeout: Duration,
    /// `smart_sync` skips when the last sync is more recent than this
    pub min_sync_interval: Duration,
    /// Mirror deliveries allowed to run at once
    pub mirror_concurrency: usize,
    /// Backend rejections (4xx) before an outbox entry is dropped; network
    /// and server failures never count
    pub max_mirror_attempts: u32,
    pub clear_all_token: String,
}

impl EngineConfig {
    /// Defaults for everything but the backend URL
    pub fn new(api_base_url: impl Into<String>) -> Result<Self> {
        let config = Self {
            api_base_url: api_base_url.into(),
            user_id: DEFAULT_USER_ID.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            min_sync_interval: DEFAULT_MIN_SYNC_INTERVAL,
            mirror_concurrency: DEFAULT_MIRROR_CONCURRENCY,
            max_mirror_attempts: DEFAULT_MAX_MIRROR_ATTEMPTS,
            clear_all_token: DEFAULT_CLEAR_ALL_TOKEN.to_string(),
        };
        config.validate()
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    #[must_use]
    pub const fn with_min_sync_interval(mut self, interval: Duration) -> Self {
        self.min_sync_interval = interval;
        self
    }

    /// Normalize and check every field
    pub fn validate(mut self) -> Result<Self> {
        let api_base_url = normalize_text_option(Some(self.api_base_url))
            .ok_or_else(|| Error::InvalidInput("api_base_url must not be empty".to_string()))?;
        if !is_http_url(&api_base_url) {
            return Err(Error::InvalidInput(
                "api_base_url must include http:// or https://".to_string(),
            ));
        }
        self.api_base_url = api_base_url.trim_end_matches('/').to_string();

        self.user_id = normalize_text_option(Some(self.user_id))
            .ok_or_else(|| Error::InvalidInput("user_id must not be empty".to_string()))?;
        self.clear_all_token = normalize_text_option(Some(self.clear_all_token))
            .ok_or_else(|| Error::InvalidInput("clear_all_token must not be empty".to_string()))?;

        if self.request_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.mirror_concurrency == 0 {
            return Err(Error::InvalidInput(
                "mirror_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_mirror_attempts == 0 {
            return Err(Error::InvalidInput(
                "max_mirror_attempts must be at least 1".to_string(),
            ));
        }

        Ok(self)
    }
}

/// Serialized engine settings, as stored in a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sync_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_mirror_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_all_token: Option<String>,
}

impl EngineConfigFile {
    /// Overlay `GROCERY_API_BASE_URL` and `GROCERY_USER_ID` from `lookup`
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = normalize_text_option(lookup(ENV_API_BASE_URL)) {
            self.api_base_url = Some(url);
        }
        if let Some(user_id) = normalize_text_option(lookup(ENV_USER_ID)) {
            self.user_id = Some(user_id);
        }
        self
    }

    /// Fill in defaults and validate
    pub fn resolve(self) -> Result<EngineConfig> {
        let api_base_url = normalize_text_option(self.api_base_url).ok_or_else(|| {
            Error::InvalidInput(format!(
                "api_base_url is not configured (set it in the config file or {ENV_API_BASE_URL})"
            ))
        })?;

        EngineConfig {
            api_base_url,
            user_id: normalize_text_option(self.user_id)
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            request_timeout: self
                .request_timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            min_sync_interval: self
                .min_sync_interval_secs
                .map_or(DEFAULT_MIN_SYNC_INTERVAL, Duration::from_secs),
            mirror_concurrency: self
                .mirror_concurrency
                .unwrap_or(DEFAULT_MIRROR_CONCURRENCY),
            max_mirror_attempts: self
                .max_mirror_attempts
                .unwrap_or(DEFAULT_MAX_MIRROR_ATTEMPTS),
            clear_all_token: normalize_text_option(self.clear_all_token)
                .unwrap_or_else(|| DEFAULT_CLEAR_ALL_TOKEN.to_string()),
        }
        .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_uses_defaults() {
        let config = EngineConfig::new("https://grocery.example.com/").unwrap();
        assert_eq!(config.api_base_url, "https://grocery.example.com");
        assert_eq!(config.user_id, "shared-user");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.min_sync_interval, Duration::from_secs(20));
        assert_eq!(config.mirror_concurrency, 4);
        assert_eq!(config.max_mirror_attempts, 10);
        assert_eq!(config.clear_all_token, "CLEAR_GROCERY_DATA_2025");
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(EngineConfig::new("grocery.example.com").is_err());
        assert!(EngineConfig::new("   ").is_err());

        let config = EngineConfig::new("http://localhost:8080").unwrap();
        assert!(config.clone().with_user_id("  ").validate().is_err());
        let mut zero = config;
        zero.mirror_concurrency = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn file_resolves_with_defaults() {
        let file: EngineConfigFile = serde_json::from_str(
            r#"{"api_base_url":"http://localhost:8080","min_sync_interval_secs":5}"#,
        )
        .unwrap();
        let config = file.resolve().unwrap();
        assert_eq!(config.min_sync_interval, Duration::from_secs(5));
        assert_eq!(config.user_id, "shared-user");
    }

    #[test]
    fn file_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<EngineConfigFile>(r#"{"api_url":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn file_without_url_fails_to_resolve() {
        let error = EngineConfigFile::default().resolve().unwrap_err();
        assert!(error.to_string().contains("GROCERY_API_BASE_URL"));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let file = EngineConfigFile {
            api_base_url: Some("http://file.example.com".to_string()),
            user_id: Some("file-user".to_string()),
            ..EngineConfigFile::default()
        };
        let config = file
            .with_env_overrides(|key| match key {
                ENV_API_BASE_URL => Some("http://env.example.com".to_string()),
                ENV_USER_ID => Some("  ".to_string()),
                _ => None,
            })
            .resolve()
            .unwrap();
        assert_eq!(config.api_base_url, "http://env.example.com");
        assert_eq!(config.user_id, "file-user");
    }
}
