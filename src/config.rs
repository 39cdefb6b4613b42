// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for vidrun.
//!
//! Stored as JSON at `~/.vidrun/config.json`. Every field has a default, so
//! a partial file (or none at all) is valid input. `VIDRUN_API_KEY` overrides
//! the stored key without being written back on save.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{JobRequest, VideoParams};

/// Environment variable that overrides `api.api_key`.
pub const API_KEY_ENV: &str = "VIDRUN_API_KEY";

pub const DEFAULT_API_BASE: &str = "https://ark.cn-beijing.volces.com/api/v3";
pub const DEFAULT_MODEL: &str = "doubao-seedance-1-0-pro-250528";
pub const DEFAULT_GATEWAY_PORT: u16 = 8090;

/// Keys shorter than this are almost certainly pasted wrong.
const MIN_API_KEY_LEN: usize = 10;

/// Below this the job will usually time out before the remote side finishes.
const MIN_RECOMMENDED_WAIT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model_id: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Polling deadline in seconds
    pub max_wait_time: u64,
    /// Seconds between status queries
    pub poll_interval: u64,
    /// Download the result locally before delivering it
    pub auto_download: bool,
    /// Empty means `~/.vidrun/videos`
    pub download_dir: String,
    /// Keep local files after delivery
    pub keep_video_files: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_wait_time: 600,
            poll_interval: 30,
            auto_download: true,
            download_dir: String::new(),
            keep_video_files: true,
        }
    }
}

/// Local messaging gateway (OneBot-style HTTP API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub port: u16,
    /// Sent as a bearer header and a `token` body field when non-empty
    pub token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GATEWAY_PORT,
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub video: VideoParams,
    pub settings: SettingsConfig,
    pub gateway: GatewayConfig,
    #[serde(skip)]
    env_api_key: Option<String>,
}

/// Result of [`Config::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// `~/.vidrun`, created on first use.
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let dir = home.join(".vidrun");
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
    }
    Ok(dir)
}

/// Default location of the config file.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

impl Config {
    /// Load from the default path, applying the environment override.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        config.env_api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Ok(config)
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Key actually used for requests (environment first).
    pub fn api_key(&self) -> &str {
        self.env_api_key
            .as_deref()
            .unwrap_or(self.api.api_key.as_str())
            .trim()
    }

    /// Override the key in memory only.
    pub fn with_api_key_override(mut self, key: impl Into<String>) -> Self {
        self.env_api_key = Some(key.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.poll_interval)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.settings.max_wait_time)
    }

    /// Directory holding downloaded videos and the catalog.
    ///
    /// Always absolute: artifact paths are handed to the gateway as
    /// `file://` URLs. A relative `download_dir` resolves against the
    /// current directory.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        let configured = self.settings.download_dir.trim();
        if configured.is_empty() {
            return Ok(config_dir()?.join("videos"));
        }
        std::path::absolute(configured)
            .with_context(|| format!("Failed to resolve download_dir {:?}", configured))
    }

    /// Check credentials and parameters before any network call.
    pub fn validate(&self) -> ConfigReport {
        let mut report = ConfigReport::default();

        let key = self.api_key();
        if key.is_empty() {
            report
                .warnings
                .push("API key is not configured, videos cannot be generated".to_string());
        } else if key.chars().count() < MIN_API_KEY_LEN {
            report
                .errors
                .push("API key length looks wrong, it may be misconfigured".to_string());
        }

        let base = self.api.api_base.trim();
        if !base.is_empty() && !base.starts_with("http") {
            report
                .errors
                .push("API base URL must start with http or https".to_string());
        }

        if self.api.model_id.trim().is_empty() {
            report.errors.push("Model ID is not configured".to_string());
        }

        if self.settings.poll_interval == 0 {
            report
                .errors
                .push("settings.poll_interval must be at least 1 second".to_string());
        }

        if self.settings.max_wait_time < MIN_RECOMMENDED_WAIT_SECS {
            report.warnings.push(
                "Max wait time is very short, generation may time out before it finishes"
                    .to_string(),
            );
        }

        if !report.warnings.is_empty() {
            tracing::debug!("Configuration warnings: {:?}", report.warnings);
        }
        if !report.errors.is_empty() {
            tracing::error!("Configuration errors: {:?}", report.errors);
        }

        report
    }

    /// Build the immutable request for one generation.
    pub fn job_request(&self, prompt: &str, model_override: Option<&str>) -> JobRequest {
        let model = model_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.api.model_id.as_str());
        let base = self.api.api_base.trim();
        JobRequest {
            prompt: prompt.trim().to_string(),
            model: model.to_string(),
            params: self.video.clone(),
            api_key: self.api_key().to_string(),
            api_base: if base.is_empty() { DEFAULT_API_BASE } else { base }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config() -> Config {
        Config::default().with_api_key_override("ark-0123456789abcdef")
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.api_base, DEFAULT_API_BASE);
        assert_eq!(config.api.model_id, DEFAULT_MODEL);
        assert_eq!(config.settings.max_wait_time, 600);
        assert_eq!(config.settings.poll_interval, 30);
        assert!(config.settings.auto_download);
        assert!(config.settings.keep_video_files);
        assert_eq!(config.gateway.port, 8090);
        assert_eq!(config.video.ratio, "16:9");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api": {"api_key": "k"}, "settings": {"poll_interval": 5}}"#)
            .expect("write config");

        let config = Config::load_from(&path).expect("load config");
        assert_eq!(config.api.api_key, "k");
        assert_eq!(config.api.model_id, DEFAULT_MODEL);
        assert_eq!(config.settings.poll_interval, 5);
        assert_eq!(config.settings.max_wait_time, 600);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config::load_from(&dir.path().join("nope.json")).expect("load config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_does_not_persist_env_override() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        let mut config = valid_config();
        config.api.model_id = "doubao-seedance-1-5-pro-251215".to_string();
        config.save_to(&path).expect("save config");

        let reloaded = Config::load_from(&path).expect("load config");
        assert_eq!(reloaded.api.model_id, "doubao-seedance-1-5-pro-251215");
        assert_eq!(reloaded.api.api_key, "");
    }

    #[test]
    fn test_storage_dir_is_absolute() {
        let mut config = Config::default();
        config.settings.download_dir = "videos".to_string();
        let dir = config.storage_dir().expect("storage dir");
        assert!(dir.is_absolute());
        assert!(dir.ends_with("videos"));

        config.settings.download_dir = "/srv/videos".to_string();
        assert_eq!(config.storage_dir().expect("storage dir"), PathBuf::from("/srv/videos"));
    }

    #[test]
    fn test_validate_valid() {
        let report = valid_config().validate();
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_validate_errors() {
        let mut config = Config::default().with_api_key_override("short");
        config.api.api_base = "ftp://example.com".to_string();
        config.api.model_id = "  ".to_string();
        let report = config.validate();
        assert_eq!(report.errors.len(), 3);
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = Config::default();
        config.settings.max_wait_time = 30;
        let report = config.validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_job_request_model_override() {
        let config = valid_config();
        let request = config.job_request("  a dog surfing ", None);
        assert_eq!(request.prompt, "a dog surfing");
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.api_key, "ark-0123456789abcdef");

        let request = config.job_request("a dog", Some("doubao-seedance-1-5-pro-251215"));
        assert_eq!(request.model, "doubao-seedance-1-5-pro-251215");
    }
}
