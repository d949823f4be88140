// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User settings loaded from `settings.toml` in the state directory.
//!
//! Every field is optional; an absent file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use kx_adapters::{ChatConfig, ChatProvider};
use kx_engine::ScanConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid settings in {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Namespaces listed in scans but never sent for analysis
    pub ignored_namespaces: Vec<String>,
    pub ai: AiSettings,
    pub scan: ScanSettings,
    /// Clusters connected at startup
    pub clusters: Vec<ClusterSettings>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiSettings {
    pub provider: ChatProvider,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: ChatProvider::default(),
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSettings {
    pub fetch_timeout_secs: u64,
    pub log_cap: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self { fetch_timeout_secs: 60, log_cap: kx_core::DEFAULT_LOG_CAP }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSettings {
    pub id: String,
    /// Ambient kubeconfig when absent
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Io(path.to_path_buf(), e)),
        };
        Self::parse(&text).map_err(|e| SettingsError::Parse(path.to_path_buf(), e))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            provider: self.ai.provider,
            model: self.ai.model.clone(),
            base_url: self.ai.base_url.clone(),
            api_key: self.ai.api_key_env.as_deref().and_then(crate::env::api_key),
            timeout: Duration::from_secs(self.ai.timeout_secs),
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::default()
            .fetch_timeout(Duration::from_secs(self.scan.fetch_timeout_secs))
            .log_cap(self.scan.log_cap)
            .ignored_namespaces(self.ignored_namespaces.clone())
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
