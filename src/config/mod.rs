//! Runtime configuration
//!
//! Read once at startup from a JSON file. Every field has a default, so an
//! empty object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::block::AssetResolver;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid static_url '{0}': must end with '/'")]
    InvalidStaticUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamfieldConfig {
    /// Log floor (default: warn)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,

    /// Prefix for static asset paths (default: "/static/")
    #[serde(default = "default_static_url")]
    pub static_url: String,

    /// Cache-busting token appended to asset URLs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_version: Option<String>,

    /// Directory scanned by the declaration loader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_dir: Option<String>,
}

fn default_log_level() -> Severity {
    Severity::Warn
}

fn default_static_url() -> String {
    "/static/".to_string()
}

impl Default for StreamfieldConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            static_url: default_static_url(),
            asset_version: None,
            declaration_dir: None,
        }
    }
}

impl StreamfieldConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: display.clone(),
                source,
            },
            other => other,
        })?;
        log_event_with_fields(Event::ConfigLoaded, &[("path", display.as_str())]);
        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !self.static_url.ends_with('/') {
            return Err(ConfigError::InvalidStaticUrl(self.static_url.clone()));
        }
        Ok(())
    }

    /// Applies process-wide settings
    pub fn apply(&self) {
        Logger::set_min_severity(self.log_level);
    }

    pub fn static_assets(&self) -> StaticAssets {
        StaticAssets {
            static_url: self.static_url.clone(),
            version: self.asset_version.clone(),
        }
    }
}

/// Resolves logical asset names against the static URL prefix
#[derive(Debug, Clone)]
pub struct StaticAssets {
    static_url: String,
    version: Option<String>,
}

impl AssetResolver for StaticAssets {
    fn resolve(&self, logical_name: &str) -> String {
        match &self.version {
            Some(v) => format!("{}{}?v={}", self.static_url, logical_name, v),
            None => format!("{}{}", self.static_url, logical_name),
        }
    }
}
