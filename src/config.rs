//! On-disk configuration.
//!
//! A single JSON file under the user config directory; every field has
//! a default so a missing or partial file still yields a working
//! setup. The daemon also writes one field back: when the configured
//! primary currency disappears from a fresh rate set, the corrected
//! choice is persisted so later runs do not repeat the fallback.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::convert::currency::DEFAULT_PRIMARY;
use crate::convert::measure::System;
use crate::convert::timestamp::{IconFormatRule, default_icon_formats, default_menu_template};

const CONFIG_DIR: &str = "clipconvd";
const CONFIG_FILE: &str = "config.json";
const RATE_CACHE_FILE: &str = "rates.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("icon_formats must end with a rule that has no less_than_secs threshold")]
    NoDefaultIconFormat,
}

/// Per-converter enable switches. All on by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterToggles {
    pub distance: bool,
    pub weight: bool,
    pub volume: bool,
    pub temperature: bool,
    pub currency: bool,
    pub timestamp: bool,
}

impl Default for ConverterToggles {
    fn default() -> Self {
        Self {
            distance: true,
            weight: true,
            volume: true,
            temperature: true,
            currency: true,
            timestamp: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Exchange-rate feed endpoint.
    pub url: String,
    /// Cache file path; defaults to a sibling of the config file.
    pub cache_file: Option<PathBuf>,
    /// How long a cached rate set counts as fresh, in seconds.
    pub freshness_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            url: "https://open.er-api.com/v6/latest/EUR".into(),
            cache_file: None,
            freshness_secs: 4 * 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which measurement system conversions target.
    pub primary_system: System,
    /// Lowercase ISO code conversions of money target.
    pub primary_currency: String,
    pub converters: ConverterToggles,
    /// Clear the shown conversion when non-matching content arrives.
    pub clear_on_change: bool,
    /// Clear the shown conversion after this many seconds; 0 disables.
    pub clear_timeout_secs: u64,
    /// Clipboard poll interval in milliseconds.
    pub poll_interval_ms: u64,
    pub rates: RatesConfig,
    pub timestamp_icon_formats: Vec<IconFormatRule>,
    pub timestamp_menu_template: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            primary_system: System::Metric,
            primary_currency: DEFAULT_PRIMARY.into(),
            converters: ConverterToggles::default(),
            clear_on_change: true,
            clear_timeout_secs: 0,
            poll_interval_ms: 500,
            rates: RatesConfig::default(),
            timestamp_icon_formats: default_icon_formats(),
            timestamp_menu_template: default_menu_template(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location when `None`. A
    /// missing file yields the defaults; a malformed file is an error
    /// rather than a silent reset.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let config: AppConfig = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                AppConfig::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let has_default = self
            .timestamp_icon_formats
            .last()
            .is_some_and(|r| r.less_than_secs.is_none());
        if !has_default {
            return Err(ConfigError::NoDefaultIconFormat);
        }
        Ok(())
    }

    /// Resolved rate cache path.
    pub fn rate_cache_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.rates.cache_file {
            Some(p) => Ok(p.clone()),
            None => Ok(app_config_dir()?.join(RATE_CACHE_FILE)),
        }
    }

    pub fn clear_timeout(&self) -> Option<std::time::Duration> {
        (self.clear_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.clear_timeout_secs))
    }

    /// Rewrite the config file with a corrected primary currency,
    /// keeping every other field as loaded.
    pub fn persist_primary_currency(
        &mut self,
        path: Option<&Path>,
        currency: &str,
    ) -> Result<(), ConfigError> {
        self.primary_currency = currency.to_lowercase();
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| ConfigError::Write { path, source })
    }
}

fn app_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join(CONFIG_DIR))
        .ok_or(ConfigError::NoConfigDir)
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_config_dir()?.join(CONFIG_FILE))
}
