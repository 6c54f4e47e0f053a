// Copyright © 2024 ScribeFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Configuration Module
//!
//! Build configuration for ScribeFlow. Settings come from a TOML file,
//! environment variables and programmatic overrides, applied in that order
//! and validated once at the end. The *site* configuration exposed to
//! templates as `site` is separate: it is YAML, read from `config_file`,
//! or supplied inline through [`Config::site`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use scribeflow::core::config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .with_file("scribeflow.toml")
//!     .with_env_prefix("SCRIBEFLOW_")
//!     .with_override("date_format", "%Y-%m-%d")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.date_format, "%Y-%m-%d");
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use toml::Value as TomlValue;

use crate::core::error::{Result, ScribeFlowError};

/// Token replaced by the post slug in [`Config::post_url_format`].
pub const PRETTY_TOKEN: &str = ":pretty";

/// URL style for flat pages.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UrlFormat {
    /// `about.html` is written to `about/index.html` and linked as `/about`.
    #[default]
    Pretty,
    /// `about.html` keeps its name and is linked as `/about.html`.
    Plain,
}

/// Represents the main configuration structure for a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_file")]
    /// Path of the YAML site configuration exposed to templates as `site`.
    pub config_file: PathBuf,

    #[serde(default = "default_true")]
    /// Renders markdown for posts and markdown pages.
    pub markdown: bool,

    #[serde(default = "default_true")]
    /// Highlights fenced code blocks during markdown rendering.
    pub highlight: bool,

    #[serde(default = "default_date_format")]
    /// `strftime` pattern used for the `date` field of posts and pages.
    pub date_format: String,

    #[serde(default)]
    /// URL template for posts, e.g. `/blog/:pretty`.
    pub post_url_format: Option<String>,

    #[serde(default)]
    /// URL style for flat pages.
    pub url_format: UrlFormat,

    #[serde(default)]
    /// Maximum log level applied for each compile (`error` ... `trace`).
    pub log_level: Option<String>,

    #[serde(default)]
    /// Inline site configuration; takes precedence over `config_file`.
    pub site: Option<JsonValue>,

    #[serde(default)]
    /// Settings used by the command-line build.
    pub build: BuildConfig,
}

/// Settings for a full build from a source directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_source_dir")]
    /// Directory scanned for sources.
    pub source_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    /// Directory compiled pages are written to.
    pub output_dir: PathBuf,

    #[serde(default)]
    /// Minifies written HTML.
    pub minify: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            minify: false,
        }
    }
}

/// Builds a `Config` from a file, the environment and explicit overrides.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<PathBuf>,
    env_prefix: Option<String>,
    overrides: HashMap<String, TomlValue>,
}

impl ConfigBuilder {
    /// Initialises a new `ConfigBuilder` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a TOML configuration file to the builder.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds a prefix for environment variables to override configuration values.
    ///
    /// # Parameters
    /// - `prefix`: The prefix for environment variables (e.g., "SCRIBEFLOW_").
    pub fn with_env_prefix<S: Into<String>>(
        mut self,
        prefix: S,
    ) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Adds a key-value pair to override configuration values.
    ///
    /// Nested build settings use dotted keys such as `build.minify`.
    pub fn with_override<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<TomlValue>,
    {
        _ = self.overrides.insert(key.into(), value.into());
        self
    }

    /// Builds the final configuration by applying all specified settings and overrides.
    pub fn build(self) -> Result<Config> {
        let mut config = if let Some(path) = self.config_file {
            load_from_file(&path)?
        } else {
            Config::default()
        };

        if let Some(prefix) = self.env_prefix {
            apply_env_overrides(&mut config, &prefix)?;
        }

        apply_overrides(&mut config, &self.overrides)?;
        validate_config(&config)?;

        Ok(config)
    }
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }

    /// Parsed `log_level`, if one is configured.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        self.log_level
            .as_deref()
            .and_then(|level| level.parse().ok())
    }

    /// Loads the site configuration exposed to templates as `site`.
    ///
    /// An inline [`Config::site`] wins. Otherwise `config_file` is parsed as
    /// YAML; a missing or malformed file yields an empty mapping.
    pub fn load_site(&self) -> JsonValue {
        if let Some(site) = &self.site {
            return site.clone();
        }

        let empty = JsonValue::Object(Map::new());
        let source = match fs::read_to_string(&self.config_file) {
            Ok(source) => source,
            Err(e) => {
                debug!(
                    "No site config at {}: {}",
                    self.config_file.display(),
                    e
                );
                return empty;
            }
        };

        match serde_yml::from_str::<JsonValue>(&source) {
            Ok(JsonValue::Null) => empty,
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Could not parse site config {}: {}",
                    self.config_file.display(),
                    e
                );
                empty
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            markdown: true,
            highlight: true,
            date_format: default_date_format(),
            post_url_format: None,
            url_format: UrlFormat::default(),
            log_level: None,
            site: None,
            build: BuildConfig::default(),
        }
    }
}

// Internal helper functions

fn load_from_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        ScribeFlowError::config_error(
            format!("Failed to read config file: {}", e),
            Some(path.to_path_buf()),
        )
    })?;

    toml::from_str(&content).map_err(|e| {
        ScribeFlowError::config_error(
            format!("Failed to parse config file: {}", e),
            Some(path.to_path_buf()),
        )
    })
}

fn apply_env_overrides(
    config: &mut Config,
    prefix: &str,
) -> Result<()> {
    for (key, value) in env::vars() {
        // Strip the prefix and ensure no leading underscores remain
        if let Some(stripped) = key.strip_prefix(prefix) {
            let config_key =
                stripped.trim_start_matches('_').to_lowercase();
            apply_config_value(config, &config_key, &value)?;
        }
    }
    Ok(())
}

fn apply_overrides(
    config: &mut Config,
    overrides: &HashMap<String, TomlValue>,
) -> Result<()> {
    for (key, value) in overrides {
        apply_config_value(config, key, value)?;
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    if config.date_format.trim().is_empty() {
        return Err(ScribeFlowError::config_error(
            "date_format cannot be empty",
            None,
        ));
    }

    if let Some(format) = &config.post_url_format {
        if !format.contains(PRETTY_TOKEN) {
            return Err(ScribeFlowError::config_error(
                format!(
                    "post_url_format '{}' must contain '{}'",
                    format, PRETTY_TOKEN
                ),
                None,
            ));
        }
    }

    if let Some(level) = &config.log_level {
        if level.parse::<LevelFilter>().is_err() {
            return Err(ScribeFlowError::config_error(
                format!("Invalid log_level '{}'", level),
                None,
            ));
        }
    }

    Ok(())
}

fn apply_config_value<T: ToString>(
    config: &mut Config,
    key: &str,
    value: &T,
) -> Result<()> {
    let value_str = value.to_string().trim_matches('"').to_string(); // Remove extra quotes
    match key {
        "config_file" => config.config_file = PathBuf::from(value_str),
        "markdown" => config.markdown = parse_bool(key, &value_str)?,
        "highlight" => config.highlight = parse_bool(key, &value_str)?,
        "date_format" => config.date_format = value_str,
        "post_url_format" => {
            config.post_url_format =
                Some(value_str).filter(|v| !v.is_empty());
        }
        "url_format" => {
            config.url_format = match value_str.to_lowercase().as_str() {
                "pretty" => UrlFormat::Pretty,
                "plain" => UrlFormat::Plain,
                other => {
                    return Err(ScribeFlowError::config_error(
                        format!("Invalid url_format '{}'", other),
                        None,
                    ));
                }
            };
        }
        "log_level" => config.log_level = Some(value_str),
        _ => {
            let nested = key
                .split_once('.')
                .or_else(|| key.split_once('_'))
                .filter(|(section, _)| *section == "build");

            if let Some((_, key)) = nested {
                apply_build_value(&mut config.build, key, &value_str)?;
            } else {
                return Err(ScribeFlowError::config_error(
                    format!("Unknown configuration key: {}", key),
                    None,
                ));
            }
        }
    }
    Ok(())
}

fn apply_build_value(
    config: &mut BuildConfig,
    key: &str,
    value: &str,
) -> Result<()> {
    match key {
        "source_dir" => config.source_dir = PathBuf::from(value),
        "output_dir" => config.output_dir = PathBuf::from(value),
        "minify" => config.minify = parse_bool(key, value)?,
        _ => {
            return Err(ScribeFlowError::config_error(
                format!("Unknown build setting: {}", key),
                None,
            ));
        }
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value.parse().map_err(|e| {
        ScribeFlowError::config_error(
            format!("Invalid {} value '{}': {}", key, value, e),
            None,
        )
    })
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_config_file() -> PathBuf {
    PathBuf::from("_config.yml")
}

fn default_date_format() -> String {
    "%B %-d, %Y".to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("_site")
}
