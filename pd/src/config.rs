//! Configuration loading
//!
//! YAML with kebab-case keys. Every section has defaults, so an empty file
//! (or no file at all) is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use stencil::{AutoEscape, Limits};
use tracing::{debug, info, warn};

const APP_NAME: &str = "promptdaemon";
const LOCAL_CONFIG: &str = ".promptdaemon.yml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level, overridden by --log-level
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    pub storage: StorageConfig,

    /// Limits and escaping for prompt templates
    pub sandbox: SandboxConfig,

    /// Content policy registered as a filter in the sandbox
    pub policy: PolicyConfig,

    pub views: ViewsConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path, if given (errors are fatal)
    /// 2. `./.promptdaemon.yml`
    /// 3. `~/.config/promptdaemon/promptdaemon.yml`
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "load: called");
        if let Some(path) = config_path {
            let config =
                Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
            config.validate()?;
            return Ok(config);
        }

        for candidate in Self::default_locations() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => {
                    config.validate()?;
                    return Ok(config);
                }
                Err(e) => {
                    warn!("Failed to load config from {}: {:#}", candidate.display(), e);
                }
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Any failure yields None; the full `load` reports it afterwards.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::default_locations(),
        };
        candidates
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn default_locations() -> Vec<PathBuf> {
        let mut locations = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(config_dir) = dirs::config_dir() {
            locations.push(config_dir.join(APP_NAME).join(format!("{}.yml", APP_NAME)));
        }
        locations
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("validate: called");
        if self.policy.filter_name.trim().is_empty() {
            return Err(eyre!("policy.filter-name must not be empty"));
        }
        if self.sandbox.cache_capacity == 0 {
            return Err(eyre!("sandbox.cache-capacity must be greater than zero"));
        }
        let limits = self.sandbox.limits();
        if limits.max_iterations == 0 || limits.max_output_bytes == 0 || limits.max_range == 0 {
            return Err(eyre!(
                "sandbox limits must be greater than zero (max-iterations, max-output-bytes, max-range)"
            ));
        }
        Ok(())
    }
}

/// Where prompt records are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the store database
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // ~/.local/share/promptdaemon/store on Linux
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("store");
        Self { path }
    }
}

/// Sandbox rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    #[serde(rename = "auto-escape")]
    pub auto_escape: AutoEscape,

    #[serde(rename = "max-iterations")]
    pub max_iterations: usize,

    #[serde(rename = "max-output-bytes")]
    pub max_output_bytes: usize,

    #[serde(rename = "max-range")]
    pub max_range: usize,

    /// Compiled templates kept in memory
    #[serde(rename = "cache-capacity")]
    pub cache_capacity: usize,
}

impl SandboxConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            max_iterations: self.max_iterations,
            max_output_bytes: self.max_output_bytes,
            max_range: self.max_range,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            auto_escape: AutoEscape::None,
            max_iterations: limits.max_iterations,
            max_output_bytes: limits.max_output_bytes,
            max_range: limits.max_range,
            cache_capacity: 256,
        }
    }
}

/// Content policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Name templates use to apply the policy, e.g. `{{ x | check_profanity }}`
    #[serde(rename = "filter-name")]
    pub filter_name: String,

    /// Terms matched case-insensitively anywhere in a value
    #[serde(rename = "banned-terms")]
    pub banned_terms: Vec<String>,

    /// Message returned to the caller on a match
    pub message: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            filter_name: "check_profanity".to_string(),
            banned_terms: vec!["fuck".to_string()],
            message: "don't curse pls".to_string(),
        }
    }
}

/// HTML view settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Directory with `index.html` / `prompt.html` overrides
    pub dir: Option<PathBuf>,
}
