//! Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `RESUMABLE_`-prefixed environment variables (`__` separates sections, so
//! `RESUMABLE_LIMITS__MAX_STEPS=500` sets `limits.max_steps`).
//!
//! The file is the one passed to [`ConfigBuilder::config_path`], else the one
//! named by `RESUMABLE_CONFIG_PATH`, else `resumable.toml` in the working
//! directory if it exists.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::computation::{Limits, DEFAULT_MAX_STEPS};

pub const CONFIG_PATH_ENV: &str = "RESUMABLE_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "resumable.toml";
const ENV_PREFIX: &str = "RESUMABLE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_steps: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directories searched (recursively) for template files
    pub paths: Vec<PathBuf>,
    /// Template file extension, without the dot
    pub extension: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            extension: "gen".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub templates: TemplatesConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Execution limits for new and restored computations
    pub fn limits(&self) -> Limits {
        Limits {
            max_steps: self.limits.max_steps,
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_steps must be greater than zero".to_string(),
            ));
        }
        if self.templates.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid(
                "templates.extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads a [`Config`] with explicit overrides applied last
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    max_steps: Option<usize>,
    template_paths: Vec<PathBuf>,
    log_level: Option<String>,
}

impl ConfigBuilder {
    /// Read this file instead of searching for one; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Search these directories in addition to the configured ones
    pub fn template_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.template_paths = paths;
        self
    }

    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        let explicit = self
            .config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        builder = match &explicit {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                builder.add_source(config::File::from(path.as_path()).required(true))
            }
            None => builder.add_source(
                config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("templates.paths")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;

        if let Some(max_steps) = self.max_steps {
            config.limits.max_steps = max_steps;
        }
        config.templates.paths.extend(self.template_paths);
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}
