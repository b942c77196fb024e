//! Driver configuration.
//!
//! Options can be built in code or loaded from a `toml`, `json` or `yaml`
//! file with `FOB_DRIVER_*` environment overrides:
//!
//! ```toml
//! log_level = "debug"
//! cache_expiry = 5
//!
//! [output]
//! asset_file_names = "static/[name].[hash:10][extname]"
//! ```

use crate::error::{DriverError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Json, Serialized, Toml, Yaml},
};
use fob_emitter::{AssetOutputOptions, DEFAULT_ASSET_FILE_NAMES, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment variables read by [`DriverOptions::load`].
pub const ENV_PREFIX: &str = "FOB_DRIVER_";

/// Number of builds an untouched cache entry survives.
pub const DEFAULT_CACHE_EXPIRY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    /// Minimum level of plugin logs that reach the log handler.
    pub log_level: LogLevel,
    /// Whether the build runs in watch mode. Exposed to plugins via `meta()`.
    pub watch_mode: bool,
    /// Give plugins a persistent cache. When disabled, cache calls are no-ops.
    pub cache: bool,
    pub cache_expiry: u32,
    pub output: OutputConfig,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            watch_mode: false,
            cache: true,
            cache_expiry: DEFAULT_CACHE_EXPIRY,
            output: OutputConfig::default(),
        }
    }
}

/// Options of one build output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Module format, passed through to `resolve_file_url` and friends.
    pub format: String,
    pub asset_file_names: String,
    pub sanitize_file_names: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "es".to_string(),
            asset_file_names: DEFAULT_ASSET_FILE_NAMES.to_string(),
            sanitize_file_names: true,
        }
    }
}

impl OutputConfig {
    pub fn asset_options(&self) -> AssetOutputOptions {
        AssetOutputOptions::new(self.asset_file_names.as_str())
            .sanitize_file_name(self.sanitize_file_names)
    }
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn watch_mode(mut self, enabled: bool) -> Self {
        self.watch_mode = enabled;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn cache_expiry(mut self, builds: u32) -> Self {
        self.cache_expiry = builds;
        self
    }

    pub fn asset_file_names(mut self, pattern: impl Into<String>) -> Self {
        self.output.asset_file_names = pattern.into();
        self
    }

    /// Load options from defaults, an optional config file and the environment.
    ///
    /// Priority: environment variables > config file > defaults. Nested keys
    /// use a double underscore, e.g. `FOB_DRIVER_OUTPUT__FORMAT=cjs`.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(DriverError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                _ => {
                    return Err(DriverError::InvalidConfig(format!(
                        "unsupported config format: {}",
                        path.display()
                    )));
                }
            };
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let options: Self = figment
            .extract()
            .map_err(|e| DriverError::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Check values that deserialize fine but can't be used.
    pub fn validate(&self) -> Result<()> {
        if self.output.asset_file_names.is_empty() {
            return Err(DriverError::InvalidConfig(
                "output.asset_file_names must not be empty".to_string(),
            ));
        }
        if fob_emitter::pattern::is_path_fragment(&self.output.asset_file_names) {
            return Err(DriverError::InvalidConfig(format!(
                "output.asset_file_names \"{}\" must be a relative pattern without a leading \"./\" or \"/\"",
                self.output.asset_file_names
            )));
        }
        Ok(())
    }
}
