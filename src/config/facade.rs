//! ConfigLoader facade over the layered sources.

use super::sources::{defaults, environment, file};
use super::HarnessConfig;
use config::{Config, ConfigError};
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    /// Precedence: defaults (lowest) -> `config_file` -> environment (highest).
    pub fn load(config_file: Option<&Path>) -> Result<HarnessConfig, ConfigError> {
        let builder = defaults::add_to_builder(Config::builder())?;
        let builder = match config_file {
            Some(path) => file::add_to_builder(builder, path)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        let config: HarnessConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(ConfigError::Message)?;
        Ok(config)
    }
}
