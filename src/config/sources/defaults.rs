//! Built-in defaults, taken from `HarnessConfig::default()`.

use crate::config::HarnessConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(Config::try_from(&HarnessConfig::default())?))
}
