mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, LogSettings, PartialSettings, ServerSettings, Settings};

/// Default location of the optional configuration file (any format `config` understands).
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Prefix of environment overrides, e.g. `TOPICBUS__SERVER__PORT=6000`.
pub const ENV_PREFIX: &str = "TOPICBUS";

/// Loads the configuration from `path` (optional) and environment variables,
/// then merges it over the default values.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merged(partial))
}

#[cfg(test)]
mod tests;
