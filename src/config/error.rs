use thiserror::Error;

/// Errors raised while loading [`super::StackwatchConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),

    /// The config file's contents are not valid TOML, or a value has
    /// the wrong shape for its field.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
