//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment variable or field held a value of the wrong shape.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field.
    #[error("missing required field '{field}' (set {env_var} or [{section}] in the config file)")]
    MissingField {
        field: String,
        section: String,
        env_var: String,
    },
}
