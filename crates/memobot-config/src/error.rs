use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file could not be read.
    #[error("config io error: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config file is not valid JSON5.
    #[error("config syntax error: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged document did not match the config model.
    #[error("config decode error: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A value has the wrong type or an unknown key was found.
    /// `path` is `<layer>:<dotted.path>`.
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },
    /// Fields are individually valid but inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}
