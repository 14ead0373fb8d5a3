use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing {0} address for the selected transport")]
    MissingAddress(&'static str),

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("`{0}` must be at least 1")]
    Zero(&'static str),

    #[error("No keys to query")]
    NoKeys,
}
