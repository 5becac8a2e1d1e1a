use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Broker configuration not found. Looked in:\n\
        - $ODB_CONFIG_PATH\n\
        - ./broker.yml\n\
        - ./.odb/broker.yml\n\
        - <config dir>/odb/broker.yml"
    )]
    NotFound,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse broker configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid broker configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
