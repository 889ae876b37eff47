use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum ManifoldError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Reporter error: {0}")]
    ReporterError(String),
}

pub type Result<T> = std::result::Result<T, ManifoldError>;
