use std::{fmt, io, path::StripPrefixError};

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MasonError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MasonError {
    #[error("Build tool failure: {0}")]
    Tool(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Corrupt data: {0}")]
    Corrupt(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl From<io::Error> for MasonError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MasonError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => MasonError::PermissionDenied,
            _ => MasonError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<StripPrefixError> for MasonError {
    fn from(src: StripPrefixError) -> MasonError {
        MasonError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for MasonError {
    fn from(src: toml::de::Error) -> MasonError {
        MasonError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for MasonError {
    fn from(src: toml::ser::Error) -> MasonError {
        MasonError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<fmt::Error> for MasonError {
    fn from(x: fmt::Error) -> Self {
        MasonError::Serialization(format!("{x}"))
    }
}
