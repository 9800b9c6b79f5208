// src/error.rs
use crate::cert::ChainPath;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertChainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Structural error at {path}: {message}")]
    Structural { path: ChainPath, message: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Crypto error while trying to {context}: {message}")]
    Crypto { context: String, message: String },

    #[error("Certificate not found: {0}")]
    NotFound(ChainPath),
}

pub type Result<T> = std::result::Result<T, CertChainError>;

impl CertChainError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn structural(path: &ChainPath, message: impl Into<String>) -> Self {
        Self::Structural {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn crypto(context: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Crypto {
            context: context.into(),
            message: error.to_string(),
        }
    }
}

/// Builds a `map_err` adapter that tags an openssl or x509 failure with what
/// was being attempted.
pub fn crypto_err<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> CertChainError + '_ {
    move |e| CertChainError::crypto(context, e)
}

impl From<CertChainError> for io::Error {
    fn from(error: CertChainError) -> Self {
        match error {
            CertChainError::Io { path, source } => io::Error::new(
                source.kind(),
                format!("Certificate IO error on {}: {}", path.display(), source),
            ),
            CertChainError::NotFound(path) => io::Error::new(
                io::ErrorKind::NotFound,
                format!("Certificate not found: {}", path),
            ),
            CertChainError::Config(message) => io::Error::new(io::ErrorKind::InvalidInput, message),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
