use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for every fallible operation in the engine.
///
/// Each variant corresponds to one of the component boundaries: config
/// loading, scanning, parsing, the on-disk store, the cache layer, the
/// dependency resolver, and analytical queries. CLI commands match on the
/// variant to decide an exit code and print a single remediation hint.
#[derive(Debug, Error)]
pub enum OrcError {
    #[error("config error: {message}")]
    Config { message: String },

    #[error("scan error at {path}: {message}")]
    Scan { path: PathBuf, message: String },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("store error: {message}")]
    Store { message: String },

    #[error("cache error: {message}")]
    Cache { message: String },

    #[error("resolver error: {message}")]
    Resolver { message: String },

    #[error("query error: {message}")]
    Query { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OrcResult<T> = Result<T, OrcError>;

impl OrcError {
    pub fn config(message: impl Into<String>) -> Self {
        OrcError::Config { message: message.into() }
    }

    pub fn scan(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        OrcError::Scan { path: path.into(), message: message.into() }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        OrcError::Parse { path: path.into(), message: message.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        OrcError::Store { message: message.into() }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        OrcError::Cache { message: message.into() }
    }

    pub fn resolver(message: impl Into<String>) -> Self {
        OrcError::Resolver { message: message.into() }
    }

    pub fn query(message: impl Into<String>) -> Self {
        OrcError::Query { message: message.into() }
    }
}

impl From<rusqlite::Error> for OrcError {
    fn from(err: rusqlite::Error) -> Self {
        OrcError::Store { message: err.to_string() }
    }
}

impl From<serde_yaml::Error> for OrcError {
    fn from(err: serde_yaml::Error) -> Self {
        OrcError::Config { message: err.to_string() }
    }
}

impl From<serde_json::Error> for OrcError {
    fn from(err: serde_json::Error) -> Self {
        OrcError::Cache { message: err.to_string() }
    }
}
