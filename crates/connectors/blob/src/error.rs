use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use sluice_container::ContainerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid parquet file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("parquet error in {path}: {source}")]
    Parquet {
        path: String,
        #[source]
        source: ParquetError,
    },

    #[error("arrow error in {path}: {source}")]
    Arrow {
        path: String,
        #[source]
        source: ArrowError,
    },

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build record container: {0}")]
    Container(#[from] ContainerError),

    /// A programming error inside the estimator; never a data problem.
    #[error("row group estimate invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Common(#[from] sluice_common::Error),
}

impl ExtractError {
    pub fn invalid_file(path: &str, reason: impl Into<String>) -> Self {
        ExtractError::InvalidFile { path: path.to_string(), reason: reason.into() }
    }

    pub fn parquet(path: &str) -> impl FnOnce(ParquetError) -> Self + '_ {
        move |source| ExtractError::Parquet { path: path.to_string(), source }
    }

    pub fn arrow(path: &str) -> impl FnOnce(ArrowError) -> Self + '_ {
        move |source| ExtractError::Arrow { path: path.to_string(), source }
    }

    pub fn io(path: &str) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ExtractError::Io { path: path.to_string(), source }
    }

    /// True when the caller's context ended the call, as opposed to bad data.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ExtractError::Common(e) if e.is_cancellation())
    }
}
