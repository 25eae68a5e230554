//! Error types for the asset pipeline

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::asset::AssetPath;

/// Error raised by a loader or a source while producing one asset
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Parse/decode error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The source could not be opened or streamed
    #[error("Source error: {0}")]
    Source(String),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(e.to_string()),
            _ => LoadError::Io(e.to_string()),
        }
    }
}

/// Result type for asset loading
pub type LoadResult<T> = Result<T, LoadError>;

/// Run user code, turning a panic into its message
pub(crate) fn catch_panic<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Ok(result),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Err(message)
        }
    }
}

/// Error raised by a compound processor after all parts were ready
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// A part expected in the cache was not there
    #[error("Missing part: {0}")]
    MissingPart(AssetPath),

    /// The parts cannot be combined
    #[error("Invalid parts: {0}")]
    Invalid(String),

    /// Reading a part failed
    #[error(transparent)]
    Part(Box<AssetError>),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl From<AssetError> for ProcessError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::NotCached(path) => ProcessError::MissingPart(path),
            other => ProcessError::Part(Box::new(other)),
        }
    }
}

/// Errors surfaced by the asset manager and delivered to listeners
#[derive(Debug, Clone, Error)]
pub enum AssetError {
    /// The asset was never loaded, or was removed
    #[error("Asset not cached: {0}")]
    NotCached(AssetPath),

    /// A loader could not produce the asset
    #[error("Failed to load '{path}': {source}")]
    LoadFailed {
        path: AssetPath,
        #[source]
        source: LoadError,
    },

    /// A part of a compound asset failed
    #[error("Part '{part}' of compound '{compound}' failed: {source}")]
    PartFailed {
        compound: AssetPath,
        part: AssetPath,
        #[source]
        source: Box<AssetError>,
    },

    /// The compound processor failed after every part was ready
    #[error("Processing compound '{compound}' failed: {source}")]
    ProcessingFailed {
        compound: AssetPath,
        #[source]
        source: ProcessError,
    },

    /// The cached object is not of the requested Rust type
    #[error("Asset '{path}' is not a {expected}")]
    TypeMismatch {
        path: AssetPath,
        expected: &'static str,
    },

    /// The request was rejected before anything was queued
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AssetError {
    /// Path the error is about
    pub fn path(&self) -> Option<&str> {
        match self {
            AssetError::NotCached(path)
            | AssetError::LoadFailed { path, .. }
            | AssetError::TypeMismatch { path, .. } => Some(path),
            AssetError::PartFailed { compound, .. }
            | AssetError::ProcessingFailed { compound, .. } => Some(compound),
            AssetError::InvalidRequest(_) => None,
        }
    }

    /// Walk through part failures down to the error that started the chain
    pub fn root_cause(&self) -> &AssetError {
        match self {
            AssetError::PartFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
