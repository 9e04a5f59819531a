//! Error types for LESS preprocessing and compilation.
//!
//! Copyright (c) 2025 Posit, PBC

use lessc_runtime::RuntimeError;
use thiserror::Error;

use crate::uri::Uri;

/// Errors that can occur while preprocessing or compiling LESS.
#[derive(Debug, Error)]
pub enum LesscError {
    /// A required import target (or the top-level source) could not be loaded
    #[error("failed to load {uri}: {source}")]
    Asset {
        uri: Uri,
        #[source]
        source: LoadError,
    },

    /// The external compiler reported a diagnostic
    #[error("LESS compilation failed: {0}")]
    Compile(String),

    /// An import option or reference scheme that this implementation does not handle
    #[error("{0}")]
    Unsupported(String),

    /// Raw input could not be decoded as text
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading caller-provided input failed
    #[error("failed to read LESS input: {0}")]
    Io(#[from] std::io::Error),

    /// Compiler configuration could not be parsed
    #[error("invalid lessc configuration: {0}")]
    Config(String),

    /// The external compiler could not be run
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Errors reported by a [`Loader`](crate::Loader).
///
/// `NotFound` and `Io` are load failures that an `optional` import may
/// swallow. `Unsupported` means the loader does not recognize the reference
/// at all and always propagates.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no such asset: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Runtime(RuntimeError),
}

impl From<RuntimeError> for LoadError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Io(io) => LoadError::Io(io),
            RuntimeError::NotSupported(msg) => LoadError::Unsupported(msg),
            other => LoadError::Runtime(other),
        }
    }
}

impl LoadError {
    /// Whether an `optional` import may downgrade this failure to "no content".
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LoadError::Unsupported(_))
    }
}
