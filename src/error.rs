//! Error types for network generation.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::isa::{ElementType, VectorIsa};

/// Errors that can occur while generating sorting networks.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested (ISA, element type) pair has no backend.
    #[error("unsupported configuration: {ty} on {isa}")]
    UnsupportedConfiguration { isa: VectorIsa, ty: ElementType },

    /// The ISA has no backend, for any element type.
    #[error("unsupported configuration: {isa} has no backend")]
    UnsupportedIsa { isa: VectorIsa },

    /// Malformed command line.
    #[error("argument error: {0}")]
    Argument(String),

    /// Writing an artifact to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Writing into an in-memory output stream failed.
    #[error("formatting error")]
    Format(#[from] fmt::Error),
}

impl Error {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedConfiguration { .. } | Error::UnsupportedIsa { .. }
        )
    }
}

/// Result type for generation.
pub type Result<T> = std::result::Result<T, Error>;
