//! Error types.

use std::{io, path::PathBuf};

use sfnt_subset::ParseError;

/// Errors that can occur when generating a font subset.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// Input font doesn't exist.
    #[error(
        "input font `{}` not found; download Noto Serif TC and place it at this path",
        .path.display()
    )]
    InputNotFound {
        /// Expected location of the font.
        path: PathBuf,
    },
    /// I/O error on a file.
    #[error("I/O error on `{}`", .path.display())]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Input font cannot be parsed or subset.
    #[error("failed processing font `{}`", .path.display())]
    Font {
        /// Path to the font.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ParseError,
    },
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Errors that can occur when verifying a font subset.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// Font file doesn't exist.
    #[error("font file not found: `{}`", .path.display())]
    FontNotFound {
        /// Expected location of the font.
        path: PathBuf,
    },
    /// I/O error reading the font.
    #[error("I/O error reading `{}`", .path.display())]
    Io {
        /// Path to the font.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Font cannot be parsed.
    #[error("failed parsing font `{}`", .path.display())]
    Font {
        /// Path to the font.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ParseError,
    },
}
