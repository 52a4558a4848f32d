//! Centralized error handling for mat_images
//!
//! This module provides structured error types for every stage of the pipeline,
//! from container detection to contrast estimation.

use std::fmt;

/// Main error type for mat_images operations
#[derive(Debug)]
pub enum MatImagesError {
    /// File missing, unreadable, or truncated at the byte level
    IoError(std::io::Error),

    /// File is neither a valid Level 5 nor a valid HDF5 MAT-file
    FormatError { reason: String },

    /// Level 5 header carries a version the classic decoder cannot read.
    /// Recovered during detection by switching to the HDF5 reader.
    UnsupportedVersion { version: u16 },

    /// One stored variable is malformed (corrupt sub-block, bad element tag)
    DecodeError { reason: String },

    /// HDF5 library errors
    Hdf5Error(hdf5::Error),

    /// Operation invoked on an array with an unsuitable shape
    ShapeError { message: String },

    /// Array shape or dimension error raised by ndarray
    ArrayError(ndarray::ShapeError),

    /// A storage backend returned a buffer of an unexpected element type
    DTypeMismatch { expected: String, found: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error
    Generic(String),
}

impl fmt::Display for MatImagesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatImagesError::IoError(e) => write!(f, "I/O error: {}", e),
            MatImagesError::FormatError { reason } => {
                write!(f, "Not a readable MAT-file: {}", reason)
            }
            MatImagesError::UnsupportedVersion { version } => {
                write!(f, "Unsupported MAT-file version 0x{:04X}", version)
            }
            MatImagesError::DecodeError { reason } => {
                write!(f, "Malformed variable: {}", reason)
            }
            MatImagesError::Hdf5Error(e) => write!(f, "HDF5 error: {}", e),
            MatImagesError::ShapeError { message } => write!(f, "Shape error: {}", message),
            MatImagesError::ArrayError(e) => write!(f, "Array error: {}", e),
            MatImagesError::DTypeMismatch { expected, found } => {
                write!(f, "Expected {} data but storage returned {}", expected, found)
            }
            MatImagesError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            MatImagesError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MatImagesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatImagesError::IoError(e) => Some(e),
            MatImagesError::Hdf5Error(e) => Some(e),
            MatImagesError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl MatImagesError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        MatImagesError::FormatError {
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        MatImagesError::DecodeError {
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(message: impl Into<String>) -> Self {
        MatImagesError::ShapeError {
            message: message.into(),
        }
    }

    /// Whether this error is local to one variable rather than the whole file.
    ///
    /// Per-variable failures are skipped and reported; everything else aborts the file.
    pub fn is_variable_local(&self) -> bool {
        !matches!(
            self,
            MatImagesError::IoError(_)
                | MatImagesError::FormatError { .. }
                | MatImagesError::UnsupportedVersion { .. }
        )
    }
}

impl From<std::io::Error> for MatImagesError {
    fn from(error: std::io::Error) -> Self {
        MatImagesError::IoError(error)
    }
}

impl From<hdf5::Error> for MatImagesError {
    fn from(error: hdf5::Error) -> Self {
        MatImagesError::Hdf5Error(error)
    }
}

impl From<ndarray::ShapeError> for MatImagesError {
    fn from(error: ndarray::ShapeError) -> Self {
        MatImagesError::ArrayError(error)
    }
}

impl From<String> for MatImagesError {
    fn from(error: String) -> Self {
        MatImagesError::Generic(error)
    }
}

impl From<&str> for MatImagesError {
    fn from(error: &str) -> Self {
        MatImagesError::Generic(error.to_string())
    }
}

/// Result type alias for mat_images operations
pub type Result<T> = std::result::Result<T, MatImagesError>;
