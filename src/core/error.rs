// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error types for container access.
//!
//! Every accessor operation reports failure through [`AccessError`]. The
//! variant identifies the kind of failure; the fields carry the offending
//! path and name so callers can build a message. Native type identifiers
//! and other low-level detail go to the `tracing` diagnostics instead.

use std::fmt;

use super::types::DataType;

/// Coarse classification of an [`AccessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Container, group, dataset or attribute failed to open or does not exist
    NotOpen,
    /// Attribute or member absent
    NotFound,
    /// Stored element type differs from the requested one
    TypeMismatch,
    /// Requested rank/shape or buffer length does not match the actual shape
    ShapeMismatch,
    /// Two shape queries against the same object disagreed
    ShapeInconsistency,
    /// Stored type is neither a string nor a known fixed-width numeric type
    UnsupportedType,
    /// The underlying transfer call failed after all checks passed
    IoFailure,
}

impl ErrorKind {
    /// Get the kind name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotOpen => "not_open",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::ShapeMismatch => "shape_mismatch",
            ErrorKind::ShapeInconsistency => "shape_inconsistency",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::IoFailure => "io_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by container operations.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessError {
    /// An object could not be opened
    NotOpen {
        /// What was being opened (path, or the container file)
        target: String,
    },

    /// An attribute or member does not exist
    NotFound {
        /// Owner path
        path: String,
        /// Attribute or member name
        name: String,
    },

    /// Stored type differs from the requested type
    TypeMismatch {
        /// Object path (with attribute name for attributes)
        path: String,
        /// Requested logical type
        requested: DataType,
        /// Stored logical type (`None` if unrecognized)
        actual: DataType,
    },

    /// Requested shape or buffer length does not match
    ShapeMismatch {
        /// Object path
        path: String,
        /// What the caller asked for
        expected: String,
        /// What was found
        actual: String,
    },

    /// Rank reported by two shape queries disagreed
    ShapeInconsistency {
        /// Dataset path
        path: String,
        /// Rank from the rank query
        rank: usize,
        /// Rank reported by the extents query
        extents_rank: usize,
    },

    /// Stored type has no logical counterpart
    UnsupportedType {
        /// Object path
        path: String,
    },

    /// A native read, write or create call failed
    IoFailure {
        /// Operation that failed (e.g. "read dataset")
        operation: String,
        /// Object path
        path: String,
        /// Message from the native layer
        message: String,
    },
}

impl AccessError {
    /// Create a "not open" error.
    pub fn not_open(target: impl Into<String>) -> Self {
        AccessError::NotOpen {
            target: target.into(),
        }
    }

    /// Create a "not found" error.
    pub fn not_found(path: impl Into<String>, name: impl Into<String>) -> Self {
        AccessError::NotFound {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(path: impl Into<String>, requested: DataType, actual: DataType) -> Self {
        AccessError::TypeMismatch {
            path: path.into(),
            requested,
            actual,
        }
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        AccessError::ShapeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a shape inconsistency error.
    pub fn shape_inconsistency(path: impl Into<String>, rank: usize, extents_rank: usize) -> Self {
        AccessError::ShapeInconsistency {
            path: path.into(),
            rank,
            extents_rank,
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(path: impl Into<String>) -> Self {
        AccessError::UnsupportedType { path: path.into() }
    }

    /// Create an I/O failure error.
    pub fn io_failure(
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AccessError::IoFailure {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotOpen { .. } => ErrorKind::NotOpen,
            AccessError::NotFound { .. } => ErrorKind::NotFound,
            AccessError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            AccessError::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            AccessError::ShapeInconsistency { .. } => ErrorKind::ShapeInconsistency,
            AccessError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            AccessError::IoFailure { .. } => ErrorKind::IoFailure,
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            AccessError::NotOpen { target } => vec![("target", target.clone())],
            AccessError::NotFound { path, name } => {
                vec![("path", path.clone()), ("name", name.clone())]
            }
            AccessError::TypeMismatch {
                path,
                requested,
                actual,
            } => vec![
                ("path", path.clone()),
                ("requested", requested.to_string()),
                ("actual", actual.to_string()),
            ],
            AccessError::ShapeMismatch {
                path,
                expected,
                actual,
            } => vec![
                ("path", path.clone()),
                ("expected", expected.clone()),
                ("actual", actual.clone()),
            ],
            AccessError::ShapeInconsistency {
                path,
                rank,
                extents_rank,
            } => vec![
                ("path", path.clone()),
                ("rank", rank.to_string()),
                ("extents_rank", extents_rank.to_string()),
            ],
            AccessError::UnsupportedType { path } => vec![("path", path.clone())],
            AccessError::IoFailure {
                operation,
                path,
                message,
            } => vec![
                ("operation", operation.clone()),
                ("path", path.clone()),
                ("message", message.clone()),
            ],
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::NotOpen { target } => write!(f, "Failed to open '{target}'"),
            AccessError::NotFound { path, name } => {
                write!(f, "'{name}' not found at '{path}'")
            }
            AccessError::TypeMismatch {
                path,
                requested,
                actual,
            } => write!(
                f,
                "Type mismatch at '{path}': requested {}, stored {}",
                requested.name_or("None"),
                actual.name_or("None")
            ),
            AccessError::ShapeMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "Shape mismatch at '{path}': expected {expected}, found {actual}"
            ),
            AccessError::ShapeInconsistency {
                path,
                rank,
                extents_rank,
            } => write!(
                f,
                "Inconsistent shape at '{path}': rank query returned {rank}, \
                 extents query returned {extents_rank}"
            ),
            AccessError::UnsupportedType { path } => {
                write!(f, "Unsupported element type at '{path}'")
            }
            AccessError::IoFailure {
                operation,
                path,
                message,
            } => write!(f, "Failed to {operation} '{path}': {message}"),
        }
    }
}

impl std::error::Error for AccessError {}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_open_error() {
        let err = AccessError::not_open("/missing.h5");
        assert_eq!(err.kind(), ErrorKind::NotOpen);
        assert_eq!(err.to_string(), "Failed to open '/missing.h5'");
    }

    #[test]
    fn test_not_found_error() {
        let err = AccessError::not_found("/data", "units");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "'units' not found at '/data'");
    }

    #[test]
    fn test_type_mismatch_error() {
        let err = AccessError::type_mismatch("/dim1", DataType::UInt32, DataType::Float32);
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            err.to_string(),
            "Type mismatch at '/dim1': requested UInt32, stored Float"
        );
    }

    #[test]
    fn test_type_mismatch_unknown_stored_type() {
        let err = AccessError::type_mismatch("/blob", DataType::Int8, DataType::None);
        assert_eq!(
            err.to_string(),
            "Type mismatch at '/blob': requested Int8, stored None"
        );
    }

    #[test]
    fn test_shape_mismatch_error() {
        let err = AccessError::shape_mismatch("/img", "rank 2", "rank 3");
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(
            err.to_string(),
            "Shape mismatch at '/img': expected rank 2, found rank 3"
        );
    }

    #[test]
    fn test_shape_inconsistency_error() {
        let err = AccessError::shape_inconsistency("/img", 3, 2);
        assert_eq!(err.kind(), ErrorKind::ShapeInconsistency);
        assert_eq!(
            err.to_string(),
            "Inconsistent shape at '/img': rank query returned 3, extents query returned 2"
        );
    }

    #[test]
    fn test_io_failure_error() {
        let err = AccessError::io_failure("read dataset", "/img", "short buffer");
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_eq!(
            err.to_string(),
            "Failed to read dataset '/img': short buffer"
        );
    }

    #[test]
    fn test_unsupported_type_error() {
        let err = AccessError::unsupported_type("/labels");
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert_eq!(err.to_string(), "Unsupported element type at '/labels'");
        assert_eq!(err.log_fields(), [("path", "/labels".to_string())]);
    }

    #[test]
    fn test_log_fields_type_mismatch() {
        let err = AccessError::type_mismatch("/dim1", DataType::Int32, DataType::Float64);
        let fields = err.log_fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], ("path", "/dim1".to_string()));
        assert_eq!(fields[1], ("requested", "Int32".to_string()));
        assert_eq!(fields[2], ("actual", "Double".to_string()));
    }

    #[test]
    fn test_log_fields_shape_inconsistency() {
        let err = AccessError::shape_inconsistency("/x", 2, 1);
        let fields = err.log_fields();
        assert_eq!(fields[1], ("rank", "2".to_string()));
        assert_eq!(fields[2], ("extents_rank", "1".to_string()));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::UnsupportedType.as_str(), "unsupported_type");
    }
}
