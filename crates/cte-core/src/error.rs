//! Error types for cte-core operations.
//!
//! Every fallible operation in the CTE engine returns [`Result`]. Each
//! [`Error`] maps onto an integer [`Status`] code so callers driving the
//! engine from a larger calibration pipeline can keep reporting plain status
//! values.
//!
//! # Usage
//!
//! ```rust
//! use cte_core::{Error, Status};
//!
//! let err = Error::allocation_problem("trap pixel map");
//! assert_eq!(err.status(), Status::AllocationProblem);
//! assert_eq!(err.status().code(), 118);
//! ```
//!
//! # Dependencies
//!
//! - [`thiserror`] - For derive macro error implementation
//!
//! # Used By
//!
//! - [`crate::image::Image`] - Buffer construction and precondition checks
//! - [`crate::params`] - Parameter validation and YAML loading
//! - `cte-ops` - Simulation, inversion and smoothing

use crate::image::StorageOrder;
use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Integer status codes reported by the engine.
///
/// `Ok` is zero; every failure is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Success.
    Ok,
    /// A scratch or output buffer could not be allocated.
    OutOfMemory,
    /// A required input is missing or empty.
    AllocationProblem,
    /// Buffers or tables have inconsistent sizes.
    SizeMismatch,
    /// A parameter has an unusable value.
    InvalidValue,
}

impl Status {
    /// Returns the integer code for this status.
    #[inline]
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::OutOfMemory => 111,
            Self::AllocationProblem => 118,
            Self::SizeMismatch => 120,
            Self::InvalidValue => 1111,
        }
    }

    /// Returns `true` for [`Status::Ok`].
    #[inline]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Status of a finished operation.
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(err) => err.status(),
        }
    }
}

/// Errors that can occur while simulating or correcting CTE trails.
///
/// # Categories
///
/// - **Preconditions**: [`AllocationProblem`](Error::AllocationProblem),
///   [`StorageOrderMismatch`](Error::StorageOrderMismatch)
/// - **Sizes**: [`SizeMismatch`](Error::SizeMismatch),
///   [`InvalidDimensions`](Error::InvalidDimensions)
/// - **Resources**: [`OutOfMemory`](Error::OutOfMemory)
/// - **Parameters**: [`InvalidParameter`](Error::InvalidParameter)
/// - **Configuration**: [`Io`](Error::Io), [`Yaml`](Error::Yaml)
#[derive(Debug, Error)]
pub enum Error {
    /// A required input is missing or empty.
    ///
    /// Stands in for a null buffer handed to the engine: an image without
    /// pixels, or a parameter bundle without trap tables.
    #[error("allocation problem: {0}")]
    AllocationProblem(String),

    /// The image is not stored in the order the engine requires.
    ///
    /// The engine never transposes silently; the caller has to deliver a
    /// column-major buffer.
    #[error("storage order mismatch: expected {expected:?}, got {got:?}")]
    StorageOrderMismatch {
        /// Order the operation requires
        expected: StorageOrder,
        /// Order of the supplied image
        got: StorageOrder,
    },

    /// A scratch or output buffer could not be reserved.
    #[error("out of memory: failed to reserve {requested} bytes")]
    OutOfMemory {
        /// Bytes requested
        requested: usize,
    },

    /// Buffers or tables disagree in size.
    #[error("size mismatch: {0}")]
    SizeMismatch(String),

    /// Image dimensions are unusable for the operation.
    #[error("invalid dimensions: {rows}x{columns} ({reason})")]
    InvalidDimensions {
        /// Number of rows
        rows: usize,
        /// Number of columns
        columns: usize,
        /// Why the dimensions were rejected
        reason: String,
    },

    /// A parameter value is out of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error while reading a parameter file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error in a parameter file.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Creates an [`Error::AllocationProblem`] error.
    #[inline]
    pub fn allocation_problem(what: impl Into<String>) -> Self {
        Self::AllocationProblem(what.into())
    }

    /// Creates an [`Error::OutOfMemory`] error for `count` elements of `T`.
    #[inline]
    pub fn out_of_memory<T>(count: usize) -> Self {
        Self::OutOfMemory {
            requested: count.saturating_mul(std::mem::size_of::<T>()),
        }
    }

    /// Creates an [`Error::SizeMismatch`] error.
    #[inline]
    pub fn size_mismatch(msg: impl Into<String>) -> Self {
        Self::SizeMismatch(msg.into())
    }

    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(rows: usize, columns: usize, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            rows,
            columns,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Maps this error onto its [`Status`] code.
    pub fn status(&self) -> Status {
        match self {
            Self::AllocationProblem(_) | Self::StorageOrderMismatch { .. } => {
                Status::AllocationProblem
            }
            Self::OutOfMemory { .. } => Status::OutOfMemory,
            Self::SizeMismatch(_) | Self::InvalidDimensions { .. } => Status::SizeMismatch,
            Self::InvalidParameter(_) | Self::Io(_) | Self::Yaml(_) => Status::InvalidValue,
        }
    }

    /// Returns `true` if this is a resource exhaustion error.
    #[inline]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}
