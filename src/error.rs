//! Error types for bloomgate operations.
//!
//! Every fallible operation in the crate returns [`Result<T>`] with a
//! [`BloomGateError`]. Errors are raised synchronously at the point of
//! violation — construction time for parameter problems, add time for
//! capacity problems, decode time for serialization problems — and are
//! never retried or swallowed internally. Retrying (for example with a
//! `Scale` policy instead of `Throw`) is the caller's decision.
//!
//! # Error Propagation
//!
//! ```
//! use bloomgate::Result;
//! use bloomgate::core::DimensionsBuilder;
//!
//! fn solve(capacity: usize, fpp: f64) -> Result<usize> {
//!     let dims = DimensionsBuilder::new()
//!         .capacity(capacity)
//!         .false_positive_probability(fpp)
//!         .build()?;
//!     Ok(dims.bit_count())
//! }
//! # assert!(solve(1000, 0.01).is_ok());
//! ```

use std::fmt;

/// Result type alias for bloomgate operations.
pub type Result<T> = std::result::Result<T, BloomGateError>;

/// Errors that can occur while building, using, or rehydrating a filter.
///
/// Each variant carries the context needed to diagnose the violation.
/// `Clone` and `PartialEq` are derived so tests can match on exact errors.
#[derive(Debug, Clone, PartialEq)]
pub enum BloomGateError {
    /// Dimension or scaling-policy constraints were violated.
    ///
    /// Raised when the dimension solver is underdetermined, a solved or
    /// supplied dimension falls outside its valid range (for example a
    /// false positive probability outside (0, 1)), or a scaling factor
    /// is out of bounds.
    InvalidParameters {
        /// Human-readable description of what is invalid.
        message: String,
    },

    /// The configured options cannot be used as requested.
    ///
    /// Raised when a persisted state names a hash algorithm that is not
    /// registered, or an option combination is unsupported.
    InvalidOptions {
        /// Human-readable description of the option problem.
        message: String,
    },

    /// Decoded state parameters conflict with the configured parameters.
    ///
    /// Raised at build time under the default `ThrowIfInconsistent`
    /// validation behavior when a rehydrated state's parameters differ
    /// from the builder's.
    ParameterMismatch {
        /// One entry per conflicting field, `"Field: decoded != configured"` form.
        inconsistencies: Vec<String>,
    },

    /// An add was attempted past capacity under the `Throw` policy.
    ///
    /// Adding more entries would push the false positive rate above the
    /// configured value. Enable scaling or raise the capacity instead.
    MaxCapacityExceeded {
        /// Configured capacity of the filter that rejected the add.
        capacity: usize,
    },

    /// A persisted document is malformed or structurally invalid.
    ///
    /// Covers JSON/binary decode failures, unknown `apiVersion` values,
    /// and states whose bit arrays do not match their parameters.
    InvalidSerializedState {
        /// Human-readable description of the defect.
        message: String,
    },
}

impl fmt::Display for BloomGateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameters { message } => {
                write!(f, "Invalid Bloom filter parameters: {}.", message)
            }
            Self::InvalidOptions { message } => {
                write!(f, "Invalid Bloom filter options: {}.", message)
            }
            Self::ParameterMismatch { inconsistencies } => {
                write!(
                    f,
                    "State parameters conflict with configured parameters: {}.",
                    inconsistencies.join("; ")
                )
            }
            Self::MaxCapacityExceeded { capacity } => {
                write!(
                    f,
                    "Cannot add to filter because it is at maximum capacity {}. \
                     Adding more entries would raise the false positive rate above \
                     the configured value. Perhaps you should enable scaling.",
                    capacity
                )
            }
            Self::InvalidSerializedState { message } => {
                write!(f, "Invalid serialized filter state: {}.", message)
            }
        }
    }
}

impl std::error::Error for BloomGateError {}

impl BloomGateError {
    /// Create an `InvalidParameters` error with a formatted message.
    #[must_use]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create an `InvalidOptions` error.
    #[must_use]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Create a `ParameterMismatch` error from per-field inconsistencies.
    #[must_use]
    pub fn parameter_mismatch(inconsistencies: Vec<String>) -> Self {
        Self::ParameterMismatch { inconsistencies }
    }

    /// Create a `MaxCapacityExceeded` error.
    #[must_use]
    pub fn max_capacity_exceeded(capacity: usize) -> Self {
        Self::MaxCapacityExceeded { capacity }
    }

    /// Create an `InvalidSerializedState` error.
    #[must_use]
    pub fn invalid_serialized_state(message: impl Into<String>) -> Self {
        Self::InvalidSerializedState {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_parameters() {
        let err = BloomGateError::invalid_parameters("Capacity must be greater than 0");
        let display = format!("{err}");
        assert!(display.contains("Invalid Bloom filter parameters"));
        assert!(display.contains("Capacity must be greater than 0"));
        assert!(display.ends_with('.'));
    }

    #[test]
    fn test_display_parameter_mismatch_joins_fields() {
        let err = BloomGateError::parameter_mismatch(vec![
            "BitCount: 100 != 200".to_string(),
            "HashCount: 7 != 5".to_string(),
        ]);
        let display = format!("{err}");
        assert!(display.contains("BitCount: 100 != 200"));
        assert!(display.contains("; "));
        assert!(display.contains("HashCount: 7 != 5"));
    }

    #[test]
    fn test_display_max_capacity_exceeded() {
        let err = BloomGateError::max_capacity_exceeded(1000);
        let display = format!("{err}");
        assert!(display.contains("1000"));
        assert!(display.contains("enable scaling"));
    }

    #[test]
    fn test_display_invalid_serialized_state() {
        let err = BloomGateError::invalid_serialized_state("expected 7 bit arrays, found 3");
        let display = format!("{err}");
        assert!(display.contains("Invalid serialized filter state"));
        assert!(display.contains("expected 7 bit arrays, found 3"));
    }

    #[test]
    fn test_implements_std_error() {
        let _err: Box<dyn std::error::Error> =
            Box::new(BloomGateError::invalid_options("no such algorithm"));
    }

    #[test]
    fn test_error_clone_and_eq() {
        let err1 = BloomGateError::max_capacity_exceeded(42);
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }

    #[test]
    fn test_propagation_with_question_mark() {
        fn inner() -> Result<()> {
            Err(BloomGateError::invalid_parameters("boom"))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
