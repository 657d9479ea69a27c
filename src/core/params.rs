//! Complete filter parameters: identity, dimensions, scaling, hashing.
//!
//! [`FilterParameters`] is the immutable value that fully describes a
//! filter's configuration. It is resolved once at build time and
//! persisted alongside the bit arrays, so a rehydrated filter can prove
//! it is interpreting the bits the same way the writer did. Scaling
//! derives fresh parameter values per generation via
//! [`FilterParameters::derive`]; nothing is ever edited in place.

use crate::core::dimensions::FilterDimensions;
use crate::core::scaling::ScalingPolicy;
use crate::error::{BloomGateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable description of a filter's configuration.
///
/// Two filters with equal parameters are interchangeable: same bit
/// layout, same hash positions, same capacity policy.
///
/// # Examples
///
/// ```
/// use bloomgate::core::{FilterDimensions, FilterParameters, ScalingPolicy};
///
/// let params = FilterParameters::new(
///     "sessions",
///     FilterDimensions::for_capacity_and_fpp(10_000, 0.01).unwrap(),
///     ScalingPolicy::default(),
///     "murmur3",
/// );
/// params.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParameters {
    id: String,
    dimensions: FilterDimensions,
    scaling: ScalingPolicy,
    hash_algorithm: String,
}

impl FilterParameters {
    /// Assemble parameters from resolved parts.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        dimensions: FilterDimensions,
        scaling: ScalingPolicy,
        hash_algorithm: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            dimensions,
            scaling,
            hash_algorithm: hash_algorithm.into(),
        }
    }

    /// Filter identity, carried through persistence and prepared-add tokens.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Solved dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &FilterDimensions {
        &self.dimensions
    }

    /// Capacity policy and growth factors.
    #[must_use]
    pub fn scaling(&self) -> &ScalingPolicy {
        &self.scaling
    }

    /// Identifier of the hash algorithm the bit positions were computed with.
    #[must_use]
    pub fn hash_algorithm(&self) -> &str {
        &self.hash_algorithm
    }

    /// Derive a new generation's parameters from this one.
    ///
    /// Keeps the scaling policy and hash algorithm; replaces identity
    /// and dimensions.
    #[must_use]
    pub fn derive(&self, id: impl Into<String>, dimensions: FilterDimensions) -> Self {
        Self {
            id: id.into(),
            dimensions,
            scaling: self.scaling.clone(),
            hash_algorithm: self.hash_algorithm.clone(),
        }
    }

    /// Check every constituent part.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidParameters`] from dimension or scaling
    /// validation, or when the hash algorithm id is empty.
    pub fn validate(&self) -> Result<()> {
        if self.hash_algorithm.is_empty() {
            return Err(BloomGateError::invalid_parameters(
                "HashAlgorithm must be set",
            ));
        }

        self.dimensions.validate()?;
        self.scaling.validate()
    }

    /// List field-level mismatches against another parameter set.
    ///
    /// The filter id is deliberately excluded: a rehydrated filter may
    /// be renamed without invalidating its bits.
    #[must_use]
    pub fn diff(&self, other: &FilterParameters) -> Vec<String> {
        let mut diff = self.dimensions.diff(&other.dimensions);
        diff.extend(self.scaling.diff(&other.scaling));

        if self.hash_algorithm != other.hash_algorithm {
            diff.push(format!(
                "HashAlgorithm: {} != {}",
                self.hash_algorithm, other.hash_algorithm
            ));
        }

        diff
    }
}

impl fmt::Display for FilterParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={}, {}, hash={}",
            self.id, self.dimensions, self.hash_algorithm
        )
    }
}
