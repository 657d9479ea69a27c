//! Filter implementations and the two-phase add protocol.
//!
//! [`FixedBloomFilter`] is the single-generation filter;
//! [`ScalingBloomFilter`] chains generations of it. [`BloomFilter`]
//! wraps whichever one the builder produced behind a single surface, so
//! callers can switch a filter from fixed to scaling by changing
//! configuration alone.

pub mod fixed;
pub mod prepared;
pub mod scaling;

pub use fixed::FixedBloomFilter;
pub use prepared::{CheckedEntry, PreparedAdd};
pub use scaling::ScalingBloomFilter;

use crate::core::FilterParameters;
use crate::error::Result;
use crate::state::FilterState;

/// A built filter: fixed-capacity or scaling, per configuration.
///
/// Produced by [`BloomFilterBuilder`](crate::builder::BloomFilterBuilder).
/// All operations delegate to the underlying filter; use
/// [`as_fixed`](Self::as_fixed) / [`as_scaling`](Self::as_scaling) for
/// variant-specific APIs.
#[derive(Debug)]
pub enum BloomFilter<K: ?Sized> {
    /// A single fixed-capacity filter.
    Fixed(FixedBloomFilter<K>),
    /// A chain of generations that grows on demand.
    Scaling(ScalingBloomFilter<K>),
}

impl<K: ?Sized> BloomFilter<K> {
    /// Filter identity.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Fixed(filter) => filter.id(),
            Self::Scaling(chain) => chain.id(),
        }
    }

    /// The parameters the filter was built with.
    #[must_use]
    pub fn parameters(&self) -> &FilterParameters {
        match self {
            Self::Fixed(filter) => filter.parameters(),
            Self::Scaling(chain) => chain.parameters(),
        }
    }

    /// Number of distinct keys added.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            Self::Fixed(filter) => filter.count(),
            Self::Scaling(chain) => chain.count(),
        }
    }

    /// Fraction of bits set (for a chain, the mean across generations).
    #[must_use]
    pub fn saturation(&self) -> f64 {
        match self {
            Self::Fixed(filter) => filter.saturation(),
            Self::Scaling(chain) => chain.saturation(),
        }
    }

    /// Check whether `key` might be present.
    ///
    /// `false` is definitive; `true` is "maybe", with the configured
    /// false positive probability.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        match self {
            Self::Fixed(filter) => filter.contains(key),
            Self::Scaling(chain) => chain.contains(key),
        }
    }

    /// Check `key` and, when absent, prepare an add for a later commit.
    ///
    /// See [`CheckedEntry`] and [`PreparedAdd`] for the two-phase
    /// protocol.
    #[must_use]
    pub fn check_and_prepare(&self, key: &K) -> CheckedEntry<K> {
        match self {
            Self::Fixed(filter) => filter.prepare_add(key),
            Self::Scaling(chain) => chain.check_and_prepare(key),
        }
    }

    /// Add `key`, returning whether it was newly added.
    ///
    /// # Errors
    ///
    /// [`MaxCapacityExceeded`](crate::BloomGateError::MaxCapacityExceeded)
    /// for a full fixed filter under the `Throw` policy;
    /// [`InvalidParameters`](crate::BloomGateError::InvalidParameters)
    /// if a scaling chain cannot solve its next generation.
    pub fn insert(&self, key: &K) -> Result<bool> {
        match self {
            Self::Fixed(filter) => filter.insert(key),
            Self::Scaling(chain) => chain.insert(key),
        }
    }

    /// Report that a hit turned out to be a false positive.
    pub fn report_false_positive(&self) {
        match self {
            Self::Fixed(filter) => filter.report_false_positive(),
            Self::Scaling(chain) => chain.report_false_positive(),
        }
    }

    /// Snapshot the filter as persistable state.
    #[must_use]
    pub fn state(&self) -> FilterState {
        match self {
            Self::Fixed(filter) => filter.state(),
            Self::Scaling(chain) => chain.state(),
        }
    }

    /// The underlying fixed filter, when not scaling.
    #[must_use]
    pub fn as_fixed(&self) -> Option<&FixedBloomFilter<K>> {
        match self {
            Self::Fixed(filter) => Some(filter),
            Self::Scaling(_) => None,
        }
    }

    /// The underlying scaling chain, when scaling.
    #[must_use]
    pub fn as_scaling(&self) -> Option<&ScalingBloomFilter<K>> {
        match self {
            Self::Fixed(_) => None,
            Self::Scaling(chain) => Some(chain),
        }
    }
}
