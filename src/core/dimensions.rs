//! Bloom filter dimension algebra.
//!
//! Four quantities describe a Bloom filter, and any two of the right
//! pairs determine the rest:
//!
//! - `n`: capacity — max items before the error guarantee is broken
//! - `m`: number of bits
//! - `k`: number of hash functions
//! - `p`: false positive probability
//!
//! The closed-form relations (Bloom 1970; Almeida et al. 2007):
//!
//! ```text
//! k = round(−log2(p))
//! k = round((m / n) · ln 2)
//! m = ceil(n · ln(p) / ln(1 / 2^ln 2))
//! n = ceil(m / (−k / ln(1 − exp(ln(p) / k))))
//! p = (1 − exp(−k / (m / n)))^k
//! ```
//!
//! [`DimensionsBuilder`] accepts any subset of the four fields and
//! iterates these relations until all are known, failing with
//! [`InvalidParameters`](crate::BloomGateError::InvalidParameters) when
//! the inputs underdetermine the system. All intermediate math is in
//! `f64`; rounding is exactly as written above, per relation.
//!
//! # References
//!
//! - Bloom, Burton H. (1970). "Space/Time Trade-offs in Hash Coding with Allowable Errors"
//! - Almeida, P. S. et al. (2007). "Scalable Bloom Filters." Inf. Process. Lett. 101

use crate::error::{BloomGateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation ceiling for the hash function count.
///
/// Past 100 hash functions the per-operation cost dwarfs any error-rate
/// benefit; a solved value that high indicates nonsensical inputs.
const MAX_HASH_COUNT: usize = 100;

/// Validation floor for the hash function count.
///
/// A single hash function degenerates to a plain bit map with no
/// independence between probes, so two is the useful minimum.
const MIN_HASH_COUNT: usize = 2;

/// A fully-solved, internally-consistent set of Bloom filter dimensions.
///
/// Instances are immutable: scaling derives *new* dimensions per
/// generation rather than editing in place. Construct through
/// [`DimensionsBuilder`] or [`FilterDimensions::for_capacity_and_fpp`].
///
/// # Examples
///
/// ```
/// use bloomgate::core::FilterDimensions;
///
/// let dims = FilterDimensions::for_capacity_and_fpp(6550, 0.01).unwrap();
/// assert_eq!(dims.bit_count(), 62783);
/// assert_eq!(dims.hash_count(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDimensions {
    false_positive_probability: f64,
    capacity: usize,
    bit_count: usize,
    hash_count: usize,
}

impl FilterDimensions {
    /// Assemble dimensions from already-solved values.
    ///
    /// Rejects a hash count below 2, which the solver can produce for
    /// very loose error rates (e.g. `p = 0.5` solves to `k = 1`).
    pub(crate) fn new(
        false_positive_probability: f64,
        capacity: usize,
        bit_count: usize,
        hash_count: usize,
    ) -> Result<Self> {
        if hash_count < MIN_HASH_COUNT {
            return Err(BloomGateError::invalid_parameters(format!(
                "Parameters resulted in a hash count of {}, which is pointless",
                hash_count
            )));
        }

        Ok(Self {
            false_positive_probability,
            capacity,
            bit_count,
            hash_count,
        })
    }

    /// Solve dimensions from a capacity and a target false positive probability.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloomgate::core::FilterDimensions;
    ///
    /// let dims = FilterDimensions::for_capacity_and_fpp(4000, 0.01).unwrap();
    /// assert_eq!(dims.bit_count(), 38341);
    /// ```
    pub fn for_capacity_and_fpp(capacity: usize, false_positive_probability: f64) -> Result<Self> {
        DimensionsBuilder::new()
            .capacity(capacity)
            .false_positive_probability(false_positive_probability)
            .build()
    }

    /// Target false positive probability.
    #[must_use]
    pub fn false_positive_probability(&self) -> f64 {
        self.false_positive_probability
    }

    /// Maximum items before the error guarantee degrades.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bit budget across all hash slices.
    #[must_use]
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// Number of hash functions (one bit slice each).
    #[must_use]
    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    /// Check range constraints on every field.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidParameters`] when capacity or bit count
    /// is zero, the false positive probability is outside (0, 1)
    /// exclusive, or the hash count is below 2 or above 100.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(BloomGateError::invalid_parameters(
                "Capacity must be greater than 0",
            ));
        }

        if self.false_positive_probability <= 0.0 || self.false_positive_probability >= 1.0 {
            return Err(BloomGateError::invalid_parameters(
                "FalsePositiveProbability must be between 0 and 1 exclusive",
            ));
        }

        if self.bit_count == 0 {
            return Err(BloomGateError::invalid_parameters(
                "BitCount must be greater than 0",
            ));
        }

        if !(MIN_HASH_COUNT..=MAX_HASH_COUNT).contains(&self.hash_count) {
            return Err(BloomGateError::invalid_parameters(format!(
                "HashCount must be between {} and {} inclusive",
                MIN_HASH_COUNT, MAX_HASH_COUNT
            )));
        }

        Ok(())
    }

    /// List field-level mismatches against another set of dimensions.
    ///
    /// Used by parameter-consistency checks when merging persisted state;
    /// an empty result means the two are interchangeable. Probabilities
    /// are compared exactly (they round-trip bit-exactly through the
    /// persisted format).
    #[must_use]
    pub fn diff(&self, other: &FilterDimensions) -> Vec<String> {
        let mut diff = Vec::new();

        if self.bit_count != other.bit_count {
            diff.push(format!(
                "BitCount: {} != {}",
                self.bit_count, other.bit_count
            ));
        }

        if self.capacity != other.capacity {
            diff.push(format!("Capacity: {} != {}", self.capacity, other.capacity));
        }

        if self.hash_count != other.hash_count {
            diff.push(format!(
                "HashCount: {} != {}",
                self.hash_count, other.hash_count
            ));
        }

        if (self.false_positive_probability - other.false_positive_probability).abs()
            > f64::EPSILON
        {
            diff.push(format!(
                "FalsePositiveProbability: {} != {}",
                self.false_positive_probability, other.false_positive_probability
            ));
        }

        diff
    }
}

impl fmt::Display for FilterDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p={}, n={}, m={}, k={}",
            self.false_positive_probability, self.capacity, self.bit_count, self.hash_count
        )
    }
}

/// The closed-form relations between `n`, `m`, `k` and `p`.
///
/// Kept as free functions so the solver loop reads like the math.
mod equations {
    use std::f64::consts::LN_2;

    /// `n = ceil(m / (−k / ln(1 − exp(ln(p) / k))))`
    pub(super) fn n(m: usize, k: usize, p: f64) -> usize {
        let k = k as f64;
        (m as f64 / (-k / (1.0 - (p.ln() / k).exp()).ln())).ceil() as usize
    }

    /// `p = (1 − exp(−k / (m / n)))^k`
    pub(super) fn p(m: usize, n: usize, k: usize) -> f64 {
        let k = k as f64;
        (1.0 - (-k / (m as f64 / n as f64)).exp()).powf(k)
    }

    /// `m = ceil(n · ln(p) / ln(1 / 2^ln 2))`
    pub(super) fn m(n: usize, p: f64) -> usize {
        (n as f64 * p.ln() / (1.0 / 2f64.powf(LN_2)).ln()).ceil() as usize
    }

    /// `k = round((m / n) · ln 2)`
    pub(super) fn k_from_ratio(m: usize, n: usize) -> usize {
        (m as f64 / n as f64 * LN_2).round() as usize
    }

    /// `k = round(−log2(p))`
    pub(super) fn k_from_p(p: f64) -> usize {
        (-p.log2()).round() as usize
    }
}

/// Incremental solver for [`FilterDimensions`].
///
/// Accepts any subset of the four dimensions. [`build`](Self::build)
/// iterates the closed-form relations until every field is known, then
/// assembles an immutable [`FilterDimensions`].
///
/// The inputs are *buildable* when they include at least one of the
/// pairs `(capacity, fpp)`, `(fpp, bit_count)` or `(capacity,
/// bit_count)`; anything less is underdetermined.
///
/// # Examples
///
/// Solving capacity from a bit budget and error target:
///
/// ```
/// use bloomgate::core::DimensionsBuilder;
///
/// let dims = DimensionsBuilder::new()
///     .bit_count(100_001)
///     .hash_count(8)
///     .false_positive_probability(0.03)
///     .build()
///     .unwrap();
/// assert_eq!(dims.capacity(), 12950);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionsBuilder {
    false_positive_probability: Option<f64>,
    capacity: Option<usize>,
    bit_count: Option<usize>,
    hash_count: Option<usize>,
}

impl DimensionsBuilder {
    /// Create an empty builder with no dimensions fixed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the target false positive probability.
    #[must_use]
    pub fn false_positive_probability(mut self, p: f64) -> Self {
        self.false_positive_probability = Some(p);
        self
    }

    /// Fix the capacity.
    #[must_use]
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = Some(n);
        self
    }

    /// Fix the total bit count.
    #[must_use]
    pub fn bit_count(mut self, m: usize) -> Self {
        self.bit_count = Some(m);
        self
    }

    /// Fix the hash function count.
    #[must_use]
    pub fn hash_count(mut self, k: usize) -> Self {
        self.hash_count = Some(k);
        self
    }

    /// Seed a builder from already-solved dimensions.
    ///
    /// Useful for re-validating persisted dimensions through the same
    /// code path as freshly-specified ones.
    #[must_use]
    pub fn from_dimensions(dims: &FilterDimensions) -> Self {
        Self {
            false_positive_probability: Some(dims.false_positive_probability()),
            capacity: Some(dims.capacity()),
            bit_count: Some(dims.bit_count()),
            hash_count: Some(dims.hash_count()),
        }
    }

    /// Whether enough fields are present for the solver to make progress.
    #[must_use]
    pub fn buildable(&self) -> bool {
        (self.capacity.is_some() && self.false_positive_probability.is_some())
            || (self.false_positive_probability.is_some() && self.bit_count.is_some())
            || (self.capacity.is_some() && self.bit_count.is_some())
    }

    /// Solve the remaining dimensions and assemble the result.
    ///
    /// Relations are applied in a fixed order, restarting after each
    /// derivation, so the same inputs always solve the same way.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidParameters`] when the inputs are not
    /// [`buildable`](Self::buildable), when iteration stalls before all
    /// four fields are known, or when the solution has a hash count
    /// below 2.
    pub fn build(&self) -> Result<FilterDimensions> {
        if !self.buildable() {
            return Err(BloomGateError::invalid_parameters(
                "Not enough dimensions are set; provide at least capacity+fpp, fpp+bitCount, \
                 or capacity+bitCount",
            ));
        }

        let mut fpp = self.false_positive_probability;
        let mut capacity = self.capacity;
        let mut bit_count = self.bit_count;
        let mut hash_count = self.hash_count;

        let mut making_progress = true;
        while making_progress
            && !(fpp.is_some() && capacity.is_some() && bit_count.is_some() && hash_count.is_some())
        {
            making_progress = false;

            if hash_count.is_none() {
                if let (Some(m), Some(n)) = (bit_count, capacity) {
                    hash_count = Some(equations::k_from_ratio(m, n));
                    making_progress = true;
                    continue;
                }
            }

            if hash_count.is_none() {
                if let Some(p) = fpp {
                    hash_count = Some(equations::k_from_p(p));
                    making_progress = true;
                    continue;
                }
            }

            if bit_count.is_none() {
                if let (Some(n), Some(p)) = (capacity, fpp) {
                    bit_count = Some(equations::m(n, p));
                    making_progress = true;
                    continue;
                }
            }

            if capacity.is_none() {
                if let (Some(m), Some(k), Some(p)) = (bit_count, hash_count, fpp) {
                    capacity = Some(equations::n(m, k, p));
                    making_progress = true;
                    continue;
                }
            }

            if fpp.is_none() {
                if let (Some(m), Some(n), Some(k)) = (bit_count, capacity, hash_count) {
                    fpp = Some(equations::p(m, n, k));
                    making_progress = true;
                }
            }
        }

        match (fpp, capacity, bit_count, hash_count) {
            (Some(p), Some(n), Some(m), Some(k)) => FilterDimensions::new(p, n, m, k),
            _ => Err(BloomGateError::invalid_parameters(format!(
                "Could not compute dimensions from the provided values: {:?}",
                self
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_capacity_and_fpp() {
        let dims = FilterDimensions::for_capacity_and_fpp(6550, 0.01).unwrap();
        assert_eq!(dims.bit_count(), 62783);
        assert_eq!(dims.hash_count(), 7);
        assert_eq!(dims.capacity(), 6550);
        assert_eq!(dims.false_positive_probability(), 0.01);
    }

    #[test]
    fn test_solve_capacity_and_fpp_small() {
        let dims = FilterDimensions::for_capacity_and_fpp(4000, 0.01).unwrap();
        assert_eq!(dims.bit_count(), 38341);
        assert_eq!(dims.hash_count(), 7);
    }

    #[test]
    fn test_solve_capacity_and_fpp_large() {
        let dims = FilterDimensions::for_capacity_and_fpp(20_000_000, 0.05).unwrap();
        assert_eq!(dims.bit_count(), 124_704_485);
        assert_eq!(dims.hash_count(), 4);
    }

    #[test]
    fn test_solve_capacity_from_bits_hashes_and_fpp() {
        let dims = DimensionsBuilder::new()
            .bit_count(100_001)
            .hash_count(8)
            .false_positive_probability(0.03)
            .build()
            .unwrap();
        assert_eq!(dims.capacity(), 12950);
    }

    #[test]
    fn test_solve_fpp_from_capacity_bits_and_hashes() {
        let dims = DimensionsBuilder::new()
            .capacity(12345)
            .bit_count(123_456)
            .hash_count(5)
            .build()
            .unwrap();
        assert!(
            (dims.false_positive_probability() - 0.009429163).abs() < 1e-8,
            "got p = {}",
            dims.false_positive_probability()
        );
    }

    #[test]
    fn test_solve_from_capacity_and_bits_alone() {
        let dims = DimensionsBuilder::new()
            .capacity(12345)
            .bit_count(123_456)
            .build()
            .unwrap();
        assert_eq!(dims.hash_count(), 7);
        assert!(
            (dims.false_positive_probability() - 0.008191797).abs() < 1e-8,
            "got p = {}",
            dims.false_positive_probability()
        );
    }

    #[test]
    fn test_underdetermined_inputs_rejected() {
        let result = DimensionsBuilder::new().capacity(1000).build();
        assert!(matches!(
            result,
            Err(BloomGateError::InvalidParameters { .. })
        ));

        let result = DimensionsBuilder::new()
            .hash_count(7)
            .false_positive_probability(0.01)
            .build();
        assert!(result.is_err(), "fpp+hashCount alone is not buildable");
    }

    #[test]
    fn test_loose_fpp_solves_to_pointless_hash_count() {
        // p = 0.5 gives k = round(1.0) = 1, which the constructor rejects.
        let result = FilterDimensions::for_capacity_and_fpp(1000, 0.5);
        assert!(matches!(
            result,
            Err(BloomGateError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let dims = FilterDimensions {
            false_positive_probability: 0.01,
            capacity: 0,
            bit_count: 1000,
            hash_count: 7,
        };
        assert!(dims.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_fpp_bounds() {
        for p in [0.0, 1.0, -0.5, 1.5] {
            let dims = FilterDimensions {
                false_positive_probability: p,
                capacity: 100,
                bit_count: 1000,
                hash_count: 7,
            };
            assert!(dims.validate().is_err(), "p = {} should be rejected", p);
        }
    }

    #[test]
    fn test_validate_rejects_zero_bit_count() {
        let dims = FilterDimensions {
            false_positive_probability: 0.01,
            capacity: 100,
            bit_count: 0,
            hash_count: 7,
        };
        assert!(dims.validate().is_err());
    }

    #[test]
    fn test_validate_hash_count_boundaries() {
        let mk = |k: usize| FilterDimensions {
            false_positive_probability: 0.01,
            capacity: 100,
            bit_count: 1000,
            hash_count: k,
        };

        // Exactly 2 is allowed; the structural bound and validation agree.
        assert!(mk(2).validate().is_ok());
        assert!(mk(100).validate().is_ok());
        assert!(mk(1).validate().is_err());
        assert!(mk(0).validate().is_err());
        assert!(mk(101).validate().is_err());
    }

    #[test]
    fn test_diff_reports_each_field() {
        let a = FilterDimensions::for_capacity_and_fpp(1000, 0.01).unwrap();
        let b = FilterDimensions::for_capacity_and_fpp(2000, 0.02).unwrap();

        let diff = a.diff(&b);
        assert!(diff.iter().any(|d| d.starts_with("BitCount:")));
        assert!(diff.iter().any(|d| d.starts_with("Capacity:")));
        assert!(diff
            .iter()
            .any(|d| d.starts_with("FalsePositiveProbability:")));
    }

    #[test]
    fn test_diff_empty_for_equal_dimensions() {
        let a = FilterDimensions::for_capacity_and_fpp(1000, 0.01).unwrap();
        let b = a.clone();
        assert!(a.diff(&b).is_empty());
    }

    #[test]
    fn test_solved_dimensions_pass_validation() {
        for (n, p) in [(100, 0.05), (10_000, 0.01), (1_000_000, 0.001)] {
            let dims = FilterDimensions::for_capacity_and_fpp(n, p).unwrap();
            dims.validate().unwrap();
        }
    }

    #[test]
    fn test_round_trip_through_builder() {
        let dims = FilterDimensions::for_capacity_and_fpp(5000, 0.02).unwrap();
        let rebuilt = DimensionsBuilder::from_dimensions(&dims).build().unwrap();
        assert_eq!(dims, rebuilt);
    }

    #[test]
    fn test_serde_wire_names_are_camel_case() {
        let dims = FilterDimensions::for_capacity_and_fpp(1000, 0.01).unwrap();
        let json = serde_json::to_string(&dims).unwrap();
        assert!(json.contains("\"falsePositiveProbability\""));
        assert!(json.contains("\"bitCount\""));
        assert!(json.contains("\"hashCount\""));
        assert!(json.contains("\"capacity\""));

        let back: FilterDimensions = serde_json::from_str(&json).unwrap();
        assert_eq!(dims, back);
    }
}
