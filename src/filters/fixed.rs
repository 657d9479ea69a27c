//! The fixed-capacity Bloom filter.
//!
//! [`FixedBloomFilter`] is the workhorse: `hash_count` prime-sized bit
//! slices, enhanced double hashing, and a single reader-writer lock.
//! Checks and prepared adds run under the read lock (many concurrent
//! readers); commits and direct inserts take the write lock for the
//! O(hash_count) bit flips only.
//!
//! The type is a cheap-to-clone handle over shared storage: clones see
//! the same bits, and prepared-add tokens keep the storage alive until
//! committed or dropped.
//!
//! # Slice sizing
//!
//! Each slice holds the smallest prime number of bits at or above
//! `⌈bit_count / hash_count⌉` — hash values distribute better modulo a
//! prime, and per-slice addressing keeps the hash functions
//! independent. The filter's real bit usage is therefore slightly above
//! the solved `bit_count`.
//!
//! # Capacity
//!
//! The capacity guard runs before any bit is set: past capacity, adds
//! fail under [`MaxCapacityBehavior::Throw`] and proceed under
//! [`MaxCapacityBehavior::Ignore`]. The `Scale` policy is handled one
//! level up by [`ScalingBloomFilter`](crate::filters::ScalingBloomFilter);
//! this type never scales itself.
//!
//! # Examples
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<str>::new()
//!     .with_capacity_and_false_positive_probability(10_000, 0.01)
//!     .build()
//!     .unwrap();
//!
//! assert!(filter.insert("first sighting").unwrap());
//! assert!(filter.contains("first sighting"));
//! assert!(!filter.insert("first sighting").unwrap());
//! ```

use crate::core::{next_prime, BitSlices, FilterParameters, MaxCapacityBehavior};
use crate::error::{BloomGateError, Result};
use crate::events::{FilterEvents, StateMetrics};
use crate::filters::prepared::{CheckedEntry, IndexPool, PreparedAdd};
use crate::hash::{slice_indexes, KeyHasher, FIRST_HASH_SEED, SECOND_HASH_SEED};
use crate::state::{FilterState, API_VERSION};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared storage behind every handle and token for one filter.
struct FixedInner<K: ?Sized> {
    parameters: FilterParameters,
    hash_count: usize,
    bits_per_slice: usize,
    capacity_behavior: MaxCapacityBehavior,
    slices: RwLock<BitSlices>,
    metrics: StateMetrics,
    index_pool: IndexPool,
    hasher: Arc<dyn KeyHasher<K>>,
}

/// A non-scaling Bloom filter with prime-sized slices and a two-phase
/// add protocol.
///
/// Cloning is cheap and clones share the same bits.
pub struct FixedBloomFilter<K: ?Sized> {
    inner: Arc<FixedInner<K>>,
}

impl<K: ?Sized> Clone for FixedBloomFilter<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: ?Sized> FixedBloomFilter<K> {
    /// Build an empty filter from validated parameters.
    pub(crate) fn new(
        parameters: FilterParameters,
        hasher: Arc<dyn KeyHasher<K>>,
        events: Arc<FilterEvents>,
    ) -> Result<Self> {
        Self::from_parts(parameters, None, 0, hasher, events)
    }

    /// Rehydrate from persisted state, byte-for-byte, no rehashing.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] when the state lacks
    /// parameters or its bit arrays do not match them;
    /// [`BloomGateError::InvalidParameters`] from parameter validation.
    pub(crate) fn from_state(
        state: &FilterState,
        hasher: Arc<dyn KeyHasher<K>>,
        events: Arc<FilterEvents>,
    ) -> Result<Self> {
        let parameters = state.parameters.clone().ok_or_else(|| {
            BloomGateError::invalid_serialized_state("filter state is missing parameters")
        })?;

        let bit_arrays = if state.bit_arrays.is_empty() {
            None
        } else {
            Some(state.bit_arrays.as_slice())
        };

        Self::from_parts(parameters, bit_arrays, state.count, hasher, events)
    }

    fn from_parts(
        parameters: FilterParameters,
        bit_arrays: Option<&[Vec<u8>]>,
        count: u64,
        hasher: Arc<dyn KeyHasher<K>>,
        events: Arc<FilterEvents>,
    ) -> Result<Self> {
        parameters.validate()?;

        let hash_count = parameters.dimensions().hash_count();
        let bits_per_slice =
            compute_bits_per_slice(parameters.dimensions().bit_count(), hash_count)?;

        let slices = match bit_arrays {
            Some(blobs) => BitSlices::from_bytes(blobs, hash_count, bits_per_slice)?,
            None => BitSlices::new(hash_count, bits_per_slice),
        };

        let metrics = StateMetrics::new(&parameters, events);
        metrics.set_count(count);

        Ok(Self {
            inner: Arc::new(FixedInner {
                capacity_behavior: parameters.scaling().max_capacity_behavior,
                hash_count,
                bits_per_slice,
                slices: RwLock::new(slices),
                metrics,
                index_pool: IndexPool::new(hash_count),
                hasher,
                parameters,
            }),
        })
    }

    /// Filter identity.
    #[must_use]
    pub fn id(&self) -> &str {
        self.inner.parameters.id()
    }

    /// The parameters this filter was built with.
    #[must_use]
    pub fn parameters(&self) -> &FilterParameters {
        &self.inner.parameters
    }

    /// Number of distinct keys added.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.metrics.count()
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.parameters.dimensions().capacity()
    }

    /// Bits per slice after prime rounding.
    #[must_use]
    pub fn bits_per_slice(&self) -> usize {
        self.inner.bits_per_slice
    }

    /// Fraction of bits set, across all slices.
    ///
    /// A proxy for how close the filter is to its statistical design
    /// limit; not used internally for correctness.
    #[must_use]
    pub fn saturation(&self) -> f64 {
        let set_bits = self.inner.slices.read().count_ones();
        set_bits as f64 / (self.inner.hash_count * self.inner.bits_per_slice) as f64
    }

    /// Check whether `key` might be present.
    ///
    /// Returns `false` only when the key is definitely absent; `true`
    /// means "maybe present" with the configured false positive
    /// probability. Read lock only; probing stops at the first unset
    /// bit, so the second hash is not even computed when the first
    /// slice already misses.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        let inner = &*self.inner;
        let slices = inner.slices.read();

        let h1 = inner.hasher.hash(key, FIRST_HASH_SEED);
        if !slices.get(0, h1 as usize % inner.bits_per_slice) {
            return false;
        }

        let h2 = inner.hasher.hash(key, SECOND_HASH_SEED);
        if !slices.get(1, h2 as usize % inner.bits_per_slice) {
            return false;
        }

        for i in 2..inner.hash_count {
            let mixed = h1.wrapping_add(i as u32).wrapping_mul(h2);
            if !slices.get(i, mixed as usize % inner.bits_per_slice) {
                return false;
            }
        }

        true
    }

    /// Check `key` and, when absent, return a token that can commit the
    /// add without rehashing.
    ///
    /// Runs under the read lock. When every bit is already set the
    /// pooled buffer is returned immediately and the entry carries no
    /// token.
    #[must_use]
    pub fn prepare_add(&self, key: &K) -> CheckedEntry<K> {
        let inner = &*self.inner;
        let slices = inner.slices.read();

        let mut indexes = inner.index_pool.acquire();
        let h1 = inner.hasher.hash(key, FIRST_HASH_SEED);
        let h2 = inner.hasher.hash(key, SECOND_HASH_SEED);
        slice_indexes(h1, h2, inner.bits_per_slice, &mut indexes);

        let maybe_present = indexes
            .iter()
            .enumerate()
            .all(|(slice, &index)| slices.get(slice, index));

        if maybe_present {
            inner.index_pool.release(indexes);
            return CheckedEntry::maybe_present();
        }

        CheckedEntry::addable(PreparedAdd::for_generation(self.clone(), indexes))
    }

    /// Add `key` in one step, without exposing the intermediate token.
    ///
    /// Hashing and bit-setting both happen under the write lock.
    /// Returns whether any bit changed (the key was not already fully
    /// present).
    ///
    /// # Errors
    ///
    /// [`BloomGateError::MaxCapacityExceeded`] past capacity under the
    /// `Throw` policy.
    pub fn insert(&self, key: &K) -> Result<bool> {
        let inner = &*self.inner;
        let mut slices = inner.slices.write();
        self.validate_capacity(inner.capacity_behavior)?;

        let h1 = inner.hasher.hash(key, FIRST_HASH_SEED);
        let h2 = inner.hasher.hash(key, SECOND_HASH_SEED);

        let mut was_present =
            slices.set_returning_previous(0, h1 as usize % inner.bits_per_slice);
        was_present &= slices.set_returning_previous(1, h2 as usize % inner.bits_per_slice);
        for i in 2..inner.hash_count {
            let mixed = h1.wrapping_add(i as u32).wrapping_mul(h2);
            was_present &=
                slices.set_returning_previous(i, mixed as usize % inner.bits_per_slice);
        }

        if !was_present {
            inner.metrics.increment_count(1);
        }

        Ok(!was_present)
    }

    /// Apply precomputed indexes under the write lock.
    ///
    /// `behavior_override` lets a scaling chain force `Ignore` for a
    /// commit that raced a scale; everything else re-validates with the
    /// filter's own policy.
    pub(crate) fn apply_prepared(
        &self,
        indexes: &[usize],
        behavior_override: Option<MaxCapacityBehavior>,
    ) -> Result<bool> {
        let inner = &*self.inner;
        let mut slices = inner.slices.write();
        self.validate_capacity(behavior_override.unwrap_or(inner.capacity_behavior))?;

        let mut made_change = false;
        for (slice, &index) in indexes.iter().enumerate().take(inner.hash_count) {
            made_change |= !slices.set_returning_previous(slice, index);
        }

        if made_change {
            inner.metrics.increment_count(1);
        }

        Ok(made_change)
    }

    /// Report that a hit turned out to be a false positive.
    pub fn report_false_positive(&self) {
        self.inner.metrics.on_false_positive();
    }

    /// Snapshot the filter as persistable state.
    ///
    /// Taken under the read lock, so the snapshot is consistent with a
    /// single point in time.
    #[must_use]
    pub fn state(&self) -> FilterState {
        let slices = self.inner.slices.read();

        FilterState {
            api_version: API_VERSION.to_string(),
            parameters: Some(self.inner.parameters.clone()),
            count: self.inner.metrics.count(),
            bit_arrays: slices.to_bytes(),
            children: Vec::new(),
        }
    }

    /// Whether two handles share the same underlying storage.
    pub(crate) fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn index_pool(&self) -> &IndexPool {
        &self.inner.index_pool
    }

    fn validate_capacity(&self, behavior: MaxCapacityBehavior) -> Result<()> {
        if behavior == MaxCapacityBehavior::Ignore {
            return Ok(());
        }

        let capacity = self.inner.metrics.capacity();
        if self.inner.metrics.count() > capacity as u64 {
            return Err(BloomGateError::max_capacity_exceeded(capacity));
        }

        Ok(())
    }
}

impl<K: ?Sized> std::fmt::Debug for FixedBloomFilter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedBloomFilter")
            .field("id", &self.id())
            .field("count", &self.count())
            .field("capacity", &self.capacity())
            .field("hash_count", &self.inner.hash_count)
            .field("bits_per_slice", &self.inner.bits_per_slice)
            .finish()
    }
}

/// Slice width for a filter: the smallest prime at or above the even
/// split of the bit budget.
pub(crate) fn compute_bits_per_slice(bit_count: usize, hash_count: usize) -> Result<usize> {
    next_prime(bit_count.div_ceil(hash_count))
}
