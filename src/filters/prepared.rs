//! The two-phase prepared-add protocol.
//!
//! Computing `k` hash indexes dominates the cost of an add. Under a
//! check-then-add workload, recomputing them at add time doubles that
//! cost, so the protocol splits the work: *prepare* computes and checks
//! under a shared read lock, returning a [`PreparedAdd`] token holding
//! the indexes; *commit* applies them under the exclusive write lock.
//! Many threads prepare concurrently; only the bit mutation serializes.
//!
//! The token's index buffer is checked out of a per-filter
//! [`IndexPool`] and must go back exactly once, whether or not the add
//! is applied. The token owns the buffer and returns it on
//! [`commit`](PreparedAdd::commit) or on drop — forgetting to commit
//! wastes the preparation but leaks nothing and corrupts nothing.
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<String>::new()
//!     .with_capacity_and_false_positive_probability(1000, 0.01)
//!     .build()
//!     .unwrap();
//!
//! let entry = filter.check_and_prepare(&"login:alice".to_string());
//! if entry.is_definitely_absent() {
//!     // ... do the expensive thing guarded by the filter ...
//!     let added = entry.commit().unwrap();
//!     assert!(added);
//! }
//! ```

use crate::error::Result;
use crate::filters::fixed::FixedBloomFilter;
use crate::filters::scaling::ChainShared;
use parking_lot::Mutex;
use std::sync::Arc;

/// Most buffers retained per pool; beyond this, returns are dropped.
const MAX_POOLED_BUFFERS: usize = 10;

/// Checkout/return pool of index buffers, one pool per filter.
///
/// Avoids allocating a `k`-wide buffer on every prepared add. The pool
/// is bounded: a burst of concurrent prepares allocates extra buffers,
/// and the surplus is freed as they come back.
#[derive(Debug)]
pub(crate) struct IndexPool {
    /// Buffer width; always the owning filter's hash count.
    width: usize,
    buffers: Mutex<Vec<Box<[usize]>>>,
}

impl IndexPool {
    pub(crate) fn new(width: usize) -> Self {
        Self {
            width,
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Check a buffer out, allocating if the pool is empty.
    pub(crate) fn acquire(&self) -> Box<[usize]> {
        self.buffers
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0usize; self.width].into_boxed_slice())
    }

    /// Return a buffer. Called exactly once per checkout, via
    /// [`PreparedAdd`]'s commit or drop path.
    pub(crate) fn release(&self, buffer: Box<[usize]>) {
        debug_assert_eq!(
            buffer.len(),
            self.width,
            "index buffer returned to the wrong pool"
        );

        let mut buffers = self.buffers.lock();
        if buffers.len() < MAX_POOLED_BUFFERS {
            buffers.push(buffer);
        }
    }
}

/// Where a prepared add gets committed.
pub(crate) enum CommitTarget<K: ?Sized> {
    /// Directly to the generation that prepared it (standalone fixed filter).
    Generation,

    /// Through the scaling chain, which tracks the total count and
    /// triggers scaling.
    Chain(Arc<ChainShared<K>>),
}

/// A prepared add: precomputed slice indexes bound to the exact filter
/// generation that computed them.
///
/// Commit applies the indexes to that generation even if the chain has
/// scaled past it in the meantime — the indexes are only meaningful
/// against the generation's own slice size. Dropping the token without
/// committing abandons the add and returns the buffer.
pub struct PreparedAdd<K: ?Sized> {
    /// The generation whose slices the indexes address.
    generation: FixedBloomFilter<K>,
    target: CommitTarget<K>,
    /// `Some` until committed or dropped; the `Option` is what makes a
    /// double release unrepresentable.
    indexes: Option<Box<[usize]>>,
}

impl<K: ?Sized> PreparedAdd<K> {
    pub(crate) fn for_generation(generation: FixedBloomFilter<K>, indexes: Box<[usize]>) -> Self {
        Self {
            generation,
            target: CommitTarget::Generation,
            indexes: Some(indexes),
        }
    }

    /// Rebind a generation-targeted token to commit through a chain.
    pub(crate) fn retarget_to_chain(mut self, chain: Arc<ChainShared<K>>) -> Self {
        Self {
            generation: self.generation.clone(),
            target: CommitTarget::Chain(chain),
            indexes: self.indexes.take(),
        }
    }

    /// Id of the generation the indexes were computed against.
    #[must_use]
    pub fn filter_id(&self) -> &str {
        self.generation.id()
    }

    /// Apply the prepared indexes.
    ///
    /// Returns whether any bit changed, i.e. whether the key was newly
    /// added. The index buffer is returned to its pool regardless of
    /// the outcome.
    ///
    /// # Errors
    ///
    /// [`MaxCapacityExceeded`](crate::BloomGateError::MaxCapacityExceeded)
    /// when the target filter is full under the `Throw` policy.
    pub fn commit(mut self) -> Result<bool> {
        let indexes = match self.indexes.take() {
            Some(indexes) => indexes,
            // Unreachable through public construction, but harmless.
            None => return Ok(false),
        };

        let result = match &self.target {
            CommitTarget::Generation => self.generation.apply_prepared(&indexes, None),
            CommitTarget::Chain(chain) => chain.apply_prepared(&self.generation, &indexes),
        };

        self.generation.index_pool().release(indexes);
        result
    }
}

impl<K: ?Sized> Drop for PreparedAdd<K> {
    fn drop(&mut self) {
        if let Some(indexes) = self.indexes.take() {
            self.generation.index_pool().release(indexes);
        }
    }
}

impl<K: ?Sized> std::fmt::Debug for PreparedAdd<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedAdd")
            .field("filter_id", &self.filter_id())
            .field("pending", &self.indexes.is_some())
            .finish()
    }
}

/// Outcome of a check that may carry a prepared add.
///
/// Either the key was maybe present (no token — the "already added"
/// sentinel), or it was definitely absent and the entry holds a token
/// ready to commit.
#[derive(Debug)]
pub struct CheckedEntry<K: ?Sized> {
    definitely_absent: bool,
    prepared: Option<PreparedAdd<K>>,
}

impl<K: ?Sized> CheckedEntry<K> {
    /// The key was maybe present; nothing to add.
    pub(crate) fn maybe_present() -> Self {
        Self {
            definitely_absent: false,
            prepared: None,
        }
    }

    /// The key was absent and can be committed via the token.
    pub(crate) fn addable(prepared: PreparedAdd<K>) -> Self {
        Self {
            definitely_absent: true,
            prepared: Some(prepared),
        }
    }

    /// Whether the filter proved the key absent.
    #[must_use]
    pub fn is_definitely_absent(&self) -> bool {
        self.definitely_absent
    }

    /// Whether a commit is possible.
    #[must_use]
    pub fn can_add(&self) -> bool {
        self.prepared.is_some()
    }

    /// Take the token out of the entry, if any.
    #[must_use]
    pub fn into_prepared_add(self) -> Option<PreparedAdd<K>> {
        self.prepared
    }

    /// Commit the prepared add, if any.
    ///
    /// Returns `Ok(false)` when there is nothing to commit (the key was
    /// already present).
    ///
    /// # Errors
    ///
    /// Propagates [`PreparedAdd::commit`] errors.
    pub fn commit(self) -> Result<bool> {
        match self.prepared {
            Some(prepared) => prepared.commit(),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_buffers() {
        let pool = IndexPool::new(7);
        let a = pool.acquire();
        let a_ptr = a.as_ptr();
        pool.release(a);

        let b = pool.acquire();
        assert_eq!(b.as_ptr(), a_ptr, "released buffer should be reused");
        assert_eq!(b.len(), 7);
        pool.release(b);
    }

    #[test]
    fn test_pool_allocates_under_pressure() {
        let pool = IndexPool::new(3);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
        pool.release(a);
        pool.release(b);
    }

    #[test]
    fn test_pool_caps_retained_buffers() {
        let pool = IndexPool::new(2);
        let buffers: Vec<_> = (0..MAX_POOLED_BUFFERS + 5).map(|_| pool.acquire()).collect();
        for buffer in buffers {
            pool.release(buffer);
        }
        assert_eq!(pool.buffers.lock().len(), MAX_POOLED_BUFFERS);
    }
}
