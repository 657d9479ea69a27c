//! Observability callbacks and the counters that feed them.
//!
//! [`FilterEvents`] is the crate's whole observability surface: a set
//! of optional fire-and-forget callbacks. The filters never branch on
//! whether a callback is present — correctness is identical with all,
//! some, or none of them set. Callbacks run synchronously on the
//! calling thread, inside the operation that triggered them; keep them
//! cheap and non-blocking.
//!
//! # Examples
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//! use bloomgate::events::FilterEvents;
//!
//! let scaled = Arc::new(AtomicU64::new(0));
//! let scaled_in_cb = Arc::clone(&scaled);
//!
//! let mut events = FilterEvents::new();
//! events.on_scaled = Some(Box::new(move |_id, _params| {
//!     scaled_in_cb.fetch_add(1, Ordering::Relaxed);
//! }));
//! ```

use crate::core::FilterParameters;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Callback type for id-only notifications (hit, miss, false positive).
pub type IdCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Optional event callbacks, fired as filter state changes.
///
/// All fields default to `None`. Each callback receives the id of the
/// filter (for a scaling chain, the chain's id) that fired it.
#[derive(Default)]
pub struct FilterEvents {
    /// Total capacity changed (fires on scale and on rehydration).
    pub on_capacity_changed: Option<Box<dyn Fn(&str, usize) + Send + Sync>>,

    /// Item count changed; receives the new count.
    pub on_count_changed: Option<Box<dyn Fn(&str, u64) + Send + Sync>>,

    /// Total bit count changed (fires on scale and on rehydration).
    pub on_bit_count_changed: Option<Box<dyn Fn(&str, usize) + Send + Sync>>,

    /// A scaling chain grew; receives the chain id and the new
    /// generation's parameters.
    pub on_scaled: Option<Box<dyn Fn(&str, &FilterParameters) + Send + Sync>>,

    /// A check found the key (maybe) present.
    pub on_hit: Option<IdCallback>,

    /// A check found the key definitely absent.
    pub on_miss: Option<IdCallback>,

    /// The caller confirmed a hit was a false positive.
    pub on_false_positive: Option<IdCallback>,
}

impl FilterEvents {
    /// Callbacks with nothing wired up.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for FilterEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEvents")
            .field("on_capacity_changed", &self.on_capacity_changed.is_some())
            .field("on_count_changed", &self.on_count_changed.is_some())
            .field("on_bit_count_changed", &self.on_bit_count_changed.is_some())
            .field("on_scaled", &self.on_scaled.is_some())
            .field("on_hit", &self.on_hit.is_some())
            .field("on_miss", &self.on_miss.is_some())
            .field("on_false_positive", &self.on_false_positive.is_some())
            .finish()
    }
}

/// Live counters for one filter or chain, fanned out to callbacks.
///
/// Count updates use atomics so read-locked operations can bump them;
/// capacity only changes under the owner's write lock but is read
/// without any lock, hence also atomic.
pub(crate) struct StateMetrics {
    id: String,
    events: Arc<FilterEvents>,
    count: AtomicU64,
    capacity: AtomicUsize,
}

impl StateMetrics {
    pub(crate) fn new(parameters: &FilterParameters, events: Arc<FilterEvents>) -> Self {
        Self {
            id: parameters.id().to_string(),
            events,
            count: AtomicU64::new(0),
            capacity: AtomicUsize::new(parameters.dimensions().capacity()),
        }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Add to the count and notify.
    pub(crate) fn increment_count(&self, amount: u64) {
        let value = self.count.fetch_add(amount, Ordering::AcqRel) + amount;
        if let Some(cb) = &self.events.on_count_changed {
            cb(&self.id, value);
        }
    }

    /// Overwrite the count (rehydration) and notify.
    pub(crate) fn set_count(&self, value: u64) {
        self.count.store(value, Ordering::Release);
        if let Some(cb) = &self.events.on_count_changed {
            cb(&self.id, value);
        }
    }

    /// Overwrite the capacity (scale, rehydration) and notify.
    pub(crate) fn set_capacity(&self, value: usize) {
        self.capacity.store(value, Ordering::Release);
        if let Some(cb) = &self.events.on_capacity_changed {
            cb(&self.id, value);
        }
    }

    /// Report the new total bit count (scale, rehydration).
    pub(crate) fn set_bit_count(&self, value: usize) {
        if let Some(cb) = &self.events.on_bit_count_changed {
            cb(&self.id, value);
        }
    }

    pub(crate) fn on_scaled(&self, new_generation: &FilterParameters) {
        if let Some(cb) = &self.events.on_scaled {
            cb(&self.id, new_generation);
        }
    }

    pub(crate) fn on_hit(&self) {
        if let Some(cb) = &self.events.on_hit {
            cb(&self.id);
        }
    }

    pub(crate) fn on_miss(&self) {
        if let Some(cb) = &self.events.on_miss {
            cb(&self.id);
        }
    }

    pub(crate) fn on_false_positive(&self) {
        if let Some(cb) = &self.events.on_false_positive {
            cb(&self.id);
        }
    }
}

impl fmt::Debug for StateMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMetrics")
            .field("id", &self.id)
            .field("count", &self.count())
            .field("capacity", &self.capacity())
            .finish()
    }
}
