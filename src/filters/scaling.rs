//! The scaling filter chain.
//!
//! [`ScalingBloomFilter`] implements Scalable Bloom Filters (Almeida et
//! al., 2007): an ordered list of [`FixedBloomFilter`] generations, the
//! last of which is active and writable. When the active generation
//! fills, a new one is appended with more bits and a tighter error
//! rate, chosen so the compounded false positive probability across all
//! generations stays under the configured target.
//!
//! # Probe order
//!
//! Checks probe newest to oldest: recently added keys are the likeliest
//! hits, and the newest generation is the largest. A prepared add
//! checks the active generation first and only then scans the older
//! ones read-only, since only the active generation can accept the add.
//!
//! # Racing a scale
//!
//! A prepared add computed against generation *g* may commit after a
//! concurrent scale made *g+1* active. The indexes are only meaningful
//! against *g*'s slice size, so the commit is applied to *g* anyway,
//! with *g*'s capacity guard forced to `Ignore`. The overrun is bounded
//! by the number of in-flight prepares, a deliberate tradeoff against
//! rehashing under the write lock.
//!
//! # Examples
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<str>::new()
//!     .with_capacity_and_false_positive_probability(100, 0.01)
//!     .with_scaling(2.0, 0.8)
//!     .build()
//!     .unwrap();
//!
//! for i in 0..1000 {
//!     filter.insert(&format!("item-{i}")).unwrap();
//! }
//! // Grew past the initial capacity without erroring, and still
//! // remembers everything.
//! assert!(filter.contains("item-0"));
//! assert!(filter.contains("item-999"));
//! ```

use crate::core::{
    DimensionsBuilder, FilterParameters, MaxCapacityBehavior,
};
use crate::error::{BloomGateError, Result};
use crate::events::{FilterEvents, StateMetrics};
use crate::filters::fixed::FixedBloomFilter;
use crate::filters::prepared::CheckedEntry;
use crate::hash::KeyHasher;
use crate::state::{FilterState, API_VERSION};
use parking_lot::RwLock;
use std::sync::Arc;

/// Chain internals, shared between the filter handle and in-flight
/// prepared-add tokens.
pub(crate) struct ChainShared<K: ?Sized> {
    parameters: FilterParameters,
    hasher: Arc<dyn KeyHasher<K>>,
    events: Arc<FilterEvents>,
    metrics: StateMetrics,
    /// Generations oldest first; the last entry is active. Guarded by
    /// the chain's own lock, independent of each generation's lock.
    generations: RwLock<Vec<FixedBloomFilter<K>>>,
}

impl<K: ?Sized> ChainShared<K> {
    /// Commit a prepared add through the chain.
    ///
    /// Serialized by the chain write lock. Applies to the token's own
    /// generation — forcing `Ignore` when that generation is no longer
    /// active — then triggers a scale if the active generation has
    /// reached its capacity.
    pub(crate) fn apply_prepared(
        &self,
        generation: &FixedBloomFilter<K>,
        indexes: &[usize],
    ) -> Result<bool> {
        let mut generations = self.generations.write();

        let is_active = generations
            .last()
            .is_some_and(|active| active.shares_storage_with(generation));
        let behavior_override = if is_active {
            None
        } else {
            // The token predates a concurrent scale; accept a bounded
            // overrun on the stale generation rather than rehashing.
            Some(MaxCapacityBehavior::Ignore)
        };

        let added = generation.apply_prepared(indexes, behavior_override)?;
        if added {
            self.metrics.increment_count(1);
        }

        let active_full = generations
            .last()
            .is_some_and(|active| active.count() >= active.capacity() as u64);
        if active_full {
            self.scale(&mut generations)?;
        }

        Ok(added)
    }

    /// Append the next generation and make it active.
    ///
    /// Generation 0 rescales the configured false positive probability
    /// to `p · (1 − r)` so the geometric series of per-generation error
    /// contributions sums below the target `p`. Every later generation
    /// grows the bit budget, tightens the error rate, and adds hash
    /// functions per the Scalable Bloom Filters recurrence.
    fn scale(&self, generations: &mut Vec<FixedBloomFilter<K>>) -> Result<()> {
        let scaling = self.parameters.scaling();
        let index = generations.len();

        let dimensions = match generations.last() {
            None => {
                let configured = self.parameters.dimensions();
                let rescaled_fpp = configured.false_positive_probability()
                    * (1.0 - scaling.false_positive_probability_scaling);
                DimensionsBuilder::new()
                    .capacity(configured.capacity())
                    .false_positive_probability(rescaled_fpp)
                    .build()?
            }
            Some(active) => {
                let active = active.parameters().dimensions();
                let next_bit_count =
                    (active.bit_count() as f64 * scaling.capacity_scaling).round() as usize;
                let next_fpp = active.false_positive_probability()
                    * scaling.false_positive_probability_scaling;
                let next_hash_count = (active.hash_count() as f64
                    + index as f64 * (1.0 / scaling.false_positive_probability_scaling).log2())
                .ceil() as usize;

                DimensionsBuilder::new()
                    .bit_count(next_bit_count)
                    .false_positive_probability(next_fpp)
                    .hash_count(next_hash_count)
                    .build()?
            }
        };

        let next_parameters = self
            .parameters
            .derive(format!("{}[{}]", self.parameters.id(), index), dimensions);

        let generation = FixedBloomFilter::new(
            next_parameters.clone(),
            Arc::clone(&self.hasher),
            Arc::clone(&self.events),
        )?;
        generations.push(generation);

        self.metrics.set_capacity(
            generations
                .iter()
                .map(|g| g.parameters().dimensions().capacity())
                .sum(),
        );
        self.metrics.set_bit_count(
            generations
                .iter()
                .map(|g| g.parameters().dimensions().bit_count())
                .sum(),
        );
        self.metrics.on_scaled(&next_parameters);

        Ok(())
    }
}

/// A Bloom filter that grows instead of filling up.
///
/// Cheap to clone (the clone shares the same chain). Construct through
/// [`BloomFilterBuilder`](crate::builder::BloomFilterBuilder) with
/// scaling enabled.
pub struct ScalingBloomFilter<K: ?Sized> {
    shared: Arc<ChainShared<K>>,
}

impl<K: ?Sized> Clone for ScalingBloomFilter<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: ?Sized> ScalingBloomFilter<K> {
    /// Build a chain from persisted state, or fresh when the state
    /// carries no children.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidParameters`] when the parameters are
    /// invalid or the policy is not `Scale`;
    /// [`BloomGateError::InvalidSerializedState`] when a child state is
    /// malformed.
    pub(crate) fn from_state(
        state: &FilterState,
        hasher: Arc<dyn KeyHasher<K>>,
        events: Arc<FilterEvents>,
    ) -> Result<Self> {
        let parameters = state.parameters.clone().ok_or_else(|| {
            BloomGateError::invalid_serialized_state("filter state is missing parameters")
        })?;
        parameters.validate()?;

        if parameters.scaling().max_capacity_behavior != MaxCapacityBehavior::Scale {
            return Err(BloomGateError::invalid_parameters(
                "a scaling filter requires MaxCapacityBehavior::Scale",
            ));
        }

        let metrics = StateMetrics::new(&parameters, Arc::clone(&events));
        let shared = Arc::new(ChainShared {
            parameters,
            hasher,
            events,
            metrics,
            generations: RwLock::new(Vec::new()),
        });

        {
            let mut generations = shared.generations.write();

            if state.children.is_empty() && !state.bit_arrays.is_empty() {
                // A leaf-shaped state adopted into a chain: the single
                // filter becomes the active generation as-is.
                generations.push(FixedBloomFilter::from_state(
                    state,
                    Arc::clone(&shared.hasher),
                    Arc::clone(&shared.events),
                )?);
            } else if state.children.is_empty() {
                shared.scale(&mut generations)?;
            } else {
                for (i, child) in state.children.iter().enumerate() {
                    if child.parameters.is_none() {
                        return Err(BloomGateError::invalid_serialized_state(format!(
                            "child filter {} is missing parameters",
                            i
                        )));
                    }
                    generations.push(FixedBloomFilter::from_state(
                        child,
                        Arc::clone(&shared.hasher),
                        Arc::clone(&shared.events),
                    )?);
                }

                shared.metrics.set_capacity(
                    generations
                        .iter()
                        .map(|g| g.parameters().dimensions().capacity())
                        .sum(),
                );
                shared.metrics.set_bit_count(
                    generations
                        .iter()
                        .map(|g| g.parameters().dimensions().bit_count())
                        .sum(),
                );
            }
        }

        shared.metrics.set_count(state.count);

        Ok(Self { shared })
    }

    /// Chain identity.
    #[must_use]
    pub fn id(&self) -> &str {
        self.shared.parameters.id()
    }

    /// The chain-level parameters (generation 0 derives from these).
    #[must_use]
    pub fn parameters(&self) -> &FilterParameters {
        &self.shared.parameters
    }

    /// Total distinct keys added across all generations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.shared.metrics.count()
    }

    /// Number of generations currently in the chain.
    #[must_use]
    pub fn generation_count(&self) -> usize {
        self.shared.generations.read().len()
    }

    /// Mean saturation across generations.
    #[must_use]
    pub fn saturation(&self) -> f64 {
        let generations = self.shared.generations.read();
        if generations.is_empty() {
            return 0.0;
        }
        generations.iter().map(|g| g.saturation()).sum::<f64>() / generations.len() as f64
    }

    /// Check whether `key` might be present in any generation.
    ///
    /// Probes newest to oldest and stops at the first hit.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        let generations = self.shared.generations.read();

        for generation in generations.iter().rev() {
            if generation.contains(key) {
                self.shared.metrics.on_hit();
                return true;
            }
        }

        self.shared.metrics.on_miss();
        false
    }

    /// Check `key` across the chain and, when absent everywhere, return
    /// a token that commits into the active generation.
    ///
    /// The token carries the chain, so committing it updates the total
    /// count and can trigger a scale.
    #[must_use]
    pub fn check_and_prepare(&self, key: &K) -> CheckedEntry<K> {
        let generations = self.shared.generations.read();

        // The active generation is checked with a prepare, because it is
        // both the likeliest to contain a recent key and the only one
        // that can accept the add.
        let active = generations
            .last()
            .expect("a scaling chain always has an active generation");
        let entry = active.prepare_add(key);

        if !entry.is_definitely_absent() {
            self.shared.metrics.on_hit();
            return CheckedEntry::maybe_present();
        }

        for generation in generations.iter().rev().skip(1) {
            if generation.contains(key) {
                self.shared.metrics.on_hit();
                // Dropping the entry releases the prepared buffer.
                return CheckedEntry::maybe_present();
            }
        }

        self.shared.metrics.on_miss();
        match entry.into_prepared_add() {
            Some(prepared) => {
                CheckedEntry::addable(prepared.retarget_to_chain(Arc::clone(&self.shared)))
            }
            None => CheckedEntry::maybe_present(),
        }
    }

    /// Add `key` in one step, scaling if the add fills the active
    /// generation.
    ///
    /// Returns whether the key was newly added.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidParameters`] if a triggered scale cannot
    /// solve the next generation's dimensions.
    pub fn insert(&self, key: &K) -> Result<bool> {
        let entry = self.check_and_prepare(key);
        if entry.can_add() {
            entry.commit()
        } else {
            Ok(false)
        }
    }

    /// Report that a hit turned out to be a false positive.
    pub fn report_false_positive(&self) {
        self.shared.metrics.on_false_positive();
    }

    /// Snapshot the whole chain as persistable state.
    ///
    /// Children are emitted oldest to newest, matching the rehydration
    /// order.
    #[must_use]
    pub fn state(&self) -> FilterState {
        let generations = self.shared.generations.read();

        FilterState {
            api_version: API_VERSION.to_string(),
            parameters: Some(self.shared.parameters.clone()),
            count: self.shared.metrics.count(),
            bit_arrays: Vec::new(),
            children: generations.iter().map(|g| g.state()).collect(),
        }
    }
}

impl<K: ?Sized> std::fmt::Debug for ScalingBloomFilter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalingBloomFilter")
            .field("id", &self.id())
            .field("count", &self.count())
            .field("generations", &self.generation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FilterDimensions, ScalingPolicy};
    use crate::hash::Murmur3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn chain_params(id: &str, capacity: usize, fpp: f64) -> FilterParameters {
        FilterParameters::new(
            id,
            FilterDimensions::for_capacity_and_fpp(capacity, fpp).unwrap(),
            ScalingPolicy::scaling(2.0, 0.8),
            "murmur3",
        )
    }

    fn chain(capacity: usize, fpp: f64) -> ScalingBloomFilter<str> {
        let state = FilterState::new(chain_params("chain-test", capacity, fpp));
        ScalingBloomFilter::from_state(&state, Arc::new(Murmur3), Arc::new(FilterEvents::new()))
            .unwrap()
    }

    #[test]
    fn test_fresh_chain_has_one_rescaled_generation() {
        let c = chain(1000, 0.01);
        assert_eq!(c.generation_count(), 1);
        assert_eq!(c.count(), 0);

        let state = c.state();
        let generation = state.children[0].parameters.as_ref().unwrap();
        assert_eq!(generation.id(), "chain-test[0]");
        // p₀ = 0.01 · (1 − 0.8)
        let p0 = generation.dimensions().false_positive_probability();
        assert!((p0 - 0.002).abs() < 1e-12, "p0 = {}", p0);
        assert_eq!(generation.dimensions().capacity(), 1000);
    }

    #[test]
    fn test_requires_scale_policy() {
        let params = FilterParameters::new(
            "no-scale",
            FilterDimensions::for_capacity_and_fpp(100, 0.01).unwrap(),
            ScalingPolicy::default(),
            "murmur3",
        );
        let result: Result<ScalingBloomFilter<str>> = ScalingBloomFilter::from_state(
            &FilterState::new(params),
            Arc::new(Murmur3),
            Arc::new(FilterEvents::new()),
        );
        assert!(matches!(
            result,
            Err(BloomGateError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_scales_when_capacity_reached_and_keeps_all_keys() {
        let c = chain(100, 0.01);
        let keys: Vec<String> = (0..450).map(|i| format!("grow-{}", i)).collect();

        for key in &keys {
            c.insert(key).unwrap();
        }

        assert!(
            c.generation_count() >= 2,
            "expected at least one scale event, generations = {}",
            c.generation_count()
        );

        for key in &keys {
            assert!(c.contains(key), "lost {} after scaling", key);
        }
    }

    #[test]
    fn test_count_counts_distinct_keys_across_generations() {
        let c = chain(100, 0.01);
        for i in 0..250 {
            c.insert(&format!("distinct-{}", i)).unwrap();
        }
        let count_after_first_pass = c.count();
        // A few inserts may be absorbed as false positives, never more.
        assert!(count_after_first_pass <= 250);
        assert!(count_after_first_pass >= 240, "count = {}", count_after_first_pass);

        // Re-inserting existing keys must not bump the count.
        for i in 0..250 {
            assert!(!c.insert(&format!("distinct-{}", i)).unwrap());
        }
        assert_eq!(c.count(), count_after_first_pass);
    }

    #[test]
    fn test_generation_dimensions_follow_recurrence() {
        let c = chain(100, 0.01);
        for i in 0..260 {
            c.insert(&format!("rec-{}", i)).unwrap();
        }
        let state = c.state();
        assert!(state.children.len() >= 2);

        let g0 = state.children[0].parameters.as_ref().unwrap().dimensions();
        let g1 = state.children[1].parameters.as_ref().unwrap().dimensions();

        // Bit budget grows by the capacity scaling factor.
        let expected_bits = (g0.bit_count() as f64 * 2.0).round() as usize;
        assert_eq!(g1.bit_count(), expected_bits);

        // Error rate tightens by the fpp scaling factor.
        let expected_fpp = g0.false_positive_probability() * 0.8;
        assert!((g1.false_positive_probability() - expected_fpp).abs() < 1e-12);

        // Hash count: ceil(k₀ + 1 · log2(1/0.8))
        let expected_k = (g0.hash_count() as f64 + (1.0f64 / 0.8).log2()).ceil() as usize;
        assert_eq!(g1.hash_count(), expected_k);

        assert_eq!(
            state.children[1].parameters.as_ref().unwrap().id(),
            "chain-test[1]"
        );
    }

    #[test]
    fn test_two_phase_protocol_on_chain() {
        let c = chain(1000, 0.01);

        let entry = c.check_and_prepare("prepared-key");
        assert!(entry.is_definitely_absent());
        assert!(!c.contains("prepared-key"));
        assert!(entry.commit().unwrap());
        assert!(c.contains("prepared-key"));
        assert_eq!(c.count(), 1);

        let entry = c.check_and_prepare("prepared-key");
        assert!(!entry.is_definitely_absent());
        assert!(!entry.commit().unwrap());
    }

    #[test]
    fn test_key_in_old_generation_is_found_by_prepare() {
        let c = chain(100, 0.01);
        c.insert("early-bird").unwrap();

        // Force at least one scale so "early-bird" lives in an old generation.
        for i in 0..300 {
            c.insert(&format!("filler-{}", i)).unwrap();
        }
        assert!(c.generation_count() >= 2);

        let entry = c.check_and_prepare("early-bird");
        assert!(!entry.is_definitely_absent());
        assert!(!entry.can_add());
    }

    #[test]
    fn test_stale_token_commits_into_original_generation() {
        let c = chain(100, 0.01);

        // Prepare against the current active generation...
        let entry = c.check_and_prepare("straggler");
        let stale_token = entry.into_prepared_add().unwrap();
        let original_generation = stale_token.filter_id().to_string();

        // ...then scale the chain out from under it.
        for i in 0..300 {
            c.insert(&format!("churn-{}", i)).unwrap();
        }
        assert!(c.generation_count() >= 2);
        let active_id = c.state().children.last().unwrap()
            .parameters
            .as_ref()
            .unwrap()
            .id()
            .to_string();
        assert_ne!(original_generation, active_id);

        // The stale commit still lands, in the original generation.
        stale_token.commit().unwrap();
        assert!(c.contains("straggler"));
    }

    #[test]
    fn test_scale_event_fires_with_new_parameters() {
        let scaled = Arc::new(Mutex::new(Vec::new()));
        let scaled_in_cb = Arc::clone(&scaled);

        let mut events = FilterEvents::new();
        events.on_scaled = Some(Box::new(move |id, params| {
            scaled_in_cb
                .lock()
                .unwrap()
                .push((id.to_string(), params.id().to_string()));
        }));

        let state = FilterState::new(chain_params("evented", 100, 0.01));
        let c: ScalingBloomFilter<str> =
            ScalingBloomFilter::from_state(&state, Arc::new(Murmur3), Arc::new(events)).unwrap();

        for i in 0..150 {
            c.insert(&format!("ev-{}", i)).unwrap();
        }

        let scaled = scaled.lock().unwrap();
        // Construction creates generation 0, the overflow creates [1].
        assert!(scaled.len() >= 2);
        assert_eq!(scaled[0], ("evented".to_string(), "evented[0]".to_string()));
        assert_eq!(scaled[1], ("evented".to_string(), "evented[1]".to_string()));
    }

    #[test]
    fn test_hit_and_miss_events() {
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));

        let mut events = FilterEvents::new();
        {
            let hits = Arc::clone(&hits);
            events.on_hit = Some(Box::new(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            }));
        }
        {
            let misses = Arc::clone(&misses);
            events.on_miss = Some(Box::new(move |_| {
                misses.fetch_add(1, Ordering::Relaxed);
            }));
        }

        let state = FilterState::new(chain_params("hitmiss", 1000, 0.01));
        let c: ScalingBloomFilter<str> =
            ScalingBloomFilter::from_state(&state, Arc::new(Murmur3), Arc::new(events)).unwrap();

        c.insert("present").unwrap();
        let misses_after_insert = misses.load(Ordering::Relaxed);
        assert_eq!(misses_after_insert, 1, "the insert's prepare is a miss");

        assert!(c.contains("present"));
        assert_eq!(hits.load(Ordering::Relaxed), 1);

        assert!(!c.contains("absent"));
        assert_eq!(misses.load(Ordering::Relaxed), misses_after_insert + 1);
    }

    #[test]
    fn test_state_round_trip_preserves_generations() {
        let c = chain(100, 0.01);
        let keys: Vec<String> = (0..350).map(|i| format!("persist-{}", i)).collect();
        for key in &keys {
            c.insert(key).unwrap();
        }
        let generations_before = c.generation_count();
        assert!(generations_before >= 2);

        let state = c.state();
        let restored: ScalingBloomFilter<str> = ScalingBloomFilter::from_state(
            &state,
            Arc::new(Murmur3),
            Arc::new(FilterEvents::new()),
        )
        .unwrap();

        assert_eq!(restored.generation_count(), generations_before);
        assert_eq!(restored.count(), c.count());
        assert_eq!(restored.state(), state, "round trip must be bit-exact");
        for key in &keys {
            assert!(restored.contains(key));
        }
    }

    #[test]
    fn test_saturation_is_mean_of_generations() {
        let c = chain(100, 0.01);
        for i in 0..250 {
            c.insert(&format!("sat-{}", i)).unwrap();
        }
        let saturation = c.saturation();
        assert!(
            saturation > 0.0 && saturation <= 1.0,
            "mean saturation must stay within [0, 1], got {}",
            saturation
        );
    }
}
