//! Filter construction: options, state merging, and the builder.
//!
//! [`BloomFilterBuilder`] resolves a [`BloomFilterOptions`] value and an
//! optional persisted [`FilterState`] into either a fixed filter or a
//! scaling chain. Configuration is an explicit value threaded through
//! the builder — there is no global default-options singleton to
//! mutate.
//!
//! # Merging persisted state
//!
//! When the builder is given state whose parameters differ from the
//! configured ones, [`StateValidationBehavior`] decides the outcome:
//! fail loudly (the default), let the state win, or drop the state and
//! start fresh. Parameter comparison happens here — at build time, with
//! both sides known — not at decode time.
//!
//! # Examples
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<str>::new()
//!     .with_capacity_and_false_positive_probability(50_000, 0.001)
//!     .build()
//!     .unwrap();
//!
//! filter.insert("seen").unwrap();
//!
//! // Persist and rebuild elsewhere, without rehashing anything.
//! let document = filter.state().serialize().unwrap();
//! let restored = BloomFilterBuilder::<str>::new()
//!     .with_capacity_and_false_positive_probability(50_000, 0.001)
//!     .with_serialized_state(&document)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! assert!(restored.contains("seen"));
//! ```

use crate::core::{DimensionsBuilder, FilterParameters, MaxCapacityBehavior, ScalingPolicy};
use crate::error::{BloomGateError, Result};
use crate::events::FilterEvents;
use crate::filters::{BloomFilter, FixedBloomFilter, ScalingBloomFilter};
use crate::hash::{resolve_algorithm, KeyBytes, KeyHasher, Murmur3};
use crate::state::FilterState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How to reconcile persisted parameters with configured ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateValidationBehavior {
    /// Fail with
    /// [`ParameterMismatch`](crate::BloomGateError::ParameterMismatch)
    /// when imported state disagrees with the configuration.
    #[default]
    ThrowIfInconsistent,

    /// The imported state's parameters win; the configured dimensions
    /// and policy are ignored.
    PreferStateConfiguration,

    /// The imported state is dropped and a fresh filter is built from
    /// the configured parameters.
    DiscardInconsistentState,
}

/// Everything the builder needs to construct a filter.
///
/// Plain data with public fields; [`BloomFilterBuilder`]'s methods are
/// a fluent veneer over it.
pub struct BloomFilterOptions<K: ?Sized> {
    /// Filter id; generated when absent and not supplied by state.
    pub id: Option<String>,

    /// Partially-specified dimensions, solved at build time.
    pub dimensions: DimensionsBuilder,

    /// Capacity policy and growth factors.
    pub scaling: ScalingPolicy,

    /// Reconciliation behavior for imported state.
    pub state_validation: StateValidationBehavior,

    /// Observability callbacks.
    pub events: Arc<FilterEvents>,

    /// Key hasher; its algorithm id is persisted with the filter.
    pub hasher: Arc<dyn KeyHasher<K>>,
}

impl<K: KeyBytes + ?Sized> Default for BloomFilterOptions<K> {
    fn default() -> Self {
        Self {
            id: None,
            dimensions: DimensionsBuilder::new()
                .capacity(10_000)
                .false_positive_probability(0.01),
            scaling: ScalingPolicy::default(),
            state_validation: StateValidationBehavior::default(),
            events: Arc::new(FilterEvents::new()),
            hasher: Arc::new(Murmur3),
        }
    }
}

impl<K: ?Sized> std::fmt::Debug for BloomFilterOptions<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilterOptions")
            .field("id", &self.id)
            .field("dimensions", &self.dimensions)
            .field("scaling", &self.scaling)
            .field("state_validation", &self.state_validation)
            .field("hash_algorithm", &self.hasher.algorithm())
            .finish()
    }
}

/// Fluent builder for [`BloomFilter`].
pub struct BloomFilterBuilder<K: ?Sized> {
    options: BloomFilterOptions<K>,
    state: Option<FilterState>,
}

impl<K: KeyBytes + ?Sized> BloomFilterBuilder<K> {
    /// A builder with default options: capacity 10 000, false positive
    /// probability 1%, `Throw` capacity policy, Murmur3 hashing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: BloomFilterOptions::default(),
            state: None,
        }
    }
}

impl<K: KeyBytes + ?Sized> Default for BloomFilterBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized> BloomFilterBuilder<K> {
    /// Start from fully-assembled options instead of the defaults.
    #[must_use]
    pub fn with_options(options: BloomFilterOptions<K>) -> Self {
        Self {
            options,
            state: None,
        }
    }

    /// Set the filter id.
    ///
    /// An id supplied by imported state takes precedence; without
    /// either, a process-unique id is generated.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.options.id = Some(id.into());
        self
    }

    /// Size the filter for `capacity` keys at the given false positive
    /// probability.
    #[must_use]
    pub fn with_capacity_and_false_positive_probability(
        mut self,
        capacity: usize,
        false_positive_probability: f64,
    ) -> Self {
        self.options.dimensions = DimensionsBuilder::new()
            .capacity(capacity)
            .false_positive_probability(false_positive_probability);
        self
    }

    /// Supply dimensions directly, partially or fully specified.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: DimensionsBuilder) -> Self {
        self.options.dimensions = dimensions;
        self
    }

    /// Enable scaling with the given growth factors.
    ///
    /// The conventional factors are `2.0` (double the bits per
    /// generation) and `0.8` (tighten the error rate by a fifth).
    #[must_use]
    pub fn with_scaling(
        mut self,
        capacity_scaling: f64,
        false_positive_probability_scaling: f64,
    ) -> Self {
        self.options.scaling =
            ScalingPolicy::scaling(capacity_scaling, false_positive_probability_scaling);
        self
    }

    /// Disable the capacity guard: adds proceed past capacity and the
    /// false positive rate degrades beyond the configured value.
    #[must_use]
    pub fn ignore_capacity_limits(mut self) -> Self {
        self.options.scaling.max_capacity_behavior = MaxCapacityBehavior::Ignore;
        self
    }

    /// Use a custom key hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn KeyHasher<K>>) -> Self {
        self.options.hasher = hasher;
        self
    }

    /// Wire up event callbacks.
    #[must_use]
    pub fn with_events(mut self, events: FilterEvents) -> Self {
        self.options.events = Arc::new(events);
        self
    }

    /// On parameter mismatch, let the imported state win.
    #[must_use]
    pub fn prefer_state_configuration(mut self) -> Self {
        self.options.state_validation = StateValidationBehavior::PreferStateConfiguration;
        self
    }

    /// On parameter mismatch, drop the imported state and start fresh.
    #[must_use]
    pub fn discard_inconsistent_state(mut self) -> Self {
        self.options.state_validation = StateValidationBehavior::DiscardInconsistentState;
        self
    }

    /// Import previously exported state.
    #[must_use]
    pub fn with_state(mut self, state: FilterState) -> Self {
        self.state = Some(state);
        self
    }

    /// Import state from its JSON document form.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] when the document does
    /// not decode.
    pub fn with_serialized_state(self, serialized: &str) -> Result<Self> {
        let state = FilterState::deserialize(serialized)?;
        Ok(self.with_state(state))
    }
}

impl<K: KeyBytes + ?Sized> BloomFilterBuilder<K> {
    /// Resolve configuration and state into a filter.
    ///
    /// # Errors
    ///
    /// - [`BloomGateError::InvalidParameters`] when dimensions cannot be
    ///   solved or fail validation
    /// - [`BloomGateError::ParameterMismatch`] when imported state
    ///   disagrees under [`StateValidationBehavior::ThrowIfInconsistent`]
    /// - [`BloomGateError::InvalidOptions`] when state names a hash
    ///   algorithm that is not registered
    /// - [`BloomGateError::InvalidSerializedState`] when the state's
    ///   structure does not match its parameters
    pub fn build(self) -> Result<BloomFilter<K>> {
        let BloomFilterBuilder { options, state } = self;
        let mut state = state;
        let mut hasher = options.hasher;

        let id = state
            .as_ref()
            .and_then(|s| s.parameters.as_ref())
            .map(|p| p.id().to_string())
            .or(options.id)
            .unwrap_or_else(generate_id);

        let dimensions = options.dimensions.build()?;
        let mut parameters =
            FilterParameters::new(id, dimensions, options.scaling, hasher.algorithm());

        if let Some(decoded) = state.as_ref().and_then(|s| s.parameters.clone()) {
            let inconsistencies = decoded.diff(&parameters);
            if !inconsistencies.is_empty() {
                match options.state_validation {
                    StateValidationBehavior::ThrowIfInconsistent => {
                        return Err(BloomGateError::parameter_mismatch(inconsistencies));
                    }
                    StateValidationBehavior::PreferStateConfiguration => {
                        if decoded.hash_algorithm() != hasher.algorithm() {
                            hasher = resolve_algorithm::<K>(decoded.hash_algorithm())?;
                        }
                        parameters = decoded;
                    }
                    StateValidationBehavior::DiscardInconsistentState => {
                        state = None;
                    }
                }
            }
        }

        parameters.validate()?;

        let mut state = state.unwrap_or_else(|| FilterState::new(parameters.clone()));
        state.parameters = Some(parameters.clone());

        if parameters.scaling().max_capacity_behavior == MaxCapacityBehavior::Scale {
            Ok(BloomFilter::Scaling(ScalingBloomFilter::from_state(
                &state,
                hasher,
                options.events,
            )?))
        } else {
            Ok(BloomFilter::Fixed(FixedBloomFilter::from_state(
                &state,
                hasher,
                options.events,
            )?))
        }
    }
}

/// Process-unique fallback id for filters built without one.
fn generate_id() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    format!("bloom-{}", NEXT.fetch_add(1, Ordering::Relaxed))
}
