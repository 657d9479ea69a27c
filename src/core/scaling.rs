//! Capacity policy and scaling configuration.
//!
//! Every filter carries a [`ScalingPolicy`] describing what happens when
//! an add would exceed capacity: fail, grow a new generation, or carry
//! on past the error guarantee. The growth factors only matter (and are
//! only validated) when the behavior is [`MaxCapacityBehavior::Scale`].

use crate::error::{BloomGateError, Result};
use serde::{Deserialize, Serialize};

/// What a filter does when an add would exceed its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaxCapacityBehavior {
    /// Fail the add with
    /// [`MaxCapacityExceeded`](crate::BloomGateError::MaxCapacityExceeded).
    Throw,

    /// Grow a new generation using the algorithm from "Scalable Bloom
    /// Filters" (Almeida et al., 2007). Scaling avoids over-allocating
    /// when the item count is unknown; when the count *is* known, a
    /// fixed filter sized up front is smaller and faster.
    Scale,

    /// Keep adding even though the false positive rate will exceed the
    /// configured value. An explicit opt-out of the capacity guard, not
    /// an error-suppression mechanism.
    Ignore,
}

/// Scaling configuration: behavior plus per-generation growth factors.
///
/// # Examples
///
/// ```
/// use bloomgate::core::{MaxCapacityBehavior, ScalingPolicy};
///
/// let policy = ScalingPolicy::scaling(2.0, 0.8);
/// assert_eq!(policy.max_capacity_behavior, MaxCapacityBehavior::Scale);
/// policy.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingPolicy {
    /// Behavior when an add would exceed capacity.
    pub max_capacity_behavior: MaxCapacityBehavior,

    /// Bit-count multiplier per generation; must exceed 1.
    pub capacity_scaling: f64,

    /// False-positive-probability multiplier per generation; must lie in
    /// (0, 1) exclusive so the geometric sum of per-generation error
    /// stays below the configured target.
    pub false_positive_probability_scaling: f64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            max_capacity_behavior: MaxCapacityBehavior::Throw,
            capacity_scaling: 2.0,
            false_positive_probability_scaling: 0.8,
        }
    }
}

impl ScalingPolicy {
    /// A policy that scales with the given growth factors.
    #[must_use]
    pub fn scaling(capacity_scaling: f64, false_positive_probability_scaling: f64) -> Self {
        Self {
            max_capacity_behavior: MaxCapacityBehavior::Scale,
            capacity_scaling,
            false_positive_probability_scaling,
        }
    }

    /// Check the growth factors.
    ///
    /// Only meaningful under [`MaxCapacityBehavior::Scale`]; the factors
    /// are ignored (and therefore unvalidated) for `Throw` and `Ignore`.
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity_behavior == MaxCapacityBehavior::Scale {
            if self.capacity_scaling <= 1.0 {
                return Err(BloomGateError::invalid_parameters(
                    "CapacityScaling must be greater than 1",
                ));
            }

            if self.false_positive_probability_scaling <= 0.0
                || self.false_positive_probability_scaling >= 1.0
            {
                return Err(BloomGateError::invalid_parameters(
                    "FalsePositiveProbabilityScaling must be between 0 and 1 exclusive",
                ));
            }
        }

        Ok(())
    }

    /// List field-level mismatches against another policy.
    #[must_use]
    pub fn diff(&self, other: &ScalingPolicy) -> Vec<String> {
        let mut diff = Vec::new();

        if self.max_capacity_behavior != other.max_capacity_behavior {
            diff.push(format!(
                "MaxCapacityBehavior: {:?} != {:?}",
                self.max_capacity_behavior, other.max_capacity_behavior
            ));
        }

        if (self.capacity_scaling - other.capacity_scaling).abs() > f64::EPSILON {
            diff.push(format!(
                "CapacityScaling: {} != {}",
                self.capacity_scaling, other.capacity_scaling
            ));
        }

        if (self.false_positive_probability_scaling - other.false_positive_probability_scaling)
            .abs()
            > f64::EPSILON
        {
            diff.push(format!(
                "FalsePositiveProbabilityScaling: {} != {}",
                self.false_positive_probability_scaling,
                other.false_positive_probability_scaling
            ));
        }

        diff
    }
}
