//! Core value types: dimensions, parameters, policies, and bit storage.
//!
//! Everything in this module is a plain value with no concurrency
//! concerns — the filters in [`crate::filters`] wrap these in locks and
//! pools. Dimension solving lives in [`dimensions`], the capacity
//! policy in [`scaling`], the combined immutable configuration record
//! in [`params`], and the word-packed slice storage in [`bitslice`].

pub mod bitslice;
pub mod dimensions;
pub mod params;
pub mod primes;
pub mod scaling;

pub use bitslice::BitSlices;
pub use dimensions::{DimensionsBuilder, FilterDimensions};
pub use params::FilterParameters;
pub use primes::next_prime;
pub use scaling::{MaxCapacityBehavior, ScalingPolicy};
