//! bloomgate: Bloom filters with a two-phase add protocol and portable
//! persisted state.
//!
//! A Bloom filter answers "have I seen this key?" with bounded false
//! positives and **zero false negatives**: `contains` returning `false`
//! is definitive, `true` means "maybe, with probability ≤ p of being
//! wrong". This crate provides:
//!
//! - **Fixed-capacity filters** ([`FixedBloomFilter`]) — solved
//!   dimensions, prime-sized slices, enhanced double hashing, a
//!   reader-writer lock per filter.
//! - **Scaling filters** ([`ScalingBloomFilter`]) — chains of fixed
//!   generations that grow on demand per the Scalable Bloom Filters
//!   algorithm, keeping the compounded error rate under the target.
//! - **A two-phase add protocol** ([`CheckedEntry`], [`PreparedAdd`]) —
//!   check-and-hash under a shared read lock, commit under the write
//!   lock, no rehashing in between.
//! - **Portable persistence** ([`FilterState`]) — a versioned document
//!   that round-trips filter state byte-for-byte, with parameter
//!   consistency checking on rehydration.
//!
//! # Quick start
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<str>::new()
//!     .with_capacity_and_false_positive_probability(100_000, 0.01)
//!     .build()
//!     .unwrap();
//!
//! assert!(filter.insert("user:42").unwrap());   // newly added
//! assert!(filter.contains("user:42"));          // maybe present
//! assert!(!filter.contains("user:43"));         // definitely absent
//! ```
//!
//! # Growing without bounds
//!
//! When the item count is unknown, enable scaling instead of guessing a
//! capacity:
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<str>::new()
//!     .with_capacity_and_false_positive_probability(1_000, 0.01)
//!     .with_scaling(2.0, 0.8)
//!     .build()
//!     .unwrap();
//!
//! for i in 0..10_000 {
//!     filter.insert(&format!("event-{i}")).unwrap();
//! }
//! assert!(filter.contains("event-0"));
//! ```
//!
//! # Check now, add later
//!
//! Under concurrent check-then-add workloads, the two-phase protocol
//! avoids hashing the key twice and holds the write lock only for the
//! bit flips:
//!
//! ```
//! use bloomgate::BloomFilterBuilder;
//!
//! let filter = BloomFilterBuilder::<str>::new().build().unwrap();
//!
//! let entry = filter.check_and_prepare("expensive-job-7");
//! if entry.is_definitely_absent() {
//!     // ...run the job exactly once...
//!     entry.commit().unwrap();
//! }
//! ```
//!
//! # Persistence
//!
//! ```
//! use bloomgate::{BloomFilterBuilder, FilterState};
//!
//! let filter = BloomFilterBuilder::<str>::new().with_id("dedupe").build().unwrap();
//! filter.insert("seen-before").unwrap();
//!
//! let json = filter.state().serialize().unwrap();
//!
//! // Later, elsewhere:
//! let restored = BloomFilterBuilder::<str>::new()
//!     .with_serialized_state(&json)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! assert_eq!(restored.id(), "dedupe");
//! assert!(restored.contains("seen-before"));
//! ```
//!
//! # What this crate does not do
//!
//! No key deletion (bits are only ever set), no cryptographic
//! guarantees from the hash functions, and no exact membership — pair
//! the filter with an authoritative store when "definitely present"
//! matters.

pub mod builder;
pub mod core;
pub mod error;
pub mod events;
pub mod filters;
pub mod hash;
pub mod state;

pub use builder::{BloomFilterBuilder, BloomFilterOptions, StateValidationBehavior};
pub use error::{BloomGateError, Result};
pub use events::FilterEvents;
pub use filters::{BloomFilter, CheckedEntry, FixedBloomFilter, PreparedAdd, ScalingBloomFilter};
pub use state::FilterState;
