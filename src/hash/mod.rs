//! Key hashing: deterministic seeded hashers and index expansion.
//!
//! Bloom filter bit positions must be reproducible across process
//! restarts — persisted bits are meaningless otherwise — so every
//! hasher here is deterministic with fixed seeds and no per-process
//! randomization. The algorithm's identity travels with the filter in
//! [`FilterParameters::hash_algorithm`](crate::core::FilterParameters::hash_algorithm)
//! and is checked when persisted state is rehydrated.
//!
//! # Enhanced double hashing
//!
//! Computing `k` independent hashes per key is the dominant cost of an
//! add. Instead, two seeded hashes `h1` and `h2` expand into `k` slice
//! indexes (Kirsch & Mitzenmacher, 2006):
//!
//! ```text
//! index[0] = h1 mod m
//! index[1] = h2 mod m
//! index[i] = (h1 + i) · h2 mod m      for i ≥ 2
//! ```
//!
//! with wrapping 32-bit arithmetic and `m` = bits per slice. See
//! [`slice_indexes`].
//!
//! # Custom key types
//!
//! Built-in hashers accept any key implementing [`KeyBytes`], which is
//! provided for strings, byte sequences, and the numeric primitives.
//! Other key types either implement `KeyBytes` or supply their own
//! [`KeyHasher`] to the builder; an algorithm registered under a custom
//! id will fail rehydration against state written by a different
//! algorithm, which is exactly the point.

pub mod murmur3;
pub mod xxhash;

pub use murmur3::Murmur3;
pub use xxhash::Xxh32;

use crate::error::{BloomGateError, Result};
use std::borrow::Cow;
use std::sync::Arc;

/// Algorithm id used when the builder is not told otherwise.
pub const DEFAULT_ALGORITHM: &str = "murmur3";

/// Seed for the first base hash.
pub const FIRST_HASH_SEED: u32 = 0;

/// Seed for the second base hash.
pub const SECOND_HASH_SEED: u32 = 1_234_567;

/// A deterministic, seeded hash over a key type.
///
/// Implementations must return the same value for the same `(key,
/// seed)` in every process, forever: the output feeds persisted bit
/// positions. That also means an implementation must never be changed
/// once state written with it exists — register a new algorithm id
/// instead.
pub trait KeyHasher<K: ?Sized>: Send + Sync {
    /// Stable identifier persisted with the filter parameters.
    fn algorithm(&self) -> &'static str;

    /// Hash `key` under `seed` to a full-range 32-bit value.
    ///
    /// Callers reduce the result modulo the slice size; implementations
    /// must not pre-reduce.
    fn hash(&self, key: &K, seed: u32) -> u32;
}

/// Byte representation of a key, for the built-in byte-oriented hashers.
///
/// The representation must be stable across runs and platforms:
/// integers use little-endian encoding, floats their IEEE-754 bit
/// pattern.
pub trait KeyBytes {
    /// The key's canonical bytes.
    fn key_bytes(&self) -> Cow<'_, [u8]>;
}

impl KeyBytes for str {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl KeyBytes for String {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl KeyBytes for [u8] {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl KeyBytes for Vec<u8> {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_slice())
    }
}

impl<const N: usize> KeyBytes for [u8; N] {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_slice())
    }
}

macro_rules! key_bytes_for_int {
    ($($t:ty),*) => {
        $(
            impl KeyBytes for $t {
                fn key_bytes(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_le_bytes().to_vec())
                }
            }
        )*
    };
}

key_bytes_for_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl KeyBytes for usize {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        // Fixed 8-byte encoding so 32- and 64-bit builds agree.
        Cow::Owned((*self as u64).to_le_bytes().to_vec())
    }
}

impl KeyBytes for isize {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned((*self as i64).to_le_bytes().to_vec())
    }
}

impl KeyBytes for f32 {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_bits().to_le_bytes().to_vec())
    }
}

impl KeyBytes for f64 {
    fn key_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_bits().to_le_bytes().to_vec())
    }
}

/// Resolve a built-in hasher by its persisted algorithm id.
///
/// Used when rehydrating state whose parameters name an algorithm other
/// than the configured one (under `PreferStateConfiguration`). This is
/// an explicit registry: unknown ids fail instead of being conjured up
/// reflectively.
///
/// # Errors
///
/// [`BloomGateError::InvalidOptions`] for an unregistered id.
pub fn resolve_algorithm<K>(algorithm: &str) -> Result<Arc<dyn KeyHasher<K>>>
where
    K: KeyBytes + ?Sized,
{
    match algorithm {
        "murmur3" => Ok(Arc::new(Murmur3)),
        "xxh32" => Ok(Arc::new(Xxh32)),
        other => Err(BloomGateError::invalid_options(format!(
            "hash algorithm '{}' is not registered; built-ins are 'murmur3' and 'xxh32'",
            other
        ))),
    }
}

/// Expand two base hashes into one index per slice.
///
/// `out.len()` determines `k`; every index is reduced modulo `modulus`.
#[inline]
pub fn slice_indexes(h1: u32, h2: u32, modulus: usize, out: &mut [usize]) {
    debug_assert!(modulus > 0);

    if let Some(slot) = out.get_mut(0) {
        *slot = h1 as usize % modulus;
    }
    if let Some(slot) = out.get_mut(1) {
        *slot = h2 as usize % modulus;
    }
    for (i, slot) in out.iter_mut().enumerate().skip(2) {
        let mixed = h1.wrapping_add(i as u32).wrapping_mul(h2);
        *slot = mixed as usize % modulus;
    }
}
