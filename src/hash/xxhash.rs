//! Alternative hasher: XXH32.
//!
//! Wraps the `xxhash-rust` implementation of 32-bit xxHash under the
//! algorithm id `"xxh32"`. Slightly faster than Murmur3 on longer keys;
//! filters persisted under one id cannot be rehydrated under the other.

use crate::hash::{KeyBytes, KeyHasher};
use xxhash_rust::xxh32::xxh32;

/// XXH32-backed key hasher, algorithm id `"xxh32"`.
///
/// # Examples
///
/// ```
/// use bloomgate::hash::{KeyHasher, Xxh32};
///
/// let hasher: &dyn KeyHasher<str> = &Xxh32;
/// assert_eq!(hasher.algorithm(), "xxh32");
/// assert_eq!(hasher.hash("hello", 0), hasher.hash("hello", 0));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh32;

impl<K: KeyBytes + ?Sized> KeyHasher<K> for Xxh32 {
    fn algorithm(&self) -> &'static str {
        "xxh32"
    }

    fn hash(&self, key: &K, seed: u32) -> u32 {
        xxh32(key.key_bytes().as_ref(), seed)
    }
}
