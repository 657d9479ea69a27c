//! Default hasher: 32-bit Murmur3.
//!
//! MurmurHash3's x86 32-bit variant (Austin Appleby, public domain),
//! implemented directly so the output is fixed for all time — the bit
//! positions of every persisted filter depend on it. Fast, well
//! distributed, and deliberately not cryptographic.

use crate::hash::{KeyBytes, KeyHasher};

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// The default key hasher, algorithm id `"murmur3"`.
///
/// # Examples
///
/// ```
/// use bloomgate::hash::{KeyHasher, Murmur3};
///
/// let h = Murmur3.hash("hello", 0);
/// // Deterministic across processes and platforms.
/// assert_eq!(h, Murmur3.hash("hello", 0));
/// assert_ne!(h, Murmur3.hash("hello", 1));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Murmur3;

impl<K: KeyBytes + ?Sized> KeyHasher<K> for Murmur3 {
    fn algorithm(&self) -> &'static str {
        "murmur3"
    }

    fn hash(&self, key: &K, seed: u32) -> u32 {
        murmur3_32(key.key_bytes().as_ref(), seed)
    }
}

/// MurmurHash3 x86 32-bit over a byte slice.
#[must_use]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k1 = 0u32;
        if tail.len() == 3 {
            k1 ^= u32::from(tail[2]) << 16;
        }
        if tail.len() >= 2 {
            k1 ^= u32::from(tail[1]) << 8;
        }
        k1 ^= u32::from(tail[0]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    fmix32(h1)
}

/// Final avalanche mix.
#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
