//! Deterministic hashing for edge fingerprints and seed derivation.
//!
//! Not cryptographic. The only requirement is that the same bytes hash to the
//! same value on every platform and build, so a persisted table's fingerprint
//! can be compared against the live bucket configuration.

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

/// Stable 64-bit hash of `bytes`, salted with `seed`.
///
/// - FNV-1a over bytes
/// - SplitMix64 finalizer for diffusion
#[must_use]
pub fn stable_hash64(seed: u64, bytes: &[u8]) -> u64 {
    splitmix64(seed ^ fnv1a(FNV_OFFSET, bytes))
}

/// Stable hash of a sequence of `f64` slices.
///
/// Each value contributes its IEEE-754 bits (little-endian) and each slice is
/// terminated by its length, so `[[1.0], []]` and `[[], [1.0]]` differ.
#[must_use]
pub fn stable_hash_f64_groups(seed: u64, groups: &[&[f64]]) -> u64 {
    let mut h = FNV_OFFSET;
    for group in groups {
        for v in group.iter() {
            h = fnv1a(h, &v.to_bits().to_le_bytes());
        }
        h = fnv1a(h, &(group.len() as u64).to_le_bytes());
    }
    splitmix64(seed ^ h)
}

/// Derive an independent sub-seed for a named stream (e.g. exploration vs. environment).
#[must_use]
pub fn derive_seed(seed: u64, stream: &str) -> u64 {
    stable_hash64(seed, stream.as_bytes())
}

#[inline]
fn fnv1a(mut h: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
